pub mod batch;
pub mod fragment;
pub mod index;
pub mod iterator;
pub mod statistics;
pub mod store;
pub mod util;

pub use batch::{Batch, BatchOp, BatchOptions};
pub use fragment::{FragmentView, RangeKeySpan, RangeKeyValue};
pub use iterator::{BatchIter, CloneOptions, IterOptions, IterValidity, format_position, format_validity};
pub use statistics::Statistics;
pub use store::{BaseStore, FaultInjector, MemStore, ReadSnapshot};
pub use util::{Code, Comparer, Result, Slice, Status};
