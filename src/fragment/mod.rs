mod fragmenter;
mod view;

pub use fragmenter::FragmentCache;
pub use view::{FragmentView, RangeDelSpan, RangeKeySpan, RangeKeyValue};
