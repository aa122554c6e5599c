mod comparer;
mod slice;
mod status;

pub use comparer::Comparer;
pub use slice::Slice;
pub use status::{Code, Result, Status};
