#[allow(clippy::module_inception)]
mod batch;
mod batch_op;
mod options;

pub(crate) use batch::BatchInner;
pub use batch::Batch;
pub use batch_op::BatchOp;
pub use options::BatchOptions;
