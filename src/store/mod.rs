mod fault;
mod mem_store;

use std::sync::Arc;

pub use fault::FaultInjector;
pub use mem_store::{MemSnapshot, MemStore};

use crate::{iterator::Iterator, util::Result};

/// Base store contract
///
/// The batch reads committed state through a [`ReadSnapshot`]: an open,
/// closeable read state that stays fixed until dropped. Cursors created
/// from one snapshot all observe the same contents.
pub trait BaseStore: Send + Sync {
    /// Capture the store's current contents.
    fn open_read_snapshot(&self) -> Result<Arc<dyn ReadSnapshot>>;
}

pub trait ReadSnapshot: Send + Sync {
    /// New unpositioned cursor over the snapshot.
    fn cursor(&self) -> Result<Box<dyn Iterator>>;

    /// Store-specific identifier of the captured state.
    fn sequence(&self) -> u64;
}
