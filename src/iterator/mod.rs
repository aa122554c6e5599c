/// Iterator module
///
/// Produces one ordered key stream from three sources:
/// - the batch's point index, bounded by the iterator's visible length
/// - a cursor over the base store's read snapshot
/// - the batch's range deletions and range keys, resolved as of the same
///   visible length
///
/// # Architecture
///
/// ```text
/// BatchIter (facade: watermark, base snapshot, limits, clone/refresh)
///     ↓
/// InterleavingIterator (point keys + range-key spans)
///     ↓
/// MergingIterator (range-deletion masking)
///     ├─→ VersionedIterator over PointIndex (batch, newest)
///     └─→ base store cursor (oldest)
/// ```
///
/// ## Key Design Principles
///
/// 1. **Batch Wins**: a batch Set/Delete shadows the base entry for the key
/// 2. **Masking**: a range deletion hides older points under its span
/// 3. **Frozen Views**: repositioning never changes the watermark
/// 4. **Bidirectional**: every layer supports forward and backward moves
use crate::util::{Result, Slice};

/// Cursor over a sorted source of point entries.
///
/// # Lifecycle
///
/// A cursor starts unpositioned. Call one of the seek methods to position
/// it:
///
/// ```ignore
/// let mut iter = snapshot.cursor()?;
/// iter.seek_to_first()?;  // Position at first key
/// while iter.valid() {
///     println!("{:?}: {:?}", iter.key(), iter.value());
///     iter.next()?;
/// }
/// ```
///
/// # Error Handling
///
/// Operations return `Result` so that base-store read failures surface to
/// the caller. The cursor state after an error is unspecified until the
/// next absolute positioning call.
pub trait Iterator: Send {
    /// Position at the first key in the source
    ///
    /// Returns Ok(true) if positioned, Ok(false) if source is empty
    fn seek_to_first(&mut self) -> Result<bool>;

    /// Position at the last key in the source
    ///
    /// Returns Ok(true) if positioned, Ok(false) if source is empty
    fn seek_to_last(&mut self) -> Result<bool>;

    /// Position at the first key >= target
    fn seek_ge(&mut self, target: &Slice) -> Result<bool>;

    /// Position at the last key < target
    fn seek_lt(&mut self, target: &Slice) -> Result<bool>;

    /// Move to the next entry
    ///
    /// Prerequisite: valid() == true
    fn next(&mut self) -> Result<bool>;

    /// Move to the previous entry
    ///
    /// Prerequisite: valid() == true
    fn prev(&mut self) -> Result<bool>;

    /// Prerequisite: valid() == true
    fn key(&self) -> Slice;

    /// Prerequisite: valid() == true
    fn value(&self) -> Slice;

    fn valid(&self) -> bool;

    /// Whether the current entry is a tombstone
    ///
    /// Sources that already hide their deletions keep the default.
    fn is_deletion(&self) -> bool {
        false
    }

    /// Batch sequence number of the current entry
    ///
    /// `None` means the entry predates every batch operation, which is the
    /// case for all base-store entries.
    fn sequence(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

mod batch_iterator;
mod format;
mod interleaving_iterator;
mod merging_iterator;
mod versioned_iterator;

pub use batch_iterator::{BatchIter, CloneOptions, IterOptions, IterValidity};
pub use format::{format_position, format_validity};
pub use interleaving_iterator::{InterleavingIterator, Position};
pub use merging_iterator::MergingIterator;
pub use versioned_iterator::VersionedIterator;
