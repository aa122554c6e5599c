use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::trace;
use parking_lot::Mutex;

use crate::{
    batch::{BatchOp, BatchOptions},
    fragment::{FragmentCache, FragmentView},
    index::{PointIndex, VersionMap},
    iterator::{BatchIter, IterOptions},
    statistics::Statistics,
    store::{BaseStore, ReadSnapshot},
    util::{Comparer, Result, Slice, Status},
};

/// Indexed batch of uncommitted mutations
///
/// Operations are appended to a mutation log and assigned consecutive
/// sequence numbers starting at 0. Point operations are indexed as they
/// are appended; range operations are folded into the fragment cache
/// lazily, when an iterator first asks for a view that includes them.
///
/// Iterators created by [`Batch::new_iter`] share the batch state and
/// stay valid while the batch keeps growing. Each iterator only observes
/// operations below its own visible length.
pub struct Batch {
    inner: Arc<BatchInner>,
}

pub(crate) struct BatchInner {
    comparer: Comparer,
    /// Mutation lock: appends and fragment-cache extension are serialized
    /// under it. Readers of an already-resolved view need no lock.
    log: Mutex<MutationLog>,
    /// Published log length; every op below it is in `index`.
    len: AtomicU64,
    index: PointIndex,
    store: Arc<dyn BaseStore>,
    stats: Arc<Statistics>,
}

struct MutationLog {
    ops: Vec<BatchOp>,
    fragments: FragmentCache,
    range_ops: usize,
    data_size: usize,
}

impl Batch {
    pub fn new(store: Arc<dyn BaseStore>) -> Self {
        Self::with_options(store, BatchOptions::default())
    }

    pub fn with_options(store: Arc<dyn BaseStore>, options: BatchOptions) -> Self {
        let stats = Arc::new(Statistics::new());
        let comparer = options.comparer();
        let log = MutationLog {
            ops: Vec::with_capacity(options.initial_capacity),
            fragments: FragmentCache::new(comparer, options.validate_fragments, stats.clone()),
            range_ops: 0,
            data_size: 0,
        };
        Batch {
            inner: Arc::new(BatchInner {
                comparer,
                log: Mutex::new(log),
                len: AtomicU64::new(0),
                index: PointIndex::new(),
                store,
                stats,
            }),
        }
    }

    pub fn set(&mut self, key: impl Into<Slice>, value: impl Into<Slice>) -> Result<()> {
        self.inner.append(BatchOp::Set {
            key: key.into(),
            value: value.into(),
        });
        Ok(())
    }

    pub fn delete(&mut self, key: impl Into<Slice>) -> Result<()> {
        self.inner.append(BatchOp::Delete { key: key.into() });
        Ok(())
    }

    /// Delete every point key in `[start, end)`.
    pub fn delete_range(&mut self, start: impl Into<Slice>, end: impl Into<Slice>) -> Result<()> {
        let (start, end) = check_span(start.into(), end.into())?;
        self.inner.append(BatchOp::DeleteRange { start, end });
        Ok(())
    }

    pub fn range_key_set(
        &mut self,
        start: impl Into<Slice>,
        end: impl Into<Slice>,
        suffix: impl Into<Slice>,
        value: impl Into<Slice>,
    ) -> Result<()> {
        let (start, end) = check_span(start.into(), end.into())?;
        let suffix = suffix.into();
        self.inner.comparer.validate_suffix(suffix.data())?;
        self.inner.append(BatchOp::RangeKeySet {
            start,
            end,
            suffix,
            value: value.into(),
        });
        Ok(())
    }

    pub fn range_key_unset(
        &mut self,
        start: impl Into<Slice>,
        end: impl Into<Slice>,
        suffix: impl Into<Slice>,
    ) -> Result<()> {
        let (start, end) = check_span(start.into(), end.into())?;
        let suffix = suffix.into();
        self.inner.comparer.validate_suffix(suffix.data())?;
        self.inner
            .append(BatchOp::RangeKeyUnset { start, end, suffix });
        Ok(())
    }

    /// Remove all range keys in `[start, end)`.
    pub fn range_key_delete(&mut self, start: impl Into<Slice>, end: impl Into<Slice>) -> Result<()> {
        let (start, end) = check_span(start.into(), end.into())?;
        self.inner.append(BatchOp::RangeKeyDelete { start, end });
        Ok(())
    }

    /// Read-your-writes lookup: the batch first, then the base store's
    /// current contents.
    pub fn get(&self, key: &Slice) -> Result<Option<Slice>> {
        let visible = self.inner.len();
        let range_del = self.inner.fragments_as_of(visible)?.range_del_seq_at(key);

        if let Some((seq, value)) = self.inner.index.get(key, visible) {
            self.inner.stats.record_batch_hit();
            if value.is_deletion() || range_del.is_some_and(|del| del > seq) {
                return Ok(None);
            }
            return Ok(Some(value.value()));
        }
        if range_del.is_some() {
            return Ok(None);
        }

        self.inner.stats.record_base_lookup();
        let snapshot = self.inner.open_read_snapshot()?;
        let mut cursor = snapshot.cursor()?;
        if cursor.seek_ge(key)? && cursor.key() == *key {
            Ok(Some(cursor.value()))
        } else {
            Ok(None)
        }
    }

    /// Iterator over the batch as of now merged with the base store's
    /// current contents.
    pub fn new_iter(&self, options: IterOptions) -> Result<BatchIter> {
        BatchIter::new(self.inner.clone(), options)
    }

    /// Number of operations in the mutation log
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    /// Same as [`Batch::len`], in the sequence-number domain
    #[inline]
    pub fn count(&self) -> u64 {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of range deletions and range-key operations appended
    pub fn range_op_count(&self) -> usize {
        self.inner.log.lock().range_ops
    }

    /// Approximate memory usage in bytes
    pub fn data_size(&self) -> usize {
        self.inner.log.lock().data_size
    }

    /// Log length the fragment cache has folded in
    pub fn fragment_watermark(&self) -> u64 {
        self.inner.log.lock().fragments.watermark()
    }

    pub fn op(&self, index: usize) -> Option<BatchOp> {
        self.inner.log.lock().ops.get(index).cloned()
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.inner.stats
    }

    pub fn comparer(&self) -> Comparer {
        self.inner.comparer
    }
}

impl BatchInner {
    fn append(&self, op: BatchOp) {
        let mut log = self.log.lock();
        let seq = log.ops.len() as u64;

        match &op {
            BatchOp::Set { key, value } => self.index.add(seq, key.clone(), value.clone()),
            BatchOp::Delete { key } => self.index.delete(seq, key.clone()),
            _ => log.range_ops += 1,
        }
        let size = op.data_size();
        self.stats.record_append(size as u64, op.is_range_op());
        trace!("batch append {} at {seq}", op.name());

        log.data_size += size;
        log.ops.push(op);
        self.len.store(seq + 1, Ordering::Release);
    }

    #[inline]
    pub(crate) fn len(&self) -> u64 {
        self.len.load(Ordering::Acquire)
    }

    /// Range deletions and range keys as of `visible`.
    pub(crate) fn fragments_as_of(&self, visible: u64) -> Result<Arc<FragmentView>> {
        let mut log = self.log.lock();
        let MutationLog { ops, fragments, .. } = &mut *log;
        fragments.view(ops, visible)
    }

    pub(crate) fn index_map(&self) -> Arc<VersionMap> {
        self.index.map()
    }

    pub(crate) fn comparer(&self) -> Comparer {
        self.comparer
    }

    pub(crate) fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    pub(crate) fn open_read_snapshot(&self) -> Result<Arc<dyn ReadSnapshot>> {
        self.stats.record_base_snapshot();
        self.store.open_read_snapshot()
    }
}

fn check_span(start: Slice, end: Slice) -> Result<(Slice, Slice)> {
    if start >= end {
        return Err(Status::invalid_argument(format!(
            "inverted or empty range [{start}-{end})"
        )));
    }
    Ok((start, end))
}
