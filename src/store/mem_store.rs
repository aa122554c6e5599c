use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use log::debug;
use parking_lot::Mutex;

use crate::{
    index::{PointIndex, VersionMap},
    iterator::{Iterator, VersionedIterator},
    store::{BaseStore, FaultInjector, ReadSnapshot},
    util::{Result, Slice},
};

/// In-memory versioned store
///
/// Each write gets the next sequence number; a snapshot pins the sequence
/// number current at acquisition and never sees later writes.
pub struct MemStore {
    index: PointIndex,
    /// Next sequence number. Writers hold the lock across the insert so a
    /// snapshot never pins a sequence whose entry is not yet in the index.
    sequence: Mutex<u64>,
    faults: Arc<FaultInjector>,
    live_snapshots: Arc<AtomicUsize>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore {
            index: PointIndex::new(),
            sequence: Mutex::new(0),
            faults: Arc::new(FaultInjector::new()),
            live_snapshots: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn put(&self, key: impl Into<Slice>, value: impl Into<Slice>) {
        let mut seq = self.sequence.lock();
        self.index.add(*seq, key.into(), value.into());
        *seq += 1;
    }

    pub fn delete(&self, key: impl Into<Slice>) {
        let mut seq = self.sequence.lock();
        self.index.delete(*seq, key.into());
        *seq += 1;
    }

    /// Latest committed value of `key`.
    pub fn get(&self, key: &Slice) -> Option<Slice> {
        let visible = *self.sequence.lock();
        match self.index.get(key, visible) {
            Some((_, value)) if !value.is_deletion() => Some(value.value()),
            _ => None,
        }
    }

    /// Create a snapshot at the current sequence number
    pub fn get_snapshot(&self) -> MemSnapshot {
        let sequence = *self.sequence.lock();
        self.live_snapshots.fetch_add(1, Ordering::SeqCst);
        debug!("store snapshot acquired at sequence {sequence}");
        MemSnapshot {
            map: self.index.map(),
            sequence,
            faults: self.faults.clone(),
            _marker: SnapshotMarker {
                live: self.live_snapshots.clone(),
            },
        }
    }

    pub fn faults(&self) -> &Arc<FaultInjector> {
        &self.faults
    }

    /// Snapshots acquired and not yet released.
    pub fn live_snapshots(&self) -> usize {
        self.live_snapshots.load(Ordering::SeqCst)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseStore for MemStore {
    fn open_read_snapshot(&self) -> Result<Arc<dyn ReadSnapshot>> {
        Ok(Arc::new(self.get_snapshot()))
    }
}

/// Point-in-time view of a [`MemStore`]
pub struct MemSnapshot {
    map: Arc<VersionMap>,
    /// Sequence number at snapshot creation
    sequence: u64,
    faults: Arc<FaultInjector>,
    _marker: SnapshotMarker,
}

/// Tracks snapshot lifetime
struct SnapshotMarker {
    live: Arc<AtomicUsize>,
}

impl Drop for SnapshotMarker {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReadSnapshot for MemSnapshot {
    fn cursor(&self) -> Result<Box<dyn Iterator>> {
        Ok(Box::new(MemStoreCursor {
            inner: VersionedIterator::live_only(self.map.clone(), self.sequence),
            faults: self.faults.clone(),
        }))
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Snapshot cursor whose moves pass through the fault injector.
struct MemStoreCursor {
    inner: VersionedIterator,
    faults: Arc<FaultInjector>,
}

impl Iterator for MemStoreCursor {
    fn seek_to_first(&mut self) -> Result<bool> {
        self.faults.check("seek_to_first")?;
        self.inner.seek_to_first()
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        self.faults.check("seek_to_last")?;
        self.inner.seek_to_last()
    }

    fn seek_ge(&mut self, target: &Slice) -> Result<bool> {
        self.faults.check("seek_ge")?;
        self.inner.seek_ge(target)
    }

    fn seek_lt(&mut self, target: &Slice) -> Result<bool> {
        self.faults.check("seek_lt")?;
        self.inner.seek_lt(target)
    }

    fn next(&mut self) -> Result<bool> {
        self.faults.check("next")?;
        self.inner.next()
    }

    fn prev(&mut self) -> Result<bool> {
        self.faults.check("prev")?;
        self.inner.prev()
    }

    fn key(&self) -> Slice {
        self.inner.key()
    }

    fn value(&self) -> Slice {
        self.inner.value()
    }

    fn valid(&self) -> bool {
        self.inner.valid()
    }
}
