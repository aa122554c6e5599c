use std::{
    cmp::Ordering,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
};

use crossbeam_skiplist::SkipMap;

use crate::util::Slice;

/// Versioned key: user key ascending, then sequence number descending, so
/// the newest version of a user key is the first entry for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalKey {
    user_key: Slice,
    sequence: u64,
}

impl InternalKey {
    pub fn new(user_key: Slice, sequence: u64) -> Self {
        InternalKey { user_key, sequence }
    }

    /// Key that sorts before every version of `user_key`.
    pub fn seek_key(user_key: Slice) -> Self {
        InternalKey::new(user_key, u64::MAX)
    }

    /// Key that sorts after every version of `user_key`.
    pub fn last_version(user_key: Slice) -> Self {
        InternalKey::new(user_key, 0)
    }

    pub fn user_key(&self) -> &Slice {
        &self.user_key
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexValue {
    Value(Slice),
    Deletion,
}

impl IndexValue {
    pub fn is_deletion(&self) -> bool {
        matches!(self, IndexValue::Deletion)
    }

    pub fn value(&self) -> Slice {
        match self {
            IndexValue::Value(v) => v.clone(),
            IndexValue::Deletion => Slice::empty(),
        }
    }
}

pub type VersionMap = SkipMap<InternalKey, IndexValue>;

/// Ordered multi-version index of point operations.
///
/// Every Set/Delete is kept under its sequence number; readers pick the
/// newest version below the watermark they hold. Entries are never
/// removed, so a reader bounded by watermark `L` sees the same result no
/// matter how many operations are added after `L`.
pub struct PointIndex {
    map: Arc<VersionMap>,
    approximate_memory: AtomicUsize,
}

impl PointIndex {
    pub fn new() -> Self {
        PointIndex {
            map: Arc::new(SkipMap::new()),
            approximate_memory: AtomicUsize::new(0),
        }
    }

    pub fn add(&self, sequence: u64, key: Slice, value: Slice) {
        self.approximate_memory
            .fetch_add(key.size() + value.size() + 8, AtomicOrdering::Relaxed);
        self.map
            .insert(InternalKey::new(key, sequence), IndexValue::Value(value));
    }

    pub fn delete(&self, sequence: u64, key: Slice) {
        self.approximate_memory
            .fetch_add(key.size() + 8, AtomicOrdering::Relaxed);
        self.map
            .insert(InternalKey::new(key, sequence), IndexValue::Deletion);
    }

    /// Newest version of `key` with a sequence number below `visible`.
    pub fn get(&self, key: &Slice, visible: u64) -> Option<(u64, IndexValue)> {
        newest_visible(&self.map, key, visible).map(|(k, v)| (k.sequence(), v))
    }

    pub fn map(&self) -> Arc<VersionMap> {
        self.map.clone()
    }

    /// Number of versions stored, across all user keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn approximate_memory_usage(&self) -> usize {
        self.approximate_memory.load(AtomicOrdering::Relaxed)
    }
}

impl Default for PointIndex {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn newest_visible(
    map: &VersionMap,
    key: &Slice,
    visible: u64,
) -> Option<(InternalKey, IndexValue)> {
    if visible == 0 {
        return None;
    }
    map.range(InternalKey::new(key.clone(), visible - 1)..)
        .next()
        .filter(|entry| entry.key().user_key() == key)
        .map(|entry| (entry.key().clone(), entry.value().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_index_put_get() {
        let index = PointIndex::new();
        index.add(0, Slice::from("key1"), Slice::from("value1"));

        let (seq, value) = index.get(&Slice::from("key1"), 1).unwrap();
        assert_eq!(seq, 0);
        assert_eq!(value, IndexValue::Value(Slice::from("value1")));
    }

    #[test]
    fn test_point_index_watermark() {
        let index = PointIndex::new();
        index.add(0, Slice::from("key1"), Slice::from("value1"));
        index.add(3, Slice::from("key1"), Slice::from("value2"));
        index.delete(5, Slice::from("key1"));

        assert_eq!(index.get(&Slice::from("key1"), 0), None);
        assert_eq!(
            index.get(&Slice::from("key1"), 3).map(|(_, v)| v),
            Some(IndexValue::Value(Slice::from("value1")))
        );
        assert_eq!(
            index.get(&Slice::from("key1"), 4).map(|(_, v)| v),
            Some(IndexValue::Value(Slice::from("value2")))
        );
        assert_eq!(
            index.get(&Slice::from("key1"), 6).map(|(_, v)| v),
            Some(IndexValue::Deletion)
        );
    }

    #[test]
    fn test_point_index_prefix_keys_do_not_collide() {
        let index = PointIndex::new();
        index.add(0, Slice::from("a"), Slice::from("1"));
        index.add(1, Slice::from("a\x00"), Slice::from("2"));

        assert_eq!(
            index.get(&Slice::from("a"), 2).map(|(_, v)| v),
            Some(IndexValue::Value(Slice::from("1")))
        );
        assert_eq!(index.get(&Slice::from("b"), 2), None);
    }

    #[test]
    fn test_internal_key_order() {
        let newer = InternalKey::new(Slice::from("k"), 9);
        let older = InternalKey::new(Slice::from("k"), 2);
        assert!(newer < older);
        assert!(InternalKey::seek_key(Slice::from("k")) < newer);
        assert!(older < InternalKey::seek_key(Slice::from("k\x00")));
    }

    #[test]
    fn test_point_index_memory_usage() {
        let index = PointIndex::new();
        assert_eq!(index.approximate_memory_usage(), 0);

        index.add(0, Slice::from("key1"), Slice::from("value1"));
        assert!(index.approximate_memory_usage() > 0);
    }
}
