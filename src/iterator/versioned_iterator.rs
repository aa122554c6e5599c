use std::{ops::Bound, sync::Arc};

use crate::{
    index::{InternalKey, IndexValue, VersionMap, point_index::newest_visible},
    iterator::Iterator,
    util::{Result, Slice},
};

/// Iterator over a [`VersionMap`] bounded by a watermark
///
/// Only versions with a sequence number below `visible` exist for this
/// iterator; for each user key the newest of those is surfaced.
///
/// # Implementation Notes
///
/// The skiplist entries borrow from the map, so the iterator remembers
/// the current internal key and re-enters the map with a range query on
/// every move. Each move is O(log n).
pub struct VersionedIterator {
    map: Arc<VersionMap>,
    visible: u64,
    /// Tombstones are surfaced (with their sequence number) for the batch
    /// index, so the merge can shadow base entries. A store snapshot hides
    /// them, and its own sequence numbers are not batch positions.
    surface_tombstones: bool,
    current: Option<(InternalKey, IndexValue)>,
}

impl VersionedIterator {
    /// Batch-side iterator: tombstones and sequence numbers are exposed.
    pub fn with_tombstones(map: Arc<VersionMap>, visible: u64) -> Self {
        VersionedIterator {
            map,
            visible,
            surface_tombstones: true,
            current: None,
        }
    }

    /// Snapshot-side iterator: deleted keys are skipped.
    pub fn live_only(map: Arc<VersionMap>, visible: u64) -> Self {
        VersionedIterator {
            map,
            visible,
            surface_tombstones: false,
            current: None,
        }
    }

    pub fn visible(&self) -> u64 {
        self.visible
    }

    fn find_forward(&mut self, lower: Bound<InternalKey>) -> bool {
        let mut hidden: Option<Slice> = None;
        let mut found = None;

        for entry in self.map.range((lower, Bound::Unbounded)) {
            let key = entry.key();
            if key.sequence() >= self.visible || hidden.as_ref() == Some(key.user_key()) {
                continue;
            }
            // Newest visible version of this user key.
            if !self.surface_tombstones && entry.value().is_deletion() {
                hidden = Some(key.user_key().clone());
                continue;
            }
            found = Some((key.clone(), entry.value().clone()));
            break;
        }

        self.current = found;
        self.current.is_some()
    }

    fn find_backward(&mut self, upper: Bound<InternalKey>) -> bool {
        let mut upper = upper;
        loop {
            let user_key = match self.map.range((Bound::Unbounded, upper)).next_back() {
                Some(entry) => entry.key().user_key().clone(),
                None => {
                    self.current = None;
                    return false;
                },
            };

            if let Some((key, value)) = newest_visible(&self.map, &user_key, self.visible) {
                if self.surface_tombstones || !value.is_deletion() {
                    self.current = Some((key, value));
                    return true;
                }
            }
            upper = Bound::Excluded(InternalKey::seek_key(user_key));
        }
    }
}

impl Iterator for VersionedIterator {
    fn seek_to_first(&mut self) -> Result<bool> {
        Ok(self.find_forward(Bound::Unbounded))
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        Ok(self.find_backward(Bound::Unbounded))
    }

    fn seek_ge(&mut self, target: &Slice) -> Result<bool> {
        Ok(self.find_forward(Bound::Included(InternalKey::seek_key(target.clone()))))
    }

    fn seek_lt(&mut self, target: &Slice) -> Result<bool> {
        Ok(self.find_backward(Bound::Excluded(InternalKey::seek_key(target.clone()))))
    }

    fn next(&mut self) -> Result<bool> {
        let Some((key, _)) = self.current.take() else {
            return Ok(false);
        };
        let after = InternalKey::last_version(key.user_key().clone());
        Ok(self.find_forward(Bound::Excluded(after)))
    }

    fn prev(&mut self) -> Result<bool> {
        let Some((key, _)) = self.current.take() else {
            return Ok(false);
        };
        let before = InternalKey::seek_key(key.user_key().clone());
        Ok(self.find_backward(Bound::Excluded(before)))
    }

    fn key(&self) -> Slice {
        self.current
            .as_ref()
            .map(|(k, _)| k.user_key().clone())
            .unwrap_or_else(Slice::empty)
    }

    fn value(&self) -> Slice {
        self.current
            .as_ref()
            .map(|(_, v)| v.value())
            .unwrap_or_else(Slice::empty)
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn is_deletion(&self) -> bool {
        self.current.as_ref().is_some_and(|(_, v)| v.is_deletion())
    }

    fn sequence(&self) -> Option<u64> {
        if !self.surface_tombstones {
            return None;
        }
        self.current.as_ref().map(|(k, _)| k.sequence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PointIndex;

    fn collect_forward(iter: &mut VersionedIterator) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut valid = iter.seek_to_first().unwrap();
        while valid {
            out.push((iter.key().to_string(), iter.value().to_string()));
            valid = iter.next().unwrap();
        }
        out
    }

    #[test]
    fn test_versioned_iterator_basic() {
        let index = PointIndex::new();
        index.add(0, Slice::from("key1"), Slice::from("value1"));
        index.add(1, Slice::from("key2"), Slice::from("value2"));
        index.add(2, Slice::from("key3"), Slice::from("value3"));

        let mut iter = VersionedIterator::with_tombstones(index.map(), 3);
        assert!(iter.seek_to_first().unwrap());
        assert_eq!(iter.key(), Slice::from("key1"));
        assert_eq!(iter.value(), Slice::from("value1"));

        assert!(iter.next().unwrap());
        assert_eq!(iter.key(), Slice::from("key2"));

        assert!(iter.next().unwrap());
        assert_eq!(iter.key(), Slice::from("key3"));

        assert!(!iter.next().unwrap());
        assert!(!iter.valid());
    }

    #[test]
    fn test_versioned_iterator_respects_watermark() {
        let index = PointIndex::new();
        index.add(0, Slice::from("b"), Slice::from("b0"));
        index.add(1, Slice::from("a"), Slice::from("a1"));
        index.add(2, Slice::from("b"), Slice::from("b2"));

        let mut iter = VersionedIterator::with_tombstones(index.map(), 1);
        assert_eq!(
            collect_forward(&mut iter),
            vec![("b".to_string(), "b0".to_string())]
        );

        let mut iter = VersionedIterator::with_tombstones(index.map(), 3);
        assert_eq!(
            collect_forward(&mut iter),
            vec![
                ("a".to_string(), "a1".to_string()),
                ("b".to_string(), "b2".to_string())
            ]
        );
    }

    #[test]
    fn test_versioned_iterator_tombstones() {
        let index = PointIndex::new();
        index.add(0, Slice::from("key1"), Slice::from("value1"));
        index.delete(1, Slice::from("key2"));
        index.add(2, Slice::from("key3"), Slice::from("value3"));

        let mut iter = VersionedIterator::with_tombstones(index.map(), 3);
        assert!(iter.seek_ge(&Slice::from("key2")).unwrap());
        assert!(iter.is_deletion());
        assert_eq!(iter.sequence(), Some(1));

        let mut iter = VersionedIterator::live_only(index.map(), 3);
        assert!(iter.seek_ge(&Slice::from("key2")).unwrap());
        assert_eq!(iter.key(), Slice::from("key3"));
        assert_eq!(iter.sequence(), None);
    }

    #[test]
    fn test_versioned_iterator_backward() {
        let index = PointIndex::new();
        index.add(0, Slice::from("a"), Slice::from("1"));
        index.add(1, Slice::from("c"), Slice::from("2"));
        index.delete(2, Slice::from("c"));
        index.add(3, Slice::from("e"), Slice::from("3"));

        let mut iter = VersionedIterator::live_only(index.map(), 4);
        assert!(iter.seek_to_last().unwrap());
        assert_eq!(iter.key(), Slice::from("e"));
        assert!(iter.prev().unwrap());
        assert_eq!(iter.key(), Slice::from("a"));
        assert!(!iter.prev().unwrap());

        // The deletion at seq 2 is not visible at watermark 2.
        let mut iter = VersionedIterator::live_only(index.map(), 2);
        assert!(iter.seek_lt(&Slice::from("d")).unwrap());
        assert_eq!(iter.key(), Slice::from("c"));
        assert_eq!(iter.value(), Slice::from("2"));
    }

    #[test]
    fn test_versioned_iterator_seek() {
        let index = PointIndex::new();
        index.add(0, Slice::from("key1"), Slice::from("value1"));
        index.add(1, Slice::from("key3"), Slice::from("value3"));
        index.add(2, Slice::from("key5"), Slice::from("value5"));

        let mut iter = VersionedIterator::live_only(index.map(), 3);

        assert!(iter.seek_ge(&Slice::from("key3")).unwrap());
        assert_eq!(iter.key(), Slice::from("key3"));

        assert!(iter.seek_ge(&Slice::from("key2")).unwrap());
        assert_eq!(iter.key(), Slice::from("key3"));

        assert!(iter.seek_lt(&Slice::from("key3")).unwrap());
        assert_eq!(iter.key(), Slice::from("key1"));

        assert!(!iter.seek_ge(&Slice::from("key9")).unwrap());
        assert!(!iter.valid());
    }
}
