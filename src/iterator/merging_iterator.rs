use std::sync::Arc;

use crate::{
    fragment::FragmentView,
    iterator::{Direction, Iterator},
    util::{Result, Slice},
};

/// Merging iterator for combining sorted point sources
///
/// Each child yields at most one entry per user key. At every position
/// the smallest (forward) or largest (backward) key across the children
/// is chosen, and the lowest-indexed child holding that key supplies the
/// entry:
/// - iterators[0]: the batch's point index (tombstones surfaced)
/// - iterators[1]: the base store cursor
///
/// # Masking
///
/// A winning tombstone hides the key. A winning entry is also hidden when
/// a range deletion covering its key is newer than the entry; base entries
/// have no batch sequence number and are older than every range deletion.
///
/// # Direction Changes
///
/// Moving forward, every child rests on its first key greater than the
/// previous position; moving backward, on its last key smaller. Reversing
/// re-seeks all children around the current key.
pub struct MergingIterator {
    iterators: Vec<Box<dyn Iterator>>,
    range_dels: Option<Arc<FragmentView>>,
    direction: Direction,
    current: Option<usize>,
}

impl MergingIterator {
    /// Create a merging iterator; `iterators[0]` has the highest priority.
    pub fn new(iterators: Vec<Box<dyn Iterator>>, range_dels: Option<Arc<FragmentView>>) -> Self {
        MergingIterator {
            iterators,
            range_dels,
            direction: Direction::Forward,
            current: None,
        }
    }

    /// Child holding the smallest (forward) or largest (backward) key.
    /// Ties go to the lower index.
    fn find_winner(&self) -> Option<usize> {
        let mut winner: Option<usize> = None;
        for (idx, iter) in self.iterators.iter().enumerate() {
            if !iter.valid() {
                continue;
            }
            let better = match winner {
                None => true,
                Some(w) => {
                    let (key, best) = (iter.key(), self.iterators[w].key());
                    match self.direction {
                        Direction::Forward => key < best,
                        Direction::Backward => key > best,
                    }
                },
            };
            if better {
                winner = Some(idx);
            }
        }
        winner
    }

    fn is_hidden(&self, idx: usize) -> bool {
        let iter = &self.iterators[idx];
        if iter.is_deletion() {
            return true;
        }
        let Some(view) = &self.range_dels else {
            return false;
        };
        match view.range_del_seq_at(&iter.key()) {
            Some(del) => iter.sequence().is_none_or(|seq| seq < del),
            None => false,
        }
    }

    /// Step every child resting on `key` one entry in the current direction.
    fn step_all_at(&mut self, key: &Slice) -> Result<()> {
        for iter in &mut self.iterators {
            if iter.valid() && iter.key() == *key {
                match self.direction {
                    Direction::Forward => iter.next()?,
                    Direction::Backward => iter.prev()?,
                };
            }
        }
        Ok(())
    }

    /// Settle on the next visible entry in the current direction.
    fn settle(&mut self) -> Result<bool> {
        loop {
            let Some(winner) = self.find_winner() else {
                self.current = None;
                return Ok(false);
            };
            if !self.is_hidden(winner) {
                self.current = Some(winner);
                return Ok(true);
            }
            let key = self.iterators[winner].key();
            self.step_all_at(&key)?;
        }
    }

    fn position_all(
        &mut self,
        direction: Direction,
        op: impl Fn(&mut Box<dyn Iterator>) -> Result<bool>,
    ) -> Result<bool> {
        self.current = None;
        self.direction = direction;
        for iter in &mut self.iterators {
            op(iter)?;
        }
        self.settle()
    }
}

impl Iterator for MergingIterator {
    fn seek_to_first(&mut self) -> Result<bool> {
        self.position_all(Direction::Forward, |it| it.seek_to_first())
    }

    fn seek_to_last(&mut self) -> Result<bool> {
        self.position_all(Direction::Backward, |it| it.seek_to_last())
    }

    fn seek_ge(&mut self, target: &Slice) -> Result<bool> {
        self.position_all(Direction::Forward, |it| it.seek_ge(target))
    }

    fn seek_lt(&mut self, target: &Slice) -> Result<bool> {
        self.position_all(Direction::Backward, |it| it.seek_lt(target))
    }

    fn next(&mut self) -> Result<bool> {
        if self.current.is_none() {
            return Ok(false);
        }
        let key = self.key();
        if self.direction == Direction::Backward {
            let after = key.immediate_successor();
            return self.position_all(Direction::Forward, |it| it.seek_ge(&after));
        }

        self.current = None;
        self.step_all_at(&key)?;
        self.settle()
    }

    fn prev(&mut self) -> Result<bool> {
        if self.current.is_none() {
            return Ok(false);
        }
        let key = self.key();
        if self.direction == Direction::Forward {
            return self.position_all(Direction::Backward, |it| it.seek_lt(&key));
        }

        self.current = None;
        self.step_all_at(&key)?;
        self.settle()
    }

    fn key(&self) -> Slice {
        self.current
            .map(|idx| self.iterators[idx].key())
            .unwrap_or_else(Slice::empty)
    }

    fn value(&self) -> Slice {
        self.current
            .map(|idx| self.iterators[idx].value())
            .unwrap_or_else(Slice::empty)
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn sequence(&self) -> Option<u64> {
        self.current.and_then(|idx| self.iterators[idx].sequence())
    }
}
