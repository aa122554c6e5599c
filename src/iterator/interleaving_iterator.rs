use std::{cmp, sync::Arc};

use crate::{
    fragment::{FragmentView, RangeKeySpan},
    iterator::{Direction, Iterator, MergingIterator},
    util::{Comparer, Result, Slice},
};

/// One position of the merged stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub key: Slice,
    /// Value of the point key at `key`, if one exists there.
    pub point: Option<Slice>,
    /// Range-key span covering `key`, clipped to the iterator bounds.
    pub span: Option<RangeKeySpan>,
}

/// Interleaves point keys with range-key spans
///
/// Positions are the union of the visible point keys and the starts of
/// the range-key spans (clipped to the bounds). Each position carries the
/// point entry at its key, if any, and the span covering it, if any. A
/// seek that lands inside a span yields a position at the seek key itself.
///
/// # Point Cursor
///
/// `points_dir` records the direction the merging iterator last moved in.
/// Moving forward it rests on the first point at or after the current
/// position; moving backward, on the last point at or before it. Any
/// other state (`None`) forces a re-seek on the next relative move.
pub struct InterleavingIterator {
    points: MergingIterator,
    view: Arc<FragmentView>,
    comparer: Comparer,
    lower: Option<Slice>,
    upper: Option<Slice>,
    /// Active between `seek_prefix_ge` and the next absolute positioning.
    prefix: Option<Slice>,
    prefix_upper: Option<Slice>,
    points_dir: Option<Direction>,
    /// Index of the span that covered the last position.
    span_hint: Option<usize>,
    current: Option<Position>,
}

impl InterleavingIterator {
    pub fn new(
        points: MergingIterator,
        view: Arc<FragmentView>,
        comparer: Comparer,
        lower: Option<Slice>,
        upper: Option<Slice>,
    ) -> Self {
        InterleavingIterator {
            points,
            view,
            comparer,
            lower,
            upper,
            prefix: None,
            prefix_upper: None,
            points_dir: None,
            span_hint: None,
            current: None,
        }
    }

    pub fn view(&self) -> &Arc<FragmentView> {
        &self.view
    }

    pub fn position(&self) -> Option<&Position> {
        self.current.as_ref()
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Replace the bounds. The iterator becomes unpositioned.
    pub fn set_bounds(&mut self, lower: Option<Slice>, upper: Option<Slice>) {
        self.lower = lower;
        self.upper = upper;
        self.invalidate();
        self.clear_prefix();
    }

    pub fn first(&mut self) -> Result<bool> {
        self.clear_prefix();
        if let Some(lower) = self.lower.clone() {
            return self.seek_ge_within_prefix(lower);
        }
        let moved = self.points.seek_to_first().and_then(|_| {
            self.points_dir = Some(Direction::Forward);
            self.settle_forward(None, true)
        });
        self.guard(moved)
    }

    pub fn last(&mut self) -> Result<bool> {
        self.clear_prefix();
        let before = self.upper.clone();
        let moved = match &before {
            Some(upper) => self.points.seek_lt(upper),
            None => self.points.seek_to_last(),
        }
        .and_then(|_| {
            self.points_dir = Some(Direction::Backward);
            self.settle_backward(before)
        });
        self.guard(moved)
    }

    pub fn seek_ge(&mut self, target: &Slice) -> Result<bool> {
        self.clear_prefix();
        self.seek_ge_within_prefix(target.clone())
    }

    /// Like `seek_ge`, then restricted to keys sharing `target`'s prefix
    /// until the next absolute positioning.
    pub fn seek_prefix_ge(&mut self, target: &Slice) -> Result<bool> {
        let prefix = Slice::from(self.comparer.prefix(target.data()));
        self.prefix_upper = prefix.prefix_successor();
        self.prefix = Some(prefix);
        self.seek_ge_within_prefix(target.clone())
    }

    pub fn seek_lt(&mut self, target: &Slice) -> Result<bool> {
        self.clear_prefix();
        let before = match &self.upper {
            Some(upper) => cmp::min(target, upper).clone(),
            None => target.clone(),
        };
        let moved = self.points.seek_lt(&before).and_then(|_| {
            self.points_dir = Some(Direction::Backward);
            self.settle_backward(Some(before))
        });
        self.guard(moved)
    }

    pub fn next(&mut self) -> Result<bool> {
        let Some(key) = self.current.as_ref().map(|p| p.key.clone()) else {
            return Ok(false);
        };
        let moved = self.step_points_forward(&key).and_then(|_| self.settle_forward(Some(key), false));
        self.guard(moved)
    }

    pub fn prev(&mut self) -> Result<bool> {
        let Some(key) = self.current.as_ref().map(|p| p.key.clone()) else {
            return Ok(false);
        };
        let moved = self.step_points_backward(&key).and_then(|_| self.settle_backward(Some(key)));
        self.guard(moved)
    }

    fn seek_ge_within_prefix(&mut self, target: Slice) -> Result<bool> {
        let target = match &self.lower {
            Some(lower) => cmp::max(&target, lower).clone(),
            None => target,
        };
        let moved = self.points.seek_ge(&target).and_then(|_| {
            self.points_dir = Some(Direction::Forward);
            self.settle_forward(Some(target), true)
        });
        self.guard(moved)
    }

    fn step_points_forward(&mut self, key: &Slice) -> Result<()> {
        if self.points_dir == Some(Direction::Forward) {
            if self.points.valid() && self.points.key() == *key {
                self.points.next()?;
            }
        } else {
            self.points.seek_ge(&key.immediate_successor())?;
            self.points_dir = Some(Direction::Forward);
        }
        Ok(())
    }

    fn step_points_backward(&mut self, key: &Slice) -> Result<()> {
        if self.points_dir == Some(Direction::Backward) {
            if self.points.valid() && self.points.key() == *key {
                self.points.prev()?;
            }
        } else {
            self.points.seek_lt(key)?;
            self.points_dir = Some(Direction::Backward);
        }
        Ok(())
    }

    /// Settle on the smallest position after `from` (at or after it when
    /// `inclusive`; from the start when `None`).
    fn settle_forward(&mut self, from: Option<Slice>, inclusive: bool) -> Result<bool> {
        let (mut from, mut inclusive) = (from, inclusive);
        loop {
            let point = self.point_candidate(Direction::Forward);
            let start = self.span_start_forward(from.as_ref(), inclusive);
            let key = match (&point, start) {
                (None, None) => {
                    self.current = None;
                    return Ok(false);
                },
                (Some(p), None) => p.clone(),
                (None, Some(s)) => s,
                (Some(p), Some(s)) => cmp::min(p.clone(), s),
            };
            let on_point = point.as_ref() == Some(&key);

            if self.matches_prefix(&key) {
                let value = on_point.then(|| self.points.value());
                self.current = Some(self.build(key, value));
                return Ok(true);
            }
            if on_point {
                self.points.next()?;
            }
            from = Some(key);
            inclusive = false;
        }
    }

    /// Settle on the largest position before `before` (before the end when
    /// `None`).
    fn settle_backward(&mut self, before: Option<Slice>) -> Result<bool> {
        let point = self.point_candidate(Direction::Backward);
        let start = self.span_start_backward(before.as_ref());
        let key = match (&point, start) {
            (None, None) => {
                self.current = None;
                return Ok(false);
            },
            (Some(p), None) => p.clone(),
            (None, Some(s)) => s,
            (Some(p), Some(s)) => cmp::max(p.clone(), s),
        };
        let value = (point.as_ref() == Some(&key)).then(|| self.points.value());
        self.current = Some(self.build(key, value));
        Ok(true)
    }

    fn point_candidate(&self, direction: Direction) -> Option<Slice> {
        if !self.points.valid() {
            return None;
        }
        let key = self.points.key();
        let in_bounds = match direction {
            Direction::Forward => self.below_upper(&key),
            Direction::Backward => self.above_lower(&key),
        };
        in_bounds.then_some(key)
    }

    fn span_start_forward(&self, from: Option<&Slice>, inclusive: bool) -> Option<Slice> {
        let spans = self.view.range_keys();
        let start = match from {
            None => spans.first().map(|s| s.start.clone()),
            Some(key) if inclusive && self.view.covering_span(key, self.span_hint).is_some() => {
                Some(key.clone())
            },
            Some(key) => spans
                .get(self.view.first_span_after(key))
                .map(|s| s.start.clone()),
        };
        start.filter(|s| self.below_upper(s))
    }

    fn span_start_backward(&self, before: Option<&Slice>) -> Option<Slice> {
        let spans = self.view.range_keys();
        let idx = match before {
            Some(key) => self.view.spans_before(key),
            None => spans.len(),
        };
        let span = spans.get(idx.checked_sub(1)?)?;
        let clipped = span.clip(self.lower.as_ref(), self.effective_upper())?;
        match before {
            Some(key) if clipped.start >= *key => None,
            _ => Some(clipped.start),
        }
    }

    fn build(&mut self, key: Slice, point: Option<Slice>) -> Position {
        let idx = self.view.covering_span(&key, self.span_hint);
        if idx.is_some() {
            self.span_hint = idx;
        }
        let span = idx.and_then(|i| {
            self.view.range_keys()[i].clip(self.lower.as_ref(), self.effective_upper())
        });
        Position { key, point, span }
    }

    fn effective_upper(&self) -> Option<&Slice> {
        match (&self.upper, &self.prefix_upper) {
            (Some(upper), Some(prefix_upper)) => Some(cmp::min(upper, prefix_upper)),
            (upper, None) => upper.as_ref(),
            (None, prefix_upper) => prefix_upper.as_ref(),
        }
    }

    fn below_upper(&self, key: &Slice) -> bool {
        self.effective_upper().is_none_or(|upper| key < upper)
    }

    fn above_lower(&self, key: &Slice) -> bool {
        self.lower.as_ref().is_none_or(|lower| key >= lower)
    }

    fn matches_prefix(&self, key: &Slice) -> bool {
        match &self.prefix {
            Some(prefix) => self.comparer.prefix(key.data()) == prefix.data(),
            None => true,
        }
    }

    fn clear_prefix(&mut self) {
        self.prefix = None;
        self.prefix_upper = None;
    }

    fn invalidate(&mut self) {
        self.current = None;
        self.points_dir = None;
        self.span_hint = None;
    }

    /// A failed move leaves nothing positioned.
    fn guard(&mut self, moved: Result<bool>) -> Result<bool> {
        if moved.is_err() {
            self.invalidate();
        }
        moved
    }
}
