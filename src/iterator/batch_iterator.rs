use std::sync::Arc;

use log::{debug, warn};

use crate::{
    batch::BatchInner,
    fragment::{RangeKeySpan, RangeKeyValue},
    iterator::{
        Direction, InterleavingIterator, Iterator, MergingIterator, Position, VersionedIterator,
    },
    store::ReadSnapshot,
    util::{Result, Slice, Status},
};

/// Options for creating an iterator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterOptions {
    /// Inclusive lower bound. Range-key spans are clipped to it.
    pub lower_bound: Option<Slice>,
    /// Exclusive upper bound. Range-key spans are clipped to it.
    pub upper_bound: Option<Slice>,
}

impl IterOptions {
    pub fn new() -> Self {
        IterOptions::default()
    }

    pub fn with_bounds(lower: Option<Slice>, upper: Option<Slice>) -> Self {
        IterOptions {
            lower_bound: lower,
            upper_bound: upper,
        }
    }

    fn validate(&self) -> Result<()> {
        if let (Some(lower), Some(upper)) = (&self.lower_bound, &self.upper_bound) {
            if lower >= upper {
                return Err(Status::invalid_argument(format!(
                    "lower bound {lower} is not below upper bound {upper}"
                )));
            }
        }
        Ok(())
    }
}

/// Options for [`BatchIter::clone_with`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Observe every batch operation appended so far instead of the
    /// source's visible length. The base store state is shared either way.
    pub refresh_batch_view: bool,
    /// Bounds for the clone; the source's bounds when `None`.
    pub iter_options: Option<IterOptions>,
}

/// Outcome of a limited positioning call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterValidity {
    /// No entry in the direction of travel
    Exhausted,
    Valid,
    /// The next entry lies beyond the limit; it is not exposed, and the
    /// next call in the same direction resumes from it
    AtLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Unpositioned,
    Valid,
    AtLimit,
    Exhausted(Direction),
}

/// State released by `close`.
struct OpenState {
    /// Base store state, fixed for this iterator and shared verbatim with
    /// every clone of it.
    read_state: Arc<dyn ReadSnapshot>,
    iter: InterleavingIterator,
}

/// Iterator over a batch merged with a base store snapshot
///
/// Carries two independent watermarks:
/// - `visible_len`: batch operations below it are observed; advanced only
///   by [`BatchIter::refresh_view`] or a refreshing clone
/// - the base store read state, fixed at creation for this iterator and
///   all of its clones
///
/// # Errors
///
/// Positioning calls return validity; a failure leaves the iterator
/// invalid with the cause in [`BatchIter::error`]. An absolute positioning
/// call (first/last/seek) clears the error, a relative one (next/prev)
/// stays invalid.
///
/// # Example
///
/// ```ignore
/// let mut iter = batch.new_iter(IterOptions::default())?;
/// let mut valid = iter.first();
/// while valid {
///     println!("{}", format_position(&iter));
///     valid = iter.next();
/// }
/// iter.close()?;
/// ```
pub struct BatchIter {
    batch: Arc<BatchInner>,
    open: Option<OpenState>,
    visible_len: u64,
    options: IterOptions,
    state: IterState,
    /// Direction of a limited move that stopped short of exposing the
    /// entry the inner iterator rests on.
    pending: Option<Direction>,
    prefix_mode: bool,
    /// Span surfaced at the previous valid position.
    last_span: Option<RangeKeySpan>,
    range_key_changed: bool,
    error: Option<Status>,
}

impl BatchIter {
    pub(crate) fn new(batch: Arc<BatchInner>, options: IterOptions) -> Result<Self> {
        options.validate()?;
        let read_state = batch.open_read_snapshot()?;
        let visible_len = batch.len();
        let iter = build_inner(&batch, &read_state, visible_len, &options)?;

        batch.stats().record_iterator_created();
        debug!(
            "iterator created: visible_len={visible_len} base_sequence={}",
            read_state.sequence()
        );
        Ok(Self::from_parts(batch, read_state, visible_len, options, iter))
    }

    fn from_parts(
        batch: Arc<BatchInner>,
        read_state: Arc<dyn ReadSnapshot>,
        visible_len: u64,
        options: IterOptions,
        iter: InterleavingIterator,
    ) -> Self {
        BatchIter {
            batch,
            open: Some(OpenState { read_state, iter }),
            visible_len,
            options,
            state: IterState::Unpositioned,
            pending: None,
            prefix_mode: false,
            last_span: None,
            range_key_changed: false,
            error: None,
        }
    }

    pub fn first(&mut self) -> bool {
        self.absolute(Direction::Forward, None, false, |it| it.first()) == IterValidity::Valid
    }

    pub fn last(&mut self) -> bool {
        self.absolute(Direction::Backward, None, false, |it| it.last()) == IterValidity::Valid
    }

    pub fn seek_ge(&mut self, key: &Slice) -> bool {
        self.absolute(Direction::Forward, None, false, |it| it.seek_ge(key)) == IterValidity::Valid
    }

    pub fn seek_lt(&mut self, key: &Slice) -> bool {
        self.absolute(Direction::Backward, None, false, |it| it.seek_lt(key)) == IterValidity::Valid
    }

    /// Seek to the first key >= `key` sharing its prefix. Subsequent
    /// `next` calls stay within the prefix; `prev` is not supported until
    /// the next absolute positioning call.
    pub fn seek_prefix_ge(&mut self, key: &Slice) -> bool {
        self.absolute(Direction::Forward, None, true, |it| it.seek_prefix_ge(key))
            == IterValidity::Valid
    }

    pub fn next(&mut self) -> bool {
        self.relative(Direction::Forward, None) == IterValidity::Valid
    }

    pub fn prev(&mut self) -> bool {
        self.relative(Direction::Backward, None) == IterValidity::Valid
    }

    /// Seek to the first key >= `key`, stopping at limit if that key is
    /// >= `limit`.
    pub fn seek_ge_with_limit(&mut self, key: &Slice, limit: &Slice) -> IterValidity {
        self.absolute(Direction::Forward, Some(limit), false, |it| it.seek_ge(key))
    }

    /// Seek to the last key < `key`, stopping at limit if that key is
    /// < `limit`.
    pub fn seek_lt_with_limit(&mut self, key: &Slice, limit: &Slice) -> IterValidity {
        self.absolute(Direction::Backward, Some(limit), false, |it| it.seek_lt(key))
    }

    pub fn next_with_limit(&mut self, limit: &Slice) -> IterValidity {
        self.relative(Direction::Forward, Some(limit))
    }

    pub fn prev_with_limit(&mut self, limit: &Slice) -> IterValidity {
        self.relative(Direction::Backward, Some(limit))
    }

    pub fn valid(&self) -> bool {
        self.state == IterState::Valid && self.error.is_none() && self.open.is_some()
    }

    fn position(&self) -> Option<&Position> {
        if !self.valid() {
            return None;
        }
        self.open.as_ref()?.iter.position()
    }

    /// Current key; empty when not valid.
    pub fn key(&self) -> Slice {
        self.position()
            .map(|p| p.key.clone())
            .unwrap_or_else(Slice::empty)
    }

    /// Value of the point key at the current position; empty when there is
    /// none.
    pub fn value(&self) -> Slice {
        self.position()
            .and_then(|p| p.point.clone())
            .unwrap_or_else(Slice::empty)
    }

    pub fn has_point_and_range(&self) -> (bool, bool) {
        self.position()
            .map_or((false, false), |p| (p.point.is_some(), p.span.is_some()))
    }

    /// Bounds of the range-key span covering the current position.
    pub fn range_bounds(&self) -> Option<(Slice, Slice)> {
        let span = self.position()?.span.as_ref()?;
        Some((span.start.clone(), span.end.clone()))
    }

    /// Range-key values covering the current position, empty suffix first,
    /// then newest version first.
    pub fn range_key_values(&self) -> &[RangeKeyValue] {
        match self.position().and_then(|p| p.span.as_ref()) {
            Some(span) => &span.values,
            None => &[],
        }
    }

    /// Whether the range-key span covering the current position differs
    /// from the one at the previous position.
    pub fn range_key_changed(&self) -> bool {
        self.valid() && self.range_key_changed
    }

    pub fn error(&self) -> Option<&Status> {
        self.error.as_ref()
    }

    /// Number of batch operations this iterator observes.
    pub fn visible_len(&self) -> u64 {
        self.visible_len
    }

    /// Sequence number of the base store state; `None` once closed.
    pub fn base_sequence(&self) -> Option<u64> {
        self.open.as_ref().map(|o| o.read_state.sequence())
    }

    pub fn options(&self) -> &IterOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.open.is_none()
    }

    /// Replace the bounds. The iterator becomes unpositioned.
    pub fn set_bounds(&mut self, lower: Option<Slice>, upper: Option<Slice>) -> Result<()> {
        let options = IterOptions::with_bounds(lower, upper);
        options.validate()?;
        let Some(open) = self.open.as_mut() else {
            return Err(Status::closed("set_bounds on a closed iterator"));
        };
        open.iter
            .set_bounds(options.lower_bound.clone(), options.upper_bound.clone());
        self.options = options;
        self.reset_position();
        Ok(())
    }

    /// Observe every batch operation appended so far.
    ///
    /// The base store state is kept. Positional state derived from the old
    /// view is discarded and the iterator becomes unpositioned.
    pub fn refresh_view(&mut self) -> Result<()> {
        let Some(open) = self.open.as_mut() else {
            return Err(Status::closed("refresh_view on a closed iterator"));
        };
        let visible_len = self.batch.len();
        open.iter = build_inner(&self.batch, &open.read_state, visible_len, &self.options)?;

        debug!(
            "iterator refreshed: visible_len {} -> {visible_len}",
            self.visible_len
        );
        self.visible_len = visible_len;
        self.error = None;
        self.reset_position();
        self.batch.stats().record_iterator_refresh();
        Ok(())
    }

    /// New, unpositioned iterator sharing this one's base store state.
    pub fn clone_with(&self, options: CloneOptions) -> Result<BatchIter> {
        let Some(open) = self.open.as_ref() else {
            return Err(Status::closed("clone of a closed iterator"));
        };
        let visible_len = if options.refresh_batch_view {
            self.batch.len()
        } else {
            self.visible_len
        };
        let iter_options = options
            .iter_options
            .unwrap_or_else(|| self.options.clone());
        iter_options.validate()?;

        let read_state = open.read_state.clone();
        let iter = build_inner(&self.batch, &read_state, visible_len, &iter_options)?;

        self.batch.stats().record_iterator_clone();
        debug!(
            "iterator cloned: visible_len={visible_len} refresh={}",
            options.refresh_batch_view
        );
        Ok(Self::from_parts(
            self.batch.clone(),
            read_state,
            visible_len,
            iter_options,
            iter,
        ))
    }

    /// Release the base store state. Returns the pending error, if any.
    pub fn close(&mut self) -> Result<()> {
        if self.open.take().is_none() {
            return Err(Status::closed("iterator already closed"));
        }
        debug!("iterator closed: visible_len={}", self.visible_len);
        self.reset_position();
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn absolute(
        &mut self,
        direction: Direction,
        limit: Option<&Slice>,
        prefix: bool,
        op: impl FnOnce(&mut InterleavingIterator) -> Result<bool>,
    ) -> IterValidity {
        self.error = None;
        self.pending = None;
        self.prefix_mode = prefix;
        let Some(open) = self.open.as_mut() else {
            return self.fail_closed();
        };
        let moved = op(&mut open.iter);
        self.settle(moved, direction, limit)
    }

    fn relative(&mut self, direction: Direction, limit: Option<&Slice>) -> IterValidity {
        if self.open.is_none() {
            return self.fail_closed();
        }
        if self.error.is_some() {
            return IterValidity::Exhausted;
        }
        if direction == Direction::Backward && self.prefix_mode {
            return self.fail(Status::invalid_argument(
                "prev is not supported in prefix iteration mode",
            ));
        }

        match self.state {
            IterState::Exhausted(d) if d == direction => IterValidity::Exhausted,
            IterState::Unpositioned | IterState::Exhausted(_) => match direction {
                Direction::Forward => self.absolute(direction, limit, false, |it| it.first()),
                Direction::Backward => self.absolute(direction, limit, false, |it| it.last()),
            },
            IterState::Valid | IterState::AtLimit => {
                let resume = self.pending.take() == Some(direction);
                let Some(open) = self.open.as_mut() else {
                    return self.fail_closed();
                };
                let moved = if resume {
                    Ok(open.iter.valid())
                } else {
                    match direction {
                        Direction::Forward => open.iter.next(),
                        Direction::Backward => open.iter.prev(),
                    }
                };
                self.settle(moved, direction, limit)
            },
        }
    }

    fn settle(&mut self, moved: Result<bool>, direction: Direction, limit: Option<&Slice>) -> IterValidity {
        let found = match moved {
            Err(err) => return self.fail(err),
            Ok(true) => self
                .open
                .as_ref()
                .and_then(|o| o.iter.position())
                .map(|p| (p.key.clone(), p.span.clone())),
            Ok(false) => None,
        };
        let Some((key, span)) = found else {
            self.state = IterState::Exhausted(direction);
            self.last_span = None;
            self.range_key_changed = false;
            return IterValidity::Exhausted;
        };

        if let Some(limit) = limit {
            let beyond = match direction {
                Direction::Forward => key >= *limit,
                Direction::Backward => key < *limit,
            };
            if beyond {
                self.pending = Some(direction);
                self.state = IterState::AtLimit;
                return IterValidity::AtLimit;
            }
        }

        self.range_key_changed = span != self.last_span;
        self.last_span = span;
        self.state = IterState::Valid;
        IterValidity::Valid
    }

    fn fail(&mut self, err: Status) -> IterValidity {
        if err.is_io_error() {
            warn!("iterator at visible_len={}: {err}", self.visible_len);
        } else {
            debug!("iterator at visible_len={}: {err}", self.visible_len);
        }
        self.batch.stats().record_error();
        self.error = Some(err);
        self.reset_position();
        IterValidity::Exhausted
    }

    fn fail_closed(&mut self) -> IterValidity {
        self.fail(Status::closed("iterator used after close"))
    }

    fn reset_position(&mut self) {
        self.state = IterState::Unpositioned;
        self.pending = None;
        self.prefix_mode = false;
        self.last_span = None;
        self.range_key_changed = false;
    }
}

/// Merge the batch as of `visible_len` with a fresh cursor over
/// `read_state`.
fn build_inner(
    batch: &BatchInner,
    read_state: &Arc<dyn ReadSnapshot>,
    visible_len: u64,
    options: &IterOptions,
) -> Result<InterleavingIterator> {
    let view = batch.fragments_as_of(visible_len)?;
    let points: Box<dyn Iterator> = Box::new(VersionedIterator::with_tombstones(
        batch.index_map(),
        visible_len,
    ));
    let base = read_state.cursor()?;
    let merged = MergingIterator::new(vec![points, base], Some(view.clone()));
    Ok(InterleavingIterator::new(
        merged,
        view,
        batch.comparer(),
        options.lower_bound.clone(),
        options.upper_bound.clone(),
    ))
}
