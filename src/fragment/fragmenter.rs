use std::{collections::BTreeMap, sync::Arc};

use log::{debug, error};

use crate::{
    batch::BatchOp,
    fragment::view::{FragmentView, RangeDelSpan, RangeKeySpan, RangeKeyValue},
    statistics::Statistics,
    util::{Comparer, Result, Slice, Status},
};

/// Below-watermark views kept for frozen iterators and their clones.
const FROZEN_VIEWS: usize = 8;

/// A range op as stored in fragments: its log position and its effect.
#[derive(Debug)]
struct RangeOp {
    sequence: u64,
    kind: RangeOpKind,
}

#[derive(Debug)]
enum RangeOpKind {
    Delete,
    KeySet { suffix: Slice, value: Slice },
    KeyUnset { suffix: Slice },
    KeyDelete,
}

/// Combined effect of a fragment's ops: the newest range deletion and the
/// active range-key values in presentation order.
#[derive(Debug, Clone, Default)]
struct FragmentState {
    del_seq: Option<u64>,
    active: Vec<(RangeKeyValue, u64)>,
}

impl FragmentState {
    /// Ops must be applied in log order.
    fn apply(&mut self, op: &RangeOp, comparer: &Comparer) {
        match &op.kind {
            RangeOpKind::Delete => self.del_seq = Some(op.sequence),
            RangeOpKind::KeySet { suffix, value } => {
                self.active.retain(|(v, _)| v.suffix != *suffix);
                self.active.push((
                    RangeKeyValue {
                        suffix: suffix.clone(),
                        value: value.clone(),
                    },
                    op.sequence,
                ));
                // Equal versions put the most recent set first.
                self.active.sort_by(|(a, a_seq), (b, b_seq)| {
                    comparer
                        .compare_suffixes(a.suffix.data(), b.suffix.data())
                        .then_with(|| b_seq.cmp(a_seq))
                });
            },
            RangeOpKind::KeyUnset { suffix } => {
                self.active.retain(|(v, _)| v.suffix != *suffix);
            },
            RangeOpKind::KeyDelete => self.active.clear(),
        }
    }
}

/// `[start, end)` with every range op covering it, in log order, and their
/// combined effect as of the cache watermark. `start` is the map key.
#[derive(Debug, Clone)]
struct Fragment {
    end: Slice,
    ops: Vec<Arc<RangeOp>>,
    state: FragmentState,
}

/// Collects spans in key order, merging a span into its predecessor when
/// they touch and carry the same effect.
#[derive(Default)]
struct SpanBuilder {
    range_dels: Vec<RangeDelSpan>,
    range_keys: Vec<RangeKeySpan>,
}

impl SpanBuilder {
    fn push_del(&mut self, span: RangeDelSpan) {
        match self.range_dels.last_mut() {
            Some(last) if last.end == span.start && last.sequence == span.sequence => {
                last.end = span.end;
            },
            _ => self.range_dels.push(span),
        }
    }

    fn push_key(&mut self, span: RangeKeySpan) {
        match self.range_keys.last_mut() {
            Some(last) if last.end == span.start && last.values == span.values => {
                last.end = span.end;
            },
            _ => self.range_keys.push(span),
        }
    }

    fn push_fragment(&mut self, start: &Slice, end: &Slice, state: &FragmentState) {
        if let Some(sequence) = state.del_seq {
            self.push_del(RangeDelSpan {
                start: start.clone(),
                end: end.clone(),
                sequence,
            });
        }
        if !state.active.is_empty() {
            self.push_key(RangeKeySpan {
                start: start.clone(),
                end: end.clone(),
                values: state.active.iter().map(|(v, _)| v.clone()).collect(),
            });
        }
    }

    fn finish(self, visible: u64) -> FragmentView {
        FragmentView::new(visible, self.range_dels, self.range_keys)
    }
}

/// Grow `[lo, hi)` to cover every span in `spans` that overlaps it.
fn widen<T>(
    spans: &[T],
    bounds: impl Fn(&T) -> (&Slice, &Slice),
    lo: &mut Slice,
    hi: &mut Slice,
) -> bool {
    let first = spans.partition_point(|s| *bounds(s).1 <= *lo);
    let last = first + spans[first..].partition_point(|s| *bounds(s).0 < *hi);
    if first == last {
        return false;
    }

    let mut changed = false;
    let (start, _) = bounds(&spans[first]);
    if *start < *lo {
        *lo = start.clone();
        changed = true;
    }
    let (_, end) = bounds(&spans[last - 1]);
    if *end > *hi {
        *hi = end.clone();
        changed = true;
    }
    changed
}

/// Incrementally maintained fragmentation of the batch's range operations.
///
/// # Watermark
///
/// `watermark` counts log operations folded in so far (the mutation log's
/// operation-count domain). Staleness is decided by comparing it with the
/// requested visible length. Fragment counts never enter that comparison:
/// one range op can split into many fragments or add none.
///
/// # Views
///
/// `head` is the view as of the watermark. Extension folds the new range
/// ops into the fragments they touch, then rebuilds `head` only over the
/// key range those ops cover; spans outside it are carried over.
///
/// Fragment boundaries only ever get added, so the fragmentation at the
/// watermark refines the one at any lower visible length. A view as of
/// `L < watermark` is replayed from the same fragments by ignoring ops at
/// positions `>= L`, and kept in `frozen` keyed by the number of range ops
/// it covers.
pub struct FragmentCache {
    fragments: BTreeMap<Slice, Fragment>,
    watermark: u64,
    /// Log positions of the folded range ops, ascending.
    range_seqs: Vec<u64>,
    head: Arc<FragmentView>,
    frozen: BTreeMap<usize, Arc<FragmentView>>,
    corrupted: Option<Status>,
    comparer: Comparer,
    validate: bool,
    stats: Arc<Statistics>,
}

impl FragmentCache {
    pub fn new(comparer: Comparer, validate: bool, stats: Arc<Statistics>) -> Self {
        FragmentCache {
            fragments: BTreeMap::new(),
            watermark: 0,
            range_seqs: Vec::new(),
            head: Arc::new(FragmentView::default()),
            frozen: BTreeMap::new(),
            corrupted: None,
            comparer,
            validate,
            stats,
        }
    }

    /// Count of log operations folded in.
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Count of range-affecting operations folded in.
    pub fn range_op_count(&self) -> usize {
        self.range_seqs.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn is_stale(&self, visible: u64) -> bool {
        self.watermark < visible
    }

    /// Range ops and range keys as of `visible`, extending the cache first
    /// when it has not folded that many ops yet.
    pub fn view(&mut self, ops: &[BatchOp], visible: u64) -> Result<Arc<FragmentView>> {
        if let Some(err) = &self.corrupted {
            return Err(err.clone());
        }
        if visible > ops.len() as u64 {
            return Err(Status::invalid_argument(format!(
                "visible length {visible} beyond log length {}",
                ops.len()
            )));
        }
        if self.is_stale(visible) {
            self.extend(ops, visible)?;
        }

        let covered = self.range_seqs.partition_point(|seq| *seq < visible);
        if covered == self.range_seqs.len() {
            return Ok(self.head.clone());
        }
        if let Some(view) = self.frozen.get(&covered) {
            return Ok(view.clone());
        }

        let view = Arc::new(self.replay(visible));
        if self.validate {
            view.validate().inspect_err(|e| error!("fragment view at {visible}: {e}"))?;
        }
        self.stats.record_view_resolved();
        self.remember(covered, view.clone());
        Ok(view)
    }

    /// Fold `ops[watermark..upto]` into the fragments and bring `head` up
    /// to date.
    pub fn extend(&mut self, ops: &[BatchOp], upto: u64) -> Result<()> {
        if let Some(err) = &self.corrupted {
            return Err(err.clone());
        }
        let from = self.watermark;
        let upto = upto.min(ops.len() as u64);
        if upto <= from {
            return Ok(());
        }

        let mut folded = 0;
        let mut dirty: Option<(Slice, Slice)> = None;
        for (offset, op) in ops[from as usize..upto as usize].iter().enumerate() {
            let sequence = from + offset as u64;
            if let Some(range_op) = Self::range_op(sequence, op) {
                let (start, end) = op.span().ok_or_else(|| {
                    Status::corruption(format!("{} op without a span", op.name()))
                })?;
                dirty = Some(match dirty {
                    None => (start.clone(), end.clone()),
                    Some((lo, hi)) => (lo.min(start.clone()), hi.max(end.clone())),
                });
                self.insert(start.clone(), end.clone(), Arc::new(range_op));
                self.range_seqs.push(sequence);
                folded += 1;
            }
        }
        self.watermark = upto;

        if self.validate {
            self.check_fragments().inspect_err(|e| self.corrupted = Some(e.clone()))?;
        }
        let mut rebuilt = 0;
        if let Some((lo, hi)) = dirty {
            let (head, visited) = self.rebuild_head(lo, hi);
            if self.validate {
                head.validate().inspect_err(|e| {
                    error!("fragment view at {upto}: {e}");
                    self.corrupted = Some(e.clone());
                })?;
            }
            let previous = std::mem::replace(&mut self.head, Arc::new(head));
            self.remember(self.range_seqs.len() - folded, previous);
            self.stats.record_view_resolved();
            self.stats.record_fragments_rebuilt(visited as u64);
            rebuilt = visited;
        }

        self.stats.record_fragment_extension(folded as u64);
        debug!(
            "fragment cache extended: watermark {from} -> {upto}, {folded} range ops folded, {rebuilt} of {} fragments rebuilt",
            self.fragments.len()
        );
        Ok(())
    }

    fn range_op(sequence: u64, op: &BatchOp) -> Option<RangeOp> {
        let kind = match op {
            BatchOp::Set { .. } | BatchOp::Delete { .. } => return None,
            BatchOp::DeleteRange { .. } => RangeOpKind::Delete,
            BatchOp::RangeKeySet { suffix, value, .. } => RangeOpKind::KeySet {
                suffix: suffix.clone(),
                value: value.clone(),
            },
            BatchOp::RangeKeyUnset { suffix, .. } => RangeOpKind::KeyUnset {
                suffix: suffix.clone(),
            },
            BatchOp::RangeKeyDelete { .. } => RangeOpKind::KeyDelete,
        };
        Some(RangeOp { sequence, kind })
    }

    fn remember(&mut self, covered: usize, view: Arc<FragmentView>) {
        self.frozen.insert(covered, view);
        if self.frozen.len() > FROZEN_VIEWS {
            self.frozen.pop_first();
        }
    }

    /// Split the fragment straddling `key`, if any, so that a boundary
    /// falls exactly at `key`.
    fn split_at(&mut self, key: &Slice) {
        let tail = match self.fragments.range_mut(..key.clone()).next_back() {
            Some((_, frag)) if frag.end > *key => Fragment {
                end: std::mem::replace(&mut frag.end, key.clone()),
                ops: frag.ops.clone(),
                state: frag.state.clone(),
            },
            _ => return,
        };
        self.fragments.insert(key.clone(), tail);
    }

    fn insert(&mut self, start: Slice, end: Slice, op: Arc<RangeOp>) {
        self.split_at(&start);
        self.split_at(&end);

        // Every fragment starting in [start, end) now also ends within it.
        let comparer = self.comparer;
        let mut gaps = Vec::new();
        let mut cursor = start;
        for (frag_start, frag) in self.fragments.range_mut(cursor.clone()..end.clone()) {
            if cursor < *frag_start {
                gaps.push((cursor.clone(), frag_start.clone()));
            }
            frag.state.apply(&op, &comparer);
            frag.ops.push(op.clone());
            cursor = frag.end.clone();
        }
        if cursor < end {
            gaps.push((cursor, end));
        }

        for (gap_start, gap_end) in gaps {
            let mut state = FragmentState::default();
            state.apply(&op, &comparer);
            self.fragments.insert(
                gap_start,
                Fragment {
                    end: gap_end,
                    ops: vec![op.clone()],
                    state,
                },
            );
        }
    }

    fn check_fragments(&self) -> Result<()> {
        let mut prev_end: Option<&Slice> = None;
        for (start, frag) in &self.fragments {
            let overlapping = prev_end.is_some_and(|p| p > start);
            if *start >= frag.end || overlapping {
                let err = Status::corruption(format!(
                    "fragment [{start}-{}) overlaps or is empty",
                    frag.end
                ));
                error!("fragment cache at watermark {}: {err}", self.watermark);
                return Err(err);
            }
            prev_end = Some(&frag.end);
        }
        Ok(())
    }

    /// New head from the current head, re-resolving only the fragments in
    /// `[lo, hi)` widened to the head spans overlapping it. Returns the view
    /// and the number of fragments visited.
    fn rebuild_head(&self, mut lo: Slice, mut hi: Slice) -> (FragmentView, usize) {
        let dels = self.head.range_dels();
        let keys = self.head.range_keys();

        // No carried-over span may cross the rebuilt range.
        loop {
            let by_keys = widen(keys, |s| (&s.start, &s.end), &mut lo, &mut hi);
            let by_dels = widen(dels, |s| (&s.start, &s.end), &mut lo, &mut hi);
            if !by_keys && !by_dels {
                break;
            }
        }

        let mut spans = SpanBuilder::default();
        let del_left = dels.partition_point(|s| s.end <= lo);
        let key_left = keys.partition_point(|s| s.end <= lo);
        spans.range_dels.extend_from_slice(&dels[..del_left]);
        spans.range_keys.extend_from_slice(&keys[..key_left]);

        let mut visited = 0;
        for (start, frag) in self.fragments.range(lo.clone()..hi.clone()) {
            spans.push_fragment(start, &frag.end, &frag.state);
            visited += 1;
        }

        let del_right = dels.partition_point(|s| s.start < hi);
        let key_right = keys.partition_point(|s| s.start < hi);
        for span in &dels[del_right..] {
            spans.push_del(span.clone());
        }
        for span in &keys[key_right..] {
            spans.push_key(span.clone());
        }

        (spans.finish(self.watermark), visited)
    }

    /// View as of `visible` replayed from scratch over every fragment.
    fn replay(&self, visible: u64) -> FragmentView {
        let mut spans = SpanBuilder::default();
        for (start, frag) in &self.fragments {
            let mut state = FragmentState::default();
            // Ops are stored in log order.
            for op in frag.ops.iter().take_while(|op| op.sequence < visible) {
                state.apply(op, &self.comparer);
            }
            spans.push_fragment(start, &frag.end, &state);
        }
        spans.finish(visible)
    }
}
