use std::sync::Arc;

use crate::util::{Result, Slice, Status};

/// A range-key value active over a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeKeyValue {
    pub suffix: Slice,
    pub value: Slice,
}

/// Maximal span `[start, end)` over which the same range-key values are
/// active. Values are in presentation order (see `Comparer`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeKeySpan {
    pub start: Slice,
    pub end: Slice,
    pub values: Arc<[RangeKeyValue]>,
}

impl RangeKeySpan {
    pub fn contains(&self, key: &Slice) -> bool {
        self.start <= *key && *key < self.end
    }

    /// Intersection with `[lower, upper)`, or `None` when empty.
    pub fn clip(&self, lower: Option<&Slice>, upper: Option<&Slice>) -> Option<RangeKeySpan> {
        let start = match lower {
            Some(l) if *l > self.start => l.clone(),
            _ => self.start.clone(),
        };
        let end = match upper {
            Some(u) if *u < self.end => u.clone(),
            _ => self.end.clone(),
        };
        (start < end).then(|| RangeKeySpan {
            start,
            end,
            values: self.values.clone(),
        })
    }
}

/// Span covered by range deletions. `sequence` is that of the newest
/// visible range deletion over the span; points older than it are hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeDelSpan {
    pub start: Slice,
    pub end: Slice,
    pub sequence: u64,
}

/// Range deletions and range keys as of one visible length.
///
/// Built by the fragment cache, then shared read-only by every iterator
/// holding the same watermark. Both span lists are sorted and
/// non-overlapping.
#[derive(Debug, Default)]
pub struct FragmentView {
    visible: u64,
    range_dels: Vec<RangeDelSpan>,
    range_keys: Vec<RangeKeySpan>,
}

impl FragmentView {
    pub(crate) fn new(
        visible: u64,
        range_dels: Vec<RangeDelSpan>,
        range_keys: Vec<RangeKeySpan>,
    ) -> Self {
        FragmentView {
            visible,
            range_dels,
            range_keys,
        }
    }

    /// Log length the view was resolved at. It also holds for longer
    /// lengths that add no range op.
    pub fn visible(&self) -> u64 {
        self.visible
    }

    pub fn range_dels(&self) -> &[RangeDelSpan] {
        &self.range_dels
    }

    pub fn range_keys(&self) -> &[RangeKeySpan] {
        &self.range_keys
    }

    /// Sequence number of the newest range deletion covering `key`.
    pub fn range_del_seq_at(&self, key: &Slice) -> Option<u64> {
        let idx = self.range_dels.partition_point(|s| s.end <= *key);
        self.range_dels
            .get(idx)
            .filter(|s| s.start <= *key)
            .map(|s| s.sequence)
    }

    /// Index of the range-key span covering `key`.
    ///
    /// `hint` is the span found by the previous lookup; the hinted span
    /// and its neighbours are checked before falling back to a binary
    /// search.
    pub fn covering_span(&self, key: &Slice, hint: Option<usize>) -> Option<usize> {
        if let Some(h) = hint {
            let lo = h.saturating_sub(1);
            let hi = (h + 2).min(self.range_keys.len());
            for idx in lo..hi {
                if self.range_keys[idx].contains(key) {
                    return Some(idx);
                }
            }
        }
        let idx = self.range_keys.partition_point(|s| s.end <= *key);
        self.range_keys
            .get(idx)
            .filter(|s| s.start <= *key)
            .map(|_| idx)
    }

    /// Index of the first span whose start is > `key`.
    pub fn first_span_after(&self, key: &Slice) -> usize {
        self.range_keys.partition_point(|s| s.start <= *key)
    }

    /// Index one past the last span whose start is < `key`.
    pub fn spans_before(&self, key: &Slice) -> usize {
        self.range_keys.partition_point(|s| s.start < *key)
    }

    /// Check ordering and disjointness of both span lists.
    pub fn validate(&self) -> Result<()> {
        fn check<'a>(
            kind: &str,
            spans: impl std::iter::Iterator<Item = (&'a Slice, &'a Slice)>,
        ) -> Result<()> {
            let mut prev_end: Option<&Slice> = None;
            for (start, end) in spans {
                if start >= end {
                    return Err(Status::corruption(format!(
                        "empty {kind} span [{start}-{end})"
                    )));
                }
                if let Some(prev) = prev_end {
                    if prev > start {
                        return Err(Status::corruption(format!(
                            "overlapping {kind} spans at {start}"
                        )));
                    }
                }
                prev_end = Some(end);
            }
            Ok(())
        }

        check("range-del", self.range_dels.iter().map(|s| (&s.start, &s.end)))?;
        check("range-key", self.range_keys.iter().map(|s| (&s.start, &s.end)))
    }
}
