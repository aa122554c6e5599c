use crate::util::Slice;

/// One entry of the mutation log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set {
        key: Slice,
        value: Slice,
    },
    Delete {
        key: Slice,
    },
    DeleteRange {
        start: Slice,
        end: Slice,
    },
    RangeKeySet {
        start: Slice,
        end: Slice,
        suffix: Slice,
        value: Slice,
    },
    RangeKeyUnset {
        start: Slice,
        end: Slice,
        suffix: Slice,
    },
    RangeKeyDelete {
        start: Slice,
        end: Slice,
    },
}

impl BatchOp {
    /// Whether the op is folded into the fragment cache.
    #[inline]
    pub fn is_range_op(&self) -> bool {
        !matches!(self, BatchOp::Set { .. } | BatchOp::Delete { .. })
    }

    /// `[start, end)` of a range op.
    pub fn span(&self) -> Option<(&Slice, &Slice)> {
        match self {
            BatchOp::Set { .. } | BatchOp::Delete { .. } => None,
            BatchOp::DeleteRange { start, end }
            | BatchOp::RangeKeySet { start, end, .. }
            | BatchOp::RangeKeyUnset { start, end, .. }
            | BatchOp::RangeKeyDelete { start, end } => Some((start, end)),
        }
    }

    /// Approximate bytes buffered by this op.
    pub fn data_size(&self) -> usize {
        match self {
            BatchOp::Set { key, value } => key.size() + value.size(),
            BatchOp::Delete { key } => key.size(),
            BatchOp::DeleteRange { start, end } | BatchOp::RangeKeyDelete { start, end } => {
                start.size() + end.size()
            },
            BatchOp::RangeKeySet {
                start,
                end,
                suffix,
                value,
            } => start.size() + end.size() + suffix.size() + value.size(),
            BatchOp::RangeKeyUnset { start, end, suffix } => {
                start.size() + end.size() + suffix.size()
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BatchOp::Set { .. } => "set",
            BatchOp::Delete { .. } => "delete",
            BatchOp::DeleteRange { .. } => "delete-range",
            BatchOp::RangeKeySet { .. } => "range-key-set",
            BatchOp::RangeKeyUnset { .. } => "range-key-unset",
            BatchOp::RangeKeyDelete { .. } => "range-key-delete",
        }
    }
}
