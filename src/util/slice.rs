use std::{borrow::Borrow, cmp::Ordering, fmt};

use bytes::Bytes;

/// Immutable byte buffer used for keys, values and suffixes.
///
/// Backed by [`Bytes`], so clones share the allocation. Batch operations,
/// index entries and resolved range-key spans all hold the same buffers.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Slice {
    data: Bytes,
}

impl Slice {
    pub fn new(data: Vec<u8>) -> Self {
        Slice {
            data: Bytes::from(data),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Slice {
            data: Bytes::copy_from_slice(data),
        }
    }

    pub fn from_static(data: &'static [u8]) -> Self {
        Slice {
            data: Bytes::from_static(data),
        }
    }

    pub fn empty() -> Self {
        Slice { data: Bytes::new() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn compare(&self, other: &Slice) -> Ordering {
        self.data.cmp(&other.data)
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.data.starts_with(prefix)
    }

    /// Sub-slice sharing the same allocation.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Slice {
        Slice {
            data: self.data.slice(range),
        }
    }

    /// Smallest key strictly greater than `self` in bytewise order.
    pub fn immediate_successor(&self) -> Slice {
        let mut buf = Vec::with_capacity(self.data.len() + 1);
        buf.extend_from_slice(&self.data);
        buf.push(0);
        Slice::new(buf)
    }

    /// Smallest key greater than every key that starts with `self`.
    ///
    /// Returns `None` when no such key exists (empty or all `0xff`).
    pub fn prefix_successor(&self) -> Option<Slice> {
        let mut buf = self.data.to_vec();
        while let Some(last) = buf.pop() {
            if last < 0xff {
                buf.push(last + 1);
                return Some(Slice::new(buf));
            }
        }
        None
    }
}

impl From<Vec<u8>> for Slice {
    fn from(data: Vec<u8>) -> Self {
        Slice::new(data)
    }
}

impl From<&[u8]> for Slice {
    fn from(data: &[u8]) -> Self {
        Slice::from_bytes(data)
    }
}

impl From<String> for Slice {
    fn from(s: String) -> Self {
        Slice::new(s.into_bytes())
    }
}

impl From<&str> for Slice {
    fn from(s: &str) -> Self {
        Slice::from_bytes(s.as_bytes())
    }
}

impl From<Bytes> for Slice {
    fn from(data: Bytes) -> Self {
        Slice { data }
    }
}

impl AsRef<[u8]> for Slice {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Borrow<[u8]> for Slice {
    fn borrow(&self) -> &[u8] {
        &self.data
    }
}

impl PartialOrd for Slice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(s) => write!(f, "Slice(\"{s}\")"),
            Err(_) => write!(f, "Slice({:?})", &self.data[..]),
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{:?}", &self.data[..]),
        }
    }
}
