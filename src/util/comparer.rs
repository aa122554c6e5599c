use std::cmp::Ordering;

use crate::util::{Result, Slice, Status};

/// Key schema: bytewise key order plus a prefix/suffix split.
///
/// A key `foo@12` splits into prefix `foo` and suffix `@12`. The suffix
/// carries a version number; range-key values are presented ordered by
/// suffix with the empty suffix first, then higher versions first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparer {
    separator: u8,
}

impl Comparer {
    pub fn new(separator: u8) -> Self {
        Comparer { separator }
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Length of the prefix of `key`.
    pub fn split(&self, key: &[u8]) -> usize {
        key.iter()
            .rposition(|&b| b == self.separator)
            .unwrap_or(key.len())
    }

    pub fn prefix<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        &key[..self.split(key)]
    }

    /// Parse the version carried by a suffix. The empty suffix has no
    /// version.
    pub fn parse_suffix(&self, suffix: &[u8]) -> Result<Option<u64>> {
        if suffix.is_empty() {
            return Ok(None);
        }
        let digits = match suffix.split_first() {
            Some((&sep, rest)) if sep == self.separator && !rest.is_empty() => rest,
            _ => {
                return Err(Status::invalid_argument(format!(
                    "malformed suffix {:?}",
                    Slice::from_bytes(suffix)
                )));
            },
        };
        std::str::from_utf8(digits)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| {
                Status::invalid_argument(format!(
                    "unsupported suffix encoding {:?}",
                    Slice::from_bytes(suffix)
                ))
            })
    }

    pub fn validate_suffix(&self, suffix: &[u8]) -> Result<()> {
        self.parse_suffix(suffix).map(|_| ())
    }

    /// Presentation order of two suffixes: empty first, then descending
    /// version. Suffixes must have been validated.
    pub fn compare_suffixes(&self, a: &[u8], b: &[u8]) -> Ordering {
        let va = self.parse_suffix(a).ok().flatten();
        let vb = self.parse_suffix(b).ok().flatten();
        match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        }
    }
}

impl Default for Comparer {
    fn default() -> Self {
        Comparer::new(b'@')
    }
}
