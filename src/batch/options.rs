use serde::{Deserialize, Serialize};

use crate::util::{Comparer, Result};

/// Options for an indexed batch
///
/// # Example
///
/// ```ignore
/// use batchview::BatchOptions;
///
/// let options = BatchOptions::from_json(r#"{"suffix_separator": 35}"#)?;
/// assert_eq!(options.suffix_separator, b'#');
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Byte separating a key's prefix from its version suffix
    /// Default: b'@'
    pub suffix_separator: u8,

    /// Number of ops to reserve room for in the mutation log
    /// Default: 64
    pub initial_capacity: usize,

    /// Check fragment ordering after every cache extension and view
    /// resolution, failing with `Corruption` on violation
    /// Default: true
    pub validate_fragments: bool,
}

impl BatchOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn comparer(&self) -> Comparer {
        Comparer::new(self.suffix_separator)
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            suffix_separator: b'@',
            initial_capacity: 64,
            validate_fragments: true,
        }
    }
}
