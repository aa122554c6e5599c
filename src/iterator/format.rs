use crate::iterator::{BatchIter, IterValidity};

/// Render the current position in the textual test format:
///
/// ```text
/// key: (value, [start-end) @2=x, @1=y UPDATED)
/// ```
///
/// A missing point value or range key is written as `.`; an invalid
/// iterator renders as `.`, or `err=<status>` when it carries an error.
pub fn format_position(iter: &BatchIter) -> String {
    if let Some(err) = iter.error() {
        return format!("err={err}");
    }
    if !iter.valid() {
        return ".".to_string();
    }

    let (has_point, has_range) = iter.has_point_and_range();
    let point = if has_point {
        iter.value().to_string()
    } else {
        ".".to_string()
    };

    let range = match iter.range_bounds() {
        Some((start, end)) if has_range => {
            let values: Vec<String> = iter
                .range_key_values()
                .iter()
                .map(|v| format!("{}={}", v.suffix, v.value))
                .collect();
            format!("[{start}-{end}) {}", values.join(", "))
        },
        _ => ".".to_string(),
    };

    let updated = if iter.range_key_changed() { " UPDATED" } else { "" };
    format!("{}: ({point}, {range}{updated})", iter.key())
}

/// Render the outcome of a limited positioning call.
pub fn format_validity(validity: IterValidity, iter: &BatchIter) -> String {
    match validity {
        IterValidity::Valid => format_position(iter),
        IterValidity::AtLimit => ". at-limit".to_string(),
        IterValidity::Exhausted => match iter.error() {
            Some(err) => format!("err={err}"),
            None => ".".to_string(),
        },
    }
}
