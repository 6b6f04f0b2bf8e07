/*!
# Span Edits

Byte-span replacements applied to source text. Text outside the edited spans
is preserved exactly, which is what keeps rewritten files formatted the way
their authors left them.
*/

use std::ops::Range;

/// A single replacement of `range` (byte offsets) with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn new(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }
}

/// Edit application errors
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EditError {
    /// Two edits touch the same bytes
    #[error("overlapping edits at {first:?} and {second:?}")]
    Overlap {
        first: Range<usize>,
        second: Range<usize>,
    },

    /// An edit lies outside the source or splits a character
    #[error("edit {range:?} is out of bounds for source of length {len}")]
    OutOfBounds { range: Range<usize>, len: usize },
}

/// Apply non-overlapping edits to `source`, returning the new text
///
/// Edits may be given in any order.
pub fn apply_edits(source: &str, edits: &[Edit]) -> Result<String, EditError> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|edit| (edit.range.start, edit.range.end));

    for edit in &sorted {
        let range = &edit.range;
        if range.start > range.end
            || range.end > source.len()
            || !source.is_char_boundary(range.start)
            || !source.is_char_boundary(range.end)
        {
            return Err(EditError::OutOfBounds {
                range: range.clone(),
                len: source.len(),
            });
        }
    }

    for pair in sorted.windows(2) {
        if pair[1].range.start < pair[0].range.end {
            return Err(EditError::Overlap {
                first: pair[0].range.clone(),
                second: pair[1].range.clone(),
            });
        }
    }

    let mut result = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in sorted {
        result.push_str(&source[cursor..edit.range.start]);
        result.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    result.push_str(&source[cursor..]);

    Ok(result)
}
