//! Content blocks
//!
//! A document's text is an ordered, immutable sequence of [`ContentBlock`]s.
//! Offsets inside a block count chars, not bytes.

use crate::error::SpanError;
use crate::position::Position;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable unit of document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Block identifier (parser supplied)
    pub id: String,
    /// Block text
    #[serde(default)]
    pub text: String,
    /// Parser/tagger classification, e.g. `HEADER`, `CLAUSE_START`
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: String,
    /// Any further attributes the parser attached
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ContentBlock {
    /// Create new block without extra attributes
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind: kind.into(),
            attributes: Map::new(),
        }
    }

    /// With an extra attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Length of the text in chars
    #[inline]
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Slice of the text between two char offsets (clamped to the text)
    #[must_use]
    pub fn slice(&self, from: usize, to: usize) -> &str {
        let start = byte_offset(&self.text, from);
        let end = byte_offset(&self.text, to.max(from));
        &self.text[start..end]
    }

    /// Char at the given offset, if any
    #[inline]
    #[must_use]
    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.text.chars().nth(offset)
    }
}

/// Byte index of the `n`-th char, or the text length when `n` is past the end
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}

/// Final position of a document (end of the last block)
///
/// An empty document ends at the origin.
#[must_use]
pub fn document_end(content: &[ContentBlock]) -> Position {
    content
        .len()
        .checked_sub(1)
        .map_or(Position::origin(), |last| {
            Position::new(last, content[last].char_len())
        })
}

/// Check that a position addresses the content
///
/// Offsets equal to the block length are valid (they point just past the last char).
pub fn check_bounds(content: &[ContentBlock], position: Position) -> Result<(), SpanError> {
    match content.get(position.block) {
        Some(block) if position.offset <= block.char_len() => Ok(()),
        _ => Err(SpanError::PositionOutOfBounds(position)),
    }
}
