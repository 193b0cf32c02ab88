//! Word-boundary snapping for raw selection positions
//!
//! Start boundaries snap backward to the start of the word they land in;
//! end boundaries snap forward to the end of the word they land in. A
//! position on whitespace, or already on a boundary, is kept.

use crate::block::{check_bounds, ContentBlock};
use crate::error::SpanError;
use crate::position::Position;

/// Snap a raw start position back to the start of its word
pub fn snap_start(content: &[ContentBlock], raw: Position) -> Result<Position, SpanError> {
    check_bounds(content, raw)?;
    let chars: Vec<char> = content[raw.block].text.chars().collect();

    if !inside_word(&chars, raw.offset) {
        return Ok(raw);
    }

    let mut offset = raw.offset;
    while offset > 0 && !chars[offset - 1].is_whitespace() {
        offset -= 1;
    }
    Ok(Position::new(raw.block, offset))
}

/// Snap a raw end position forward to the end of its word
pub fn snap_end(content: &[ContentBlock], raw: Position) -> Result<Position, SpanError> {
    check_bounds(content, raw)?;
    let chars: Vec<char> = content[raw.block].text.chars().collect();

    if !inside_word(&chars, raw.offset) {
        return Ok(raw);
    }

    let mut offset = raw.offset;
    while offset < chars.len() && !chars[offset].is_whitespace() {
        offset += 1;
    }
    Ok(Position::new(raw.block, offset))
}

/// Offset sits between two non-whitespace chars
fn inside_word(chars: &[char], offset: usize) -> bool {
    offset > 0
        && offset < chars.len()
        && !chars[offset - 1].is_whitespace()
        && !chars[offset].is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Vec<ContentBlock> {
        vec![ContentBlock::new("b0", "The Supplier shall  pay", "CLAUSE")]
    }

    fn p(offset: usize) -> Position {
        Position::new(0, offset)
    }

    #[test]
    fn start_inside_word_snaps_back() {
        // "Supplier" spans 4..12
        assert_eq!(snap_start(&doc(), p(7)).unwrap(), p(4));
    }

    #[test]
    fn start_on_boundary_or_whitespace_kept() {
        assert_eq!(snap_start(&doc(), p(4)).unwrap(), p(4));
        assert_eq!(snap_start(&doc(), p(3)).unwrap(), p(3));
        assert_eq!(snap_start(&doc(), p(19)).unwrap(), p(19));
        assert_eq!(snap_start(&doc(), p(0)).unwrap(), p(0));
    }

    #[test]
    fn end_inside_word_snaps_forward() {
        assert_eq!(snap_end(&doc(), p(7)).unwrap(), p(12));
        // last word runs to the end of the block
        assert_eq!(snap_end(&doc(), p(21)).unwrap(), p(23));
    }

    #[test]
    fn end_at_word_start_excludes_word() {
        assert_eq!(snap_end(&doc(), p(4)).unwrap(), p(4));
        assert_eq!(snap_end(&doc(), p(12)).unwrap(), p(12));
        assert_eq!(snap_end(&doc(), p(23)).unwrap(), p(23));
    }

    #[test]
    fn out_of_bounds_rejected() {
        assert!(matches!(
            snap_start(&doc(), p(24)),
            Err(SpanError::PositionOutOfBounds(_))
        ));
        assert!(snap_end(&doc(), Position::new(1, 0)).is_err());
    }
}
