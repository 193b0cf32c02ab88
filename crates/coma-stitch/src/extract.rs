//! Text extraction between positions

use coma_span::{ContentBlock, Position};

/// Separator placed between text taken from consecutive blocks
pub(crate) const BLOCK_SEPARATOR: &str = "\n";

/// Text in `[from, to)`
///
/// Within one block this is a plain char slice. Across blocks it joins the
/// remainder of the start block, every interior block and the prefix of the
/// end block with [`BLOCK_SEPARATOR`]. An empty start remainder (the range
/// begins at the end of its block) and an empty end prefix (offset 0) add
/// neither text nor a separator, so a range that begins at a block end reads
/// the same as one that begins at the next block's start.
///
/// Positions past the content are clamped; an empty or inverted range yields `""`.
#[must_use]
pub fn extract(content: &[ContentBlock], from: Position, to: Position) -> String {
    if from >= to || content.is_empty() {
        return String::new();
    }

    let last = content.len() - 1;
    if from.block > last {
        return String::new();
    }
    let to = if to.block > last {
        Position::new(last, content[last].char_len())
    } else {
        to
    };

    if from.block == to.block {
        return content[from.block].slice(from.offset, to.offset).to_string();
    }

    let mut pieces: Vec<&str> = Vec::with_capacity(to.block - from.block + 1);

    let head = &content[from.block];
    if from.offset < head.char_len() {
        pieces.push(head.slice(from.offset, usize::MAX));
    }

    pieces.extend(
        content[from.block + 1..to.block]
            .iter()
            .map(|block| block.text.as_str()),
    );

    if to.offset > 0 {
        pieces.push(content[to.block].slice(0, to.offset));
    }

    pieces.join(BLOCK_SEPARATOR)
}
