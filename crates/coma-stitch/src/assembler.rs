//! Stitching assembler
//!
//! Walks the document once, in clause order, emitting clause-segments and
//! the gap-segments between them.

use crate::extract::extract;
use crate::segment::Segment;
use coma_span::{compare, document_end, Clause, ContentBlock, Position};

/// Stitch clauses and gaps into an ordered segment sequence
///
/// Only terminated clauses participate. Gaps whose text is whitespace-only
/// are dropped. A block separator that falls exactly on a segment edge
/// belongs to neither segment, so the concatenated segment texts match the
/// full document text only up to whitespace.
#[must_use]
pub fn stitch(content: &[ContentBlock], clauses: &[Clause]) -> Vec<Segment> {
    let mut ordered: Vec<&Clause> = clauses.iter().filter(|c| c.is_terminated()).collect();
    ordered.sort_by(|a, b| compare(&a.start, &b.start));

    let mut segments = Vec::with_capacity(ordered.len() * 2 + 1);
    let mut cursor = Position::origin();

    for clause in ordered {
        let Some(end) = clause.end else { continue };

        push_gap(&mut segments, content, cursor, clause.start);
        segments.push(Segment::Clause {
            clause: clause.clone(),
            text: extract(content, clause.start, end),
        });
        cursor = end;
    }

    push_gap(&mut segments, content, cursor, document_end(content));

    tracing::trace!(segments = segments.len(), "document stitched");
    segments
}

fn push_gap(segments: &mut Vec<Segment>, content: &[ContentBlock], from: Position, to: Position) {
    if from >= to {
        return;
    }
    let text = extract(content, from, to);
    if text.trim().is_empty() {
        return;
    }
    segments.push(Segment::Gap {
        start: from,
        end: to,
        text,
    });
}
