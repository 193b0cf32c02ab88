//! Finalize: canonical one-block-per-section form

use crate::assembler::stitch;
use crate::export::SKIP_TYPE;
use crate::segment::Segment;
use coma_span::{Clause, ContentBlock, Position};
use serde_json::Value;

/// Canonical content and clauses produced by [`finalize`]
#[derive(Debug, Clone, PartialEq)]
pub struct Finalized {
    /// One block per stitched segment
    pub content: Vec<ContentBlock>,
    /// One clause per clause block, spanning the whole block
    pub clauses: Vec<Clause>,
}

/// Re-index a document so that every segment becomes its own block
///
/// Clause blocks take the clause id as block id and the clause kind as block
/// kind; gap blocks are numbered `gap-<n>` with kind `SKIP`. Clause metadata
/// (id, kind, header, tags) is preserved. Running finalize on its own output
/// yields the same structure.
#[must_use]
pub fn finalize(content: &[ContentBlock], clauses: &[Clause]) -> Finalized {
    let segments = stitch(content, clauses);

    let mut out_content = Vec::with_capacity(segments.len());
    let mut out_clauses = Vec::new();
    let mut gaps = 0usize;

    for segment in segments {
        match segment {
            Segment::Clause { clause, text } => {
                if text.is_empty() {
                    tracing::warn!(clause = %clause.id, "dropping clause with no text during finalize");
                    continue;
                }
                let index = out_content.len();
                let len = text.chars().count();
                out_content.push(
                    ContentBlock::new(clause.id.as_str(), text, clause.kind.as_str())
                        .with_attribute("header", Value::String(clause.header.clone())),
                );
                out_clauses.push(Clause {
                    start: Position::new(index, 0),
                    end: Some(Position::new(index, len)),
                    ..clause
                });
            }
            Segment::Gap { text, .. } => {
                out_content.push(ContentBlock::new(format!("gap-{gaps}"), text, SKIP_TYPE));
                gaps += 1;
            }
        }
    }

    tracing::debug!(
        blocks = out_content.len(),
        clauses = out_clauses.len(),
        "document finalized"
    );

    Finalized {
        content: out_content,
        clauses: out_clauses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use coma_span::{document_end, store::check_invariants, ClauseKind};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn content_of(texts: &[&str]) -> Vec<ContentBlock> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ContentBlock::new(format!("b{i}"), *t, "CONTENT"))
            .collect()
    }

    fn p(block: usize, offset: usize) -> Position {
        Position::new(block, offset)
    }

    #[test]
    fn segments_become_blocks() {
        let content = content_of(&["Intro", "Section 1", "Text A.", "Section 2", "Text B."]);
        let clauses = vec![
            Clause::closed("s1", ClauseKind::Clause, p(1, 0), p(3, 0))
                .with_header("Section 1")
                .with_tags(["payment"]),
            Clause::closed("s2", ClauseKind::Annex, p(3, 0), p(3, 9)),
        ];

        let out = finalize(&content, &clauses);

        let ids: Vec<&str> = out.content.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["gap-0", "s1", "s2", "gap-1"]);
        assert_eq!(out.content[0].kind, SKIP_TYPE);
        assert_eq!(out.content[1].text, "Section 1\nText A.");
        assert_eq!(out.content[2].kind, "ANNEX");
        assert_eq!(out.content[3].text, "Text B.");

        assert_eq!(out.clauses.len(), 2);
        assert_eq!(out.clauses[0].range(), Some((p(1, 0), p(1, 17))));
        assert_eq!(out.clauses[0].header, "Section 1");
        assert!(out.clauses[0].tags.contains("payment"));
        assert_eq!(out.clauses[1].range(), Some((p(2, 0), p(2, 9))));
        check_invariants(&out.clauses).unwrap();
    }

    #[test]
    fn twice_is_identity() {
        let content = content_of(&["Intro", "Section 1", "Text A.", "  ", "Tail"]);
        let clauses = vec![Clause::closed("s1", ClauseKind::Clause, p(1, 0), p(2, 4))];
        let once = finalize(&content, &clauses);
        let twice = finalize(&once.content, &once.clauses);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_clause_dropped() {
        let content = content_of(&["abc", "def"]);
        // covers only the block boundary, so the extracted text is empty
        let clauses = vec![Clause::closed("e", ClauseKind::Clause, p(0, 3), p(1, 0))];
        let out = finalize(&content, &clauses);
        assert!(out.clauses.is_empty());
        let texts: Vec<&str> = out.content.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "def"]);
    }

    proptest! {
        #[test]
        fn prop_finalize_idempotent(
            texts in prop::collection::vec("[a-z ]{0,10}", 1..5),
            cut_a in 0usize..40,
            cut_b in 0usize..40,
        ) {
            let content = content_of(&texts.iter().map(String::as_str).collect::<Vec<_>>());
            let points: Vec<Position> = content
                .iter()
                .enumerate()
                .flat_map(|(b, block)| (0..=block.char_len()).map(move |o| Position::new(b, o)))
                .collect();
            let (a, b) = (points[cut_a % points.len()], points[cut_b % points.len()]);
            let clauses = if a < b {
                vec![Clause::closed("x", ClauseKind::Clause, a, b)]
            } else {
                Vec::new()
            };

            let once = finalize(&content, &clauses);
            let twice = finalize(&once.content, &once.clauses);
            prop_assert_eq!(&once, &twice);

            let before = extract(&content, Position::origin(), document_end(&content));
            let after = extract(&once.content, Position::origin(), document_end(&once.content));
            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            prop_assert_eq!(strip(&before), strip(&after));
        }
    }
}
