//! Heuristic clause bootstrapping
//!
//! Initial clauses are derived by scanning blocks in order: every block a
//! [`BoundaryClassifier`] marks as a section start opens a clause that runs
//! until the next boundary (or the end of the document).

use crate::block::{document_end, ContentBlock};
use crate::clause::{Clause, ClauseId, ClauseKind};
use crate::position::Position;
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest header derived from block text
const MAX_HEADER_CHARS: usize = 80;

/// Decides whether a block starts a new section, and of which kind
pub trait BoundaryClassifier: Send + Sync {
    /// `Some(kind)` when the block opens a section
    fn classify(&self, block: &ContentBlock) -> Option<ClauseKind>;
}

impl<F> BoundaryClassifier for F
where
    F: Fn(&ContentBlock) -> Option<ClauseKind> + Send + Sync,
{
    fn classify(&self, block: &ContentBlock) -> Option<ClauseKind> {
        self(block)
    }
}

/// Classifies by the kind label the parser/tagger attached to the block
///
/// Boundaries are `*_START` labels (`INFO_START` opens an info section), plus the structural
/// labels `HEADER`, `TITLE`, `SECTION_GROUP` and `APPENDIX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindClassifier;

impl BoundaryClassifier for KindClassifier {
    fn classify(&self, block: &ContentBlock) -> Option<ClauseKind> {
        let label = block.kind.trim().to_ascii_uppercase();
        match label.as_str() {
            "HEADER" | "TITLE" | "SECTION_GROUP" => Some(ClauseKind::Clause),
            "APPENDIX" => Some(ClauseKind::Appendix),
            other => other
                .strip_suffix("_START")
                .and_then(|base| base.parse().ok()),
        }
    }
}

static NUMBERED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^((article|section|appendix|schedule|exhibit|annex)\s+\w+|\d+(\.\d+)*\.?)")
        .unwrap_or_else(|e| unreachable!("static heading pattern: {e}"))
});

static APPENDIX_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(appendix|schedule|exhibit|annex)")
        .unwrap_or_else(|e| unreachable!("static appendix pattern: {e}"))
});

/// Classifies by the block text: short numbered, all-caps or appendix-like lines
#[derive(Debug, Clone, Copy)]
pub struct HeadingPatternClassifier {
    /// Blocks with this many words or more are never headings
    pub max_words: usize,
}

impl Default for HeadingPatternClassifier {
    fn default() -> Self {
        Self { max_words: 15 }
    }
}

impl BoundaryClassifier for HeadingPatternClassifier {
    fn classify(&self, block: &ContentBlock) -> Option<ClauseKind> {
        let text = block.text.trim();
        if text.is_empty() || text.split_whitespace().count() >= self.max_words {
            return None;
        }

        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        let all_caps = text.chars().count() > 3
            && !letters.is_empty()
            && letters.iter().all(|c| c.is_uppercase());

        if APPENDIX_HEADING.is_match(text) {
            let word = text.split_whitespace().next().unwrap_or_default();
            Some(match word.to_ascii_lowercase().as_str() {
                "annex" => ClauseKind::Annex,
                "exhibit" => ClauseKind::Exhibit,
                _ => ClauseKind::Appendix,
            })
        } else if NUMBERED_HEADING.is_match(text) || all_caps {
            Some(ClauseKind::Clause)
        } else {
            None
        }
    }
}

/// Derive clauses from block boundaries
///
/// Each clause starts at offset 0 of its boundary block and ends at offset 0
/// of the next boundary block; the last one ends at the document end.
/// Content before the first boundary stays untagged. Boundaries that would
/// produce an empty range are skipped.
#[must_use]
pub fn derive_clauses(content: &[ContentBlock], classifier: &dyn BoundaryClassifier) -> Vec<Clause> {
    let starts: Vec<(usize, ClauseKind)> = content
        .iter()
        .enumerate()
        .filter_map(|(i, block)| classifier.classify(block).map(|kind| (i, kind)))
        .collect();

    let doc_end = document_end(content);
    let mut clauses = Vec::with_capacity(starts.len());

    for (n, (index, kind)) in starts.iter().enumerate() {
        let start = Position::new(*index, 0);
        let end = starts
            .get(n + 1)
            .map_or(doc_end, |(next, _)| Position::new(*next, 0));
        if start >= end {
            continue;
        }

        let block = &content[*index];
        let id = if block.id.is_empty() {
            ClauseId::generate()
        } else {
            ClauseId(block.id.clone())
        };

        clauses.push(Clause::closed(id, *kind, start, end).with_header(header_from(&block.text)));
    }

    tracing::debug!(blocks = content.len(), clauses = clauses.len(), "clauses bootstrapped");
    clauses
}

fn header_from(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Clause::DEFAULT_HEADER.to_string();
    }
    trimmed.chars().take(MAX_HEADER_CHARS).collect()
}
