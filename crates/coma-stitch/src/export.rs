//! Export format
//!
//! An export is an ordered JSON array. Element 0 is the document header
//! (`{"type": "HEADER", "metadata": {...}}`); every following element is a
//! stitched segment carrying `{type, start, end, text, tags}`. Clause
//! segments use the clause kind as `type`, gaps use `SKIP`.

use crate::assembler::stitch;
use crate::error::StitchError;
use crate::segment::Segment;
use coma_span::{Clause, ClauseKind, ContentBlock, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` of the leading header element
pub const HEADER_TYPE: &str = "HEADER";

/// `type` of gap segments
pub const SKIP_TYPE: &str = "SKIP";

/// Leading header element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportHeader {
    /// Always [`HEADER_TYPE`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Document metadata
    pub metadata: Value,
}

/// One exported segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSegment {
    /// Clause kind, or [`SKIP_TYPE`] for gaps
    #[serde(rename = "type")]
    pub kind: String,
    /// Clause id (absent for gaps)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Clause header, or the gap label
    pub header: String,
    /// Start in the source document
    pub start: Position,
    /// End in the source document
    pub end: Position,
    /// Segment text
    pub text: String,
    /// Clause tags (empty for gaps)
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&Segment> for ExportSegment {
    fn from(segment: &Segment) -> Self {
        let (start, end) = segment.range();
        match segment.clause() {
            Some(clause) => Self {
                kind: clause.kind.as_str().to_string(),
                id: Some(clause.id.to_string()),
                header: clause.header.clone(),
                start,
                end,
                text: segment.text().to_string(),
                tags: clause.tags.iter().cloned().collect(),
            },
            None => Self {
                kind: SKIP_TYPE.to_string(),
                id: None,
                header: segment.label().to_string(),
                start,
                end,
                text: segment.text().to_string(),
                tags: Vec::new(),
            },
        }
    }
}

impl ExportSegment {
    /// Whether this is a gap segment
    #[inline]
    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.kind == SKIP_TYPE
    }
}

/// Element of the export array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportEntry {
    /// Element 0
    Header(ExportHeader),
    /// Elements 1..
    Segment(ExportSegment),
}

/// Reject clauses whose kind is not in `allowed`
///
/// Unterminated clauses are checked too: they would be exported as soon as
/// they are closed.
///
/// # Errors
/// `StitchError::IncompatibleKind` for the first offending clause
pub fn validate_kinds(clauses: &[Clause], allowed: &[ClauseKind]) -> Result<(), StitchError> {
    match clauses.iter().find(|c| !allowed.contains(&c.kind)) {
        Some(clause) => Err(StitchError::IncompatibleKind {
            clause: clause.id.clone(),
            kind: clause.kind,
        }),
        None => Ok(()),
    }
}

/// Build the export array for a document
///
/// # Errors
/// `StitchError::IncompatibleKind` if a clause kind is not in `allowed`
pub fn export(
    content: &[ContentBlock],
    clauses: &[Clause],
    metadata: Value,
    allowed: &[ClauseKind],
) -> Result<Vec<ExportEntry>, StitchError> {
    validate_kinds(clauses, allowed)?;

    let segments = stitch(content, clauses);
    let mut entries = Vec::with_capacity(segments.len() + 1);
    entries.push(ExportEntry::Header(ExportHeader {
        kind: HEADER_TYPE.to_string(),
        metadata,
    }));
    entries.extend(segments.iter().map(|s| ExportEntry::Segment(s.into())));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn content() -> Vec<ContentBlock> {
        ["Section 1", "Text A.", "Section 2", "Text B."]
            .iter()
            .enumerate()
            .map(|(i, t)| ContentBlock::new(format!("b{i}"), *t, ""))
            .collect()
    }

    fn p(block: usize, offset: usize) -> Position {
        Position::new(block, offset)
    }

    #[test]
    fn export_shape() {
        let clauses = vec![Clause::closed("c1", ClauseKind::Clause, p(0, 0), p(1, 7))
            .with_header("Section 1")
            .with_tags(["scope"])];
        let entries = export(&content(), &clauses, json!({"filename": "a.pdf"}), &ClauseKind::ALL).unwrap();
        let value = serde_json::to_value(&entries).unwrap();

        assert_eq!(value[0], json!({"type": "HEADER", "metadata": {"filename": "a.pdf"}}));
        assert_eq!(value[1]["type"], "CLAUSE");
        assert_eq!(value[1]["id"], "c1");
        assert_eq!(value[1]["text"], "Section 1\nText A.");
        assert_eq!(value[1]["tags"], json!(["scope"]));
        assert_eq!(value[1]["start"], json!({"block": 0, "offset": 0}));
        assert_eq!(value[2]["type"], "SKIP");
        assert!(value[2].get("id").is_none());
        assert_eq!(value[2]["text"], "Section 2\nText B.");
    }

    #[test]
    fn parse_back() {
        let entries = export(&content(), &[], json!({}), &ClauseKind::ALL).unwrap();
        let text = serde_json::to_string(&entries).unwrap();
        let parsed: Vec<ExportEntry> = serde_json::from_str(&text).unwrap();
        assert!(matches!(parsed[0], ExportEntry::Header(_)));
        assert!(matches!(&parsed[1], ExportEntry::Segment(s) if s.is_skip()));
    }

    #[test]
    fn incompatible_kind_rejected() {
        let clauses = vec![Clause::closed("g", ClauseKind::Guideline, p(0, 0), p(0, 4))];
        let err = export(&content(), &clauses, json!({}), &[ClauseKind::Clause]).unwrap_err();
        assert_eq!(
            err,
            StitchError::IncompatibleKind {
                clause: "g".into(),
                kind: ClauseKind::Guideline
            }
        );
    }
}
