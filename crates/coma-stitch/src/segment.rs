//! Stitched segments

use coma_span::{Clause, Position};

/// Label for text not covered by any clause
pub const GAP_LABEL: &str = "Untagged Content";

/// One piece of a stitched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text covered by a terminated clause
    Clause {
        /// The clause (metadata and range)
        clause: Clause,
        /// Text of `[clause.start, clause.end)`
        text: String,
    },
    /// Untagged text between or around clauses
    Gap {
        /// Start of the gap
        start: Position,
        /// End of the gap
        end: Position,
        /// Gap text (always has non-whitespace content)
        text: String,
    },
}

impl Segment {
    /// Segment text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Segment::Clause { text, .. } | Segment::Gap { text, .. } => text,
        }
    }

    /// Range covered in the source document
    #[inline]
    #[must_use]
    pub fn range(&self) -> (Position, Position) {
        match self {
            Segment::Clause { clause, .. } => (clause.start, clause.end.unwrap_or(clause.start)),
            Segment::Gap { start, end, .. } => (*start, *end),
        }
    }

    /// Clause header, or [`GAP_LABEL`] for gaps
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Segment::Clause { clause, .. } => &clause.header,
            Segment::Gap { .. } => GAP_LABEL,
        }
    }

    /// Whether this is a gap
    #[inline]
    #[must_use]
    pub fn is_gap(&self) -> bool {
        matches!(self, Segment::Gap { .. })
    }

    /// The clause, for clause segments
    #[inline]
    #[must_use]
    pub fn clause(&self) -> Option<&Clause> {
        match self {
            Segment::Clause { clause, .. } => Some(clause),
            Segment::Gap { .. } => None,
        }
    }
}
