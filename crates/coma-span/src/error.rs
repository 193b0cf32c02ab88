//! Error types for clause operations

use crate::clause::ClauseId;
use crate::position::Position;

/// Clause validation errors
///
/// Every variant is a synchronous rejection: the clause list passed in is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    /// Range would intersect an existing terminated clause
    #[error("position {position} overlaps existing clause '{existing}'")]
    Overlap {
        /// Offending (snapped) position
        position: Position,
        /// Clause already covering that position
        existing: ClauseId,
    },

    /// An unterminated clause already exists
    #[error("clause '{0}' is still open; end it before starting another")]
    UnterminatedExists(ClauseId),

    /// Snapped end does not lie after the start
    #[error("end {end} is not after start {start}")]
    EndBeforeStart {
        /// Start of the open clause
        start: Position,
        /// Snapped end
        end: Position,
    },

    /// No unterminated clause to end
    #[error("no open clause to end")]
    NoOpenClause,

    /// Merge needs at least two distinct clauses
    #[error("merge needs at least 2 clauses, got {0}")]
    TooFewSelected(usize),

    /// Merge selection contains the unterminated clause
    #[error("clause '{0}' is unterminated and cannot be merged")]
    UnterminatedSelected(ClauseId),

    /// Merged range would cover the start of the open clause
    #[error("merge would enclose the start {start} of open clause '{open}'")]
    OpenClauseInside {
        /// The unterminated clause
        open: ClauseId,
        /// Its start
        start: Position,
    },

    /// Referenced clause does not exist
    #[error("unknown clause: {0}")]
    UnknownClause(ClauseId),

    /// Position does not address any char in the content
    #[error("position {0} is outside the document")]
    PositionOutOfBounds(Position),

    /// Clause list breaks one of the structural invariants
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl SpanError {
    /// Short machine-readable code, stable across releases
    #[inline]
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Overlap { .. } => "OVERLAP",
            Self::UnterminatedExists(_) => "UNTERMINATED_EXISTS",
            Self::EndBeforeStart { .. } => "END_BEFORE_START",
            Self::NoOpenClause => "NO_OPEN_CLAUSE",
            Self::TooFewSelected(_) => "TOO_FEW_SELECTED",
            Self::UnterminatedSelected(_) => "UNTERMINATED_SELECTED",
            Self::OpenClauseInside { .. } => "OPEN_CLAUSE_INSIDE",
            Self::UnknownClause(_) => "UNKNOWN_CLAUSE",
            Self::PositionOutOfBounds(_) => "POSITION_OUT_OF_BOUNDS",
            Self::InvariantViolated(_) => "INVARIANT_VIOLATED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SpanError::TooFewSelected(1).code(), "TOO_FEW_SELECTED");
        assert_eq!(SpanError::NoOpenClause.code(), "NO_OPEN_CLAUSE");
    }

    #[test]
    fn display_mentions_positions() {
        let err = SpanError::EndBeforeStart {
            start: Position::new(1, 4),
            end: Position::new(1, 2),
        };
        assert_eq!(err.to_string(), "end {1,2} is not after start {1,4}");
    }
}
