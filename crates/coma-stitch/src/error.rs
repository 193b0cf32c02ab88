//! Error types for stitching and export

use coma_span::{ClauseId, ClauseKind};

/// Stitching / export errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StitchError {
    /// Clause kind not accepted for this document type
    #[error("clause '{clause}' has kind {kind}, which this document type does not accept")]
    IncompatibleKind {
        /// Offending clause
        clause: ClauseId,
        /// Its kind
        kind: ClauseKind,
    },

    /// Export payload could not be serialized
    #[error("export serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StitchError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
