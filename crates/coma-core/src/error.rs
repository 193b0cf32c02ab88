//! Error types for Coma Core
//!
//! Provides error handling for:
//! - Clause and export validation (wrapped from `coma-span` / `coma-stitch`)
//! - Illegal lifecycle transitions and failed guards
//! - Document and job persistence
//! - Backend calls

use crate::types::{DocumentId, DocumentStatus, JobType};
use coma_span::SpanError;
use coma_stitch::StitchError;

/// Main Coma error type
#[derive(Debug, thiserror::Error)]
pub enum ComaError {
    /// Clause operation rejected
    #[error("clause error: {0}")]
    Span(#[from] SpanError),

    /// Stitching or export rejected
    #[error("export error: {0}")]
    Stitch(#[from] StitchError),

    /// Lifecycle rule violated
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Persistence failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Backend call failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Unknown document
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// No persisted job for this document and job type
    #[error("no {job_type} job for document {document}")]
    JobNotFound {
        /// Document id
        document: DocumentId,
        /// Job type
        job_type: JobType,
    },

    /// Job result could not be applied
    #[error("invalid {job_type} result: {reason}")]
    InvalidResult {
        /// Job type
        job_type: JobType,
        /// What was wrong with the payload
        reason: String,
    },

    /// No generated taxonomy stored on the document
    #[error("document {0} has no generated taxonomy")]
    MissingTaxonomy(DocumentId),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl ComaError {
    /// Synchronous rejection of a request; state is unchanged
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Span(_) | Self::Stitch(StitchError::IncompatibleKind { .. }) | Self::Lifecycle(_)
        )
    }

    /// Worth retrying on the next tick
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_transient(),
            Self::Store(StoreError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// Transition not in the lifecycle table
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: DocumentStatus,
        /// Requested status
        to: DocumentStatus,
    },

    /// Ingest needs an original file handle
    #[error("document has no original file to ingest")]
    MissingOriginalFile,

    /// Analysis needs an active global taxonomy
    #[error("no active taxonomy; generate and save one before analyzing")]
    NoActiveTaxonomy,

    /// Clause edits outside draft/annotated
    #[error("clauses cannot be edited while the document is {0}")]
    NotEditable(DocumentStatus),

    /// Pause requested outside a processing status
    #[error("cannot pause a document that is {0}")]
    NotPausable(DocumentStatus),

    /// Unpause requested for a document that is not paused
    #[error("document is not paused (status {0})")]
    NotPaused(DocumentStatus),

    /// New work requested for a paused document
    #[error("document is paused; unpause it first")]
    Paused,
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failed
    #[error("io error: {0}")]
    Io(String),

    /// Stored data could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Backend call errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Resource unknown to the backend (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status
    #[error("backend returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Connection, timeout or other transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Transport failures and server-side (5xx) errors
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
