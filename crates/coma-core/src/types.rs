//! Core types for documents and jobs

use chrono::{DateTime, Utc};
use coma_span::{Clause, ClauseKind, ContentBlock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Document identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Generate a fresh document id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Backend job identifier (opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Document processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Uploaded, not yet annotated
    Uploaded,
    /// Ingest job running
    Ingesting,
    /// Clauses populated, under review
    Draft,
    /// Finalized, ready for analysis
    Annotated,
    /// Analysis job running
    Analyzing,
    /// Analysis results stored
    Analyzed,
    /// Local polling suspended
    Paused,
}

impl DocumentStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [DocumentStatus; 7] = [
        DocumentStatus::Uploaded,
        DocumentStatus::Ingesting,
        DocumentStatus::Draft,
        DocumentStatus::Annotated,
        DocumentStatus::Analyzing,
        DocumentStatus::Analyzed,
        DocumentStatus::Paused,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Ingesting => "ingesting",
            Self::Draft => "draft",
            Self::Annotated => "annotated",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Paused => "paused",
        }
    }

    /// Whether a backend job drives this status
    #[inline]
    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Ingesting | Self::Analyzing)
    }

    /// Job type behind a processing status
    #[inline]
    #[must_use]
    pub fn job_type(&self) -> Option<JobType> {
        match self {
            Self::Ingesting => Some(JobType::Ingest),
            Self::Analyzing => Some(JobType::Analyze),
            _ => None,
        }
    }
}

impl Display for DocumentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Master agreement
    #[default]
    Master,
    /// Subordinate agreement
    Subordinate,
    /// Reference document (playbook, guidelines)
    Reference,
}

const CONTRACT_KINDS: [ClauseKind; 5] = [
    ClauseKind::Info,
    ClauseKind::Clause,
    ClauseKind::Appendix,
    ClauseKind::Annex,
    ClauseKind::Exhibit,
];

const REFERENCE_KINDS: [ClauseKind; 2] = [ClauseKind::Guideline, ClauseKind::Info];

impl DocumentType {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "MASTER",
            Self::Subordinate => "SUBORDINATE",
            Self::Reference => "REFERENCE",
        }
    }

    /// Reference-type document
    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference)
    }

    /// Clause kinds an export of this document type may contain
    #[inline]
    #[must_use]
    pub fn allowed_clause_kinds(&self) -> &'static [ClauseKind] {
        if self.is_reference() {
            &REFERENCE_KINDS
        } else {
            &CONTRACT_KINDS
        }
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MASTER" => Ok(Self::Master),
            "SUBORDINATE" => Ok(Self::Subordinate),
            "REFERENCE" => Ok(Self::Reference),
            _ => Err(format!("unknown document type: {s}")),
        }
    }
}

/// Backend job type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Annotation / ingest of the original file
    Ingest,
    /// Analysis of the finalized document
    Analyze,
    /// Taxonomy generation
    Taxonomy,
}

impl JobType {
    /// All job types
    pub const ALL: [JobType; 3] = [JobType::Ingest, JobType::Analyze, JobType::Taxonomy];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Analyze => "analyze",
            Self::Taxonomy => "taxonomy",
        }
    }

    /// Status a document holds while this job runs
    #[inline]
    #[must_use]
    pub fn processing_status(&self) -> Option<DocumentStatus> {
        match self {
            Self::Ingest => Some(DocumentStatus::Ingesting),
            Self::Analyze => Some(DocumentStatus::Analyzing),
            Self::Taxonomy => None,
        }
    }
}

impl Display for JobType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown job type: {s}"))
    }
}

/// Key under which a job record is persisted: `<documentId>:<jobType>`
#[inline]
#[must_use]
pub fn job_key(document: &DocumentId, job_type: JobType) -> String {
    format!("{document}:{job_type}")
}

/// Split a persisted job key back into its parts
#[must_use]
pub fn parse_job_key(key: &str) -> Option<(DocumentId, JobType)> {
    let (document, job_type) = key.rsplit_once(':')?;
    Some((DocumentId(document.to_string()), job_type.parse().ok()?))
}

/// Persisted job reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Backend job id
    pub job_id: JobId,
    /// Job type
    pub job_type: JobType,
    /// When the job was submitted (or attached to)
    pub submitted_at: DateTime<Utc>,
    /// When a terminal status was observed
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create new unfinished record
    #[inline]
    #[must_use]
    pub fn new(job_id: JobId, job_type: JobType, submitted_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            job_type,
            submitted_at,
            finished_at: None,
        }
    }

    /// Whether a terminal status has been observed
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Job progress shown while a document is processing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Percent complete (0..=100)
    pub percent: u8,
    /// Backend status message
    #[serde(default)]
    pub message: Option<String>,
}

/// Document header: identity, status and bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    /// Document id
    pub id: DocumentId,
    /// Original file name
    pub filename: String,
    /// Current status
    pub status: DocumentStatus,
    /// Status to return to when unpausing
    #[serde(default)]
    pub status_before_pause: Option<DocumentStatus>,
    /// Document type
    pub document_type: DocumentType,
    /// Free-form document tags
    #[serde(default)]
    pub document_tags: Vec<String>,
    /// Handle of the original file (required for ingest)
    #[serde(default)]
    pub original_file: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last commit time
    pub updated_at: DateTime<Utc>,
    /// Commit counter
    #[serde(default)]
    pub revision: u64,
}

/// Analysis results and other fields derived from the current structure
///
/// Cleared by finalize.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedFields {
    /// Reference analysis: decision records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisions: Option<Value>,
    /// Reference analysis: trace payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Value>,
    /// Contract analysis: term sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_sheet: Option<Value>,
    /// Contract analysis: reference map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_map: Option<Value>,
    /// Generated taxonomy tag records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<Vec<Value>>,
    /// Message of the last failed job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Complete document record as persisted in the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Header
    pub header: DocumentHeader,
    /// Immutable content blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Clauses over `content`
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Derived analysis fields
    #[serde(default)]
    pub derived: DerivedFields,
    /// Progress of the running job
    #[serde(default)]
    pub progress: Option<Progress>,
}

impl DocumentRecord {
    /// Create new uploaded document without content
    #[must_use]
    pub fn new(filename: impl Into<String>, document_type: DocumentType, now: DateTime<Utc>) -> Self {
        Self {
            header: DocumentHeader {
                id: DocumentId::generate(),
                filename: filename.into(),
                status: DocumentStatus::Uploaded,
                status_before_pause: None,
                document_type,
                document_tags: Vec::new(),
                original_file: None,
                created_at: now,
                updated_at: now,
                revision: 0,
            },
            content: Vec::new(),
            clauses: Vec::new(),
            derived: DerivedFields::default(),
            progress: None,
        }
    }

    /// With original file handle
    #[inline]
    #[must_use]
    pub fn with_original_file(mut self, handle: impl Into<String>) -> Self {
        self.header.original_file = Some(handle.into());
        self
    }

    /// With document tags
    #[inline]
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.header.document_tags = tags;
        self
    }

    /// With content blocks
    #[inline]
    #[must_use]
    pub fn with_content(mut self, content: Vec<ContentBlock>) -> Self {
        self.content = content;
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.header.status = status;
        self
    }

    /// Document id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.header.id
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> DocumentStatus {
        self.header.status
    }

    /// Export metadata (element 0 of an export)
    #[must_use]
    pub fn export_metadata(&self) -> Value {
        serde_json::json!({
            "id": self.header.id,
            "filename": self.header.filename,
            "documentType": self.header.document_type,
            "documentTags": self.header.document_tags,
            "status": self.header.status,
            "revision": self.header.revision,
            "updatedAt": self.header.updated_at,
        })
    }
}
