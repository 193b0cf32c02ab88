//! Coma core
//!
//! Document lifecycle, serialized document commits and resumable backend
//! job orchestration on top of the span model.
//!
//! # Core Concepts
//!
//! - [`DocumentRecord`]: header, immutable content, clauses and derived fields
//! - [`lifecycle`]: the status machine, pause/unpause and revert-on-failure
//! - [`DocumentWorkspace`]: per-document serialized read-modify-write commits
//! - [`JobOrchestrator`]: submits ingest/analyze/taxonomy jobs, polls them,
//!   merges results and resumes outstanding jobs after a reload
//! - [`Backend`]: the remote processing service, abstracted for tests
//! - [`store`]: document and job-id persistence (file and in-memory)
//!
//! # Example
//!
//! ```rust,ignore
//! use coma_core::{ComaConfig, DocumentWorkspace, JobOrchestrator};
//!
//! let config = ComaConfig::load("coma.toml")?;
//! let workspace = Arc::new(DocumentWorkspace::new(documents, Arc::new(SystemClock)));
//! let orchestrator = JobOrchestrator::new(workspace, jobs, backend, config);
//! orchestrator.resume_all().await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod orchestrator;
pub mod results;
pub mod store;
pub mod types;
pub mod workspace;

pub use backend::{
    ActiveJob, AnalysisRequest, Backend, JobCreated, JobPoll, JobState, JobStatusResponse, TaxonomyCheck,
    UploadRequest,
};
pub use cache::TaxonomyCache;
pub use clock::{Clock, SystemClock};
pub use config::ComaConfig;
pub use error::{BackendError, ComaError, LifecycleError, StoreError};
pub use events::{wait_terminal, JobEvent};
pub use orchestrator::{JobOrchestrator, PollOutcome, ResumeReport};
pub use store::{DocumentStore, FileDocumentStore, FileJobStore, InMemoryDocumentStore, InMemoryJobStore, JobStore};
pub use types::{
    DerivedFields, DocumentHeader, DocumentId, DocumentRecord, DocumentStatus, DocumentType, JobId, JobRecord,
    JobType, Progress,
};
pub use workspace::DocumentWorkspace;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
