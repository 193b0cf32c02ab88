//! Persistence capabilities
//!
//! The document store is an opaque keyed record collaborator; the job store
//! durably maps `<documentId>:<jobType>` to the backend job reference.

mod file;
mod memory;

pub use file::{FileDocumentStore, FileJobStore};
pub use memory::{InMemoryDocumentStore, InMemoryJobStore};

use crate::error::StoreError;
use crate::types::{DocumentId, DocumentRecord, JobRecord, JobType};
use async_trait::async_trait;

/// Keyed document record store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every stored document
    async fn get_all(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    /// One document, if present
    async fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError>;

    /// Insert or replace a document
    async fn put(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    /// Remove a document (no-op when absent)
    async fn delete(&self, id: &DocumentId) -> Result<(), StoreError>;
}

/// Durable job id store, surviving reloads
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Job persisted for this document and job type
    async fn get(&self, document: &DocumentId, job_type: JobType) -> Result<Option<JobRecord>, StoreError>;

    /// Persist (or replace) the job for `record.job_type`
    async fn put(&self, document: &DocumentId, record: &JobRecord) -> Result<(), StoreError>;

    /// Forget the job for this document and job type
    async fn clear(&self, document: &DocumentId, job_type: JobType) -> Result<(), StoreError>;

    /// Every persisted job
    async fn all(&self) -> Result<Vec<(DocumentId, JobRecord)>, StoreError>;
}
