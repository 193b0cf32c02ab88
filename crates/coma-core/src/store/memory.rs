//! In-memory stores

use super::{DocumentStore, JobStore};
use crate::error::StoreError;
use crate::types::{job_key, parse_job_key, DocumentId, DocumentRecord, JobRecord, JobType};
use async_trait::async_trait;
use dashmap::DashMap;

/// Document store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    records: DashMap<DocumentId, DocumentRecord>,
}

impl InMemoryDocumentStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_all(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut all: Vec<DocumentRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.header.created_at.cmp(&b.header.created_at));
        Ok(all)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        self.records.insert(record.header.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }
}

/// Job store backed by a concurrent map keyed `<documentId>:<jobType>`
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, JobRecord>,
}

impl InMemoryJobStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, document: &DocumentId, job_type: JobType) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.get(&job_key(document, job_type)).map(|r| r.value().clone()))
    }

    async fn put(&self, document: &DocumentId, record: &JobRecord) -> Result<(), StoreError> {
        self.jobs.insert(job_key(document, record.job_type), record.clone());
        Ok(())
    }

    async fn clear(&self, document: &DocumentId, job_type: JobType) -> Result<(), StoreError> {
        self.jobs.remove(&job_key(document, job_type));
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(DocumentId, JobRecord)>, StoreError> {
        Ok(self
            .jobs
            .iter()
            .filter_map(|entry| {
                parse_job_key(entry.key()).map(|(document, _)| (document, entry.value().clone()))
            })
            .collect())
    }
}
