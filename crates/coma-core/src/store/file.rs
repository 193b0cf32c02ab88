//! JSON file stores
//!
//! Documents live one per file (`<dir>/<id>.json`); jobs share one JSON map
//! file. Writes go to a temporary sibling first and are renamed into place.
//! File names keep only ASCII alphanumerics, `-` and `_` of the id.

use super::{DocumentStore, JobStore};
use crate::error::StoreError;
use crate::types::{job_key, parse_job_key, DocumentId, DocumentRecord, JobRecord, JobType};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Document store writing one JSON file per document
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Create store rooted at `dir` (created on first write)
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &DocumentId) -> PathBuf {
        let stem: String = id
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .collect();
        if stem.is_empty() {
            self.dir.join("_.json")
        } else {
            self.dir.join(format!("{stem}.json"))
        }
    }

    fn parse(path: &Path, bytes: &[u8]) -> Result<DocumentRecord, StoreError> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    async fn read(path: PathBuf) -> Result<DocumentRecord, StoreError> {
        let bytes = tokio::fs::read(&path).await?;
        Self::parse(&path, &bytes)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get_all(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }

        let mut all = try_join_all(paths.into_iter().map(Self::read)).await?;
        all.sort_by(|a, b| a.header.created_at.cmp(&b.header.created_at));
        Ok(all)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Self::parse(&path, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.path_for(&record.header.id), &bytes).await
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Job store persisting every job in a single JSON map
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileJobStore {
    /// Create store backed by the file at `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, JobRecord>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, jobs: &BTreeMap<String, JobRecord>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(jobs)?;
        write_atomic(&self.path, &bytes).await
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn get(&self, document: &DocumentId, job_type: JobType) -> Result<Option<JobRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&job_key(document, job_type)))
    }

    async fn put(&self, document: &DocumentId, record: &JobRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs = self.load().await?;
        jobs.insert(job_key(document, record.job_type), record.clone());
        self.save(&jobs).await
    }

    async fn clear(&self, document: &DocumentId, job_type: JobType) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs = self.load().await?;
        if jobs.remove(&job_key(document, job_type)).is_some() {
            self.save(&jobs).await?;
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(DocumentId, JobRecord)>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter_map(|(key, record)| parse_job_key(&key).map(|(document, _)| (document, record)))
            .collect())
    }
}
