//! Backend capability
//!
//! Everything the orchestrator needs from the analysis backend, one method
//! per endpoint. `coma-client` implements it over HTTP; tests script it.

use crate::error::BackendError;
use crate::types::{DocumentId, DocumentType, JobId, JobType};
use async_trait::async_trait;
use coma_stitch::ExportSegment;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Multipart upload for an ingest job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File name sent with the file part
    pub filename: String,
    /// File bytes
    pub bytes: Vec<u8>,
    /// Document type
    pub document_type: DocumentType,
    /// Run the backend AI tagger
    pub use_ai_tagger: bool,
}

/// Payload of analysis and taxonomy-generation jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Document id
    pub document_id: DocumentId,
    /// Original file name
    pub filename: String,
    /// Document type
    pub document_type: DocumentType,
    /// Stitched export segments
    pub segments: Vec<ExportSegment>,
    /// Active taxonomy tag records (empty for taxonomy generation)
    #[serde(default)]
    pub taxonomy: Vec<Value>,
}

/// Response of job-creating endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    /// Created job
    pub job_id: JobId,
}

/// `GET /taxonomy/check`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxonomyCheck {
    /// Whether an active taxonomy exists
    pub exists: bool,
    /// File holding it
    #[serde(default)]
    pub filename: Option<String>,
}

/// `GET /jobs/check_active`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActiveJob {
    /// Whether a running job was found
    pub found: bool,
    /// Its id
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// When it started (backend format)
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ActiveJob {
    /// The running job, if one was found
    #[inline]
    #[must_use]
    pub fn running(self) -> Option<JobId> {
        if self.found {
            self.job_id
        } else {
            None
        }
    }
}

/// Status string of `GET /status/{job_id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Still running
    Processing,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
}

/// Body of `GET /status/{job_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job state
    pub status: JobState,
    /// Percent complete
    #[serde(default)]
    pub progress: Option<f64>,
    /// Status message
    #[serde(default)]
    pub message: Option<String>,
    /// Result payload (completed)
    #[serde(default)]
    pub result: Option<Value>,
    /// Error message (failed)
    #[serde(default)]
    pub error: Option<String>,
}

/// One observation of a job's status
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// Still running
    Processing {
        /// Percent complete (0..=100)
        percent: u8,
        /// Status message
        message: Option<String>,
    },
    /// Finished; result to merge
    Completed(Value),
    /// Finished with an error
    Failed(String),
    /// Backend does not know the job (lost)
    NotFound,
}

impl From<JobStatusResponse> for JobPoll {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(response: JobStatusResponse) -> Self {
        match response.status {
            JobState::Processing => Self::Processing {
                percent: response.progress.unwrap_or(0.0).clamp(0.0, 100.0).round() as u8,
                message: response.message,
            },
            JobState::Completed => Self::Completed(response.result.unwrap_or(Value::Null)),
            JobState::Failed => Self::Failed(
                response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "job failed".to_string()),
            ),
        }
    }
}

/// Analysis backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /upload`: start an ingest job
    async fn upload(&self, request: UploadRequest) -> Result<JobId, BackendError>;

    /// `GET /status/{job_id}`; a 404 yields [`JobPoll::NotFound`]
    async fn status(&self, job_id: &JobId) -> Result<JobPoll, BackendError>;

    /// `DELETE /cancel_job/{job_id}`
    async fn cancel_job(&self, job_id: &JobId) -> Result<(), BackendError>;

    /// `GET /taxonomy/check`
    async fn taxonomy_check(&self) -> Result<TaxonomyCheck, BackendError>;

    /// `GET /taxonomy/active`
    async fn taxonomy_active(&self) -> Result<Vec<Value>, BackendError>;

    /// `POST /taxonomy/generate`: start a taxonomy job
    async fn generate_taxonomy(&self, request: AnalysisRequest) -> Result<JobId, BackendError>;

    /// `POST /taxonomy/save`
    async fn save_taxonomy(&self, tags: Vec<Value>) -> Result<(), BackendError>;

    /// `GET /jobs/check_active`
    async fn check_active(&self, document: &DocumentId, job_type: JobType) -> Result<ActiveJob, BackendError>;

    /// `POST /analyze_hipdam_document`: reference-document analysis
    async fn analyze_reference(&self, request: AnalysisRequest) -> Result<JobId, BackendError>;

    /// `POST /analyze_contract_document`: contract analysis
    async fn analyze_contract(&self, request: AnalysisRequest) -> Result<JobId, BackendError>;

    /// `GET /output/{file}`
    async fn fetch_output(&self, file: &str) -> Result<Value, BackendError>;

    /// `DELETE /cleanup_output/{file}`
    async fn cleanup_output(&self, file: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(body: Value) -> JobPoll {
        serde_json::from_value::<JobStatusResponse>(body).unwrap().into()
    }

    #[test]
    fn status_bodies() {
        assert_eq!(
            parse(json!({"status": "processing", "progress": 42, "message": "tagging"})),
            JobPoll::Processing {
                percent: 42,
                message: Some("tagging".into())
            }
        );
        assert_eq!(
            parse(json!({"status": "processing", "progress": 130.2})),
            JobPoll::Processing {
                percent: 100,
                message: None
            }
        );
        assert_eq!(
            parse(json!({"status": "completed", "result": {"content": []}})),
            JobPoll::Completed(json!({"content": []}))
        );
        assert_eq!(
            parse(json!({"status": "failed", "error": "model timeout"})),
            JobPoll::Failed("model timeout".into())
        );
    }

    #[test]
    fn active_job() {
        let found: ActiveJob = serde_json::from_value(json!({"found": true, "job_id": "j9"})).unwrap();
        assert_eq!(found.running(), Some(JobId::from("j9")));
        let none: ActiveJob = serde_json::from_value(json!({"found": false})).unwrap();
        assert_eq!(none.running(), None);
    }
}
