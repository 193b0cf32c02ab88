//! Coma HTTP client
//!
//! [`HttpBackend`] implements the [`Backend`] capability against the
//! analysis service's REST endpoints.
//!
//! # Example
//!
//! ```rust,ignore
//! use coma_client::HttpBackend;
//! use coma_core::ComaConfig;
//!
//! let backend = HttpBackend::new(&ComaConfig::load("coma.toml")?)?;
//! let check = backend.taxonomy_check().await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use async_trait::async_trait;
use coma_core::{
    ActiveJob, AnalysisRequest, Backend, BackendError, ComaConfig, DocumentId, JobCreated, JobId, JobPoll,
    JobStatusResponse, JobType, TaxonomyCheck, UploadRequest,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Analysis backend over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    Tags { tags: Vec<Value> },
    Taxonomy { taxonomy: Vec<Value> },
    Bare(Vec<Value>),
}

#[derive(Serialize)]
struct SaveTaxonomy {
    tags: Vec<Value>,
}

fn transport(e: reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Decode(e.to_string())
    } else {
        BackendError::Transport(e.to_string())
    }
}

impl HttpBackend {
    /// Create a client for the configured backend URL and request timeout
    ///
    /// # Errors
    /// `BackendError::Transport` if the HTTP client cannot be built
    pub fn new(config: &ComaConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(transport)?;
        Ok(Self::with_client(http_client, &config.backend_url))
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), "backend request failed");
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T, BackendError> {
        let response = self.execute(request, path).await?;
        let text = response.text().await.map_err(transport)?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.json(self.http_client.get(self.url(path)), path).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, BackendError> {
        self.json(self.http_client.post(self.url(path)).json(body), path).await
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.execute(self.http_client.delete(self.url(path)), path).await?;
        Ok(())
    }

    async fn create_job<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<JobId, BackendError> {
        let created: JobCreated = self.post_json(path, body).await?;
        tracing::debug!(path, job_id = %created.job_id, "backend job created");
        Ok(created.job_id)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, request: UploadRequest) -> Result<JobId, BackendError> {
        let form = Form::new()
            .part("file", Part::bytes(request.bytes).file_name(request.filename))
            .text("useAiTagger", request.use_ai_tagger.to_string())
            .text("documentType", request.document_type.as_str());

        let path = "upload";
        let created: JobCreated = self
            .json(self.http_client.post(self.url(path)).multipart(form), path)
            .await?;
        Ok(created.job_id)
    }

    async fn status(&self, job_id: &JobId) -> Result<JobPoll, BackendError> {
        match self.get::<JobStatusResponse>(&format!("status/{job_id}")).await {
            Ok(response) => Ok(response.into()),
            Err(BackendError::NotFound(_)) => Ok(JobPoll::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<(), BackendError> {
        self.delete(&format!("cancel_job/{job_id}")).await
    }

    async fn taxonomy_check(&self) -> Result<TaxonomyCheck, BackendError> {
        self.get("taxonomy/check").await
    }

    async fn taxonomy_active(&self) -> Result<Vec<Value>, BackendError> {
        let tags = match self.get::<TagList>("taxonomy/active").await? {
            TagList::Tags { tags } | TagList::Taxonomy { taxonomy: tags } | TagList::Bare(tags) => tags,
        };
        Ok(tags)
    }

    async fn generate_taxonomy(&self, request: AnalysisRequest) -> Result<JobId, BackendError> {
        self.create_job("taxonomy/generate", &request).await
    }

    async fn save_taxonomy(&self, tags: Vec<Value>) -> Result<(), BackendError> {
        let path = "taxonomy/save";
        let request = self.http_client.post(self.url(path)).json(&SaveTaxonomy { tags });
        self.execute(request, path).await?;
        Ok(())
    }

    async fn check_active(&self, document: &DocumentId, job_type: JobType) -> Result<ActiveJob, BackendError> {
        let path = "jobs/check_active";
        let request = self
            .http_client
            .get(self.url(path))
            .query(&[("file_id", document.as_str()), ("process_type", job_type.as_str())]);
        self.json(request, path).await
    }

    async fn analyze_reference(&self, request: AnalysisRequest) -> Result<JobId, BackendError> {
        self.create_job("analyze_hipdam_document", &request).await
    }

    async fn analyze_contract(&self, request: AnalysisRequest) -> Result<JobId, BackendError> {
        self.create_job("analyze_contract_document", &request).await
    }

    async fn fetch_output(&self, file: &str) -> Result<Value, BackendError> {
        self.get(&format!("output/{file}")).await
    }

    async fn cleanup_output(&self, file: &str) -> Result<(), BackendError> {
        self.delete(&format!("cleanup_output/{file}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response; returns the base URL and the raw request
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}/"), handle)
    }

    fn backend(base_url: &str) -> HttpBackend {
        let config = ComaConfig::new().with_backend_url(base_url);
        HttpBackend::new(&config).unwrap()
    }

    #[test]
    fn urls_join_cleanly() {
        let b = HttpBackend::with_client(reqwest::Client::new(), "http://localhost:8000/");
        assert_eq!(b.base_url(), "http://localhost:8000");
        assert_eq!(b.url("/status/j1"), "http://localhost:8000/status/j1");
    }

    #[tokio::test]
    async fn status_processing() {
        let (url, server) = serve_once("200 OK", r#"{"status":"processing","progress":42.4,"message":"tagging"}"#).await;
        let poll = backend(&url).status(&JobId::from("j1")).await.unwrap();

        assert_eq!(
            poll,
            JobPoll::Processing {
                percent: 42,
                message: Some("tagging".into())
            }
        );
        assert!(server.await.unwrap().starts_with("GET /status/j1 "));
    }

    #[tokio::test]
    async fn status_404_is_lost_job() {
        let (url, _server) = serve_once("404 Not Found", r#"{"detail":"unknown job"}"#).await;
        let poll = backend(&url).status(&JobId::from("gone")).await.unwrap();
        assert_eq!(poll, JobPoll::NotFound);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (url, _server) = serve_once("503 Service Unavailable", "busy").await;
        let err = backend(&url).taxonomy_check().await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(err, BackendError::Http { status: 503, ref body } if body == "busy"));
    }

    #[tokio::test]
    async fn check_active_query() {
        let (url, server) = serve_once("200 OK", r#"{"found":true,"job_id":"j9","timestamp":"2025-01-01T10:00:00"}"#).await;
        let active = backend(&url)
            .check_active(&DocumentId::from("doc1"), JobType::Analyze)
            .await
            .unwrap();

        assert_eq!(active.running(), Some(JobId::from("j9")));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /jobs/check_active?file_id=doc1&process_type=analyze "));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let (url, _server) = serve_once("200 OK", "not json").await;
        let err = backend(&url).taxonomy_active().await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ComaConfig::new().with_backend_url(format!("http://{addr}"));
        let client = HttpBackend::new(&config).unwrap();
        let err = tokio::time::timeout(Duration::from_secs(10), client.taxonomy_check())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
