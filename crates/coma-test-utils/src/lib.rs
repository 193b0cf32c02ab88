//! Testing utilities for Coma workspace
//!
//! Shared fixtures, a scripted in-process backend and a fast clock.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use coma_core::lifecycle;
use coma_core::{
    ActiveJob, AnalysisRequest, Backend, BackendError, Clock, ComaConfig, DocumentId, DocumentRecord, DocumentStatus,
    DocumentType, DocumentWorkspace, InMemoryDocumentStore, InMemoryJobStore, JobId, JobOrchestrator, JobPoll,
    JobType, TaxonomyCheck, UploadRequest,
};
use coma_span::{Clause, ClauseKind, ContentBlock, Position};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub fn blocks(texts: &[&str]) -> Vec<ContentBlock> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| ContentBlock::new(format!("b{i}"), *text, "CONTENT"))
        .collect()
}

pub fn document(texts: &[&str], status: DocumentStatus, document_type: DocumentType) -> DocumentRecord {
    DocumentRecord::new("contract.pdf", document_type, Utc::now())
        .with_original_file("uploads/contract.pdf")
        .with_content(blocks(texts))
        .with_status(status)
}

pub fn clause(id: &str, kind: ClauseKind, start: (usize, usize), end: (usize, usize)) -> Clause {
    Clause::closed(id, kind, Position::new(start.0, start.1), Position::new(end.0, end.1))
}

/// Ingest job result with `(text, type)` blocks
pub fn ingest_result(items: &[(&str, &str)]) -> Value {
    let content: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(i, (text, kind))| json!({"id": format!("b{i}"), "text": text, "type": kind}))
        .collect();
    json!({"filename": "contract.pdf", "content": content})
}

pub fn processing(percent: u8) -> JobPoll {
    JobPoll::Processing {
        percent,
        message: None,
    }
}

/// Wall clock whose sleeps last one millisecond
///
/// `now()` advances by each requested sleep duration.
#[derive(Debug)]
pub struct InstantClock {
    now: Mutex<DateTime<Utc>>,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut now = self.now.lock();
            *now += ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::zero());
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// A recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload { filename: String, use_ai_tagger: bool },
    Status(JobId),
    Cancel(JobId),
    TaxonomyCheck,
    TaxonomyActive,
    GenerateTaxonomy(DocumentId),
    SaveTaxonomy(usize),
    CheckActive(DocumentId, JobType),
    AnalyzeReference(DocumentId),
    AnalyzeContract(DocumentId),
    FetchOutput(String),
    CleanupOutput(String),
}

/// Document change made while a backend call is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum Interleave {
    /// Pause the document inside the next status query
    PauseOnStatus(DocumentId),
    /// Overwrite the document's status inside the next upload
    StatusOnUpload(DocumentId, DocumentStatus),
}

#[derive(Debug, Clone)]
enum Reply {
    Poll(JobPoll),
    Transport(String),
}

#[derive(Debug, Default)]
struct Script {
    next_job: u64,
    replies: HashMap<JobId, VecDeque<Reply>>,
    active: HashMap<(DocumentId, JobType), JobId>,
    outputs: HashMap<String, Value>,
    taxonomy_exists: bool,
    active_taxonomy: Vec<Value>,
    saved_taxonomy: Option<Vec<Value>>,
    requests: Vec<AnalysisRequest>,
    fail_cancel: bool,
    calls: Vec<Call>,
    workspace: Option<Arc<DocumentWorkspace>>,
    interleaved: Vec<Interleave>,
}

/// In-process backend answering from a script
///
/// Created jobs are numbered `job-1`, `job-2`, ... so replies can be
/// scripted before submission. Status replies are consumed in order; the
/// last one repeats. Unscripted jobs report `processing` at 0%.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, job: &str, polls: impl IntoIterator<Item = JobPoll>) {
        let mut script = self.script.lock();
        let queue = script.replies.entry(JobId::from(job)).or_default();
        queue.extend(polls.into_iter().map(Reply::Poll));
    }

    pub fn script_transport_error(&self, job: &str, message: &str) {
        let mut script = self.script.lock();
        let queue = script.replies.entry(JobId::from(job)).or_default();
        queue.push_back(Reply::Transport(message.to_string()));
    }

    pub fn set_taxonomy_exists(&self, exists: bool) {
        self.script.lock().taxonomy_exists = exists;
    }

    pub fn set_active_taxonomy(&self, tags: Vec<Value>) {
        self.script.lock().active_taxonomy = tags;
    }

    pub fn set_active_job(&self, document: &DocumentId, job_type: JobType, job: &str) {
        self.script
            .lock()
            .active
            .insert((document.clone(), job_type), JobId::from(job));
    }

    pub fn set_output(&self, file: &str, payload: Value) {
        self.script.lock().outputs.insert(file.to_string(), payload);
    }

    pub fn fail_cancel(&self) {
        self.script.lock().fail_cancel = true;
    }

    /// Workspace that [`Interleave`] changes are committed to
    pub fn attach_workspace(&self, workspace: Arc<DocumentWorkspace>) {
        self.script.lock().workspace = Some(workspace);
    }

    pub fn interleave(&self, change: Interleave) {
        self.script.lock().interleaved.push(change);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn status_calls(&self, job: &str) -> usize {
        let job = JobId::from(job);
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Status(id) if *id == job))
            .count()
    }

    pub fn saved_taxonomy(&self) -> Option<Vec<Value>> {
        self.script.lock().saved_taxonomy.clone()
    }

    pub fn last_request(&self) -> Option<AnalysisRequest> {
        self.script.lock().requests.last().cloned()
    }

    fn record(&self, call: Call) {
        self.script.lock().calls.push(call);
    }

    fn take_interleaved(&self, wanted: fn(&Interleave) -> bool) -> Option<(Interleave, Arc<DocumentWorkspace>)> {
        let mut script = self.script.lock();
        let workspace = script.workspace.clone()?;
        let index = script.interleaved.iter().position(wanted)?;
        Some((script.interleaved.remove(index), workspace))
    }

    async fn run_interleaved(&self, wanted: fn(&Interleave) -> bool) {
        let Some((change, workspace)) = self.take_interleaved(wanted) else {
            return;
        };
        match change {
            Interleave::PauseOnStatus(id) => workspace
                .commit(&id, |r| Ok(lifecycle::pause(&mut r.header)?))
                .await
                .unwrap(),
            Interleave::StatusOnUpload(id, status) => workspace
                .commit(&id, move |r| {
                    r.header.status = status;
                    Ok(())
                })
                .await
                .unwrap(),
        }
    }

    fn create_job(&self, request: Option<AnalysisRequest>, call: Call) -> JobId {
        let mut script = self.script.lock();
        script.calls.push(call);
        if let Some(request) = request {
            script.requests.push(request);
        }
        script.next_job += 1;
        JobId(format!("job-{}", script.next_job))
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn upload(&self, request: UploadRequest) -> Result<JobId, BackendError> {
        self.run_interleaved(|c| matches!(c, Interleave::StatusOnUpload(..))).await;
        let call = Call::Upload {
            filename: request.filename,
            use_ai_tagger: request.use_ai_tagger,
        };
        Ok(self.create_job(None, call))
    }

    async fn status(&self, job_id: &JobId) -> Result<JobPoll, BackendError> {
        self.run_interleaved(|c| matches!(c, Interleave::PauseOnStatus(_))).await;
        let mut script = self.script.lock();
        script.calls.push(Call::Status(job_id.clone()));
        let reply = match script.replies.get_mut(job_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match reply {
            Some(Reply::Poll(poll)) => Ok(poll),
            Some(Reply::Transport(message)) => Err(BackendError::Transport(message)),
            None => Ok(processing(0)),
        }
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<(), BackendError> {
        self.record(Call::Cancel(job_id.clone()));
        if self.script.lock().fail_cancel {
            return Err(BackendError::Http {
                status: 500,
                body: "cancel failed".into(),
            });
        }
        Ok(())
    }

    async fn taxonomy_check(&self) -> Result<TaxonomyCheck, BackendError> {
        self.record(Call::TaxonomyCheck);
        let exists = self.script.lock().taxonomy_exists;
        Ok(TaxonomyCheck {
            exists,
            filename: exists.then(|| "taxonomy.json".to_string()),
        })
    }

    async fn taxonomy_active(&self) -> Result<Vec<Value>, BackendError> {
        self.record(Call::TaxonomyActive);
        Ok(self.script.lock().active_taxonomy.clone())
    }

    async fn generate_taxonomy(&self, request: AnalysisRequest) -> Result<JobId, BackendError> {
        let call = Call::GenerateTaxonomy(request.document_id.clone());
        Ok(self.create_job(Some(request), call))
    }

    async fn save_taxonomy(&self, tags: Vec<Value>) -> Result<(), BackendError> {
        let mut script = self.script.lock();
        script.calls.push(Call::SaveTaxonomy(tags.len()));
        script.saved_taxonomy = Some(tags);
        script.taxonomy_exists = true;
        Ok(())
    }

    async fn check_active(&self, document: &DocumentId, job_type: JobType) -> Result<ActiveJob, BackendError> {
        let mut script = self.script.lock();
        script.calls.push(Call::CheckActive(document.clone(), job_type));
        let job_id = script.active.get(&(document.clone(), job_type)).cloned();
        Ok(ActiveJob {
            found: job_id.is_some(),
            job_id,
            timestamp: None,
        })
    }

    async fn analyze_reference(&self, request: AnalysisRequest) -> Result<JobId, BackendError> {
        let call = Call::AnalyzeReference(request.document_id.clone());
        Ok(self.create_job(Some(request), call))
    }

    async fn analyze_contract(&self, request: AnalysisRequest) -> Result<JobId, BackendError> {
        let call = Call::AnalyzeContract(request.document_id.clone());
        Ok(self.create_job(Some(request), call))
    }

    async fn fetch_output(&self, file: &str) -> Result<Value, BackendError> {
        let mut script = self.script.lock();
        script.calls.push(Call::FetchOutput(file.to_string()));
        script
            .outputs
            .get(file)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(file.to_string()))
    }

    async fn cleanup_output(&self, file: &str) -> Result<(), BackendError> {
        self.record(Call::CleanupOutput(file.to_string()));
        Ok(())
    }
}

/// Orchestrator wired to in-memory stores, a scripted backend and a fast clock
pub struct TestHarness {
    pub orchestrator: JobOrchestrator,
    pub workspace: Arc<DocumentWorkspace>,
    pub jobs: Arc<InMemoryJobStore>,
    pub backend: Arc<ScriptedBackend>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_stores(Arc::new(InMemoryDocumentStore::new()), Arc::new(InMemoryJobStore::new()))
    }

    /// Fresh orchestrator over existing stores, as after a reload
    pub fn with_stores(documents: Arc<InMemoryDocumentStore>, jobs: Arc<InMemoryJobStore>) -> Self {
        let workspace = Arc::new(DocumentWorkspace::new(documents, Arc::new(InstantClock::new())));
        let backend = Arc::new(ScriptedBackend::new());
        backend.attach_workspace(workspace.clone());
        let config = ComaConfig::new().with_poll_interval(Duration::from_millis(10));
        let orchestrator = JobOrchestrator::new(workspace.clone(), jobs.clone(), backend.clone(), config);
        Self {
            orchestrator,
            workspace,
            jobs,
            backend,
        }
    }

    pub async fn insert(&self, record: DocumentRecord) -> DocumentId {
        self.workspace.insert(record).await.unwrap().header.id
    }

    pub async fn status(&self, id: &DocumentId) -> DocumentStatus {
        self.workspace.get(id).await.unwrap().status()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
