//! Job orchestrator
//!
//! Creates backend jobs, persists their ids, polls them and merges their
//! results back into documents through the workspace.
//!
//! # Core Concepts
//!
//! - One poll task per `(document, job type)`; starting a new one aborts the old
//! - Job ids are persisted before the document enters a processing status,
//!   so no document is ever `ingesting`/`analyzing` without one
//! - While a document is paused its poll task keeps ticking but skips status queries
//! - Transport errors are logged and retried on the next tick; only terminal
//!   responses (`completed`, `failed`, not found) stop polling
//! - Outcomes are broadcast as [`JobEvent`]s
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = JobOrchestrator::new(workspace, jobs, backend, config);
//! let report = orchestrator.resume_all().await?;
//! let mut events = orchestrator.subscribe();
//! orchestrator.submit_analysis(&id).await?;
//! let outcome = wait_terminal(&mut events, &id, JobType::Analyze).await;
//! ```

use crate::backend::{AnalysisRequest, Backend, JobPoll, UploadRequest};
use crate::cache::TaxonomyCache;
use crate::clock::Clock;
use crate::config::ComaConfig;
use crate::error::{ComaError, LifecycleError};
use crate::events::JobEvent;
use crate::lifecycle;
use crate::results::{self, ReferenceAnalysis};
use crate::store::JobStore;
use crate::types::{job_key, DocumentId, DocumentRecord, DocumentStatus, JobId, JobRecord, JobType, Progress};
use crate::workspace::DocumentWorkspace;
use coma_span::{BoundaryClassifier, KindClassifier};
use coma_stitch::ExportSegment;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Result of a single poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep polling
    Continue,
    /// Polling for this job is over
    Finished,
}

/// What [`JobOrchestrator::resume_all`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeReport {
    /// Jobs whose polling was resumed
    pub resumed: Vec<(DocumentId, JobType)>,
    /// Documents reset to their stable status for lack of a job id
    pub reset: Vec<DocumentId>,
}

struct PollHandle {
    generation: u64,
    task: JoinHandle<()>,
}

struct Inner {
    workspace: Arc<DocumentWorkspace>,
    jobs: Arc<dyn JobStore>,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    classifier: RwLock<Arc<dyn BoundaryClassifier>>,
    config: ComaConfig,
    pollers: DashMap<String, PollHandle>,
    next_generation: AtomicU64,
    events: broadcast::Sender<JobEvent>,
    taxonomy: TaxonomyCache,
}

/// Orchestrates backend jobs for documents
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("active_polls", &self.inner.pollers.len())
            .field("poll_interval", &self.inner.config.poll_interval())
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    /// Create orchestrator
    ///
    /// Ingest results are bootstrapped with [`KindClassifier`] until
    /// [`set_classifier`](Self::set_classifier) is called.
    #[must_use]
    pub fn new(
        workspace: Arc<DocumentWorkspace>,
        jobs: Arc<dyn JobStore>,
        backend: Arc<dyn Backend>,
        config: ComaConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let clock = Arc::clone(workspace.clock());
        Self {
            inner: Arc::new(Inner {
                workspace,
                jobs,
                backend,
                clock,
                classifier: RwLock::new(Arc::new(KindClassifier)),
                taxonomy: TaxonomyCache::with_ttl(config.taxonomy_cache_ttl()),
                config,
                pollers: DashMap::new(),
                next_generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Replace the classifier used to bootstrap clauses from ingest results
    pub fn set_classifier(&self, classifier: Arc<dyn BoundaryClassifier>) {
        *self.inner.classifier.write() = classifier;
    }

    /// The document workspace
    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &Arc<DocumentWorkspace> {
        &self.inner.workspace
    }

    /// Subscribe to job events
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a poll task is running for this job
    #[must_use]
    pub fn is_polling(&self, document: &DocumentId, job_type: JobType) -> bool {
        self.inner.is_polling(document, job_type)
    }

    /// Upload the original file and start an ingest job
    ///
    /// `use_ai_tagger` falls back to the configured default.
    ///
    /// # Errors
    /// - Lifecycle `Paused` while the document is paused
    /// - Lifecycle `IllegalTransition` unless the document is uploaded
    /// - Lifecycle `MissingOriginalFile`
    /// - Backend errors from the upload
    pub async fn submit_ingest(
        &self,
        document: &DocumentId,
        bytes: Vec<u8>,
        use_ai_tagger: Option<bool>,
    ) -> Result<JobId, ComaError> {
        let record = self.inner.workspace.get(document).await?;
        lifecycle::ensure_not_paused(&record.header)?;
        lifecycle::validate_transition(&record.header, DocumentStatus::Ingesting)?;
        lifecycle::guard_ingest(&record.header)?;

        let request = UploadRequest {
            filename: record.header.filename.clone(),
            bytes,
            document_type: record.header.document_type,
            use_ai_tagger: use_ai_tagger.unwrap_or(self.inner.config.use_ai_tagger),
        };
        let job_id = self.inner.backend.upload(request).await?;
        self.inner.start_job(document, JobType::Ingest, job_id).await
    }

    /// Start (or attach to) an analysis job
    ///
    /// Needs an active global taxonomy. Reference documents go to the
    /// reference analyzer, contracts to the contract analyzer.
    ///
    /// # Errors
    /// - Lifecycle `Paused` while the document is paused
    /// - Lifecycle `IllegalTransition` unless the document is annotated or analyzed
    /// - Lifecycle `NoActiveTaxonomy`
    /// - `INCOMPATIBLE_KIND` when a clause kind does not fit the document type
    /// - Backend errors
    pub async fn submit_analysis(&self, document: &DocumentId) -> Result<JobId, ComaError> {
        let record = self.inner.workspace.get(document).await?;
        lifecycle::ensure_not_paused(&record.header)?;
        lifecycle::validate_transition(&record.header, DocumentStatus::Analyzing)?;

        let check = self.inner.taxonomy.get_or_fetch(self.inner.backend.as_ref()).await?;
        if !check.exists {
            return Err(LifecycleError::NoActiveTaxonomy.into());
        }

        if let Some(job_id) = self.inner.attachable(document, JobType::Analyze).await? {
            return self.inner.start_job(document, JobType::Analyze, job_id).await;
        }

        coma_stitch::validate_kinds(&record.clauses, record.header.document_type.allowed_clause_kinds())?;
        let taxonomy = self.inner.backend.taxonomy_active().await?;
        let request = analysis_request(&record, taxonomy);

        let job_id = if record.header.document_type.is_reference() {
            self.inner.backend.analyze_reference(request).await?
        } else {
            self.inner.backend.analyze_contract(request).await?
        };
        self.inner.start_job(document, JobType::Analyze, job_id).await
    }

    /// Start (or attach to) a taxonomy generation job
    ///
    /// The document status is not changed.
    ///
    /// # Errors
    /// - Lifecycle `Paused` while the document is paused
    /// - Backend errors
    pub async fn submit_taxonomy(&self, document: &DocumentId) -> Result<JobId, ComaError> {
        let record = self.inner.workspace.get(document).await?;
        lifecycle::ensure_not_paused(&record.header)?;

        if let Some(job_id) = self.inner.attachable(document, JobType::Taxonomy).await? {
            return self.inner.start_job(document, JobType::Taxonomy, job_id).await;
        }

        let request = analysis_request(&record, Vec::new());
        let job_id = self.inner.backend.generate_taxonomy(request).await?;
        self.inner.start_job(document, JobType::Taxonomy, job_id).await
    }

    /// Post the document's generated taxonomy as the active one
    ///
    /// Returns the number of saved tag records.
    ///
    /// # Errors
    /// - `ComaError::MissingTaxonomy` if no taxonomy job has completed
    /// - Backend errors
    pub async fn save_taxonomy(&self, document: &DocumentId) -> Result<usize, ComaError> {
        let record = self.inner.workspace.get(document).await?;
        let tags = record
            .derived
            .taxonomy
            .ok_or_else(|| ComaError::MissingTaxonomy(document.clone()))?;
        let count = tags.len();

        self.inner.backend.save_taxonomy(tags).await?;
        self.inner.taxonomy.invalidate().await;
        tracing::info!(document_id = %document, tags = count, "taxonomy saved");
        Ok(count)
    }

    /// Run one poll tick for a job
    ///
    /// # Errors
    /// Store errors, or transient errors while merging a completed result
    pub async fn poll_once(&self, document: &DocumentId, job_type: JobType) -> Result<PollOutcome, ComaError> {
        self.inner.poll_once(document, job_type).await
    }

    /// Reconcile persisted jobs with document statuses after a reload
    ///
    /// Processing (or paused) documents with an unfinished persisted job
    /// resume polling; those without one fall back to their stable status.
    /// Unfinished taxonomy jobs resume as well.
    ///
    /// # Errors
    /// Store errors
    pub async fn resume_all(&self) -> Result<ResumeReport, ComaError> {
        let mut report = ResumeReport::default();

        for record in self.inner.workspace.list().await? {
            let document = record.header.id.clone();
            let Some(job_type) = lifecycle::effective_status(&record.header).job_type() else {
                if record.status() == DocumentStatus::Paused {
                    tracing::warn!(document_id = %document, "paused document without a remembered status");
                }
                continue;
            };

            match self.inner.jobs.get(&document, job_type).await? {
                Some(job) if !job.is_finished() => {
                    tracing::info!(
                        document_id = %document,
                        job_type = %job_type,
                        job_id = %job.job_id,
                        "resuming job polling"
                    );
                    self.inner.spawn_poll(document.clone(), job_type);
                    report.resumed.push((document, job_type));
                }
                _ => {
                    let status = self
                        .inner
                        .workspace
                        .commit(&document, |r| {
                            r.progress = None;
                            Ok(lifecycle::revert(&mut r.header))
                        })
                        .await?;
                    tracing::warn!(
                        document_id = %document,
                        job_type = %job_type,
                        %status,
                        "no persisted job; document reset"
                    );
                    report.reset.push(document);
                }
            }
        }

        for (document, job) in self.inner.jobs.all().await? {
            if job.job_type == JobType::Taxonomy && !job.is_finished() {
                tracing::info!(document_id = %document, job_id = %job.job_id, "resuming taxonomy job");
                self.inner.spawn_poll(document.clone(), JobType::Taxonomy);
                report.resumed.push((document, JobType::Taxonomy));
            }
        }

        Ok(report)
    }

    /// Pause a processing document
    ///
    /// Local only: the backend job keeps running; status queries are
    /// skipped until [`unpause`](Self::unpause).
    ///
    /// # Errors
    /// Lifecycle `NotPausable`
    pub async fn pause(&self, document: &DocumentId) -> Result<(), ComaError> {
        self.inner
            .workspace
            .commit(document, |r| Ok(lifecycle::pause(&mut r.header)?))
            .await?;
        tracing::info!(document_id = %document, "document paused");
        Ok(())
    }

    /// Return a paused document to its processing status
    ///
    /// Restarts polling if no poll task is alive for the job.
    ///
    /// # Errors
    /// Lifecycle `NotPaused`
    pub async fn unpause(&self, document: &DocumentId) -> Result<(), ComaError> {
        let status = self
            .inner
            .workspace
            .commit(document, |r| {
                lifecycle::unpause(&mut r.header)?;
                Ok(r.header.status)
            })
            .await?;
        tracing::info!(document_id = %document, %status, "document unpaused");

        if let Some(job_type) = status.job_type() {
            if !self.inner.is_polling(document, job_type) && self.inner.jobs.get(document, job_type).await?.is_some() {
                self.inner.spawn_poll(document.clone(), job_type);
            }
        }
        Ok(())
    }

    /// Cancel a job
    ///
    /// Stops polling, asks the backend to cancel (a failure there is only
    /// logged), forgets the job id and reverts the document.
    ///
    /// # Errors
    /// `ComaError::JobNotFound` if there is neither a persisted job nor a
    /// processing status for this job type
    pub async fn cancel(&self, document: &DocumentId, job_type: JobType) -> Result<(), ComaError> {
        if let Some((_, handle)) = self.inner.pollers.remove(&job_key(document, job_type)) {
            handle.task.abort();
        }

        let job = self.inner.jobs.get(document, job_type).await?;
        let processing = job_type.processing_status();
        let record = self.inner.workspace.get(document).await?;
        let in_processing = processing.is_some_and(|s| lifecycle::effective_status(&record.header) == s);

        if job.is_none() && !in_processing {
            return Err(ComaError::JobNotFound {
                document: document.clone(),
                job_type,
            });
        }

        if let Some(job) = &job {
            if let Err(e) = self.inner.backend.cancel_job(&job.job_id).await {
                tracing::warn!(
                    document_id = %document,
                    job_id = %job.job_id,
                    error = %e,
                    "backend cancellation failed"
                );
            }
        }
        self.inner.jobs.clear(document, job_type).await?;

        if in_processing {
            self.inner
                .workspace
                .commit(document, |r| {
                    lifecycle::revert(&mut r.header);
                    r.progress = None;
                    Ok(())
                })
                .await?;
        }

        tracing::info!(document_id = %document, job_type = %job_type, "job cancelled");
        self.inner.emit(JobEvent::Cancelled {
            document: document.clone(),
            job_type,
        });
        Ok(())
    }

    /// Abort every poll task
    pub fn shutdown(&self) {
        self.inner.pollers.retain(|_, handle| {
            handle.task.abort();
            false
        });
    }
}

fn analysis_request(record: &DocumentRecord, taxonomy: Vec<Value>) -> AnalysisRequest {
    let segments = coma_stitch::stitch(&record.content, &record.clauses)
        .iter()
        .map(ExportSegment::from)
        .collect();
    AnalysisRequest {
        document_id: record.header.id.clone(),
        filename: record.header.filename.clone(),
        document_type: record.header.document_type,
        segments,
        taxonomy,
    }
}

impl Inner {
    fn emit(&self, event: JobEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn is_polling(&self, document: &DocumentId, job_type: JobType) -> bool {
        self.pollers
            .get(&job_key(document, job_type))
            .is_some_and(|handle| !handle.task.is_finished())
    }

    async fn attachable(&self, document: &DocumentId, job_type: JobType) -> Result<Option<JobId>, ComaError> {
        let running = self.backend.check_active(document, job_type).await?.running();
        if let Some(job_id) = &running {
            tracing::info!(
                document_id = %document,
                job_type = %job_type,
                job_id = %job_id,
                "attaching to running backend job"
            );
        }
        Ok(running)
    }

    /// Persist the job, enter the processing status, start polling
    ///
    /// If the status can no longer be entered the backend job is cancelled
    /// and forgotten.
    async fn start_job(self: &Arc<Self>, document: &DocumentId, job_type: JobType, job_id: JobId) -> Result<JobId, ComaError> {
        let record = JobRecord::new(job_id.clone(), job_type, self.clock.now());
        self.jobs.put(document, &record).await?;

        if let Some(status) = job_type.processing_status() {
            let entered = self
                .workspace
                .commit(document, |r| {
                    lifecycle::ensure_not_paused(&r.header)?;
                    lifecycle::advance(&mut r.header, status)?;
                    r.progress = Some(Progress::default());
                    r.derived.last_error = None;
                    Ok(())
                })
                .await;
            if let Err(e) = entered {
                tracing::warn!(
                    document_id = %document,
                    job_type = %job_type,
                    job_id = %job_id,
                    error = %e,
                    "document changed during submission; cancelling backend job"
                );
                if let Err(cancel) = self.backend.cancel_job(&job_id).await {
                    tracing::warn!(
                        document_id = %document,
                        job_id = %job_id,
                        error = %cancel,
                        "backend cancellation failed"
                    );
                }
                self.jobs.clear(document, job_type).await?;
                return Err(e);
            }
        }

        tracing::info!(
            document_id = %document,
            job_type = %job_type,
            job_id = %job_id,
            "job submitted"
        );
        self.emit(JobEvent::Submitted {
            document: document.clone(),
            job_type,
            job_id: job_id.clone(),
        });
        self.spawn_poll(document.clone(), job_type);
        Ok(job_id)
    }

    fn spawn_poll(self: &Arc<Self>, document: DocumentId, job_type: JobType) {
        let key = job_key(&document, job_type);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(self);
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            loop {
                inner.clock.sleep(inner.config.poll_interval()).await;
                match inner.poll_once(&document, job_type).await {
                    Ok(PollOutcome::Continue) => {}
                    Ok(PollOutcome::Finished) => break,
                    Err(e) if e.is_transient() => {
                        tracing::warn!(
                            document_id = %document,
                            job_type = %job_type,
                            error = %e,
                            "poll tick failed; retrying"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            document_id = %document,
                            job_type = %job_type,
                            error = %e,
                            "polling stopped"
                        );
                        break;
                    }
                }
            }
            inner.pollers.remove_if(&task_key, |_, handle| handle.generation == generation);
        });

        if let Some(previous) = self.pollers.insert(key, PollHandle { generation, task }) {
            previous.task.abort();
        }
    }

    async fn poll_once(&self, document: &DocumentId, job_type: JobType) -> Result<PollOutcome, ComaError> {
        let Some(job) = self.jobs.get(document, job_type).await? else {
            return Ok(PollOutcome::Finished);
        };
        if job.is_finished() {
            return Ok(PollOutcome::Finished);
        }

        let record = match self.workspace.get(document).await {
            Ok(record) => record,
            Err(ComaError::DocumentNotFound(_)) => {
                tracing::warn!(document_id = %document, job_type = %job_type, "document gone; polling stopped");
                return Ok(PollOutcome::Finished);
            }
            Err(e) => return Err(e),
        };

        if let Some(processing) = job_type.processing_status() {
            if lifecycle::effective_status(&record.header) != processing {
                tracing::debug!(
                    document_id = %document,
                    job_type = %job_type,
                    status = %record.header.status,
                    "document left the processing status; polling stopped"
                );
                return Ok(PollOutcome::Finished);
            }
            if record.status() == DocumentStatus::Paused {
                tracing::trace!(document_id = %document, "paused; status query skipped");
                return Ok(PollOutcome::Continue);
            }
        }

        let poll = match self.backend.status(&job.job_id).await {
            Ok(poll) => poll,
            Err(e) => {
                tracing::warn!(
                    document_id = %document,
                    job_id = %job.job_id,
                    error = %e,
                    "status query failed; retrying next tick"
                );
                return Ok(PollOutcome::Continue);
            }
        };

        match poll {
            JobPoll::Processing { percent, message } => {
                let progress = Progress { percent, message };
                if job_type.processing_status().is_some() {
                    let update = progress.clone();
                    self.workspace
                        .commit(document, move |r| {
                            r.progress = Some(update);
                            Ok(())
                        })
                        .await?;
                }
                tracing::debug!(document_id = %document, job_type = %job_type, percent, "job progress");
                self.emit(JobEvent::Progress {
                    document: document.clone(),
                    job_type,
                    progress,
                });
                Ok(PollOutcome::Continue)
            }
            JobPoll::Completed(result) => self.complete(document, &job, result).await,
            JobPoll::Failed(message) => {
                self.fail(document, &job, message).await?;
                Ok(PollOutcome::Finished)
            }
            JobPoll::NotFound => {
                self.lose(document, job_type).await?;
                Ok(PollOutcome::Finished)
            }
        }
    }

    async fn complete(&self, document: &DocumentId, job: &JobRecord, result: Value) -> Result<PollOutcome, ComaError> {
        let applied = match job.job_type {
            JobType::Ingest => self.complete_ingest(document, result).await,
            JobType::Analyze => self.complete_analysis(document, result).await,
            JobType::Taxonomy => self.complete_taxonomy(document, result).await,
        };

        match applied {
            Ok(()) => {}
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                self.fail(document, job, e.to_string()).await?;
                return Ok(PollOutcome::Finished);
            }
        }

        self.mark_finished(document, job).await?;
        self.emit(JobEvent::Completed {
            document: document.clone(),
            job_type: job.job_type,
        });
        Ok(PollOutcome::Finished)
    }

    async fn complete_ingest(&self, document: &DocumentId, result: Value) -> Result<(), ComaError> {
        let classifier = Arc::clone(&*self.classifier.read());
        let clauses = self
            .workspace
            .commit(document, move |r| results::apply_ingest(r, result, classifier.as_ref()))
            .await?;
        tracing::info!(document_id = %document, clauses, "ingest result merged");
        Ok(())
    }

    async fn complete_taxonomy(&self, document: &DocumentId, result: Value) -> Result<(), ComaError> {
        let tags = self
            .workspace
            .commit(document, move |r| results::apply_taxonomy(r, result))
            .await?;
        tracing::info!(document_id = %document, tags, "taxonomy result stored");
        Ok(())
    }

    async fn complete_analysis(&self, document: &DocumentId, result: Value) -> Result<(), ComaError> {
        let record = self.workspace.get(document).await?;

        if !record.header.document_type.is_reference() {
            self.workspace
                .commit(document, move |r| results::apply_contract_analysis(r, result))
                .await?;
            tracing::info!(document_id = %document, "contract analysis merged");
            return Ok(());
        }

        let mut analysis = ReferenceAnalysis::parse(result)?;
        let files = analysis.pending_files();
        for file in &files {
            let payload = self.backend.fetch_output(file).await?;
            analysis.resolve(file, payload);
        }

        self.workspace
            .commit(document, move |r| results::apply_reference_analysis(r, analysis))
            .await?;

        for file in &files {
            if let Err(e) = self.backend.cleanup_output(file).await {
                tracing::warn!(document_id = %document, file = %file, error = %e, "output cleanup failed");
            }
        }
        tracing::info!(document_id = %document, fetched = files.len(), "reference analysis merged");
        Ok(())
    }

    async fn fail(&self, document: &DocumentId, job: &JobRecord, message: String) -> Result<(), ComaError> {
        let job_type = job.job_type;
        let stored = message.clone();
        self.workspace
            .commit(document, move |r| {
                if job_type.processing_status().is_some() {
                    lifecycle::revert(&mut r.header);
                }
                r.progress = None;
                r.derived.last_error = Some(stored);
                Ok(())
            })
            .await?;
        self.mark_finished(document, job).await?;

        tracing::error!(
            document_id = %document,
            job_type = %job_type,
            job_id = %job.job_id,
            error = %message,
            "job failed"
        );
        self.emit(JobEvent::Failed {
            document: document.clone(),
            job_type,
            message,
        });
        Ok(())
    }

    async fn lose(&self, document: &DocumentId, job_type: JobType) -> Result<(), ComaError> {
        if job_type.processing_status().is_some() {
            self.workspace
                .commit(document, |r| {
                    lifecycle::revert(&mut r.header);
                    r.progress = None;
                    Ok(())
                })
                .await?;
        }
        self.jobs.clear(document, job_type).await?;

        tracing::info!(document_id = %document, job_type = %job_type, "job lost; document reverted");
        self.emit(JobEvent::Lost {
            document: document.clone(),
            job_type,
        });
        Ok(())
    }

    async fn mark_finished(&self, document: &DocumentId, job: &JobRecord) -> Result<(), ComaError> {
        let mut finished = job.clone();
        finished.finished_at = Some(self.clock.now());
        self.jobs.put(document, &finished).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ActiveJob, MockBackend, TaxonomyCheck};
    use crate::clock::SystemClock;
    use crate::store::{InMemoryDocumentStore, InMemoryJobStore};
    use crate::types::DocumentType;
    use chrono::Utc;
    use coma_span::{Clause, ClauseKind, ContentBlock, Position};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        orchestrator: JobOrchestrator,
        jobs: Arc<InMemoryJobStore>,
    }

    fn harness(backend: MockBackend) -> Harness {
        let workspace = Arc::new(DocumentWorkspace::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(SystemClock),
        ));
        let jobs = Arc::new(InMemoryJobStore::new());
        // long interval: spawned poll tasks never tick during a test
        let config = ComaConfig::new().with_poll_interval(Duration::from_secs(3600));
        let orchestrator = JobOrchestrator::new(workspace, jobs.clone(), Arc::new(backend), config);
        Harness { orchestrator, jobs }
    }

    async fn annotated(h: &Harness, document_type: DocumentType, kind: ClauseKind) -> DocumentId {
        let content = vec![
            ContentBlock::new("s1", "Payment terms apply.", kind.as_str()),
            ContentBlock::new("gap-0", "Signed in Berlin.", "SKIP"),
        ];
        let mut record = DocumentRecord::new("a.pdf", document_type, Utc::now())
            .with_content(content)
            .with_status(DocumentStatus::Annotated);
        record.clauses = vec![Clause::closed("s1", kind, Position::new(0, 0), Position::new(0, 20))];
        h.orchestrator.workspace().insert(record).await.unwrap().header.id
    }

    fn taxonomy_exists(backend: &mut MockBackend) {
        backend.expect_taxonomy_check().returning(|| {
            Ok(TaxonomyCheck {
                exists: true,
                filename: Some("tax.json".into()),
            })
        });
    }

    #[tokio::test]
    async fn analysis_requires_active_taxonomy() {
        let mut backend = MockBackend::new();
        backend
            .expect_taxonomy_check()
            .returning(|| Ok(TaxonomyCheck::default()));
        backend.expect_analyze_contract().never();

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Master, ClauseKind::Clause).await;
        let err = h.orchestrator.submit_analysis(&id).await.unwrap_err();
        assert!(matches!(err, ComaError::Lifecycle(LifecycleError::NoActiveTaxonomy)));
        assert_eq!(
            h.orchestrator.workspace().get(&id).await.unwrap().status(),
            DocumentStatus::Annotated
        );
    }

    #[tokio::test]
    async fn contract_analysis_submits_stitched_segments() {
        let mut backend = MockBackend::new();
        taxonomy_exists(&mut backend);
        backend
            .expect_check_active()
            .returning(|_, _| Ok(ActiveJob::default()));
        backend
            .expect_taxonomy_active()
            .returning(|| Ok(vec![json!({"tag_id": "T1"})]));
        backend
            .expect_analyze_contract()
            .withf(|req| {
                req.segments.len() == 2
                    && req.segments[0].kind == "CLAUSE"
                    && req.segments[1].is_skip()
                    && req.taxonomy.len() == 1
            })
            .times(1)
            .returning(|_| Ok(JobId::from("job-1")));

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Master, ClauseKind::Clause).await;
        let job = h.orchestrator.submit_analysis(&id).await.unwrap();

        assert_eq!(job, JobId::from("job-1"));
        let record = h.orchestrator.workspace().get(&id).await.unwrap();
        assert_eq!(record.status(), DocumentStatus::Analyzing);
        let persisted = h.jobs.get(&id, JobType::Analyze).await.unwrap().unwrap();
        assert_eq!(persisted.job_id, job);
        assert!(h.orchestrator.is_polling(&id, JobType::Analyze));
        h.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn attaches_to_running_job() {
        let mut backend = MockBackend::new();
        taxonomy_exists(&mut backend);
        backend
            .expect_check_active()
            .withf(|_, job_type| *job_type == JobType::Analyze)
            .returning(|_, _| {
                Ok(ActiveJob {
                    found: true,
                    job_id: Some(JobId::from("running-7")),
                    timestamp: None,
                })
            });
        backend.expect_analyze_reference().never();
        backend.expect_taxonomy_active().never();

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Reference, ClauseKind::Guideline).await;
        let job = h.orchestrator.submit_analysis(&id).await.unwrap();
        assert_eq!(job, JobId::from("running-7"));
        h.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn incompatible_kinds_block_analysis() {
        let mut backend = MockBackend::new();
        taxonomy_exists(&mut backend);
        backend
            .expect_check_active()
            .returning(|_, _| Ok(ActiveJob::default()));
        backend.expect_analyze_reference().never();

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Reference, ClauseKind::Clause).await;
        let err = h.orchestrator.submit_analysis(&id).await.unwrap_err();
        assert!(err.is_validation());
        assert!(h.jobs.get(&id, JobType::Analyze).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reference_outputs_fetched_then_cleaned() {
        let mut backend = MockBackend::new();
        backend
            .expect_status()
            .returning(|_| Ok(JobPoll::Completed(json!({"decisions_file": "out-1.json", "trace": {"n": 1}}))));
        backend
            .expect_fetch_output()
            .withf(|file| file.to_string() == "out-1.json")
            .times(1)
            .returning(|_| Ok(json!([{"decision": "keep"}])));
        backend
            .expect_cleanup_output()
            .withf(|file| file.to_string() == "out-1.json")
            .times(1)
            .returning(|_| Err(crate::error::BackendError::Transport("reset".into())));

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Reference, ClauseKind::Guideline).await;
        h.orchestrator
            .workspace()
            .commit(&id, |r| Ok(lifecycle::advance(&mut r.header, DocumentStatus::Analyzing)?))
            .await
            .unwrap();
        h.jobs
            .put(&id, &JobRecord::new(JobId::from("j"), JobType::Analyze, Utc::now()))
            .await
            .unwrap();

        let outcome = h.orchestrator.poll_once(&id, JobType::Analyze).await.unwrap();
        assert_eq!(outcome, PollOutcome::Finished);

        let record = h.orchestrator.workspace().get(&id).await.unwrap();
        assert_eq!(record.status(), DocumentStatus::Analyzed);
        assert_eq!(record.derived.decisions, Some(json!([{"decision": "keep"}])));
        let job = h.jobs.get(&id, JobType::Analyze).await.unwrap().unwrap();
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn cancel_survives_backend_error() {
        let mut backend = MockBackend::new();
        backend
            .expect_cancel_job()
            .times(1)
            .returning(|_| Err(crate::error::BackendError::Transport("down".into())));

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Master, ClauseKind::Clause).await;
        h.orchestrator
            .workspace()
            .commit(&id, |r| Ok(lifecycle::advance(&mut r.header, DocumentStatus::Analyzing)?))
            .await
            .unwrap();
        h.jobs
            .put(&id, &JobRecord::new(JobId::from("j"), JobType::Analyze, Utc::now()))
            .await
            .unwrap();

        let mut events = h.orchestrator.subscribe();
        h.orchestrator.cancel(&id, JobType::Analyze).await.unwrap();

        let record = h.orchestrator.workspace().get(&id).await.unwrap();
        assert_eq!(record.status(), DocumentStatus::Annotated);
        assert!(h.jobs.get(&id, JobType::Analyze).await.unwrap().is_none());
        assert!(matches!(events.recv().await.unwrap(), JobEvent::Cancelled { .. }));
    }

    #[tokio::test]
    async fn cancel_without_job_is_rejected() {
        let h = harness(MockBackend::new());
        let id = annotated(&h, DocumentType::Master, ClauseKind::Clause).await;
        let err = h.orchestrator.cancel(&id, JobType::Taxonomy).await.unwrap_err();
        assert!(matches!(err, ComaError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn save_taxonomy_posts_generated_tags() {
        let mut backend = MockBackend::new();
        backend
            .expect_save_taxonomy()
            .withf(|tags| tags.len() == 2)
            .times(1)
            .returning(|_| Ok(()));

        let h = harness(backend);
        let id = annotated(&h, DocumentType::Reference, ClauseKind::Guideline).await;
        assert!(matches!(
            h.orchestrator.save_taxonomy(&id).await,
            Err(ComaError::MissingTaxonomy(_))
        ));

        h.orchestrator
            .workspace()
            .commit(&id, |r| {
                r.derived.taxonomy = Some(vec![json!({"tag_id": "A"}), json!({"tag_id": "B"})]);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(h.orchestrator.save_taxonomy(&id).await.unwrap(), 2);
    }
}
