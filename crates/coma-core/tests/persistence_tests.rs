//! File-backed stores across a simulated restart

use coma_core::{
    ComaConfig, DocumentStatus, DocumentType, DocumentWorkspace, FileDocumentStore, FileJobStore, JobOrchestrator,
    JobStore, JobType, SystemClock,
};
use coma_span::{ClauseKind, KindClassifier, Position};
use coma_test_utils::{blocks, ScriptedBackend};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn open(dir: &std::path::Path) -> (JobOrchestrator, Arc<FileJobStore>, Arc<ScriptedBackend>) {
    let documents = Arc::new(FileDocumentStore::new(dir.join("documents")));
    let jobs = Arc::new(FileJobStore::new(dir.join("jobs.json")));
    let backend = Arc::new(ScriptedBackend::new());
    let workspace = Arc::new(DocumentWorkspace::new(documents, Arc::new(SystemClock)));
    let config = ComaConfig::new().with_poll_interval(Duration::from_secs(3600));
    let orchestrator = JobOrchestrator::new(workspace, jobs.clone(), backend.clone(), config);
    (orchestrator, jobs, backend)
}

#[tokio::test]
async fn edits_and_jobs_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let (orchestrator, _, _) = open(dir.path());
        let workspace = orchestrator.workspace();
        let record = workspace
            .create("msa.pdf", DocumentType::Master, Some("uploads/msa.pdf".into()))
            .await
            .unwrap();
        let id = record.header.id;

        workspace
            .bootstrap(&id, blocks(&["Definitions", "Terms used herein."]), &KindClassifier)
            .await
            .unwrap();
        workspace.start_clause(&id, Position::new(0, 0), ClauseKind::Clause).await.unwrap();
        workspace.end_clause(&id, Position::new(1, 18)).await.unwrap();
        workspace.finalize(&id).await.unwrap();
        id
    };

    let (orchestrator, jobs, backend) = open(dir.path());
    backend.set_taxonomy_exists(true);
    let record = orchestrator.workspace().get(&id).await.unwrap();
    assert_eq!(record.status(), DocumentStatus::Annotated);
    assert_eq!(record.clauses.len(), 1);
    assert!(record.header.revision >= 4);

    orchestrator.submit_analysis(&id).await.unwrap();
    orchestrator.shutdown();
    let persisted = jobs.get(&id, JobType::Analyze).await.unwrap().unwrap();

    let (restarted, _, _) = open(dir.path());
    let report = restarted.resume_all().await.unwrap();
    assert_eq!(report.resumed, vec![(id.clone(), JobType::Analyze)]);
    assert!(report.reset.is_empty());
    assert_eq!(
        restarted.workspace().get(&id).await.unwrap().status(),
        DocumentStatus::Analyzing
    );
    assert_eq!(persisted.job_id.as_str(), "job-1");
    restarted.shutdown();
}
