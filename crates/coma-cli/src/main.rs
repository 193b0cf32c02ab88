//! coma - clause review from the command line
//!
//! Usage:
//!   coma list                               List documents
//!   coma upload <file> --type MASTER        Create a document and ingest it
//!   coma analyze <id>                       Run analysis and wait for it
//!   coma resume                             Resume outstanding jobs after a restart
//!   coma export <id> --out review.json      Write the JSON export

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coma_client::HttpBackend;
use coma_core::{
    wait_terminal, ComaConfig, DocumentId, DocumentStatus, DocumentType, DocumentWorkspace, FileDocumentStore,
    FileJobStore, JobEvent, JobOrchestrator, JobType, SystemClock,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "coma", version, about = "Clause review over immutable text blocks")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "coma.toml", global = true)]
    config: PathBuf,

    /// Backend base URL (overrides config and environment)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Data directory (overrides config and environment)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents
    List,
    /// Create a document from a file and ingest it
    Upload {
        /// Original file (PDF or DOCX)
        file: PathBuf,
        /// Document type: MASTER, SUBORDINATE or REFERENCE
        #[arg(long = "type", default_value = "MASTER")]
        document_type: DocumentType,
        /// Run the backend AI tagger
        #[arg(long)]
        ai_tagger: bool,
    },
    /// Analyze an annotated document
    Analyze {
        /// Document id
        id: String,
    },
    /// Generate a taxonomy from a document
    Taxonomy {
        /// Document id
        id: String,
    },
    /// Make a document's generated taxonomy the active one
    SaveTaxonomy {
        /// Document id
        id: String,
    },
    /// Resume polling of outstanding jobs
    Resume,
    /// Pause a processing document
    Pause {
        /// Document id
        id: String,
    },
    /// Unpause a document and wait for its job
    Unpause {
        /// Document id
        id: String,
    },
    /// Cancel a job
    Cancel {
        /// Document id
        id: String,
        /// Job type: ingest, analyze or taxonomy
        #[arg(long)]
        job: JobType,
    },
    /// Collapse a document into one block per segment
    Finalize {
        /// Document id
        id: String,
    },
    /// Write the JSON export
    Export {
        /// Document id
        id: String,
        /// Output file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<ComaConfig> {
    let mut config = ComaConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    if let Some(url) = &cli.backend_url {
        config = config.with_backend_url(url.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir.clone());
    }
    Ok(config)
}

fn open(config: ComaConfig) -> Result<JobOrchestrator> {
    let backend = HttpBackend::new(&config).context("Failed to create backend client")?;
    let documents = Arc::new(FileDocumentStore::new(config.data_dir.join("documents")));
    let jobs = Arc::new(FileJobStore::new(config.data_dir.join("jobs.json")));
    let workspace = Arc::new(DocumentWorkspace::new(documents, Arc::new(SystemClock)));
    Ok(JobOrchestrator::new(workspace, jobs, Arc::new(backend), config))
}

/// Block until the job ends; a failure becomes the command's error
async fn wait(events: &mut broadcast::Receiver<JobEvent>, id: &DocumentId, job_type: JobType) -> Result<()> {
    match wait_terminal(events, id, job_type).await {
        Some(JobEvent::Completed { .. }) => {
            println!("{job_type} completed for {id}");
            Ok(())
        }
        Some(JobEvent::Failed { message, .. }) => bail!("{job_type} failed for {id}: {message}"),
        Some(JobEvent::Lost { .. }) => bail!("{job_type} job for {id} is no longer known to the backend"),
        Some(JobEvent::Cancelled { .. }) => bail!("{job_type} job for {id} was cancelled"),
        Some(_) | None => bail!("event channel closed while waiting for {job_type}"),
    }
}

async fn cmd_list(orchestrator: &JobOrchestrator) -> Result<()> {
    let documents = orchestrator.workspace().list().await?;
    if documents.is_empty() {
        println!("No documents");
        return Ok(());
    }
    for record in documents {
        let progress = record
            .progress
            .as_ref()
            .map(|p| format!(" {}%", p.percent))
            .unwrap_or_default();
        println!(
            "{}  {:<10} {:<11} rev {:<4} {}{}",
            record.header.id,
            record.header.status.as_str(),
            record.header.document_type.as_str(),
            record.header.revision,
            record.header.filename,
            progress
        );
    }
    Ok(())
}

async fn cmd_upload(orchestrator: &JobOrchestrator, file: PathBuf, document_type: DocumentType, ai_tagger: bool) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("Upload path has no file name")?;
    let handle = file.canonicalize().unwrap_or(file).display().to_string();

    let record = orchestrator
        .workspace()
        .create(filename, document_type, Some(handle))
        .await?;
    let id = record.header.id;
    println!("Created {id}");

    let mut events = orchestrator.subscribe();
    let job = orchestrator.submit_ingest(&id, bytes, Some(ai_tagger)).await?;
    println!("Ingest job {job} submitted");
    wait(&mut events, &id, JobType::Ingest).await
}

async fn cmd_resume(orchestrator: &JobOrchestrator) -> Result<()> {
    let mut events = orchestrator.subscribe();
    let report = orchestrator.resume_all().await?;

    for id in &report.reset {
        println!("Reset {id} (no persisted job)");
    }
    let mut pending = HashSet::new();
    for (id, job_type) in &report.resumed {
        if orchestrator.workspace().get(id).await?.status() == DocumentStatus::Paused {
            println!("Skipping paused {id}");
            continue;
        }
        println!("Resumed {job_type} for {id}");
        pending.insert((id.clone(), *job_type));
    }

    let mut failures = 0usize;
    while !pending.is_empty() {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => bail!("event channel closed with jobs outstanding"),
        };
        if !event.is_terminal() || !pending.remove(&(event.document().clone(), event.job_type())) {
            continue;
        }
        match event {
            JobEvent::Completed { document, job_type } => println!("{job_type} completed for {document}"),
            other => {
                eprintln!("{} for {} did not complete: {other:?}", other.job_type(), other.document());
                failures += 1;
            }
        }
    }
    orchestrator.shutdown();
    if failures > 0 {
        bail!("{failures} resumed job(s) did not complete");
    }
    Ok(())
}

async fn cmd_export(orchestrator: &JobOrchestrator, id: &DocumentId, out: Option<PathBuf>) -> Result<()> {
    let entries = orchestrator.workspace().export(id).await?;
    let json = serde_json::to_string_pretty(&entries)?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} segment(s) to {}", entries.len().saturating_sub(1), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let orchestrator = open(load_config(&cli)?)?;

    match cli.command {
        Commands::List => cmd_list(&orchestrator).await,
        Commands::Upload {
            file,
            document_type,
            ai_tagger,
        } => cmd_upload(&orchestrator, file, document_type, ai_tagger).await,
        Commands::Analyze { id } => {
            let id = DocumentId::from(id.as_str());
            let mut events = orchestrator.subscribe();
            let job = orchestrator.submit_analysis(&id).await?;
            println!("Analysis job {job} submitted");
            wait(&mut events, &id, JobType::Analyze).await
        }
        Commands::Taxonomy { id } => {
            let id = DocumentId::from(id.as_str());
            let mut events = orchestrator.subscribe();
            let job = orchestrator.submit_taxonomy(&id).await?;
            println!("Taxonomy job {job} submitted");
            wait(&mut events, &id, JobType::Taxonomy).await
        }
        Commands::SaveTaxonomy { id } => {
            let count = orchestrator.save_taxonomy(&DocumentId::from(id.as_str())).await?;
            println!("Saved {count} tag record(s) as the active taxonomy");
            Ok(())
        }
        Commands::Resume => cmd_resume(&orchestrator).await,
        Commands::Pause { id } => {
            orchestrator.pause(&DocumentId::from(id.as_str())).await?;
            println!("Paused {id}");
            Ok(())
        }
        Commands::Unpause { id } => {
            let id = DocumentId::from(id.as_str());
            let mut events = orchestrator.subscribe();
            orchestrator.unpause(&id).await?;
            let status = orchestrator.workspace().get(&id).await?.status();
            let Some(job_type) = status.job_type() else {
                bail!("{id} unpaused into {status}, which has no job");
            };
            println!("Unpaused {id}; waiting for {job_type}");
            wait(&mut events, &id, job_type).await
        }
        Commands::Cancel { id, job } => {
            orchestrator.cancel(&DocumentId::from(id.as_str()), job).await?;
            println!("Cancelled {job} for {id}");
            Ok(())
        }
        Commands::Finalize { id } => {
            let blocks = orchestrator.workspace().finalize(&DocumentId::from(id.as_str())).await?;
            println!("Finalized {id} into {blocks} block(s)");
            Ok(())
        }
        Commands::Export { id, out } => cmd_export(&orchestrator, &DocumentId::from(id.as_str()), out).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);
    run(cli).await
}
