//! Job events broadcast by the orchestrator

use crate::types::{DocumentId, JobId, JobType, Progress};
use tokio::sync::broadcast;

/// Something observable happened to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Job created (or attached to) and polling started
    Submitted {
        /// Document
        document: DocumentId,
        /// Job type
        job_type: JobType,
        /// Backend job id
        job_id: JobId,
    },
    /// Backend reported progress
    Progress {
        /// Document
        document: DocumentId,
        /// Job type
        job_type: JobType,
        /// Reported progress
        progress: Progress,
    },
    /// Result merged into the document
    Completed {
        /// Document
        document: DocumentId,
        /// Job type
        job_type: JobType,
    },
    /// Backend reported failure; the document was reverted
    Failed {
        /// Document
        document: DocumentId,
        /// Job type
        job_type: JobType,
        /// User-visible message
        message: String,
    },
    /// Backend no longer knows the job; the document was reverted
    Lost {
        /// Document
        document: DocumentId,
        /// Job type
        job_type: JobType,
    },
    /// Cancelled on request
    Cancelled {
        /// Document
        document: DocumentId,
        /// Job type
        job_type: JobType,
    },
}

impl JobEvent {
    /// Document the event concerns
    #[inline]
    #[must_use]
    pub fn document(&self) -> &DocumentId {
        match self {
            Self::Submitted { document, .. }
            | Self::Progress { document, .. }
            | Self::Completed { document, .. }
            | Self::Failed { document, .. }
            | Self::Lost { document, .. }
            | Self::Cancelled { document, .. } => document,
        }
    }

    /// Job type the event concerns
    #[inline]
    #[must_use]
    pub fn job_type(&self) -> JobType {
        match self {
            Self::Submitted { job_type, .. }
            | Self::Progress { job_type, .. }
            | Self::Completed { job_type, .. }
            | Self::Failed { job_type, .. }
            | Self::Lost { job_type, .. }
            | Self::Cancelled { job_type, .. } => *job_type,
        }
    }

    /// Polling has stopped for this job
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Lost { .. } | Self::Cancelled { .. }
        )
    }
}

/// Wait for the terminal event of one job
///
/// Returns `None` if the channel closes first. Lagged receivers skip ahead.
pub async fn wait_terminal(
    receiver: &mut broadcast::Receiver<JobEvent>,
    document: &DocumentId,
    job_type: JobType,
) -> Option<JobEvent> {
    loop {
        match receiver.recv().await {
            Ok(event) if event.is_terminal() && event.document() == document && event.job_type() == job_type => {
                return Some(event);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "job event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
