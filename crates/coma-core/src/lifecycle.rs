//! Document lifecycle state machine
//!
//! ```text
//! uploaded -> draft | ingesting
//! ingesting -> draft | uploaded
//! draft -> draft | annotated
//! annotated -> analyzing | annotated
//! analyzing -> analyzed | annotated
//! analyzed -> analyzing
//! ```
//!
//! `ingesting` and `analyzing` enter `paused` through [`pause`] only. A
//! paused document leaves through [`unpause`] (back to the remembered
//! status), [`revert`] (its stable fallback) or [`finish`] (a completed
//! job's target).

use crate::error::LifecycleError;
use crate::types::{DocumentHeader, DocumentStatus};

/// Statuses reachable from `from` in one step of [`advance`]
///
/// Empty for `paused`, whose exits depend on the remembered status.
#[must_use]
pub fn allowed_transitions(from: DocumentStatus) -> Vec<DocumentStatus> {
    use DocumentStatus::*;
    match from {
        Uploaded => vec![Draft, Ingesting],
        Ingesting => vec![Draft, Uploaded],
        Draft => vec![Draft, Annotated],
        Annotated => vec![Analyzing, Annotated],
        Analyzing => vec![Analyzed, Annotated],
        Analyzed => vec![Analyzing],
        Paused => vec![],
    }
}

/// Validates a state transition for `header`
///
/// A paused document may only return to its remembered status.
///
/// # Errors
/// `LifecycleError::IllegalTransition` if `to` is not reachable
pub fn validate_transition(header: &DocumentHeader, to: DocumentStatus) -> Result<(), LifecycleError> {
    let from = header.status;
    let allowed = match (from, header.status_before_pause) {
        (DocumentStatus::Paused, before) => before == Some(to),
        _ => allowed_transitions(from).contains(&to),
    };
    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTransition { from, to })
    }
}

/// Rejects new work on a paused document
///
/// # Errors
/// `LifecycleError::Paused`
pub fn ensure_not_paused(header: &DocumentHeader) -> Result<(), LifecycleError> {
    if header.status == DocumentStatus::Paused {
        Err(LifecycleError::Paused)
    } else {
        Ok(())
    }
}

/// Nearest stable status for a processing status
///
/// Non-processing statuses map to themselves.
#[inline]
#[must_use]
pub fn stable_fallback(status: DocumentStatus) -> DocumentStatus {
    match status {
        DocumentStatus::Ingesting => DocumentStatus::Uploaded,
        DocumentStatus::Analyzing => DocumentStatus::Annotated,
        other => other,
    }
}

/// Status the document is effectively in, looking through a pause
#[inline]
#[must_use]
pub fn effective_status(header: &DocumentHeader) -> DocumentStatus {
    match (header.status, header.status_before_pause) {
        (DocumentStatus::Paused, Some(before)) => before,
        (status, _) => status,
    }
}

/// Move to `to` after validating the transition
///
/// # Errors
/// `LifecycleError::IllegalTransition`
pub fn advance(header: &mut DocumentHeader, to: DocumentStatus) -> Result<(), LifecycleError> {
    validate_transition(header, to)?;
    header.status = to;
    header.status_before_pause = None;
    Ok(())
}

/// Apply a completed job's target status, looking through a pause
///
/// Pausing only hides polling; a job that finished while the document was
/// paused still lands, and the pause is dropped.
///
/// # Errors
/// `LifecycleError::IllegalTransition` if `to` is not reachable from the
/// effective status
pub fn finish(header: &mut DocumentHeader, to: DocumentStatus) -> Result<(), LifecycleError> {
    let from = effective_status(header);
    if !allowed_transitions(from).contains(&to) {
        return Err(LifecycleError::IllegalTransition { from, to });
    }
    header.status = to;
    header.status_before_pause = None;
    Ok(())
}

/// Suspend local polling of a processing document
///
/// # Errors
/// `LifecycleError::NotPausable` unless the document is ingesting or analyzing
pub fn pause(header: &mut DocumentHeader) -> Result<(), LifecycleError> {
    if !header.status.is_processing() {
        return Err(LifecycleError::NotPausable(header.status));
    }
    header.status_before_pause = Some(header.status);
    header.status = DocumentStatus::Paused;
    Ok(())
}

/// Return a paused document to its remembered status
///
/// # Errors
/// `LifecycleError::NotPaused` if the document is not paused
pub fn unpause(header: &mut DocumentHeader) -> Result<(), LifecycleError> {
    let before = match (header.status, header.status_before_pause) {
        (DocumentStatus::Paused, Some(before)) => before,
        (status, _) => return Err(LifecycleError::NotPaused(status)),
    };
    header.status = before;
    header.status_before_pause = None;
    Ok(())
}

/// Fall back to the stable status on cancel, failure or loss
///
/// Looks through a pause. Returns the new status.
pub fn revert(header: &mut DocumentHeader) -> DocumentStatus {
    let fallback = stable_fallback(effective_status(header));
    header.status = fallback;
    header.status_before_pause = None;
    fallback
}

/// `uploaded -> ingesting` requires an original file handle
///
/// # Errors
/// `LifecycleError::MissingOriginalFile`
pub fn guard_ingest(header: &DocumentHeader) -> Result<(), LifecycleError> {
    match header.original_file.as_deref() {
        Some(handle) if !handle.is_empty() => Ok(()),
        _ => Err(LifecycleError::MissingOriginalFile),
    }
}

/// Clause edits are allowed in draft and annotated only
///
/// # Errors
/// `LifecycleError::NotEditable`
pub fn ensure_editable(status: DocumentStatus) -> Result<(), LifecycleError> {
    match status {
        DocumentStatus::Draft | DocumentStatus::Annotated => Ok(()),
        other => Err(LifecycleError::NotEditable(other)),
    }
}
