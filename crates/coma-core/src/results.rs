//! Merging completed job results into document records
//!
//! Each function validates the payload before touching the record, so a
//! rejected payload leaves the record as it was.

use crate::error::ComaError;
use crate::lifecycle;
use crate::types::{DocumentRecord, DocumentStatus, JobType};
use coma_span::{derive_clauses, BoundaryClassifier, ContentBlock};
use serde::Deserialize;
use serde_json::Value;

fn invalid(job_type: JobType, reason: impl Into<String>) -> ComaError {
    ComaError::InvalidResult {
        job_type,
        reason: reason.into(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngestPayload {
    Wrapped { content: Vec<ContentBlock> },
    Bare(Vec<ContentBlock>),
}

/// Ingest: store the returned blocks, bootstrap clauses, move to draft
///
/// Returns the number of derived clauses.
///
/// # Errors
/// `ComaError::InvalidResult` if the payload holds no block list
pub fn apply_ingest(
    record: &mut DocumentRecord,
    result: Value,
    classifier: &dyn BoundaryClassifier,
) -> Result<usize, ComaError> {
    let content = match serde_json::from_value(result).map_err(|e| invalid(JobType::Ingest, e.to_string()))? {
        IngestPayload::Wrapped { content } | IngestPayload::Bare(content) => content,
    };

    lifecycle::finish(&mut record.header, DocumentStatus::Draft)?;
    record.clauses = derive_clauses(&content, classifier);
    record.content = content;
    record.progress = None;
    record.derived.last_error = None;
    Ok(record.clauses.len())
}

/// Contract analysis payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContractAnalysis {
    /// Term sheet
    #[serde(default, alias = "termSheet")]
    pub term_sheet: Option<Value>,
    /// Reference map
    #[serde(default, alias = "referenceMap")]
    pub reference_map: Option<Value>,
}

/// Contract analysis: store term sheet and reference map, move to analyzed
///
/// A payload with neither field is stored whole as the term sheet.
///
/// # Errors
/// Lifecycle `IllegalTransition` unless the document is analyzing (paused or not)
pub fn apply_contract_analysis(record: &mut DocumentRecord, result: Value) -> Result<(), ComaError> {
    let parsed: ContractAnalysis = serde_json::from_value(result.clone()).unwrap_or_default();
    let analysis = if parsed.term_sheet.is_none() && parsed.reference_map.is_none() {
        ContractAnalysis {
            term_sheet: Some(result),
            reference_map: None,
        }
    } else {
        parsed
    };

    lifecycle::finish(&mut record.header, DocumentStatus::Analyzed)?;
    record.derived.term_sheet = analysis.term_sheet;
    record.derived.reference_map = analysis.reference_map;
    record.derived.last_error = None;
    record.progress = None;
    Ok(())
}

/// Reference analysis payload
///
/// Large payloads may be left on the server; the `*_file` pointers name
/// them until they are fetched with [`ReferenceAnalysis::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReferenceAnalysis {
    /// Decision records
    #[serde(default)]
    pub decisions: Option<Value>,
    /// Trace payload
    #[serde(default)]
    pub trace: Option<Value>,
    /// Server-side file holding the decisions
    #[serde(default, alias = "decisionsFile")]
    pub decisions_file: Option<String>,
    /// Server-side file holding the trace
    #[serde(default, alias = "traceFile")]
    pub trace_file: Option<String>,
}

impl ReferenceAnalysis {
    /// Parse a completed job result
    ///
    /// # Errors
    /// `ComaError::InvalidResult` if the payload is not an object
    pub fn parse(result: Value) -> Result<Self, ComaError> {
        if !result.is_object() {
            return Err(invalid(JobType::Analyze, "reference analysis result is not an object"));
        }
        serde_json::from_value(result).map_err(|e| invalid(JobType::Analyze, e.to_string()))
    }

    /// Server-side files still to fetch
    #[must_use]
    pub fn pending_files(&self) -> Vec<String> {
        self.decisions_file
            .iter()
            .chain(self.trace_file.iter())
            .cloned()
            .collect()
    }

    /// Pull a fetched file into the payload and drop its pointer
    pub fn resolve(&mut self, file: &str, payload: Value) {
        if self.decisions_file.as_deref() == Some(file) {
            self.decisions = Some(payload.clone());
            self.decisions_file = None;
        }
        if self.trace_file.as_deref() == Some(file) {
            self.trace = Some(payload);
            self.trace_file = None;
        }
    }
}

/// Reference analysis: store decisions and trace, move to analyzed
///
/// # Errors
/// - `ComaError::InvalidResult` if a file pointer was never resolved
/// - Lifecycle `IllegalTransition` unless the document is analyzing (paused or not)
pub fn apply_reference_analysis(record: &mut DocumentRecord, analysis: ReferenceAnalysis) -> Result<(), ComaError> {
    if let Some(file) = analysis.pending_files().first() {
        return Err(invalid(JobType::Analyze, format!("output file {file} was not fetched")));
    }

    lifecycle::finish(&mut record.header, DocumentStatus::Analyzed)?;
    record.derived.decisions = analysis.decisions;
    record.derived.trace = analysis.trace;
    record.derived.last_error = None;
    record.progress = None;
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaxonomyPayload {
    Tags { tags: Vec<Value> },
    Taxonomy { taxonomy: Vec<Value> },
    Bare(Vec<Value>),
}

/// Taxonomy: store the generated tag records; status is unchanged
///
/// Returns the number of tag records.
///
/// # Errors
/// `ComaError::InvalidResult` if the payload holds no tag list
pub fn apply_taxonomy(record: &mut DocumentRecord, result: Value) -> Result<usize, ComaError> {
    let tags = match serde_json::from_value(result).map_err(|e| invalid(JobType::Taxonomy, e.to_string()))? {
        TaxonomyPayload::Tags { tags } | TaxonomyPayload::Taxonomy { taxonomy: tags } | TaxonomyPayload::Bare(tags) => tags,
    };
    let count = tags.len();
    record.derived.taxonomy = Some(tags);
    Ok(count)
}
