//! Clause store operations
//!
//! Pure functions over an explicit clause list. Each either returns the new
//! clause (or list) or rejects the request, leaving the input untouched.
//!
//! # Invariants
//! - at most one clause is unterminated
//! - terminated `[start, end)` ranges never intersect
//! - `start < end` for every terminated clause
//! - the unterminated clause does not start inside a terminated range

use crate::block::ContentBlock;
use crate::clause::{Clause, ClauseId, ClauseKind, ClausePatch};
use crate::error::SpanError;
use crate::position::Position;
use crate::snap::{snap_end, snap_start};
use std::collections::HashSet;

/// The single unterminated clause, if any
#[inline]
#[must_use]
pub fn open_clause(clauses: &[Clause]) -> Option<&Clause> {
    clauses.iter().find(|c| !c.is_terminated())
}

/// Begin a new clause at a raw position
///
/// The position is snapped back to the start of the word it lands in.
///
/// # Errors
/// - `SpanError::UnterminatedExists` if another clause is still open
/// - `SpanError::Overlap` if the snapped start lies inside a terminated clause
/// - `SpanError::PositionOutOfBounds` if `raw` does not address the content
pub fn start_clause(
    clauses: &[Clause],
    content: &[ContentBlock],
    raw: Position,
    kind: ClauseKind,
) -> Result<Clause, SpanError> {
    if let Some(open) = open_clause(clauses) {
        return Err(SpanError::UnterminatedExists(open.id.clone()));
    }

    let start = snap_start(content, raw)?;

    if let Some(existing) = clauses.iter().find(|c| c.is_inside(start)) {
        return Err(SpanError::Overlap {
            position: start,
            existing: existing.id.clone(),
        });
    }

    tracing::debug!(%start, %raw, "clause started");
    Ok(Clause::open(kind, start))
}

/// Close the open clause at a raw position
///
/// The position is snapped forward to the end of the word it lands in.
/// Returns the terminated clause; the caller replaces the open one with it.
///
/// # Errors
/// - `SpanError::NoOpenClause` if nothing is open
/// - `SpanError::EndBeforeStart` if the snapped end is not after the start
/// - `SpanError::Overlap` if `[start, end)` intersects a terminated clause
pub fn end_clause(
    clauses: &[Clause],
    content: &[ContentBlock],
    raw: Position,
) -> Result<Clause, SpanError> {
    let open = open_clause(clauses).ok_or(SpanError::NoOpenClause)?;
    let end = snap_end(content, raw)?;

    if end <= open.start {
        return Err(SpanError::EndBeforeStart {
            start: open.start,
            end,
        });
    }

    if let Some(existing) = clauses
        .iter()
        .filter(|c| c.id != open.id)
        .find(|c| c.intersects(open.start, end))
    {
        return Err(SpanError::Overlap {
            position: end,
            existing: existing.id.clone(),
        });
    }

    let mut closed = open.clone();
    closed.end = Some(end);
    tracing::debug!(clause = %closed.id, start = %closed.start, %end, "clause ended");
    Ok(closed)
}

/// Remove every clause whose id is listed
#[must_use]
pub fn delete_clauses(clauses: &[Clause], ids: &[ClauseId]) -> Vec<Clause> {
    let doomed: HashSet<&ClauseId> = ids.iter().collect();
    clauses
        .iter()
        .filter(|c| !doomed.contains(&c.id))
        .cloned()
        .collect()
}

/// Insert a clause, replacing any clause with the same id in place
#[must_use]
pub fn upsert(clauses: &[Clause], clause: Clause) -> Vec<Clause> {
    let mut out = clauses.to_vec();
    match out.iter_mut().find(|c| c.id == clause.id) {
        Some(slot) => *slot = clause,
        None => out.push(clause),
    }
    out
}

/// Edit clause metadata (header, kind, tags)
///
/// # Errors
/// `SpanError::UnknownClause` if no clause has this id
pub fn update_clause(
    clauses: &[Clause],
    id: &ClauseId,
    patch: &ClausePatch,
) -> Result<Vec<Clause>, SpanError> {
    let mut out = clauses.to_vec();
    let clause = out
        .iter_mut()
        .find(|c| &c.id == id)
        .ok_or_else(|| SpanError::UnknownClause(id.clone()))?;
    patch.apply(clause);
    Ok(out)
}

/// Verify the clause-list invariants listed in the module docs
///
/// # Errors
/// `SpanError::InvariantViolated` describing the first violation found
pub fn check_invariants(clauses: &[Clause]) -> Result<(), SpanError> {
    let open = clauses.iter().filter(|c| !c.is_terminated()).count();
    if open > 1 {
        return Err(SpanError::InvariantViolated(format!(
            "{open} unterminated clauses"
        )));
    }

    let mut ranges: Vec<(Position, Position, &ClauseId)> = clauses
        .iter()
        .filter_map(|c| c.range().map(|(s, e)| (s, e, &c.id)))
        .collect();

    if let Some(open) = open_clause(clauses) {
        if let Some(existing) = clauses.iter().find(|c| c.is_inside(open.start)) {
            return Err(SpanError::InvariantViolated(format!(
                "open clause '{}' starts inside '{}'",
                open.id, existing.id
            )));
        }
    }

    if let Some((_, _, id)) = ranges.iter().find(|(s, e, _)| s >= e) {
        return Err(SpanError::InvariantViolated(format!(
            "clause '{id}' has an empty or inverted range"
        )));
    }

    ranges.sort_by_key(|(s, _, _)| *s);
    for pair in ranges.windows(2) {
        let (_, prev_end, prev_id) = pair[0];
        let (next_start, _, next_id) = pair[1];
        if next_start < prev_end {
            return Err(SpanError::InvariantViolated(format!(
                "clauses '{prev_id}' and '{next_id}' overlap"
            )));
        }
    }

    Ok(())
}
