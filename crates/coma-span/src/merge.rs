//! Clause merging
//!
//! Merging flattens a sub-region: the selection fixes the outer bounds and
//! every terminated clause enclosed by those bounds is absorbed, whether it
//! was selected or not.

use crate::clause::{Clause, ClauseId};
use crate::error::SpanError;
use crate::store::open_clause;
use std::collections::BTreeSet;

/// Merge the selected clauses into one spanning `[min start, max end]`
///
/// The merged clause takes the kind of the earliest selected clause, a
/// default header and an empty tag set, and occupies the list slot of the
/// first absorbed clause.
///
/// # Returns
/// The new clause list and the id of the merged clause
///
/// # Errors
/// - `SpanError::TooFewSelected` for fewer than two distinct ids
/// - `SpanError::UnknownClause` for ids not in the list
/// - `SpanError::UnterminatedSelected` if the open clause is selected
/// - `SpanError::OpenClauseInside` if the merged range would cover the open
///   clause's start
pub fn merge(clauses: &[Clause], selected: &[ClauseId]) -> Result<(Vec<Clause>, ClauseId), SpanError> {
    let distinct: BTreeSet<&ClauseId> = selected.iter().collect();
    if distinct.len() < 2 {
        return Err(SpanError::TooFewSelected(distinct.len()));
    }

    let mut picked = Vec::with_capacity(distinct.len());
    for id in &distinct {
        let clause = clauses
            .iter()
            .find(|c| &c.id == *id)
            .ok_or_else(|| SpanError::UnknownClause((*id).clone()))?;
        let (start, end) = clause
            .range()
            .ok_or_else(|| SpanError::UnterminatedSelected(clause.id.clone()))?;
        picked.push((start, end, clause.kind));
    }

    // picked is non-empty (>= 2 entries), so min/max exist
    let (min_start, _, kind) = picked
        .iter()
        .copied()
        .min_by_key(|(s, _, _)| *s)
        .ok_or(SpanError::TooFewSelected(0))?;
    let max_end = picked
        .iter()
        .map(|(_, e, _)| *e)
        .max()
        .ok_or(SpanError::TooFewSelected(0))?;

    if let Some(open) = open_clause(clauses) {
        if min_start <= open.start && open.start < max_end {
            return Err(SpanError::OpenClauseInside {
                open: open.id.clone(),
                start: open.start,
            });
        }
    }

    let merged = Clause::closed(ClauseId::generate(), kind, min_start, max_end);
    let merged_id = merged.id.clone();

    let mut out = Vec::with_capacity(clauses.len());
    let mut absorbed = 0usize;
    let mut merged_slot = Some(merged);
    for clause in clauses {
        if clause.is_enclosed_by(min_start, max_end) {
            absorbed += 1;
            if let Some(m) = merged_slot.take() {
                out.push(m);
            }
        } else {
            out.push(clause.clone());
        }
    }

    tracing::debug!(
        merged = %merged_id,
        start = %min_start,
        end = %max_end,
        absorbed,
        "clauses merged"
    );

    Ok((out, merged_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::ClauseKind;
    use crate::position::Position;
    use crate::store::check_invariants;
    use pretty_assertions::assert_eq;

    fn p(offset: usize) -> Position {
        Position::new(0, offset)
    }

    fn clause(id: &str, start: usize, end: usize) -> Clause {
        Clause::closed(id, ClauseKind::Clause, p(start), p(end))
            .with_header(format!("Header {id}"))
            .with_tags([id])
    }

    #[test]
    fn absorbs_enclosed_unselected_clause() {
        let clauses = vec![clause("A", 0, 10), clause("C", 12, 18), clause("B", 20, 30)];
        let (out, id) = merge(&clauses, &["A".into(), "B".into()]).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, id);
        assert_eq!(out[0].range(), Some((p(0), p(30))));
        assert_eq!(out[0].header, Clause::DEFAULT_HEADER);
        assert!(out[0].tags.is_empty());
    }

    #[test]
    fn keeps_clauses_outside_bounds_in_order() {
        let clauses = vec![
            clause("X", 40, 50),
            clause("A", 0, 10),
            clause("B", 20, 30),
            clause("Y", 31, 35),
        ];
        let (out, id) = merge(&clauses, &["B".into(), "A".into()]).unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["X", id.as_str(), "Y"]);
        check_invariants(&out).unwrap();
    }

    #[test]
    fn too_few_selected() {
        let clauses = vec![clause("A", 0, 10)];
        assert_eq!(
            merge(&clauses, &["A".into()]),
            Err(SpanError::TooFewSelected(1))
        );
        assert_eq!(
            merge(&clauses, &["A".into(), "A".into()]),
            Err(SpanError::TooFewSelected(1))
        );
    }

    #[test]
    fn unknown_and_unterminated_rejected() {
        let open = Clause::open(ClauseKind::Clause, p(40));
        let clauses = vec![clause("A", 0, 10), open.clone()];
        assert_eq!(
            merge(&clauses, &["A".into(), "Z".into()]),
            Err(SpanError::UnknownClause("Z".into()))
        );
        assert_eq!(
            merge(&clauses, &["A".into(), open.id.clone()]),
            Err(SpanError::UnterminatedSelected(open.id))
        );
    }

    #[test]
    fn open_clause_between_selection_rejected() {
        let open = Clause::open(ClauseKind::Info, p(5));
        let clauses = vec![clause("A", 0, 4), open.clone(), clause("B", 15, 19)];

        assert_eq!(
            merge(&clauses, &["A".into(), "B".into()]),
            Err(SpanError::OpenClauseInside {
                open: open.id.clone(),
                start: p(5)
            })
        );

        let after = vec![clause("A", 0, 4), clause("B", 6, 9), Clause::open(ClauseKind::Info, p(9))];
        let (out, _) = merge(&after, &["A".into(), "B".into()]).unwrap();
        assert_eq!(out.len(), 2);
        check_invariants(&out).unwrap();
    }

    #[test]
    fn merged_kind_follows_earliest_selection() {
        let a = Clause::closed("A", ClauseKind::Appendix, p(0), p(5));
        let b = Clause::closed("B", ClauseKind::Clause, p(6), p(9));
        let (out, _) = merge(&[b, a], &["A".into(), "B".into()]).unwrap();
        assert_eq!(out[0].kind, ClauseKind::Appendix);
    }
}
