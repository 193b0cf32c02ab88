//! Document workspace
//!
//! Every document mutation goes through [`DocumentWorkspace::commit`]:
//! commits to the same document are serialized behind a per-document async
//! lock, the record is re-read inside the lock, and the store is written only
//! when the mutation succeeds. Each commit bumps `revision`.
//!
//! # Example
//!
//! ```rust,ignore
//! let workspace = DocumentWorkspace::new(store, Arc::new(SystemClock));
//! let open = workspace.start_clause(&id, Position::new(0, 3), ClauseKind::Clause).await?;
//! let closed = workspace.end_clause(&id, Position::new(1, 7)).await?;
//! ```

use crate::clock::Clock;
use crate::error::ComaError;
use crate::lifecycle;
use crate::store::DocumentStore;
use crate::types::{DerivedFields, DocumentId, DocumentRecord, DocumentStatus, DocumentType};
use coma_span::{store, BoundaryClassifier, Clause, ClauseId, ClauseKind, ClausePatch, ContentBlock, Position, SpanError};
use coma_stitch::{ExportEntry, Segment};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Serialized access to document records
pub struct DocumentWorkspace {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    locks: DashMap<DocumentId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for DocumentWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWorkspace")
            .field("locked_documents", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl DocumentWorkspace {
    /// Create workspace over a document store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
        }
    }

    /// Time source used for timestamps
    #[inline]
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock_for(&self, id: &DocumentId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    /// Create a new uploaded document
    ///
    /// # Errors
    /// `ComaError::Store` if the record cannot be written
    pub async fn create(
        &self,
        filename: impl Into<String>,
        document_type: DocumentType,
        original_file: Option<String>,
    ) -> Result<DocumentRecord, ComaError> {
        let mut record = DocumentRecord::new(filename, document_type, self.clock.now());
        record.header.original_file = original_file;
        self.store.put(&record).await?;
        tracing::info!(
            document_id = %record.header.id,
            filename = %record.header.filename,
            document_type = %document_type,
            "document created"
        );
        Ok(record)
    }

    /// Store a complete record as-is (import)
    ///
    /// # Errors
    /// `ComaError::Store` if the record cannot be written
    pub async fn insert(&self, record: DocumentRecord) -> Result<DocumentRecord, ComaError> {
        let lock = self.lock_for(&record.header.id);
        let _guard = lock.lock().await;
        self.store.put(&record).await?;
        Ok(record)
    }

    /// Load a document
    ///
    /// # Errors
    /// `ComaError::DocumentNotFound` for unknown ids
    pub async fn get(&self, id: &DocumentId) -> Result<DocumentRecord, ComaError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ComaError::DocumentNotFound(id.clone()))
    }

    /// Every document
    ///
    /// # Errors
    /// `ComaError::Store`
    pub async fn list(&self) -> Result<Vec<DocumentRecord>, ComaError> {
        Ok(self.store.get_all().await?)
    }

    /// Remove a document
    ///
    /// # Errors
    /// `ComaError::Store`
    pub async fn delete(&self, id: &DocumentId) -> Result<(), ComaError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.store.delete(id).await?;
        self.locks.remove(id);
        tracing::info!(document_id = %id, "document deleted");
        Ok(())
    }

    /// Apply a mutation to one document
    ///
    /// The mutation sees the latest committed record. If it returns an error
    /// nothing is written and the error is passed through.
    ///
    /// # Errors
    /// - `ComaError::DocumentNotFound` for unknown ids
    /// - whatever `mutate` returns
    /// - `ComaError::Store` if the write fails
    pub async fn commit<T, F>(&self, id: &DocumentId, mutate: F) -> Result<T, ComaError>
    where
        F: FnOnce(&mut DocumentRecord) -> Result<T, ComaError> + Send,
        T: Send,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ComaError::DocumentNotFound(id.clone()))?;
        let revision = record.header.revision;

        let value = mutate(&mut record)?;

        record.header.id = id.clone();
        record.header.revision = revision + 1;
        record.header.updated_at = self.clock.now();
        self.store.put(&record).await?;

        tracing::debug!(
            document_id = %id,
            revision = record.header.revision,
            status = %record.header.status,
            "document committed"
        );
        Ok(value)
    }

    /// Start a clause at a raw position (snapped to the word start)
    ///
    /// # Errors
    /// Lifecycle `NotEditable`, or the clause store's rejections
    pub async fn start_clause(&self, id: &DocumentId, raw: Position, kind: ClauseKind) -> Result<Clause, ComaError> {
        self.commit(id, move |record| {
            lifecycle::ensure_editable(record.status())?;
            let clause = store::start_clause(&record.clauses, &record.content, raw, kind)?;
            record.clauses = store::upsert(&record.clauses, clause.clone());
            Ok(clause)
        })
        .await
    }

    /// End the open clause at a raw position (snapped to the word end)
    ///
    /// # Errors
    /// Lifecycle `NotEditable`, or the clause store's rejections
    pub async fn end_clause(&self, id: &DocumentId, raw: Position) -> Result<Clause, ComaError> {
        self.commit(id, move |record| {
            lifecycle::ensure_editable(record.status())?;
            let clause = store::end_clause(&record.clauses, &record.content, raw)?;
            record.clauses = store::upsert(&record.clauses, clause.clone());
            Ok(clause)
        })
        .await
    }

    /// Delete clauses by id; returns how many were removed
    ///
    /// # Errors
    /// Lifecycle `NotEditable`
    pub async fn delete_clauses(&self, id: &DocumentId, ids: &[ClauseId]) -> Result<usize, ComaError> {
        self.commit(id, |record| {
            lifecycle::ensure_editable(record.status())?;
            let before = record.clauses.len();
            record.clauses = store::delete_clauses(&record.clauses, ids);
            Ok(before - record.clauses.len())
        })
        .await
    }

    /// Merge the selected clauses; returns the merged clause id
    ///
    /// # Errors
    /// Lifecycle `NotEditable`, or the merge engine's rejections
    pub async fn merge_clauses(&self, id: &DocumentId, selected: &[ClauseId]) -> Result<ClauseId, ComaError> {
        self.commit(id, |record| {
            lifecycle::ensure_editable(record.status())?;
            let (clauses, merged) = coma_span::merge(&record.clauses, selected)?;
            record.clauses = clauses;
            Ok(merged)
        })
        .await
    }

    /// Edit clause metadata
    ///
    /// # Errors
    /// Lifecycle `NotEditable`, or `UNKNOWN_CLAUSE`
    pub async fn update_clause(&self, id: &DocumentId, clause: &ClauseId, patch: &ClausePatch) -> Result<Clause, ComaError> {
        self.commit(id, |record| {
            lifecycle::ensure_editable(record.status())?;
            record.clauses = store::update_clause(&record.clauses, clause, patch)?;
            record
                .clauses
                .iter()
                .find(|c| &c.id == clause)
                .cloned()
                .ok_or_else(|| SpanError::UnknownClause(clause.clone()).into())
        })
        .await
    }

    /// Populate an uploaded document from locally parsed blocks
    ///
    /// Clauses are derived with `classifier`; the document moves to draft.
    /// Returns the number of derived clauses.
    ///
    /// # Errors
    /// Lifecycle `IllegalTransition` unless the document is uploaded
    pub async fn bootstrap(
        &self,
        id: &DocumentId,
        content: Vec<ContentBlock>,
        classifier: &dyn BoundaryClassifier,
    ) -> Result<usize, ComaError> {
        self.commit(id, move |record| {
            lifecycle::advance(&mut record.header, DocumentStatus::Draft)?;
            record.clauses = coma_span::derive_clauses(&content, classifier);
            record.content = content;
            Ok(record.clauses.len())
        })
        .await
    }

    /// Collapse the document into one block per segment
    ///
    /// Derived analysis fields are discarded and the document becomes
    /// annotated. Returns the new block count.
    ///
    /// # Errors
    /// - Lifecycle `NotEditable`
    /// - `UNTERMINATED_EXISTS` while a clause is still open
    pub async fn finalize(&self, id: &DocumentId) -> Result<usize, ComaError> {
        self.commit(id, |record| {
            lifecycle::ensure_editable(record.status())?;
            if let Some(open) = store::open_clause(&record.clauses) {
                return Err(SpanError::UnterminatedExists(open.id.clone()).into());
            }
            let finalized = coma_stitch::finalize(&record.content, &record.clauses);
            lifecycle::advance(&mut record.header, DocumentStatus::Annotated)?;
            record.content = finalized.content;
            record.clauses = finalized.clauses;
            record.derived = DerivedFields::default();
            tracing::info!(
                document_id = %record.header.id,
                blocks = record.content.len(),
                clauses = record.clauses.len(),
                "document finalized"
            );
            Ok(record.content.len())
        })
        .await
    }

    /// Stitched segments of the current structure
    ///
    /// # Errors
    /// `ComaError::DocumentNotFound`
    pub async fn segments(&self, id: &DocumentId) -> Result<Vec<Segment>, ComaError> {
        let record = self.get(id).await?;
        Ok(coma_stitch::stitch(&record.content, &record.clauses))
    }

    /// Export array for the document
    ///
    /// # Errors
    /// `INCOMPATIBLE_KIND` when a clause kind does not fit the document type
    pub async fn export(&self, id: &DocumentId) -> Result<Vec<ExportEntry>, ComaError> {
        let record = self.get(id).await?;
        let entries = coma_stitch::export(
            &record.content,
            &record.clauses,
            record.export_metadata(),
            record.header.document_type.allowed_clause_kinds(),
        )?;
        tracing::debug!(document_id = %id, entries = entries.len(), "document exported");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::LifecycleError;
    use crate::store::InMemoryDocumentStore;
    use chrono::Utc;
    use coma_span::KindClassifier;
    use pretty_assertions::assert_eq;

    fn blocks() -> Vec<ContentBlock> {
        vec![
            ContentBlock::new("b0", "Section 1", "HEADER"),
            ContentBlock::new("b1", "Text A.", "PARAGRAPH"),
            ContentBlock::new("b2", "Section 2", "HEADER"),
            ContentBlock::new("b3", "Text B.", "PARAGRAPH"),
        ]
    }

    async fn draft(workspace: &DocumentWorkspace) -> DocumentId {
        let record = DocumentRecord::new("a.pdf", DocumentType::Master, Utc::now())
            .with_content(blocks())
            .with_status(DocumentStatus::Draft);
        workspace.insert(record).await.unwrap().header.id
    }

    fn workspace() -> DocumentWorkspace {
        DocumentWorkspace::new(Arc::new(InMemoryDocumentStore::new()), Arc::new(SystemClock))
    }

    fn p(block: usize, offset: usize) -> Position {
        Position::new(block, offset)
    }

    #[tokio::test]
    async fn start_end_and_revision() {
        let ws = workspace();
        let id = draft(&ws).await;

        ws.start_clause(&id, p(0, 3), ClauseKind::Clause).await.unwrap();
        let closed = ws.end_clause(&id, p(1, 7)).await.unwrap();
        assert_eq!(closed.range(), Some((p(0, 0), p(1, 7))));

        let record = ws.get(&id).await.unwrap();
        assert_eq!(record.header.revision, 2);
        assert_eq!(record.clauses, vec![closed]);

        let segments = ws.segments(&id).await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text(), "Section 2\nText B.");
    }

    #[tokio::test]
    async fn rejected_edit_leaves_record_untouched() {
        let ws = workspace();
        let id = draft(&ws).await;
        ws.start_clause(&id, p(0, 0), ClauseKind::Clause).await.unwrap();
        ws.end_clause(&id, p(1, 7)).await.unwrap();
        let before = ws.get(&id).await.unwrap();

        let err = ws.start_clause(&id, p(1, 2), ClauseKind::Clause).await.unwrap_err();
        assert!(matches!(err, ComaError::Span(SpanError::Overlap { .. })));
        assert!(err.is_validation());
        assert_eq!(ws.get(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn edits_need_editable_status() {
        let ws = workspace();
        let record = DocumentRecord::new("a.pdf", DocumentType::Master, Utc::now())
            .with_content(blocks())
            .with_status(DocumentStatus::Analyzing);
        let id = ws.insert(record).await.unwrap().header.id;
        let err = ws.start_clause(&id, p(0, 0), ClauseKind::Clause).await.unwrap_err();
        assert!(matches!(
            err,
            ComaError::Lifecycle(LifecycleError::NotEditable(DocumentStatus::Analyzing))
        ));
    }

    #[tokio::test]
    async fn bootstrap_then_finalize() {
        let ws = workspace();
        let id = ws.create("a.pdf", DocumentType::Master, None).await.unwrap().header.id;

        let derived = ws.bootstrap(&id, blocks(), &KindClassifier).await.unwrap();
        assert_eq!(derived, 2);
        assert_eq!(ws.get(&id).await.unwrap().status(), DocumentStatus::Draft);

        let blocks = ws.finalize(&id).await.unwrap();
        assert_eq!(blocks, 2);
        let record = ws.get(&id).await.unwrap();
        assert_eq!(record.status(), DocumentStatus::Annotated);
        assert_eq!(record.content[0].text, "Section 1\nText A.");
        assert_eq!(record.derived, DerivedFields::default());
    }

    #[tokio::test]
    async fn finalize_refuses_open_clause() {
        let ws = workspace();
        let id = draft(&ws).await;
        ws.start_clause(&id, p(0, 0), ClauseKind::Clause).await.unwrap();
        let err = ws.finalize(&id).await.unwrap_err();
        assert!(matches!(err, ComaError::Span(SpanError::UnterminatedExists(_))));
    }

    #[tokio::test]
    async fn merge_update_delete() {
        let ws = workspace();
        let id = draft(&ws).await;
        let derived = coma_span::derive_clauses(&blocks(), &KindClassifier);
        ws.commit(&id, |r| {
            r.clauses = derived.clone();
            Ok(())
        })
        .await
        .unwrap();

        let ids: Vec<ClauseId> = derived.iter().map(|c| c.id.clone()).collect();
        let merged = ws.merge_clauses(&id, &ids).await.unwrap();

        let patch = ClausePatch {
            header: Some("Everything".into()),
            ..ClausePatch::default()
        };
        let updated = ws.update_clause(&id, &merged, &patch).await.unwrap();
        assert_eq!(updated.header, "Everything");
        assert_eq!(updated.range(), Some((p(0, 0), p(3, 7))));

        assert_eq!(ws.delete_clauses(&id, &[merged]).await.unwrap(), 1);
        assert!(ws.get(&id).await.unwrap().clauses.is_empty());
    }

    #[tokio::test]
    async fn export_checks_kinds_against_document_type() {
        let ws = workspace();
        let record = DocumentRecord::new("playbook.docx", DocumentType::Reference, Utc::now())
            .with_content(blocks())
            .with_status(DocumentStatus::Draft);
        let id = ws.insert(record).await.unwrap().header.id;
        ws.start_clause(&id, p(0, 0), ClauseKind::Clause).await.unwrap();
        ws.end_clause(&id, p(1, 7)).await.unwrap();

        let err = ws.export(&id).await.unwrap_err();
        assert!(err.is_validation());

        let clause = ws.get(&id).await.unwrap().clauses[0].id.clone();
        let patch = ClausePatch {
            kind: Some(ClauseKind::Guideline),
            ..ClausePatch::default()
        };
        ws.update_clause(&id, &clause, &patch).await.unwrap();
        let entries = ws.export(&id).await.unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_commits_are_serialized() {
        let ws = Arc::new(workspace());
        let id = draft(&ws).await;

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let ws = Arc::clone(&ws);
                let id = id.clone();
                tokio::spawn(async move {
                    ws.commit(&id, move |r| {
                        r.header.document_tags.push(format!("t{n}"));
                        Ok(())
                    })
                    .await
                })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let record = ws.get(&id).await.unwrap();
        assert_eq!(record.header.document_tags.len(), 16);
        assert_eq!(record.header.revision, 16);
    }

    #[tokio::test]
    async fn unknown_document() {
        let ws = workspace();
        let err = ws.get(&DocumentId::from("nope")).await.unwrap_err();
        assert!(matches!(err, ComaError::DocumentNotFound(_)));
    }
}
