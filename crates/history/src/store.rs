use std::collections::VecDeque;
use std::path::PathBuf;

use plm_core::annotation::Annotation;
use plm_core::error::{CoreError, ErrorCode};
use plm_core::types::{normalize_document_label, normalize_project_id, timestamp_now, EventKind};
use tokio::sync::RwLock;

use crate::entry::HistoryEntry;
use crate::filter::HistoryFilter;
use crate::persistence;
use crate::views::{self, DocumentSummary, ProjectSummary};

#[derive(Debug, Clone, Default)]
pub struct HistoryConfig {
    /// Maximum entries kept in memory; `0` = unbounded.
    pub limit: usize,
    /// NDJSON mirror of the log, if any.
    pub file: Option<PathBuf>,
    /// Entries replayed from `file` at startup; `0` = all.
    pub load_limit: usize,
}

/// A new annotation event for an existing document.
#[derive(Debug, Clone, Default)]
pub struct AnnotationRequest {
    pub project_id: String,
    pub document_label: String,
    pub annotations: Vec<Annotation>,
    /// Overrides; `None` or empty inherits from the prior entry.
    pub owner: Option<String>,
    pub tags: Option<Vec<String>>,
    pub revision_note: Option<String>,
}

/// In-memory, most-recent-first history log.
///
/// All mutation happens under a single write lock, which also covers the
/// append to the history file so file order matches memory order.
pub struct HistoryStore {
    config: HistoryConfig,
    entries: RwLock<VecDeque<HistoryEntry>>,
}

impl HistoryStore {
    /// Create an empty store without replaying the history file.
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Create a store and replay the configured history file.
    ///
    /// Load failures are logged and leave the store empty.
    pub async fn open(config: HistoryConfig) -> Self {
        let store = Self::new(config);
        if let Some(path) = store.config.file.clone() {
            match persistence::load_entries(&path, store.config.load_limit).await {
                Ok(loaded) => {
                    let mut entries: VecDeque<HistoryEntry> = loaded.into();
                    if store.config.limit > 0 {
                        entries.truncate(store.config.limit);
                    }
                    tracing::info!(
                        path = %path.display(),
                        count = entries.len(),
                        "History replayed",
                    );
                    *store.entries.write().await = entries;
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "History load failed");
                }
            }
        }
        store
    }

    /// Normalize and prepend an entry, trimming the oldest beyond the cap.
    pub async fn record(&self, mut entry: HistoryEntry) -> HistoryEntry {
        entry.normalize();
        let mut entries = self.entries.write().await;
        self.insert_locked(&mut entries, entry.clone()).await;
        entry
    }

    async fn insert_locked(&self, entries: &mut VecDeque<HistoryEntry>, entry: HistoryEntry) {
        if let Some(path) = &self.config.file {
            if let Err(e) = persistence::append_entry(path, &entry).await {
                tracing::error!(path = %path.display(), error = %e, "History write failed");
            }
        }
        entries.push_front(entry);
        if self.config.limit > 0 {
            entries.truncate(self.config.limit);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Entries matching `filter`, most recent first; `limit` 0 = unbounded.
    pub async fn list(&self, filter: &HistoryFilter, limit: usize) -> Vec<HistoryEntry> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|e| filter.matches(e))
            .take(views::cap(limit))
            .collect()
    }

    pub async fn projects(&self, filter: &HistoryFilter, limit: usize) -> Vec<ProjectSummary> {
        views::build_projects(&self.snapshot().await, filter, limit)
    }

    pub async fn documents(
        &self,
        project_id: &str,
        filter: &HistoryFilter,
        limit: usize,
    ) -> Vec<DocumentSummary> {
        let project_id = normalize_project_id(project_id);
        views::build_documents(&self.snapshot().await, &project_id, filter, limit)
    }

    pub async fn versions(
        &self,
        project_id: &str,
        document_label: &str,
        filter: &HistoryFilter,
        limit: usize,
    ) -> Vec<HistoryEntry> {
        let project_id = normalize_project_id(project_id);
        let document_label = normalize_document_label(document_label);
        views::build_versions(
            &self.snapshot().await,
            &project_id,
            &document_label,
            filter,
            limit,
        )
    }

    /// Record an annotation event anchored to the document's latest entry.
    ///
    /// The new entry inherits state, viewer and error from that entry and
    /// carries its annotations followed by the new ones. Prior entries are
    /// left untouched.
    pub async fn add_annotation(&self, request: AnnotationRequest) -> Result<HistoryEntry, CoreError> {
        if request.annotations.is_empty() {
            return Err(CoreError::validation(
                ErrorCode::MissingAnnotations,
                "annotation message required",
            ));
        }
        let project_id = normalize_project_id(&request.project_id);
        let document_label = normalize_document_label(&request.document_label);

        let mut entries = self.entries.write().await;
        let base = entries
            .iter()
            .find(|e| e.is_document(&project_id, &document_label))
            .cloned()
            .ok_or_else(|| CoreError::not_found(ErrorCode::DocumentNotFound, "document not found"))?;

        let now = timestamp_now();
        let mut annotations = base.annotations.clone();
        annotations.extend(request.annotations);

        let mut entry = HistoryEntry {
            task_id: uuid::Uuid::new_v4().simple().to_string(),
            state: base.state,
            created_at: now.clone(),
            started_at: Some(now.clone()),
            finished_at: Some(now),
            viewer_url: base.viewer_url.clone(),
            error: base.error.clone(),
            error_code: base.error_code,
            project_id,
            document_label,
            owner: request
                .owner
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| base.owner.clone()),
            tags: request
                .tags
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| base.tags.clone()),
            revision_note: request
                .revision_note
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| base.revision_note.clone()),
            annotations,
            event: EventKind::Annotation,
        };
        entry.normalize();
        self.insert_locked(&mut entries, entry.clone()).await;

        tracing::info!(
            task_id = %entry.task_id,
            project_id = %entry.project_id,
            document_label = %entry.document_label,
            annotation_count = entry.annotations.len(),
            "Annotation recorded",
        );
        Ok(entry)
    }
}
