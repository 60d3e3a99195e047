//! Aggregate views derived from the history log at query time.
//!
//! Each builder makes a single pass over a most-recent-first snapshot, so
//! the first entry seen for a key supplies its "latest" fields and keys keep
//! first-seen order.

use std::collections::HashSet;

use indexmap::IndexMap;
use plm_core::annotation::Annotation;
use plm_core::document_id::encode_document_id;
use plm_core::types::TaskState;
use serde::Serialize;

use crate::entry::HistoryEntry;
use crate::filter::HistoryFilter;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub latest_task_id: String,
    pub latest_state: TaskState,
    pub last_activity: String,
    pub owner: String,
    pub tags: Vec<String>,
    pub revision_note: String,
    pub annotation_count: usize,
    pub latest_annotation: Option<Annotation>,
    /// Distinct document labels observed for the project.
    pub document_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub document_label: String,
    pub project_id: String,
    pub latest_task_id: String,
    pub latest_state: TaskState,
    pub last_activity: String,
    pub latest_viewer_url: Option<String>,
    pub owner: String,
    pub tags: Vec<String>,
    pub revision_note: String,
    pub annotation_count: usize,
    pub latest_annotation: Option<Annotation>,
    /// Matching history entries for the document.
    pub version_count: usize,
}

pub(crate) fn build_projects(
    entries: &[HistoryEntry],
    filter: &HistoryFilter,
    limit: usize,
) -> Vec<ProjectSummary> {
    let mut projects: IndexMap<String, (ProjectSummary, HashSet<String>)> = IndexMap::new();
    for entry in entries.iter().filter(|e| filter.matches(e)) {
        let (_, labels) = projects
            .entry(entry.project_id.clone())
            .or_insert_with(|| {
                let summary = ProjectSummary {
                    project_id: entry.project_id.clone(),
                    latest_task_id: entry.task_id.clone(),
                    latest_state: entry.state,
                    last_activity: entry.created_at.clone(),
                    owner: entry.owner.clone(),
                    tags: entry.tags.clone(),
                    revision_note: entry.revision_note.clone(),
                    annotation_count: entry.annotations.len(),
                    latest_annotation: entry.latest_annotation().cloned(),
                    document_count: 0,
                };
                (summary, HashSet::new())
            });
        labels.insert(entry.document_label.clone());
    }

    projects
        .into_values()
        .map(|(mut summary, labels)| {
            summary.document_count = labels.len();
            summary
        })
        .take(cap(limit))
        .collect()
}

pub(crate) fn build_documents(
    entries: &[HistoryEntry],
    project_id: &str,
    filter: &HistoryFilter,
    limit: usize,
) -> Vec<DocumentSummary> {
    let mut documents: IndexMap<String, DocumentSummary> = IndexMap::new();
    for entry in entries
        .iter()
        .filter(|e| e.project_id == project_id && filter.matches(e))
    {
        let document_id = encode_document_id(&entry.project_id, &entry.document_label);
        let summary = documents
            .entry(document_id.clone())
            .or_insert_with(|| DocumentSummary {
                document_id,
                document_label: entry.document_label.clone(),
                project_id: entry.project_id.clone(),
                latest_task_id: entry.task_id.clone(),
                latest_state: entry.state,
                last_activity: entry.created_at.clone(),
                latest_viewer_url: entry.viewer_url.clone(),
                owner: entry.owner.clone(),
                tags: entry.tags.clone(),
                revision_note: entry.revision_note.clone(),
                annotation_count: entry.annotations.len(),
                latest_annotation: entry.latest_annotation().cloned(),
                version_count: 0,
            });
        summary.version_count += 1;
    }

    documents.into_values().take(cap(limit)).collect()
}

pub(crate) fn build_versions(
    entries: &[HistoryEntry],
    project_id: &str,
    document_label: &str,
    filter: &HistoryFilter,
    limit: usize,
) -> Vec<HistoryEntry> {
    entries
        .iter()
        .filter(|e| e.is_document(project_id, document_label) && filter.matches(e))
        .take(cap(limit))
        .cloned()
        .collect()
}

/// `0` means unbounded.
pub(crate) fn cap(limit: usize) -> usize {
    if limit == 0 {
        usize::MAX
    } else {
        limit
    }
}
