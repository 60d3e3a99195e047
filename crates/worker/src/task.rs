use std::sync::Arc;

use plm_converter::ConversionResult;
use plm_core::error::ErrorCode;
use plm_core::task::TaskConfig;
use plm_core::types::{timestamp_now, EventKind, TaskState};
use plm_history::HistoryEntry;
use serde::Serialize;

/// Point-in-time snapshot of a task.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task_id: String,
    pub config: Arc<TaskConfig>,
    pub state: TaskState,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub result: Option<ConversionResult>,
}

impl TaskRecord {
    pub(crate) fn queued(task_id: String, config: TaskConfig) -> Self {
        Self {
            task_id,
            config: Arc::new(config),
            state: TaskState::Queued,
            created_at: timestamp_now(),
            started_at: None,
            finished_at: None,
            error: None,
            error_code: None,
            result: None,
        }
    }

    /// History entry describing this task's outcome.
    pub fn to_history_entry(&self) -> HistoryEntry {
        let config = &self.config;
        HistoryEntry {
            task_id: self.task_id.clone(),
            state: self.state,
            created_at: self.created_at.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            viewer_url: self
                .result
                .as_ref()
                .filter(|_| self.state == TaskState::Done)
                .map(|r| r.viewer_url.clone()),
            error: self.error.clone(),
            error_code: self.error_code,
            project_id: config.project_id.clone(),
            document_label: config.document_label.clone(),
            owner: config.owner.clone(),
            tags: config.tags.clone(),
            revision_note: config.revision_note.clone(),
            annotations: config.annotations.clone(),
            event: EventKind::Convert,
        }
    }
}

/// Number of registered tasks per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub error: usize,
}

impl TaskCounts {
    pub(crate) fn add(&mut self, state: TaskState) {
        match state {
            TaskState::Queued => self.queued += 1,
            TaskState::Running => self.running += 1,
            TaskState::Done => self.done += 1,
            TaskState::Error => self.error += 1,
        }
    }
}
