use serde::{Deserialize, Serialize};

/// Stored in place of an absent project id.
pub const UNASSIGNED_PROJECT: &str = "unassigned";

/// Stored in place of an absent document label.
pub const UNTITLED_DOCUMENT: &str = "untitled";

/// Lifecycle of a conversion task: `queued -> running -> {done | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Done,
    Error,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }

    /// Parse a state name; unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "queued" => Some(TaskState::Queued),
            "running" => Some(TaskState::Running),
            "done" => Some(TaskState::Done),
            "error" => Some(TaskState::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced a history entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Convert,
    Annotation,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Convert => "convert",
            EventKind::Annotation => "annotation",
        }
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Second precision keeps lexicographic and chronological order identical,
/// which the history range filters rely on.
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Replace an empty project id with [`UNASSIGNED_PROJECT`].
pub fn normalize_project_id(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNASSIGNED_PROJECT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace an empty document label with [`UNTITLED_DOCUMENT`].
pub fn normalize_document_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNTITLED_DOCUMENT.to_string()
    } else {
        trimmed.to_string()
    }
}
