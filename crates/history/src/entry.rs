use plm_core::annotation::{normalize_annotations, Annotation};
use plm_core::error::ErrorCode;
use plm_core::parsing::normalize_tags;
use plm_core::types::{normalize_document_label, normalize_project_id, EventKind, TaskState};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Immutable record of a task outcome or annotation event.
///
/// Deserialization is tolerant of older or hand-edited history files: tags
/// may be a joined string, annotations may be bare strings, and missing
/// metadata falls back to empty values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub viewer_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub project_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub document_label: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub owner: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub revision_note: String,
    #[serde(default, deserialize_with = "lenient_annotations")]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub event: EventKind,
}

impl HistoryEntry {
    /// Apply identity sentinels and backfill annotation timestamps.
    pub fn normalize(&mut self) {
        self.project_id = normalize_project_id(&self.project_id);
        self.document_label = normalize_document_label(&self.document_label);
        for annotation in &mut self.annotations {
            if annotation.created_at.is_empty() {
                annotation.created_at = self.created_at.clone();
            }
        }
    }

    pub fn is_document(&self, project_id: &str, document_label: &str) -> bool {
        self.project_id == project_id && self.document_label == document_label
    }

    pub fn latest_annotation(&self) -> Option<&Annotation> {
        self.annotations.last()
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(normalize_tags(&Value::deserialize(deserializer)?))
}

fn lenient_annotations<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Annotation>, D::Error> {
    Ok(normalize_annotations(&Value::deserialize(deserializer)?, ""))
}
