//! Free-form annotations attached to document history.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Annotation {
    pub fn new(
        message: impl Into<String>,
        author: impl Into<String>,
        created_at: impl Into<String>,
        kind: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            author: author.into(),
            created_at: created_at.into(),
            kind: kind.filter(|k| !k.trim().is_empty()),
        }
    }
}

/// Normalize a loosely-typed annotation payload.
///
/// Accepts a string, an object or a list of either. Objects may carry the
/// message as `message`, `text` or `note` and the timestamp as `created_at`
/// or `created`; a missing timestamp falls back to `fallback_time`. Entries
/// with an empty message are dropped.
pub fn normalize_annotations(value: &Value, fallback_time: &str) -> Vec<Annotation> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| normalize_one(item, fallback_time))
            .collect(),
        other => normalize_one(other, fallback_time).into_iter().collect(),
    }
}

fn normalize_one(item: &Value, fallback_time: &str) -> Option<Annotation> {
    let annotation = match item {
        Value::Object(map) => {
            let field = |keys: &[&str]| -> String {
                keys.iter()
                    .filter_map(|k| map.get(*k))
                    .map(value_text)
                    .find(|s| !s.is_empty())
                    .unwrap_or_default()
            };
            let created_at = field(&["created_at", "created"]);
            let kind = field(&["kind"]);
            Annotation::new(
                field(&["message", "text", "note"]),
                field(&["author"]),
                if created_at.is_empty() {
                    fallback_time.trim().to_string()
                } else {
                    created_at
                },
                Some(kind),
            )
        }
        Value::Null => return None,
        other => Annotation::new(value_text(other), "", fallback_time.trim(), None),
    };
    if annotation.message.is_empty() {
        None
    } else {
        Some(annotation)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
