//! Lenient parsing of loosely-typed request fields.

use serde_json::Value;

/// `1`, `true`, `yes`, `y` and `on` (any case) are true; anything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Split on commas, trimming items and dropping empty ones.
pub fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Like [`parse_csv`] but also accepts `;` as a separator.
pub fn parse_tags(value: &str) -> Vec<String> {
    parse_csv(&value.replace(';', ","))
}

/// Tags stored in history may be a list or a separator-joined string.
pub fn normalize_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => parse_tags(s),
        _ => Vec::new(),
    }
}

/// Lowercase and ensure a leading dot: `DXF` becomes `.dxf`.
pub fn normalize_extension(value: &str) -> String {
    let ext = value.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
