//! Immutable configuration of a conversion task.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::document_id::encode_document_id;
use crate::error::{CoreError, ErrorCode};
use crate::parsing::parse_csv;
use crate::types::{normalize_document_label, normalize_project_id};

/// Artifact families the converter can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Json,
    Gltf,
    Meta,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Json => "json",
            OutputKind::Gltf => "gltf",
            OutputKind::Meta => "meta",
        }
    }

    /// Parse a comma-separated `emit` field. Duplicates collapse; an empty
    /// field yields an empty list (converter default).
    pub fn parse_list(value: &str) -> Result<Vec<OutputKind>, CoreError> {
        let mut kinds = Vec::new();
        for item in parse_csv(value) {
            let kind = match item.to_ascii_lowercase().as_str() {
                "json" => OutputKind::Json,
                "gltf" => OutputKind::Gltf,
                "meta" => OutputKind::Meta,
                other => {
                    return Err(CoreError::validation(
                        ErrorCode::InvalidBody,
                        format!("unknown emit kind '{other}' (expected json, gltf, meta)"),
                    ))
                }
            };
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

/// How emitted artifacts are named on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    #[default]
    Legacy,
    ContentHash,
    Both,
}

impl NamingMode {
    /// Map the `hash_names` / `keep_legacy_names` flag pair onto a mode.
    ///
    /// Keeping legacy names is only meaningful alongside hashed names.
    pub fn from_flags(hash_names: bool, keep_legacy_names: bool) -> Self {
        match (hash_names, keep_legacy_names) {
            (true, true) => NamingMode::Both,
            (true, false) => NamingMode::ContentHash,
            (false, _) => NamingMode::Legacy,
        }
    }
}

/// Patch the produced document record to a schema version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMigration {
    /// Target schema version; `0` lets the migrator pick the latest.
    pub target: u32,
    pub backup: bool,
}

/// Validate the produced document record, optionally against a schema file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentValidation {
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub plugin: PathBuf,
    pub input_path: PathBuf,
    /// Per-task run directory under the output root; parent of input and output.
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub emit: Vec<OutputKind>,
    pub naming: NamingMode,
    pub convert_cli: Option<PathBuf>,
    pub migration: Option<DocumentMigration>,
    pub validation: Option<DocumentValidation>,
    pub project_id: String,
    pub document_label: String,
    pub owner: String,
    pub tags: Vec<String>,
    pub revision_note: String,
    pub annotations: Vec<Annotation>,
}

impl TaskConfig {
    pub fn project_id(&self) -> String {
        normalize_project_id(&self.project_id)
    }

    pub fn document_label(&self) -> String {
        normalize_document_label(&self.document_label)
    }

    pub fn document_id(&self) -> String {
        encode_document_id(&self.project_id(), &self.document_label())
    }

    /// Requested kinds joined with commas, as the converter expects.
    pub fn emit_list(&self) -> String {
        self.emit
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}
