//! Subprocess-backed [`Converter`].

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use plm_core::task::{NamingMode, TaskConfig};
use serde_json::Value;

use crate::urls::{file_url, relative_url_path};
use crate::{ConversionResult, ConvertError, Converter, MANIFEST_FILE};

/// Default location of the web viewer, relative to the serve root.
pub const DEFAULT_VIEWER_PATH: &str = "tools/web_viewer/index.html";

/// Runs `program [leading args] --plugin .. --input .. --out ..` and reads
/// the manifest it leaves behind.
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    program: PathBuf,
    leading_args: Vec<String>,
    serve_root: PathBuf,
    base_url: String,
    viewer_path: String,
}

impl ProcessConverter {
    /// `serve_root` is the directory the HTTP layer serves statically;
    /// artifact URLs are computed relative to it.
    pub fn new(
        program: impl Into<PathBuf>,
        serve_root: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            serve_root: serve_root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            viewer_path: DEFAULT_VIEWER_PATH.to_string(),
        }
    }

    /// Arguments placed before the generated flags, e.g. a script path.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn with_viewer_path(mut self, viewer_path: impl Into<String>) -> Self {
        self.viewer_path = viewer_path.into().trim_start_matches('/').to_string();
        self
    }

    /// Full argument list for `config`, excluding the program itself.
    pub fn command_args(&self, config: &TaskConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        let mut flag = |name: &str, value: Option<OsString>| {
            args.push(name.into());
            if let Some(value) = value {
                args.push(value);
            }
        };

        flag("--plugin", Some(config.plugin.clone().into_os_string()));
        flag("--input", Some(config.input_path.clone().into_os_string()));
        flag("--out", Some(config.output_dir.clone().into_os_string()));
        flag("--project-id", Some(config.project_id().into()));
        flag("--document-label", Some(config.document_label().into()));
        flag("--document-id", Some(config.document_id().into()));
        if !config.emit.is_empty() {
            flag("--emit", Some(config.emit_list().into()));
        }
        match config.naming {
            NamingMode::Legacy => {}
            NamingMode::ContentHash => flag("--hash-names", None),
            NamingMode::Both => {
                flag("--hash-names", None);
                flag("--keep-legacy-names", None);
            }
        }
        if let Some(cli) = &config.convert_cli {
            flag("--convert-cli", Some(cli.clone().into_os_string()));
        }
        if let Some(migration) = &config.migration {
            flag("--migrate-document", None);
            if migration.target > 0 {
                flag("--document-target", Some(migration.target.to_string().into()));
            }
            if migration.backup {
                flag("--document-backup", None);
            }
        }
        if let Some(validation) = &config.validation {
            flag("--validate-document", None);
            if let Some(schema) = &validation.schema {
                flag("--document-schema", Some(schema.clone().into_os_string()));
            }
        }
        args
    }

    fn viewer_url(&self, manifest_path: &Path, config: &TaskConfig) -> String {
        format!(
            "{}/{}?manifest={}&project_id={}&document_label={}&document_id={}",
            self.base_url,
            self.viewer_path,
            relative_url_path(&self.serve_root, manifest_path),
            urlencoding::encode(&config.project_id()),
            urlencoding::encode(&config.document_label()),
            urlencoding::encode(&config.document_id()),
        )
    }
}

#[async_trait]
impl Converter for ProcessConverter {
    async fn convert(&self, config: &TaskConfig) -> Result<ConversionResult, ConvertError> {
        let args = self.command_args(config);
        tracing::debug!(program = %self.program.display(), ?args, "Running converter");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .current_dir(&self.serve_root)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ConvertError::Exception(format!(
                    "failed to run converter {}: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(exit_code = ?output.status.code(), %stderr, "Converter failed");
            return Err(ConvertError::Failed(if stderr.is_empty() {
                "conversion failed".to_string()
            } else {
                stderr
            }));
        }

        let manifest_path = config.output_dir.join(MANIFEST_FILE);
        let manifest = load_manifest(&manifest_path)
            .await
            .ok_or(ConvertError::ManifestMissing)?;

        let artifact_urls: BTreeMap<String, String> = manifest
            .get("artifacts")
            .and_then(Value::as_object)
            .map(|artifacts| {
                artifacts
                    .iter()
                    .filter_map(|(key, name)| {
                        let name = name.as_str()?;
                        let url = file_url(
                            &self.base_url,
                            &self.serve_root,
                            &config.output_dir.join(name),
                        );
                        Some((key.clone(), url))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ConversionResult {
            document_id: config.document_id(),
            viewer_url: self.viewer_url(&manifest_path, config),
            manifest,
            manifest_path: manifest_path.display().to_string(),
            artifact_urls,
            output_dir: config.output_dir.display().to_string(),
        })
    }
}

/// A manifest must be a non-empty JSON object.
async fn load_manifest(path: &Path) -> Option<Value> {
    let raw = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice::<Value>(&raw).ok()? {
        Value::Object(map) if !map.is_empty() => Some(Value::Object(map)),
        _ => None,
    }
}
