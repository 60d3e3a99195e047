//! Request bodies for `/convert` and `/annotate`.
//!
//! Both endpoints accept loosely-typed input. Raw fields are collected first,
//! then validated into typed values; validation runs to completion before
//! anything touches the filesystem or the task queue.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use plm_core::annotation::{normalize_annotations, Annotation};
use plm_core::document_id::{decode_document_id, encode_document_id};
use plm_core::error::{CoreError, ErrorCode};
use plm_core::parsing::{normalize_tags, parse_bool, parse_tags};
use plm_core::paths::is_within;
use plm_core::task::{DocumentMigration, DocumentValidation, NamingMode, OutputKind, TaskConfig};
use plm_core::types::{normalize_document_label, normalize_project_id, timestamp_now};
use plm_history::AnnotationRequest;
use serde_json::{Map, Value};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Stored name for uploads whose file name is empty after sanitizing.
pub const FALLBACK_UPLOAD_NAME: &str = "upload.bin";

/// Multipart part whose contents stand in for the `annotations` field.
const ANNOTATIONS_FILE_PART: &str = "annotations_file";

// ---------------------------------------------------------------------------
// /convert
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Base name only; directory components from the client are dropped.
    pub filename: String,
    pub data: Bytes,
}

/// Raw multipart fields of a `/convert` request.
#[derive(Debug, Default)]
pub struct ConvertForm {
    pub file: Option<UploadedFile>,
    pub annotations_file: Option<String>,
    fields: HashMap<String, String>,
}

impl ConvertForm {
    /// Drain a multipart stream. The first part carrying a file name is the
    /// upload; later file parts are ignored.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ConvertForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let filename = field.file_name().filter(|f| !f.is_empty()).map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;

            match filename {
                Some(_) if name == ANNOTATIONS_FILE_PART => {
                    form.annotations_file = Some(String::from_utf8_lossy(&data).into_owned());
                }
                Some(filename) => {
                    if form.file.is_none() {
                        form.file = Some(UploadedFile {
                            filename: sanitize_filename(&filename),
                            data,
                        });
                    }
                }
                None => {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Trimmed field value; empty when absent.
    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|v| v.trim()).unwrap_or_default()
    }

    fn flag(&self, name: &str) -> bool {
        parse_bool(self.text(name))
    }

    /// Validate every field, in the order clients observe errors:
    /// file, plugin, emit, annotations, document target, document schema,
    /// converter CLI.
    pub fn validate(mut self, config: &ServerConfig) -> Result<ConvertSubmission, CoreError> {
        let Some(file) = self.file.take() else {
            return Err(CoreError::validation(ErrorCode::MissingFile, "missing file"));
        };

        let plugin = self.select_plugin(&file.filename, config)?;
        let emit = OutputKind::parse_list(self.text("emit"))?;
        let annotations = self.annotations()?;
        let document_target = self.document_target()?;
        let document_schema = self.document_schema(config)?;
        let convert_cli = self.convert_cli(config)?;

        let migration = self.flag("migrate_document").then(|| DocumentMigration {
            target: document_target,
            backup: self.flag("document_backup"),
        });
        let validation = self
            .flag("validate_document")
            .then(|| DocumentValidation {
                schema: document_schema,
            });

        let wait = !self.flag("async") && (!self.has("wait") || self.flag("wait"));
        let wait_timeout = self
            .text("wait_timeout")
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .map(|t| t.max(0.0));

        let document_label = match self.text("document_label") {
            "" => file.filename.clone(),
            label => label.to_string(),
        };

        Ok(ConvertSubmission {
            plugin,
            emit,
            naming: NamingMode::from_flags(self.flag("hash_names"), self.flag("keep_legacy_names")),
            convert_cli,
            migration,
            validation,
            project_id: self.text("project_id").to_string(),
            document_label,
            owner: self.text("owner").to_string(),
            tags: parse_tags(self.text("tags")),
            revision_note: self.text("revision_note").to_string(),
            annotations,
            wait,
            wait_timeout,
            file,
        })
    }

    fn select_plugin(&self, filename: &str, config: &ServerConfig) -> Result<PathBuf, CoreError> {
        let plugin = match self.text("plugin") {
            "" => match config.plugin_map.for_filename(filename) {
                Some(mapped) => {
                    tracing::debug!(plugin = %mapped.display(), filename, "Auto-selected plugin");
                    Some(mapped.to_path_buf())
                }
                None => config.default_plugin.clone(),
            },
            explicit => Some(config.resolve(explicit)),
        };

        let plugin =
            plugin.ok_or_else(|| CoreError::validation(ErrorCode::MissingPlugin, "missing plugin"))?;
        if !plugin.exists() {
            return Err(CoreError::validation(ErrorCode::PluginNotFound, "plugin not found"));
        }
        if !config.plugin_allowlist.allows(&plugin) {
            return Err(CoreError::forbidden(ErrorCode::PluginNotAllowed, "plugin not allowed"));
        }
        Ok(plugin)
    }

    fn annotations(&self) -> Result<Vec<Annotation>, CoreError> {
        let now = timestamp_now();
        let raw = match self.text("annotations") {
            "" => self.annotations_file.as_deref().map(str::trim).unwrap_or_default(),
            raw => raw,
        };

        let mut annotations = if raw.is_empty() {
            Vec::new()
        } else {
            let parsed: Value = serde_json::from_str(raw).map_err(|_| {
                CoreError::validation(ErrorCode::InvalidAnnotationsJson, "invalid annotations json")
            })?;
            normalize_annotations(&parsed, &now)
        };

        if let Some(annotation) = inline_annotation(
            self.text("annotation_text"),
            self.text("annotation_author"),
            self.text("annotation_kind"),
            &now,
        ) {
            annotations.push(annotation);
        }
        Ok(annotations)
    }

    fn document_target(&self) -> Result<u32, CoreError> {
        match self.text("document_target") {
            "" => Ok(0),
            raw => raw.parse::<u32>().map_err(|_| {
                CoreError::validation(ErrorCode::InvalidDocumentTarget, "invalid document_target")
            }),
        }
    }

    fn document_schema(&self, config: &ServerConfig) -> Result<Option<PathBuf>, CoreError> {
        let raw = self.text("document_schema");
        if raw.is_empty() {
            return Ok(None);
        }
        let schema = config.resolve(raw);
        if !is_within(&schema, &config.serve_root) {
            return Err(CoreError::forbidden(
                ErrorCode::DocumentSchemaNotAllowed,
                "document_schema not allowed",
            ));
        }
        if !schema.exists() {
            return Err(CoreError::validation(
                ErrorCode::DocumentSchemaNotFound,
                "document_schema not found",
            ));
        }
        Ok(Some(schema))
    }

    fn convert_cli(&self, config: &ServerConfig) -> Result<Option<PathBuf>, CoreError> {
        let cli = match self.text("convert_cli") {
            "" => config.default_convert_cli.clone(),
            explicit => Some(config.resolve(explicit)),
        };
        let Some(cli) = cli else {
            return Ok(None);
        };
        if !cli.exists() {
            return Err(CoreError::validation(
                ErrorCode::ConvertCliNotFound,
                "convert_cli not found",
            ));
        }
        if !config.cli_allowlist.allows(&cli) {
            return Err(CoreError::forbidden(
                ErrorCode::ConvertCliNotAllowed,
                "convert_cli not allowed",
            ));
        }
        Ok(Some(cli))
    }
}

/// A fully validated `/convert` request.
#[derive(Debug, Clone)]
pub struct ConvertSubmission {
    pub file: UploadedFile,
    pub plugin: PathBuf,
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
    /// Block until the task is terminal (or the wait times out).
    pub wait: bool,
    /// Seconds; `None` uses the configured default.
    pub wait_timeout: Option<f64>,
}

impl ConvertSubmission {
    pub fn input_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join("input").join(&self.file.filename)
    }

    pub fn task_config(&self, run_dir: &Path) -> TaskConfig {
        TaskConfig {
            plugin: self.plugin.clone(),
            input_path: self.input_path(run_dir),
            work_dir: run_dir.to_path_buf(),
            output_dir: run_dir.join("output"),
            emit: self.emit.clone(),
            naming: self.naming,
            convert_cli: self.convert_cli.clone(),
            migration: self.migration.clone(),
            validation: self.validation.clone(),
            project_id: self.project_id.clone(),
            document_label: self.document_label.clone(),
            owner: self.owner.clone(),
            tags: self.tags.clone(),
            revision_note: self.revision_note.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

/// Strip directory components; empty names become [`FALLBACK_UPLOAD_NAME`].
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => FALLBACK_UPLOAD_NAME.to_string(),
        base => base.to_string(),
    }
}

fn inline_annotation(text: &str, author: &str, kind: &str, now: &str) -> Option<Annotation> {
    (!text.is_empty()).then(|| Annotation::new(text, author, now, Some(kind.to_string())))
}

// ---------------------------------------------------------------------------
// /annotate
// ---------------------------------------------------------------------------

/// Flat field map of an `/annotate` body, decoded according to its
/// content type: JSON object, urlencoded form, or multipart text fields.
///
/// Any other content type, an undecodable body or an empty map is rejected
/// with `INVALID_BODY`.
#[derive(Debug, Default)]
pub struct AnnotateBody(pub Map<String, Value>);

impl FromRequest<AppState> for AnnotateBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let invalid = || CoreError::validation(ErrorCode::InvalidBody, "invalid request body");

        let fields = if content_type.contains("application/json") {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            match serde_json::from_slice::<Value>(&body) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            }
        } else if content_type.contains("application/x-www-form-urlencoded") {
            let Form(form) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|_| invalid())?;
            form.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
        } else if content_type.contains("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|_| invalid())?;
            let mut map = Map::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                if field.file_name().is_some_and(|f| !f.is_empty()) {
                    continue;
                }
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                map.insert(name, Value::String(value));
            }
            map
        } else {
            Map::new()
        };

        if fields.is_empty() {
            return Err(invalid().into());
        }
        Ok(AnnotateBody(fields))
    }
}

/// A validated `/annotate` request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateForm {
    pub project_id: String,
    pub document_label: String,
    pub owner: Option<String>,
    pub tags: Option<Vec<String>>,
    pub revision_note: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl AnnotateForm {
    /// Resolve the document identity (`document_id`, else `project_id` +
    /// `document_label`) and collect the annotations to append.
    pub fn parse(fields: &Map<String, Value>) -> Result<Self, CoreError> {
        let text = |name: &str| fields.get(name).map(field_text).unwrap_or_default();

        let (project_id, document_label) = match text("document_id").as_str() {
            "" => (text("project_id"), text("document_label")),
            token => decode_document_id(token)?,
        };
        let (project_id, document_label) = (project_id.trim(), document_label.trim());
        if project_id.is_empty() || document_label.is_empty() {
            return Err(CoreError::validation(
                ErrorCode::MissingDocumentIdentity,
                "missing document identity",
            ));
        }

        let now = timestamp_now();
        let mut annotations = match fields.get("annotations") {
            Some(Value::String(raw)) if !raw.trim().is_empty() => {
                let parsed: Value = serde_json::from_str(raw).map_err(|_| {
                    CoreError::validation(
                        ErrorCode::InvalidAnnotationsJson,
                        "invalid annotations json",
                    )
                })?;
                normalize_annotations(&parsed, &now)
            }
            Some(Value::String(_)) | None => Vec::new(),
            Some(other) => normalize_annotations(other, &now),
        };
        if let Some(annotation) = inline_annotation(
            &text("annotation_text"),
            &text("annotation_author"),
            &text("annotation_kind"),
            &now,
        ) {
            annotations.push(annotation);
        }
        if annotations.is_empty() {
            return Err(CoreError::validation(
                ErrorCode::MissingAnnotations,
                "missing annotations",
            ));
        }

        let tags = fields.get("tags").map(normalize_tags).unwrap_or_default();
        let non_empty = |value: String| (!value.is_empty()).then_some(value);

        Ok(Self {
            project_id: normalize_project_id(project_id),
            document_label: normalize_document_label(document_label),
            owner: non_empty(text("owner")),
            tags: (!tags.is_empty()).then_some(tags),
            revision_note: non_empty(text("revision_note")),
            annotations,
        })
    }

    pub fn document_id(&self) -> String {
        encode_document_id(&self.project_id, &self.document_label)
    }

    pub fn into_request(self) -> AnnotationRequest {
        AnnotationRequest {
            project_id: self.project_id,
            document_label: self.document_label,
            annotations: self.annotations,
            owner: self.owner,
            tags: self.tags,
            revision_note: self.revision_note,
        }
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixture must be an object"),
        }
    }

    fn config_for(root: &Path, extra: &[&str]) -> ServerConfig {
        use clap::Parser;

        let root = root.to_string_lossy().to_string();
        let mut argv = vec!["plm-router", "--serve-root", root.as_str()];
        argv.extend_from_slice(extra);
        ServerConfig::from_args(crate::cli::RouterArgs::try_parse_from(argv).unwrap())
    }

    fn upload(name: &str) -> ConvertForm {
        ConvertForm {
            file: Some(UploadedFile {
                filename: name.to_string(),
                data: Bytes::from_static(b"0\nSECTION\n"),
            }),
            ..Default::default()
        }
    }

    fn code_of(result: Result<ConvertSubmission, CoreError>) -> ErrorCode {
        result.map(|_| ()).unwrap_err().code()
    }

    #[test]
    fn convert_requires_file_then_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), &[]);

        let no_file = ConvertForm::default().with_field("plugin", "x.so");
        assert_eq!(code_of(no_file.validate(&config)), ErrorCode::MissingFile);
        assert_eq!(code_of(upload("a.dxf").validate(&config)), ErrorCode::MissingPlugin);
        assert_eq!(
            code_of(upload("a.dxf").with_field("plugin", "missing.so").validate(&config)),
            ErrorCode::PluginNotFound
        );
    }

    #[test]
    fn convert_uses_mapped_plugin_and_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dxf.so"), b"").unwrap();
        let config = config_for(dir.path(), &["--plugin-map", ".dxf=dxf.so"]);

        let submission = upload("plan.DXF")
            .with_field("emit", "json,gltf")
            .with_field("tags", "a;b")
            .with_field("annotation_text", "first pass")
            .validate(&config)
            .unwrap();
        assert!(submission.plugin.ends_with("dxf.so"));
        assert_eq!(submission.emit, vec![OutputKind::Json, OutputKind::Gltf]);
        assert_eq!(submission.document_label, "plan.DXF");
        assert_eq!(submission.tags, vec!["a", "b"]);
        assert_eq!(submission.annotations.len(), 1);
        assert!(submission.wait);
        assert!(submission.wait_timeout.is_none());
        assert!(submission.migration.is_none());

        let run_dir = dir.path().join("run");
        let task = submission.task_config(&run_dir);
        assert_eq!(task.input_path, run_dir.join("input").join("plan.DXF"));
        assert_eq!(task.output_dir, run_dir.join("output"));
    }

    #[test]
    fn convert_flags_and_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p.so"), b"").unwrap();
        let config = config_for(dir.path(), &["--default-plugin", "p.so"]);

        let submission = upload("a.dxf")
            .with_field("async", "1")
            .with_field("wait_timeout", "-2")
            .with_field("migrate_document", "yes")
            .with_field("document_target", "3")
            .validate(&config)
            .unwrap();
        assert!(!submission.wait);
        assert_eq!(submission.wait_timeout, Some(0.0));
        assert_eq!(
            submission.migration,
            Some(DocumentMigration {
                target: 3,
                backup: false
            })
        );

        let submission = upload("a.dxf")
            .with_field("wait", "false")
            .with_field("wait_timeout", "soon")
            .validate(&config)
            .unwrap();
        assert!(!submission.wait);
        assert!(submission.wait_timeout.is_none());
    }

    #[test]
    fn convert_field_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p.so"), b"").unwrap();
        let config = config_for(dir.path(), &["--default-plugin", "p.so"]);

        let cases = [
            ("emit", "json,obj", ErrorCode::InvalidBody),
            ("annotations", "{oops", ErrorCode::InvalidAnnotationsJson),
            ("document_target", "-1", ErrorCode::InvalidDocumentTarget),
            ("document_target", "two", ErrorCode::InvalidDocumentTarget),
            ("document_schema", "../outside.json", ErrorCode::DocumentSchemaNotAllowed),
            ("document_schema", "schema.json", ErrorCode::DocumentSchemaNotFound),
            ("convert_cli", "nope.py", ErrorCode::ConvertCliNotFound),
        ];
        for (field, value, expected) in cases {
            let result = upload("a.dxf").with_field(field, value).validate(&config);
            assert_eq!(code_of(result), expected, "{field}={value}");
        }
    }

    #[test]
    fn convert_enforces_allowlists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("plugins")).unwrap();
        std::fs::write(dir.path().join("p.so"), b"").unwrap();
        std::fs::write(dir.path().join("cli.py"), b"").unwrap();
        let config = config_for(
            dir.path(),
            &["--plugin-allowlist", "plugins", "--cli-allowlist", "plugins"],
        );

        let result = upload("a.dxf").with_field("plugin", "p.so").validate(&config);
        assert_eq!(code_of(result), ErrorCode::PluginNotAllowed);

        std::fs::write(dir.path().join("plugins/ok.so"), b"").unwrap();
        let result = upload("a.dxf")
            .with_field("plugin", "plugins/ok.so")
            .with_field("convert_cli", "cli.py")
            .validate(&config);
        assert_eq!(code_of(result), ErrorCode::ConvertCliNotAllowed);
    }

    #[test]
    fn sanitize_keeps_base_name_only() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\drawings\\plan.dxf"), "plan.dxf");
        assert_eq!(sanitize_filename("dir/"), FALLBACK_UPLOAD_NAME);
        assert_eq!(sanitize_filename(".."), FALLBACK_UPLOAD_NAME);
    }

    #[test]
    fn annotate_resolves_identity_from_document_id() {
        let token = encode_document_id("proj", "plan.dxf");
        let form = AnnotateForm::parse(&fields(json!({
            "document_id": token,
            "annotation_text": "checked",
            "annotation_author": "kim",
        })))
        .unwrap();
        assert_eq!(form.project_id, "proj");
        assert_eq!(form.document_label, "plan.dxf");
        assert_eq!(form.annotations.len(), 1);
        assert_eq!(form.annotations[0].author, "kim");
        assert_eq!(form.document_id(), encode_document_id("proj", "plan.dxf"));
        assert!(form.owner.is_none());
        assert!(form.tags.is_none());
    }

    #[test]
    fn annotate_accepts_annotation_lists_and_json_strings() {
        let form = AnnotateForm::parse(&fields(json!({
            "project_id": "p",
            "document_label": "d",
            "annotations": [{"message": "one"}, "two"],
            "tags": "a;b",
            "owner": "lee",
        })))
        .unwrap();
        assert_eq!(form.annotations.len(), 2);
        assert_eq!(form.tags, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(form.owner.as_deref(), Some("lee"));

        let form = AnnotateForm::parse(&fields(json!({
            "project_id": "p",
            "document_label": "d",
            "annotations": "[{\"text\": \"three\"}]",
        })))
        .unwrap();
        assert_eq!(form.annotations[0].message, "three");
    }

    #[test]
    fn annotate_validation_errors() {
        assert_matches!(
            AnnotateForm::parse(&fields(json!({"document_id": "%%%", "annotation_text": "x"}))),
            Err(CoreError::Validation {
                code: ErrorCode::InvalidDocumentId,
                ..
            })
        );
        assert_matches!(
            AnnotateForm::parse(&fields(json!({"project_id": "p", "annotation_text": "x"}))),
            Err(CoreError::Validation {
                code: ErrorCode::MissingDocumentIdentity,
                ..
            })
        );
        assert_matches!(
            AnnotateForm::parse(&fields(json!({
                "project_id": "p",
                "document_label": "d",
                "annotations": "{not json",
            }))),
            Err(CoreError::Validation {
                code: ErrorCode::InvalidAnnotationsJson,
                ..
            })
        );
        assert_matches!(
            AnnotateForm::parse(&fields(json!({"project_id": "p", "document_label": "d"}))),
            Err(CoreError::Validation {
                code: ErrorCode::MissingAnnotations,
                ..
            })
        );
    }
}
