use serde::{Deserialize, Serialize};

/// Machine-readable error codes returned in every error payload.
///
/// Serialized in `SCREAMING_SNAKE_CASE`; the string form is part of the
/// wire contract and is also advertised by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthRequired,
    BadContentLength,
    EmptyRequest,
    PayloadTooLarge,
    InvalidBody,
    MissingFile,
    MissingPlugin,
    MissingProjectId,
    MissingDocumentIdentity,
    MissingAnnotations,
    InvalidAnnotationsJson,
    InvalidDocumentId,
    InvalidDocumentTarget,
    PluginNotFound,
    PluginNotAllowed,
    ConvertCliNotFound,
    ConvertCliNotAllowed,
    DocumentSchemaNotFound,
    DocumentSchemaNotAllowed,
    DocumentNotFound,
    QueueFull,
    TaskNotFound,
    UnknownEndpoint,
    ConvertFailed,
    ConvertException,
    ManifestMissing,
    InternalError,
}

impl ErrorCode {
    /// Every code a client may observe, in documentation order.
    pub const ALL: [ErrorCode; 27] = [
        ErrorCode::AuthRequired,
        ErrorCode::BadContentLength,
        ErrorCode::EmptyRequest,
        ErrorCode::PayloadTooLarge,
        ErrorCode::InvalidBody,
        ErrorCode::MissingFile,
        ErrorCode::MissingPlugin,
        ErrorCode::MissingProjectId,
        ErrorCode::MissingDocumentIdentity,
        ErrorCode::MissingAnnotations,
        ErrorCode::InvalidAnnotationsJson,
        ErrorCode::InvalidDocumentId,
        ErrorCode::InvalidDocumentTarget,
        ErrorCode::PluginNotFound,
        ErrorCode::PluginNotAllowed,
        ErrorCode::ConvertCliNotFound,
        ErrorCode::ConvertCliNotAllowed,
        ErrorCode::DocumentSchemaNotFound,
        ErrorCode::DocumentSchemaNotAllowed,
        ErrorCode::DocumentNotFound,
        ErrorCode::QueueFull,
        ErrorCode::TaskNotFound,
        ErrorCode::UnknownEndpoint,
        ErrorCode::ConvertFailed,
        ErrorCode::ConvertException,
        ErrorCode::ManifestMissing,
        ErrorCode::InternalError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::BadContentLength => "BAD_CONTENT_LENGTH",
            ErrorCode::EmptyRequest => "EMPTY_REQUEST",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::InvalidBody => "INVALID_BODY",
            ErrorCode::MissingFile => "MISSING_FILE",
            ErrorCode::MissingPlugin => "MISSING_PLUGIN",
            ErrorCode::MissingProjectId => "MISSING_PROJECT_ID",
            ErrorCode::MissingDocumentIdentity => "MISSING_DOCUMENT_IDENTITY",
            ErrorCode::MissingAnnotations => "MISSING_ANNOTATIONS",
            ErrorCode::InvalidAnnotationsJson => "INVALID_ANNOTATIONS_JSON",
            ErrorCode::InvalidDocumentId => "INVALID_DOCUMENT_ID",
            ErrorCode::InvalidDocumentTarget => "INVALID_DOCUMENT_TARGET",
            ErrorCode::PluginNotFound => "PLUGIN_NOT_FOUND",
            ErrorCode::PluginNotAllowed => "PLUGIN_NOT_ALLOWED",
            ErrorCode::ConvertCliNotFound => "CONVERT_CLI_NOT_FOUND",
            ErrorCode::ConvertCliNotAllowed => "CONVERT_CLI_NOT_ALLOWED",
            ErrorCode::DocumentSchemaNotFound => "DOCUMENT_SCHEMA_NOT_FOUND",
            ErrorCode::DocumentSchemaNotAllowed => "DOCUMENT_SCHEMA_NOT_ALLOWED",
            ErrorCode::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            ErrorCode::QueueFull => "QUEUE_FULL",
            ErrorCode::TaskNotFound => "TASK_NOT_FOUND",
            ErrorCode::UnknownEndpoint => "UNKNOWN_ENDPOINT",
            ErrorCode::ConvertFailed => "CONVERT_FAILED",
            ErrorCode::ConvertException => "CONVERT_EXCEPTION",
            ErrorCode::ManifestMissing => "MANIFEST_MISSING",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain errors raised while validating requests or manipulating tasks
/// and history. Each variant carries the taxonomy code the client sees.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {message}")]
    Validation { code: ErrorCode, message: String },

    #[error("Forbidden: {message}")]
    Forbidden { code: ErrorCode, message: String },

    #[error("Not found: {message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        CoreError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: ErrorCode, message: impl Into<String>) -> Self {
        CoreError::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        CoreError::NotFound {
            code,
            message: message.into(),
        }
    }

    /// The taxonomy code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Unauthorized(_) => ErrorCode::AuthRequired,
            CoreError::Validation { code, .. }
            | CoreError::Forbidden { code, .. }
            | CoreError::NotFound { code, .. } => *code,
            CoreError::PayloadTooLarge(_) => ErrorCode::PayloadTooLarge,
            CoreError::Capacity(_) => ErrorCode::QueueFull,
            CoreError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// The client-facing message, without the variant prefix used by `Display`.
    pub fn message(&self) -> &str {
        match self {
            CoreError::Unauthorized(m)
            | CoreError::PayloadTooLarge(m)
            | CoreError::Capacity(m)
            | CoreError::Internal(m) => m,
            CoreError::Validation { message, .. }
            | CoreError::Forbidden { message, .. }
            | CoreError::NotFound { message, .. } => message,
        }
    }
}
