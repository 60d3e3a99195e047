use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use plm_core::error::{CoreError, ErrorCode};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Every variant renders as `{"status": "error", "message", "error_code"}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `plm_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A malformed request body or multipart stream.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No route matches the request.
    #[error("unknown endpoint")]
    UnknownEndpoint,

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Core(core) => core.code(),
            AppError::BadRequest(_) => ErrorCode::InvalidBody,
            AppError::UnknownEndpoint => ErrorCode::UnknownEndpoint,
            AppError::InternalError(_) => ErrorCode::InternalError,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Core(core) => match core {
                CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
                CoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                CoreError::Capacity(_) => StatusCode::TOO_MANY_REQUESTS,
                CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownEndpoint => StatusCode::NOT_FOUND,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Core(CoreError::Internal(msg)) | AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "an internal error occurred".to_string()
            }
            AppError::Core(core) => core.message().to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::UnknownEndpoint => "unknown endpoint".to_string(),
        };

        let body = json!({
            "status": "error",
            "message": message,
            "error_code": self.code(),
        });

        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
