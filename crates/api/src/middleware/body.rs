//! `Content-Length` guard for POST endpoints.

use axum::extract::FromRequestParts;
use axum::http::header::CONTENT_LENGTH;
use axum::http::request::Parts;
use plm_core::error::{CoreError, ErrorCode};

use crate::error::AppError;
use crate::state::AppState;

/// Declared body length, validated against the configured upload limit.
///
/// - unparsable header: `400 BAD_CONTENT_LENGTH`
/// - missing or zero: `400 EMPTY_REQUEST`
/// - above `max_bytes` (when non-zero): `413 PAYLOAD_TOO_LARGE`
#[derive(Debug, Clone, Copy)]
pub struct ContentLength(pub u64);

impl FromRequestParts<AppState> for ContentLength {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let length = check_content_length(
            parts.headers.get(CONTENT_LENGTH).map(|v| v.as_bytes()),
            state.config.max_bytes,
        )?;
        Ok(ContentLength(length))
    }
}

fn check_content_length(header: Option<&[u8]>, max_bytes: u64) -> Result<u64, CoreError> {
    let length = match header {
        None => 0,
        Some(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                CoreError::validation(ErrorCode::BadContentLength, "invalid content length")
            })?,
    };
    if length <= 0 {
        return Err(CoreError::validation(ErrorCode::EmptyRequest, "empty request"));
    }
    let length = length as u64;
    if max_bytes > 0 && length > max_bytes {
        return Err(CoreError::PayloadTooLarge("payload too large".into()));
    }
    Ok(length)
}
