//! Bearer-token authorization extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use plm_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Passes when no token is configured, or when the `Authorization` header
/// carries `Bearer <token>` matching it.
///
/// Place it first in a handler's argument list so an unauthorized request
/// is rejected before its body is inspected:
///
/// ```ignore
/// async fn protected(_auth: RequireAuth, State(state): State<AppState>) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth;

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.auth_token.as_deref() else {
            return Ok(RequireAuth);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if token == expected => Ok(RequireAuth),
            _ => {
                tracing::debug!(path = %parts.uri.path(), "Rejected unauthorized request");
                Err(AppError::Core(CoreError::Unauthorized("unauthorized".into())))
            }
        }
    }
}
