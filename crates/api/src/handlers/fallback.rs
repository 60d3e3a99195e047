use crate::error::AppError;

/// Any route or method the gateway does not serve.
pub async fn unknown_endpoint() -> AppError {
    AppError::UnknownEndpoint
}
