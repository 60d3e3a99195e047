//! Route table.
//!
//! ```text
//! GET  /health                                  liveness + process metadata (public)
//! POST /convert                                 multipart upload, enqueue conversion
//! GET  /status/{task_id}                        task snapshot
//! GET  /history                                 filtered history entries
//! GET  /projects                                per-project aggregates
//! GET  /projects/{project_id}/documents         per-document aggregates
//! GET  /documents/{document_id}/versions        versions of one document
//! POST /annotate                                append annotations
//! GET  *                                        static file under the serve root (public)
//! ```
//!
//! A known path with an unsupported method, and any path that is neither
//! routed nor a file, answers `404 UNKNOWN_ENDPOINT`.

use std::path::Path;

use axum::handler::HandlerWithoutStateExt;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::handlers::fallback::unknown_endpoint;
use crate::handlers::{annotate, convert, health, history, status};
use crate::state::AppState;

pub fn router(serve_root: &Path) -> Router<AppState> {
    let static_files = ServeDir::new(serve_root)
        .call_fallback_on_method_not_allowed(true)
        .fallback(unknown_endpoint.into_service());

    Router::new()
        .route(
            "/health",
            get(health::health_check).fallback(unknown_endpoint),
        )
        .route(
            "/convert",
            post(convert::submit_conversion).fallback(unknown_endpoint),
        )
        .route(
            "/status/{task_id}",
            get(status::get_status).fallback(unknown_endpoint),
        )
        .route(
            "/history",
            get(history::list_history).fallback(unknown_endpoint),
        )
        .route(
            "/projects",
            get(history::list_projects).fallback(unknown_endpoint),
        )
        .route(
            "/projects/{project_id}/documents",
            get(history::list_project_documents).fallback(unknown_endpoint),
        )
        .route(
            "/documents/{document_id}/versions",
            get(history::list_document_versions).fallback(unknown_endpoint),
        )
        .route(
            "/annotate",
            post(annotate::annotate_document).fallback(unknown_endpoint),
        )
        .fallback_service(static_files)
}
