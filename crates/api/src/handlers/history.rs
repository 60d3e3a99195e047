//! Read-only views over the execution history.
//!
//! Every endpoint accepts the same filter set (see [`ListQuery`]) and
//! answers with a [`ListResponse`].

use axum::extract::{Path, State};
use axum::Json;
use plm_core::document_id::decode_document_id;
use plm_core::error::{CoreError, ErrorCode};
use plm_history::{DocumentSummary, HistoryEntry, ProjectSummary};

use crate::error::AppResult;
use crate::middleware::auth::RequireAuth;
use crate::query::ListQuery;
use crate::response::ListResponse;
use crate::state::AppState;

/// GET /history
pub async fn list_history(
    _auth: RequireAuth,
    State(state): State<AppState>,
    query: ListQuery,
) -> AppResult<Json<ListResponse<HistoryEntry>>> {
    let items = state.history.list(&query.to_filter(), query.limit()).await;
    Ok(Json(ListResponse::new(items)))
}

/// GET /projects
pub async fn list_projects(
    _auth: RequireAuth,
    State(state): State<AppState>,
    query: ListQuery,
) -> AppResult<Json<ListResponse<ProjectSummary>>> {
    let items = state
        .history
        .projects(&query.to_filter(), query.limit())
        .await;
    Ok(Json(ListResponse::new(items)))
}

/// GET /projects/{project_id}/documents
///
/// A blank project segment fails with `MISSING_PROJECT_ID`.
pub async fn list_project_documents(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    query: ListQuery,
) -> AppResult<Json<ListResponse<DocumentSummary>>> {
    if project_id.trim().is_empty() {
        return Err(CoreError::validation(ErrorCode::MissingProjectId, "missing project id").into());
    }
    let items = state
        .history
        .documents(&project_id, &query.to_filter(), query.limit())
        .await;
    Ok(Json(ListResponse::new(items)))
}

/// GET /documents/{document_id}/versions
///
/// Fails with `INVALID_DOCUMENT_ID` when the token does not decode.
pub async fn list_document_versions(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    query: ListQuery,
) -> AppResult<Json<ListResponse<HistoryEntry>>> {
    let (project_id, document_label) = decode_document_id(&document_id)?;
    let items = state
        .history
        .versions(
            &project_id,
            &document_label,
            &query.to_filter(),
            query.limit(),
        )
        .await;
    Ok(Json(ListResponse::new(items)))
}
