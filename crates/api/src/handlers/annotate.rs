//! `POST /annotate`: append annotations to a document's history.

use axum::extract::State;
use axum::Json;
use plm_history::HistoryEntry;
use serde::Serialize;

use crate::error::AppResult;
use crate::forms::{AnnotateBody, AnnotateForm};
use crate::middleware::auth::RequireAuth;
use crate::middleware::body::ContentLength;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnnotateResponse {
    pub status: &'static str,
    pub document_id: String,
    /// The new annotation event.
    pub entry: HistoryEntry,
}

/// POST /annotate
///
/// Accepts JSON, urlencoded or multipart bodies. The document must already
/// have a history entry (`404 DOCUMENT_NOT_FOUND` otherwise).
pub async fn annotate_document(
    _auth: RequireAuth,
    _length: ContentLength,
    State(state): State<AppState>,
    AnnotateBody(fields): AnnotateBody,
) -> AppResult<Json<AnnotateResponse>> {
    let form = AnnotateForm::parse(&fields)?;
    let document_id = form.document_id();
    let entry = state.history.add_annotation(form.into_request()).await?;

    tracing::debug!(document_id = %document_id, task_id = %entry.task_id, "Document annotated");
    Ok(Json(AnnotateResponse {
        status: "ok",
        document_id,
        entry,
    }))
}
