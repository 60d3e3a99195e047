//! Task status polling.

use axum::extract::{Path, State};
use axum::Json;
use plm_converter::ConversionResult;
use plm_core::error::{CoreError, ErrorCode};
use plm_core::types::TaskState;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::RequireAuth;
use crate::state::AppState;

/// `GET /status/{task_id}` payload. A finished task carries its conversion
/// result inline; a failed one carries `error` and `error_code`.
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub status: &'static str,
    pub task_id: String,
    pub state: TaskState,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub status_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(flatten)]
    pub result: Option<ConversionResult>,
}

/// GET /status/{task_id}
pub async fn get_status(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> AppResult<Json<TaskStatusResponse>> {
    let task = state
        .tasks
        .get(&task_id)
        .await
        .ok_or_else(|| CoreError::not_found(ErrorCode::TaskNotFound, "task not found"))?;

    let failed = task.state == TaskState::Error;
    Ok(Json(TaskStatusResponse {
        status: "ok",
        status_url: state.tasks.status_url(&task.task_id),
        state: task.state,
        created_at: task.created_at,
        started_at: task.started_at,
        finished_at: task.finished_at,
        error: task.error.filter(|_| failed),
        error_code: task.error_code.filter(|_| failed),
        result: task.result.filter(|_| task.state == TaskState::Done),
        task_id: task.task_id,
    }))
}
