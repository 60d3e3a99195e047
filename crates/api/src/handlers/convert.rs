//! Upload submission: `POST /convert`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use plm_converter::ConversionResult;
use plm_core::error::{CoreError, ErrorCode};
use plm_core::types::TaskState;
use plm_worker::TaskRecord;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::forms::{ConvertForm, ConvertSubmission};
use crate::middleware::auth::RequireAuth;
use crate::middleware::body::ContentLength;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Accepted, pending and finished submissions share this shape; the
/// conversion result is merged in once the task is done.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub status: &'static str,
    pub task_id: String,
    pub state: TaskState,
    pub status_url: String,
    #[serde(flatten)]
    pub result: Option<ConversionResult>,
}

/// Synchronous submission whose task failed.
#[derive(Debug, Serialize)]
pub struct ConvertFailure {
    pub status: &'static str,
    pub message: String,
    pub error: String,
    pub error_code: ErrorCode,
    pub task_id: String,
    pub state: TaskState,
    pub status_url: String,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /convert
///
/// Validates the multipart form, stages the upload in a fresh run
/// directory and enqueues a task. Answers `202` immediately for
/// asynchronous submissions, otherwise waits for the task to finish and
/// degrades to `202` when the wait times out.
pub async fn submit_conversion(
    _auth: RequireAuth,
    ContentLength(length): ContentLength,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let form = match multipart {
        Ok(multipart) => ConvertForm::from_multipart(multipart).await?,
        // A body that is not multipart carries no file.
        Err(_) => ConvertForm::default(),
    };
    let submission = form.validate(&state.config)?;

    let run_dir = make_run_dir(&state.config.out_root)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create run directory: {e}")))?;
    if let Err(e) = stage_upload(&submission, &run_dir).await {
        remove_run_dir(&run_dir).await;
        return Err(AppError::InternalError(format!("Failed to store upload: {e}")));
    }
    tracing::debug!(
        run_dir = %run_dir.display(),
        filename = %submission.file.filename,
        bytes = length,
        "Upload staged",
    );

    let task = match state.tasks.submit(submission.task_config(&run_dir)).await {
        Ok(task) => task,
        Err(e) => {
            remove_run_dir(&run_dir).await;
            return Err(e.into());
        }
    };
    let status_url = state.tasks.status_url(&task.task_id);

    if !submission.wait {
        tracing::info!(task_id = %task.task_id, "Conversion queued");
        return Ok(accepted(task, status_url));
    }

    let timeout = submission
        .wait_timeout
        .unwrap_or(state.config.wait_timeout_secs);
    // Out-of-range timeouts wait until the task finishes.
    let task = state
        .tasks
        .wait(&task.task_id, Duration::try_from_secs_f64(timeout).ok())
        .await
        .ok_or_else(|| CoreError::not_found(ErrorCode::TaskNotFound, "task not found"))?;

    match task.state {
        TaskState::Done => {
            tracing::info!(task_id = %task.task_id, "Conversion done");
            let response = ConvertResponse {
                status: "ok",
                task_id: task.task_id,
                state: task.state,
                status_url,
                result: task.result,
            };
            Ok((StatusCode::OK, Json(response)).into_response())
        }
        TaskState::Error => {
            tracing::info!(task_id = %task.task_id, error_code = ?task.error_code, "Conversion failed");
            let error = task.error.unwrap_or_default();
            let response = ConvertFailure {
                status: "error",
                message: error.clone(),
                error,
                error_code: task.error_code.unwrap_or(ErrorCode::ConvertFailed),
                task_id: task.task_id,
                state: task.state,
                status_url,
            };
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response())
        }
        TaskState::Queued | TaskState::Running => {
            tracing::info!(task_id = %task.task_id, state = %task.state, "Conversion still pending");
            Ok(accepted(task, status_url))
        }
    }
}

fn accepted(task: TaskRecord, status_url: String) -> Response {
    let response = ConvertResponse {
        status: "ok",
        task_id: task.task_id,
        state: task.state,
        status_url,
        result: None,
    };
    (StatusCode::ACCEPTED, Json(response)).into_response()
}

// ---------------------------------------------------------------------------
// Run directories
// ---------------------------------------------------------------------------

/// Create `<out_root>/<UTC stamp>_<pid>[_<n>]` with `input/` and `output/`.
///
/// The first free suffix wins; creation itself detects collisions.
async fn make_run_dir(out_root: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(out_root).await?;
    let stem = format!(
        "{}_{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ"),
        std::process::id()
    );

    let mut counter = 0u32;
    let run_dir = loop {
        let name = match counter {
            0 => stem.clone(),
            n => format!("{stem}_{n}"),
        };
        let candidate = out_root.join(name);
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => break candidate,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    };

    tokio::fs::create_dir(run_dir.join("input")).await?;
    tokio::fs::create_dir(run_dir.join("output")).await?;
    Ok(run_dir)
}

async fn stage_upload(submission: &ConvertSubmission, run_dir: &Path) -> std::io::Result<()> {
    tokio::fs::write(submission.input_path(run_dir), &submission.file.data).await
}

async fn remove_run_dir(run_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(run_dir).await {
        tracing::warn!(run_dir = %run_dir.display(), error = %e, "Failed to remove run directory");
    }
}
