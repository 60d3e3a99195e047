//! Liveness and process metadata.

use axum::extract::State;
use axum::Json;
use plm_core::error::ErrorCode;
use plm_worker::TaskCounts;
use serde::Serialize;

use crate::state::AppState;

/// `GET /health` payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub started_at: String,
    pub uptime_seconds: u64,
    pub commit: String,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub build_time: String,
    pub hostname: String,
    pub pid: u32,
    /// Every error code a client may observe.
    pub error_codes: Vec<ErrorCode>,
    /// Extensions with a mapped plugin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_map: Option<Vec<String>>,
    /// File name only; the full path is not disclosed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_convert_cli: Option<String>,
    pub workers: usize,
    pub queue_size: usize,
    pub tasks: TaskCounts,
    pub history_count: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;
    let file_name = |path: &std::path::Path| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
    };

    Json(HealthResponse {
        status: "ok",
        started_at: state.build.started_at.clone(),
        uptime_seconds: state.started.elapsed().as_secs(),
        commit: state.build.commit.clone(),
        version: env!("CARGO_PKG_VERSION"),
        build_time: state.build.build_time.clone(),
        hostname: state.build.hostname.clone(),
        pid: state.build.pid,
        error_codes: ErrorCode::ALL.to_vec(),
        plugin_map: (!config.plugin_map.is_empty()).then(|| config.plugin_map.extensions()),
        default_plugin: config.default_plugin.as_deref().and_then(file_name),
        default_convert_cli: config.default_convert_cli.as_deref().and_then(file_name),
        workers: config.max_workers,
        queue_size: config.queue_size,
        tasks: state.tasks.counts().await,
        history_count: state.history.len().await,
    })
}
