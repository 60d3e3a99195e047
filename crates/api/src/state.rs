use std::sync::Arc;
use std::time::Instant;

use plm_history::HistoryStore;
use plm_worker::TaskManager;

use crate::build_info::BuildInfo;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Resolved server configuration.
    pub config: Arc<ServerConfig>,
    /// Queue, worker pool and task registry.
    pub tasks: Arc<TaskManager>,
    /// Execution and annotation history.
    pub history: Arc<HistoryStore>,
    /// Process metadata reported by `/health`.
    pub build: Arc<BuildInfo>,
    /// Process start, for uptime.
    pub started: Instant,
}
