use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use plm_converter::ProcessConverter;
use plm_history::HistoryStore;
use plm_worker::TaskManager;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plm_api::build_info::BuildInfo;
use plm_api::cli::RouterArgs;
use plm_api::config::ServerConfig;
use plm_api::router::build_app_router;
use plm_api::state::AppState;

/// How long workers get to finish their current step on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "plm_api=debug,plm_worker=debug,plm_history=info,plm_converter=debug,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_args(RouterArgs::parse());
    tracing::info!(
        host = %config.host,
        port = config.port,
        serve_root = %config.serve_root.display(),
        out_root = %config.out_root.display(),
        base_url = %config.base_url,
        auth = config.auth_token.is_some(),
        "Loaded server configuration",
    );
    if !config.plugin_map.is_empty() {
        tracing::info!(extensions = ?config.plugin_map.extensions(), "Plugin map loaded");
    }
    if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS allowlist loaded");
    }

    tokio::fs::create_dir_all(&config.out_root)
        .await
        .with_context(|| format!("Failed to create output root {}", config.out_root.display()))?;

    // --- History ---
    let history = Arc::new(HistoryStore::open(config.history_config()).await);
    tracing::info!(entries = history.len().await, "History store ready");

    // --- Workers ---
    let converter = ProcessConverter::new(
        config.converter_program.clone(),
        config.serve_root.clone(),
        config.base_url.clone(),
    )
    .with_args(config.converter_args.clone())
    .with_viewer_path(config.viewer_path.clone());
    let cancel = CancellationToken::new();
    let tasks = Arc::new(TaskManager::start(
        config.worker_config(),
        Arc::clone(&history),
        Arc::new(converter),
        cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        build: Arc::new(BuildInfo::collect(&config.serve_root).await),
        config: Arc::new(config.clone()),
        tasks: Arc::clone(&tasks),
        history,
        started: Instant::now(),
    };

    // --- Router ---
    let app = build_app_router(state, &config).context("Invalid CORS origin")?;

    // --- Start server ---
    let addr: SocketAddr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Invalid host {}", config.host))?
        .next()
        .with_context(|| format!("No address for host {}", config.host))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "PLM router listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping workers");
    tasks.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then cancel background work.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
    cancel.cancel();
}
