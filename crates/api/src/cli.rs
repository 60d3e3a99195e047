//! Command-line arguments for `plm-router`.

use std::path::PathBuf;

use clap::Parser;

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// PLM router service: upload, convert, preview.
///
/// Every flag can also be set through the matching `PLM_ROUTER_*`
/// environment variable; an explicit flag wins.
#[derive(Parser, Debug, Clone)]
#[command(name = "plm-router")]
#[command(version, about = "PLM router service (upload -> convert -> preview URL)", long_about = None)]
pub struct RouterArgs {
    /// Bind host
    #[arg(long, env = "PLM_ROUTER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port
    #[arg(long, env = "PLM_ROUTER_PORT", default_value_t = 9000)]
    pub port: u16,

    /// Directory served statically; relative paths resolve against it
    #[arg(long, env = "PLM_ROUTER_SERVE_ROOT", default_value = ".")]
    pub serve_root: PathBuf,

    /// Output root for conversion runs
    #[arg(long, env = "PLM_ROUTER_OUT_ROOT", default_value = "build/plm_service_runs")]
    pub out_root: PathBuf,

    /// Importer plugin used when a request names none and no mapping applies
    #[arg(long, env = "PLM_ROUTER_DEFAULT_PLUGIN", default_value = "")]
    pub default_plugin: String,

    /// Extension-to-plugin map (e.g. .dxf=path,.json=path)
    #[arg(long, env = "PLM_ROUTER_PLUGIN_MAP", default_value = "")]
    pub plugin_map: String,

    /// convert_cli used when a request names none
    #[arg(long, env = "PLM_ROUTER_DEFAULT_CONVERT_CLI", default_value = "")]
    pub default_convert_cli: String,

    /// Converter executable
    #[arg(long, env = "PLM_ROUTER_CONVERTER", default_value = "python3")]
    pub converter: String,

    /// Whitespace-separated arguments placed before the generated converter flags
    #[arg(long, env = "PLM_ROUTER_CONVERTER_ARGS", default_value = "tools/plm_convert.py")]
    pub converter_args: String,

    /// Web viewer page, relative to the serve root
    #[arg(long, env = "PLM_ROUTER_VIEWER_PATH", default_value = "tools/web_viewer/index.html")]
    pub viewer_path: String,

    /// Public host for generated URLs (defaults to the bind host)
    #[arg(long, env = "PLM_ROUTER_PUBLIC_HOST", default_value = "")]
    pub public_host: String,

    /// Bearer token required on every endpoint except /health
    #[arg(long, env = "PLM_ROUTER_AUTH_TOKEN", default_value = "", hide_env_values = true)]
    pub auth_token: String,

    /// Comma-separated allowlist of origins (use * to allow all)
    #[arg(long, env = "PLM_ROUTER_CORS_ORIGINS", default_value = "")]
    pub cors_origins: String,

    /// Max request body in bytes (0 disables)
    #[arg(long, env = "PLM_ROUTER_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: u64,

    /// Comma-separated allowed plugin paths or directories
    #[arg(long, env = "PLM_ROUTER_PLUGIN_ALLOWLIST", default_value = "")]
    pub plugin_allowlist: String,

    /// Comma-separated allowed convert_cli paths or directories
    #[arg(long, env = "PLM_ROUTER_CLI_ALLOWLIST", default_value = "")]
    pub cli_allowlist: String,

    /// Concurrent conversions
    #[arg(long, env = "PLM_ROUTER_MAX_WORKERS", default_value_t = 1)]
    pub max_workers: usize,

    /// Max queued jobs (0 = unbounded)
    #[arg(long, env = "PLM_ROUTER_QUEUE_SIZE", default_value_t = 8)]
    pub queue_size: usize,

    /// TTL in seconds for run directory cleanup (0 disables)
    #[arg(long, env = "PLM_ROUTER_TTL_SECONDS", default_value_t = 3600)]
    pub ttl_seconds: u64,

    /// Cleanup interval in seconds (0 disables)
    #[arg(long, env = "PLM_ROUTER_CLEANUP_INTERVAL", default_value_t = 300)]
    pub cleanup_interval: u64,

    /// Max history entries kept in memory (0 = unbounded)
    #[arg(long, env = "PLM_ROUTER_HISTORY_LIMIT", default_value_t = 200)]
    pub history_limit: usize,

    /// Append task history to this JSONL file
    #[arg(long, env = "PLM_ROUTER_HISTORY_FILE", default_value = "")]
    pub history_file: String,

    /// Max history entries replayed on startup (0 = all)
    #[arg(long, env = "PLM_ROUTER_HISTORY_LOAD", default_value_t = 200)]
    pub history_load: usize,

    /// Default seconds a synchronous /convert waits before answering 202
    #[arg(long, env = "PLM_ROUTER_WAIT_TIMEOUT", default_value_t = 300.0)]
    pub wait_timeout: f64,
}
