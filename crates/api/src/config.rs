use std::path::PathBuf;
use std::time::Duration;

use plm_core::parsing::parse_csv;
use plm_core::paths::{resolve_path, PathAllowlist, PluginMap};
use plm_history::HistoryConfig;
use plm_worker::WorkerConfig;

use crate::cli::RouterArgs;

/// Resolved server configuration.
///
/// Built from [`RouterArgs`]: relative paths are resolved against the serve
/// root, maps and allowlists are parsed, and the public base URL is derived.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served statically and used to resolve relative paths.
    pub serve_root: PathBuf,
    /// Directory holding one run directory per task.
    pub out_root: PathBuf,
    pub default_plugin: Option<PathBuf>,
    pub plugin_map: PluginMap,
    pub default_convert_cli: Option<PathBuf>,
    pub converter_program: String,
    pub converter_args: Vec<String>,
    pub viewer_path: String,
    /// Scheme, host and port used in every generated URL.
    pub base_url: String,
    /// `None` disables authorization.
    pub auth_token: Option<String>,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Max request body; `0` disables the limit.
    pub max_bytes: u64,
    pub plugin_allowlist: PathAllowlist,
    pub cli_allowlist: PathAllowlist,
    pub max_workers: usize,
    pub queue_size: usize,
    pub ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub history_limit: usize,
    pub history_file: Option<PathBuf>,
    pub history_load: usize,
    /// Default synchronous wait for `/convert`, in seconds.
    pub wait_timeout_secs: f64,
}

impl ServerConfig {
    /// Resolve parsed arguments into a configuration.
    ///
    /// | Flag / Env                                          | Default                       |
    /// |-----------------------------------------------------|-------------------------------|
    /// | `--host` / `PLM_ROUTER_HOST`                        | `127.0.0.1`                   |
    /// | `--port` / `PLM_ROUTER_PORT`                        | `9000`                        |
    /// | `--serve-root` / `PLM_ROUTER_SERVE_ROOT`            | `.`                           |
    /// | `--out-root` / `PLM_ROUTER_OUT_ROOT`                | `build/plm_service_runs`      |
    /// | `--max-bytes` / `PLM_ROUTER_MAX_BYTES`              | `52428800`                    |
    /// | `--queue-size` / `PLM_ROUTER_QUEUE_SIZE`            | `8`                           |
    /// | `--ttl-seconds` / `PLM_ROUTER_TTL_SECONDS`          | `3600`                        |
    /// | `--wait-timeout` / `PLM_ROUTER_WAIT_TIMEOUT`        | `300`                         |
    pub fn from_args(args: RouterArgs) -> Self {
        let serve_root = std::env::current_dir()
            .map(|cwd| resolve_path(&cwd, &args.serve_root.to_string_lossy()))
            .unwrap_or_else(|_| args.serve_root.clone());
        let out_root = resolve_path(&serve_root, &args.out_root.to_string_lossy());

        let optional_path = |value: &str| -> Option<PathBuf> {
            let value = value.trim();
            (!value.is_empty()).then(|| resolve_path(&serve_root, value))
        };

        let wait_timeout_secs = if args.wait_timeout.is_finite() && args.wait_timeout >= 0.0 {
            args.wait_timeout
        } else {
            300.0
        };

        Self {
            base_url: build_base_url(&args.host, args.port, &args.public_host),
            host: args.host,
            port: args.port,
            default_plugin: optional_path(&args.default_plugin),
            plugin_map: PluginMap::parse(&args.plugin_map, &serve_root),
            default_convert_cli: optional_path(&args.default_convert_cli),
            converter_program: args.converter,
            converter_args: args
                .converter_args
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            viewer_path: args.viewer_path,
            auth_token: Some(args.auth_token.trim().to_string()).filter(|t| !t.is_empty()),
            cors_origins: parse_csv(&args.cors_origins),
            max_bytes: args.max_bytes,
            plugin_allowlist: PathAllowlist::parse(&args.plugin_allowlist, &serve_root),
            cli_allowlist: PathAllowlist::parse(&args.cli_allowlist, &serve_root),
            max_workers: args.max_workers.max(1),
            queue_size: args.queue_size,
            ttl_secs: args.ttl_seconds,
            cleanup_interval_secs: args.cleanup_interval,
            history_limit: args.history_limit,
            history_file: optional_path(&args.history_file),
            history_load: args.history_load,
            wait_timeout_secs,
            out_root,
            serve_root,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_workers: self.max_workers,
            queue_size: self.queue_size,
            base_url: self.base_url.clone(),
            out_root: self.out_root.clone(),
            ttl: Duration::from_secs(self.ttl_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
        }
    }

    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig {
            limit: self.history_limit,
            file: self.history_file.clone(),
            load_limit: self.history_load,
        }
    }

    /// Resolve a request-supplied path the same way configured paths are.
    pub fn resolve(&self, value: &str) -> PathBuf {
        resolve_path(&self.serve_root, value)
    }
}

/// `http://{host}:{port}`, preferring the public host and mapping wildcard
/// binds to `localhost`.
pub fn build_base_url(host: &str, port: u16, public_host: &str) -> String {
    let resolved = match public_host.trim() {
        "" => match host {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            other => other,
        },
        public => public,
    };
    format!("http://{resolved}:{port}")
}
