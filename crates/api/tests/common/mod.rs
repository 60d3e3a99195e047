#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use clap::Parser;
use http_body_util::BodyExt;
use plm_api::build_info::BuildInfo;
use plm_api::cli::RouterArgs;
use plm_api::config::ServerConfig;
use plm_api::router::build_app_router;
use plm_api::state::AppState;
use plm_converter::ProcessConverter;
use plm_history::HistoryStore;
use plm_worker::TaskManager;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Stand-in converter. Writes `document.json` and a manifest into the
/// `--out` directory; `broken.*` inputs fail and `slow.*` inputs stall.
pub const CONVERTER_SCRIPT: &str = r#"
prev=""
out=""
input=""
for arg in "$@"; do
  if [ "$prev" = "--out" ]; then out="$arg"; fi
  if [ "$prev" = "--input" ]; then input="$arg"; fi
  prev="$arg"
done
case "$(basename "$input")" in
  broken.*) echo "unsupported entity" >&2; exit 2 ;;
  slow.*) sleep 2 ;;
esac
mkdir -p "$out"
printf '{"schema":1}' > "$out/document.json"
printf '{"artifacts":{"document_json":"document.json"}}' > "$out/manifest.json"
"#;

pub const BOUNDARY: &str = "plm-test-boundary";

/// A router wired to a scratch serve root, a `/bin/sh` converter and an
/// in-memory history store.
pub struct TestApp {
    pub dir: TempDir,
    pub config: ServerConfig,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_args(&[]).await
    }

    /// Extra CLI flags replace the matching test defaults.
    pub async fn with_args(extra: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("plugins")).unwrap();
        std::fs::write(root.join("plugins/libdxf.so"), b"").unwrap();
        std::fs::create_dir_all(root.join("tools")).unwrap();
        std::fs::write(root.join("tools/convert.sh"), CONVERTER_SCRIPT).unwrap();

        let root_arg = root.to_string_lossy().to_string();
        let defaults = [
            ("--out-root", "runs"),
            ("--default-plugin", "plugins/libdxf.so"),
            ("--converter", "/bin/sh"),
            ("--converter-args", "tools/convert.sh"),
            ("--ttl-seconds", "0"),
            ("--wait-timeout", "10"),
        ];
        let mut argv = vec!["plm-router", "--serve-root", root_arg.as_str()];
        for (flag, value) in defaults {
            if !extra.contains(&flag) {
                argv.extend([flag, value]);
            }
        }
        argv.extend_from_slice(extra);
        let config = ServerConfig::from_args(RouterArgs::try_parse_from(argv).unwrap());

        let history = Arc::new(HistoryStore::new(config.history_config()));
        let converter = ProcessConverter::new(
            config.converter_program.clone(),
            config.serve_root.clone(),
            config.base_url.clone(),
        )
        .with_args(config.converter_args.clone())
        .with_viewer_path(config.viewer_path.clone());
        let tasks = Arc::new(TaskManager::start(
            config.worker_config(),
            Arc::clone(&history),
            Arc::new(converter),
            CancellationToken::new(),
        ));

        let state = AppState {
            config: Arc::new(config.clone()),
            tasks,
            history,
            build: Arc::new(BuildInfo {
                pid: std::process::id(),
                ..Default::default()
            }),
            started: Instant::now(),
        };

        Self { dir, config, state }
    }

    pub fn root(&self) -> &Path {
        &self.config.serve_root
    }

    pub fn out_root(&self) -> PathBuf {
        self.config.out_root.clone()
    }

    /// Run directories currently under the output root.
    pub fn run_dirs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.out_root()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// A fresh router over the shared state.
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone(), &self.config).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, content_type: &str, body: Vec<u8>) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.post(uri, "application/json", serde_json::to_vec(&body).unwrap())
            .await
    }

    /// Submit a `/convert` form with an uploaded file.
    pub async fn convert(&self, filename: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let body = multipart_body(fields, Some((filename, &b"0\nSECTION\n0\nEOF\n"[..])));
        self.post("/convert", &multipart_content_type(), body).await
    }

    /// Poll `/status/{task_id}` until the task is terminal.
    pub async fn poll_until_terminal(&self, task_id: &str) -> serde_json::Value {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let json = body_json(self.get(&format!("/status/{task_id}")).await).await;
            let state = json["state"].as_str().unwrap_or_default().to_string();
            if state == "done" || state == "error" {
                return json;
            }
            assert!(Instant::now() < deadline, "task {task_id} stuck in {state}");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Encode text fields and an optional `file` part as multipart/form-data.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}
