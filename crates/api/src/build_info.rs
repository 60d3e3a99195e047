//! Process metadata reported by `/health`.

use std::path::Path;

use plm_core::types::timestamp_now;

#[derive(Debug, Clone, Default)]
pub struct BuildInfo {
    pub started_at: String,
    /// Short commit of the serve root's git checkout, if any.
    pub commit: String,
    pub build_time: String,
    pub hostname: String,
    pub pid: u32,
}

impl BuildInfo {
    /// Gather metadata; every lookup is best-effort and falls back to "".
    pub async fn collect(serve_root: &Path) -> Self {
        Self {
            started_at: timestamp_now(),
            commit: git_commit(serve_root).await,
            build_time: build_time(),
            hostname: hostname(),
            pid: std::process::id(),
        }
    }
}

async fn git_commit(root: &Path) -> String {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => String::new(),
    }
}

/// `PLM_ROUTER_BUILD_TIME` verbatim, else `SOURCE_DATE_EPOCH` as a UTC timestamp.
fn build_time() -> String {
    if let Ok(value) = std::env::var("PLM_ROUTER_BUILD_TIME") {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .map(|v| format_epoch(v.trim()))
        .unwrap_or_default()
}

fn format_epoch(value: &str) -> String {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_string();
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_default()
}
