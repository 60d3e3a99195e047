//! Reclamation of expired run directories.
//!
//! Each submitted task owns one run directory directly under the output
//! root. Once a directory is older than the TTL and no queued or running
//! task references it, the sweep removes it. Removal is best-effort:
//! failures are logged and counted, never propagated.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub removed: usize,
    pub skipped_active: usize,
    pub errors: usize,
}

/// Remove directories under `out_root` last modified before `now - ttl`.
///
/// A directory is kept if any path in `active` lies inside it.
pub async fn sweep_expired(
    out_root: &Path,
    ttl: Duration,
    active: &[PathBuf],
    now: SystemTime,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    let Some(cutoff) = now.checked_sub(ttl) else {
        return report;
    };

    let mut entries = match tokio::fs::read_dir(out_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(root = %out_root.display(), "Output root does not exist, nothing to clean");
            return report;
        }
        Err(e) => {
            tracing::warn!(root = %out_root.display(), error = %e, "Failed to read output root");
            report.errors += 1;
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read directory entry");
                report.errors += 1;
                break;
            }
        };
        let path = entry.path();

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_dir() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat run directory");
                report.errors += 1;
                continue;
            }
        };
        report.scanned += 1;

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Run directory has no mtime");
                report.errors += 1;
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        if active.iter().any(|p| p.starts_with(&path)) {
            tracing::debug!(path = %path.display(), "Skipping expired directory of an active task");
            report.skipped_active += 1;
            continue;
        }

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed expired run directory");
                report.removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove run directory");
                report.errors += 1;
            }
        }
    }

    if report.removed > 0 || report.errors > 0 {
        tracing::info!(
            removed = report.removed,
            skipped_active = report.skipped_active,
            errors = report.errors,
            "Cleanup sweep completed",
        );
    } else {
        tracing::debug!(scanned = report.scanned, "Cleanup sweep completed, nothing expired");
    }

    report
}
