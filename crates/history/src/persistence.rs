//! Newline-delimited JSON mirror of the history log.

use std::collections::VecDeque;
use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::entry::HistoryEntry;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history entry could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append one entry as a single JSON line, creating the file if needed.
pub async fn append_entry(path: &Path, entry: &HistoryEntry) -> Result<(), HistoryError> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// Load the last `load_limit` entries (0 = all), most recent first.
///
/// A missing file yields an empty log. Blank and malformed lines are skipped.
pub async fn load_entries(path: &Path, load_limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut buffer: VecDeque<HistoryEntry> = VecDeque::new();
    let mut skipped = 0usize;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(mut entry) => {
                entry.normalize();
                buffer.push_back(entry);
                if load_limit > 0 && buffer.len() > load_limit {
                    buffer.pop_front();
                }
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "Skipped malformed history lines");
    }

    Ok(buffer.into_iter().rev().collect())
}
