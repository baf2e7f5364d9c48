//! Rejection log sink: append-only JSONL audit trail.
//!
//! One JSON object per line. The field names and the `action` literal are an
//! external contract consumed by ops tooling; do not rename them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    /// Path relative to the watched source root.
    pub file_path: String,
    pub file_size: u64,
    pub reason: String,
    pub action: String,
}

impl RejectionLogEntry {
    pub fn rejected(relative_path: &Path, file_size: u64, reason: impl Into<String>) -> Self {
        let filename = relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            timestamp: Utc::now(),
            filename,
            file_path: relative_path.to_string_lossy().replace('\\', "/"),
            file_size,
            reason: reason.into(),
            action: "REJECTED".to_string(),
        }
    }
}

/// Handle on the append-only rejection log file.
#[derive(Debug, Clone)]
pub struct RejectionLog {
    path: PathBuf,
}

impl RejectionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single JSON line. The file and its parent
    /// directory are created on first write.
    pub async fn append(&self, entry: &RejectionLogEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        // tokio::fs::File buffers internally and completes writes in the
        // background on drop; flush before returning so the entry is visible
        // to readers as soon as append resolves.
        file.flush().await?;
        Ok(())
    }
}
