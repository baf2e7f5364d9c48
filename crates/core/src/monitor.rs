//! Debounce coordinator and batch orchestrator.
//!
//! A single task owns the pending set and the debounce timing, so two timers
//! or two concurrent drains cannot exist: the loop is either waiting for
//! events (idle), counting down the debounce window (debouncing), or running
//! a batch inline (processing). Events that arrive while a batch runs buffer
//! on the channel and open a fresh debounce cycle once the batch returns.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use providers::{AudioProber, TypeSniffer};
use storage::{RejectionLog, RejectionLogEntry};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::classify::Allowlist;
use crate::cleanup;
use crate::config::AppConfig;
use crate::models::{BatchSummary, ValidationResult};
use crate::mover::{self, MoveError};
use crate::validate::{Validator, Verdict};

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Add(PathBuf),
    Error(String),
}

pub struct Monitor {
    source_root: PathBuf,
    dest_root: PathBuf,
    debounce: Duration,
    strict: bool,
    allowlist: Allowlist,
    validator: Validator,
    rejections: RejectionLog,
    batch_observer: Option<mpsc::UnboundedSender<BatchSummary>>,
}

enum FileOutcome {
    /// Vanished before processing; not counted.
    Skipped,
    Moved,
    Rejected,
    /// Validated fine but the move failed; the file stays at the source.
    MoveFailed,
}

impl Monitor {
    /// Build the orchestrator. Failure to create the destination root is the
    /// one fatal startup error.
    pub fn new(
        cfg: &AppConfig,
        prober: Arc<dyn AudioProber>,
        sniffer: Arc<dyn TypeSniffer>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&cfg.paths.source)
            .with_context(|| format!("create source root {}", cfg.paths.source))?;
        std::fs::create_dir_all(&cfg.paths.destination)
            .with_context(|| format!("create destination root {}", cfg.paths.destination))?;
        // Watch events carry resolved absolute paths; the root must match for
        // relative-path mirroring to work.
        let source_root = std::fs::canonicalize(&cfg.paths.source)
            .with_context(|| format!("resolve source root {}", cfg.paths.source))?;

        Ok(Self {
            source_root,
            dest_root: PathBuf::from(&cfg.paths.destination),
            debounce: Duration::from_millis(cfg.watch.debounce_ms.max(1)),
            strict: cfg.behavior.strict,
            allowlist: Allowlist::from_config(&cfg.allow),
            validator: Validator::new(cfg, prober, sniffer),
            rejections: RejectionLog::new(&cfg.paths.rejection_log),
            batch_observer: None,
        })
    }

    /// Receive a copy of every completed batch summary, for instrumentation.
    pub fn with_batch_observer(mut self, tx: mpsc::UnboundedSender<BatchSummary>) -> Self {
        self.batch_observer = Some(tx);
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Drive the event loop until every sender is dropped. An armed debounce
    /// window is abandoned on shutdown; a batch already running completes
    /// before the loop observes the closed channel.
    pub async fn run(&self, mut rx: mpsc::Receiver<WatchEvent>) {
        let mut pending: HashSet<PathBuf> = HashSet::new();
        // Armed by add events only; watch errors must not push the flush out.
        let mut deadline: Option<Instant> = None;

        loop {
            let msg = match deadline {
                None => rx.recv().await,
                Some(at) => match timeout_at(at, rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        deadline = None;
                        let batch: Vec<PathBuf> = pending.drain().collect();
                        self.run_batch(batch).await;
                        continue;
                    }
                },
            };

            let Some(msg) = msg else {
                info!("watch channel closed, monitor stopping");
                break;
            };

            match msg {
                WatchEvent::Add(path) => {
                    if pending.insert(path.clone()) {
                        debug!(path = %path.display(), pending = pending.len(), "file detected");
                    }
                    deadline = Some(Instant::now() + self.debounce);
                }
                WatchEvent::Error(err) => {
                    warn!("watch error: {err}");
                }
            }
        }
    }

    /// Run the full per-file pipeline over a drained snapshot, then clean up
    /// the source tree. No per-file failure aborts the batch.
    pub async fn run_batch(&self, files: Vec<PathBuf>) -> BatchSummary {
        info!(files = files.len(), "processing batch");
        let mut summary = BatchSummary::default();

        for path in files {
            match self.process_file(&path).await {
                FileOutcome::Skipped => {}
                FileOutcome::Moved => {
                    summary.processed += 1;
                    summary.moved += 1;
                }
                FileOutcome::Rejected => {
                    summary.processed += 1;
                    summary.rejected += 1;
                }
                FileOutcome::MoveFailed => {
                    summary.processed += 1;
                }
            }
        }

        let stats = cleanup::sweep(&self.source_root, &self.allowlist, self.strict);
        info!(
            processed = summary.processed,
            moved = summary.moved,
            rejected = summary.rejected,
            leftovers_deleted = stats.files_deleted,
            dirs_removed = stats.dirs_removed,
            "batch complete"
        );
        if let Some(tx) = &self.batch_observer {
            let _ = tx.send(summary);
        }
        summary
    }

    async fn process_file(&self, path: &Path) -> FileOutcome {
        let result = match self.validator.validate(path).await {
            Verdict::Skipped => return FileOutcome::Skipped,
            Verdict::Checked(result) => result,
        };

        if result.valid {
            match mover::move_file(&self.source_root, &self.dest_root, path) {
                Ok(dest) => {
                    info!(
                        from = %path.display(),
                        to = %dest.display(),
                        category = ?result.category,
                        "accepted"
                    );
                    FileOutcome::Moved
                }
                Err(err @ MoveError::SourceDelete { .. }) => {
                    // The copy landed; only the source duplicate lingers.
                    error!("{err}");
                    FileOutcome::Moved
                }
                Err(err) if err.source_vanished() => {
                    debug!(path = %path.display(), "vanished before move");
                    FileOutcome::Skipped
                }
                Err(err) => {
                    error!(path = %path.display(), "move failed: {err}");
                    FileOutcome::MoveFailed
                }
            }
        } else {
            self.reject(path, &result).await;
            FileOutcome::Rejected
        }
    }

    /// Delete the offending file and record one audit entry. Losing the audit
    /// entry is tolerable; losing the ability to keep ingesting is not.
    async fn reject(&self, path: &Path, result: &ValidationResult) {
        let reason = result
            .reason
            .clone()
            .unwrap_or_else(|| "rejected".to_string());

        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "failed to delete rejected file: {e}"),
        }

        let rel = path.strip_prefix(&self.source_root).unwrap_or(path);
        let entry = RejectionLogEntry::rejected(rel, result.file_size, reason.as_str());
        if let Err(e) = self.rejections.append(&entry).await {
            error!(path = %path.display(), "failed to record rejection: {e}");
        }
        info!(path = %path.display(), reason = %reason, "rejected");
    }
}
