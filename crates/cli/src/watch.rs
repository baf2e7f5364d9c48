//! Directory watch adapter: notify events filtered through a stable-write
//! check before they reach the monitor, so partially-written uploads are not
//! reported until they settle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use ingest_core::config::AppConfig;
use ingest_core::monitor::WatchEvent;
use ingest_core::scan::{build_globset, is_hidden};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct WatchHandle {
    watcher: RecommendedWatcher,
    stability: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the notify stream and the stable-write filter. Events already
    /// queued for the monitor are still processed.
    pub fn shutdown(self) {
        drop(self.watcher);
        self.stability.abort();
    }
}

/// Watch `root` recursively and feed settled file arrivals into `tx`.
pub fn start(root: &Path, cfg: &AppConfig, tx: mpsc::Sender<WatchEvent>) -> Result<WatchHandle> {
    let excludes = build_globset(&cfg.watch.exclude)?;
    let (raw_tx, raw_rx) = mpsc::channel::<PathBuf>(1024);
    let err_tx = tx.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                for path in event.paths {
                    if is_hidden(&path) || excludes.is_match(&path) || !path.is_file() {
                        continue;
                    }
                    if raw_tx.blocking_send(path).is_err() {
                        // Monitor side shut down.
                        return;
                    }
                }
            }
            Err(err) => {
                let _ = err_tx.blocking_send(WatchEvent::Error(err.to_string()));
            }
        },
        notify::Config::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    let quiet = Duration::from_millis(cfg.watch.quiet_ms.max(1));
    let stability = tokio::spawn(stable_write_filter(raw_rx, tx, quiet));

    Ok(WatchHandle { watcher, stability })
}

/// Forward a path only once its size and mtime have held still for a full
/// quiet period, measured from the last observed change of that path. Every
/// fresh event for a tracked path restarts its clock; paths that vanish
/// before settling are dropped silently.
pub async fn stable_write_filter(
    mut rx: mpsc::Receiver<PathBuf>,
    tx: mpsc::Sender<WatchEvent>,
    quiet: Duration,
) {
    struct Tracked {
        stamp: Option<(u64, SystemTime)>,
        last_change: std::time::Instant,
    }
    let mut tracked: HashMap<PathBuf, Tracked> = HashMap::new();
    // First tick lands one full interval out, never immediately.
    let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + quiet, quiet);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(path) => {
                        let entry = Tracked {
                            stamp: stamp(&path),
                            last_change: std::time::Instant::now(),
                        };
                        tracked.insert(path, entry);
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {
                let mut settled = Vec::new();
                let mut gone = Vec::new();
                for (path, entry) in tracked.iter_mut() {
                    match stamp(path) {
                        None => gone.push(path.clone()),
                        current if current == entry.stamp => {
                            // Unchanged since a tick is not enough; the whole
                            // quiet period must have passed since the last
                            // observed change of this path.
                            if entry.last_change.elapsed() >= quiet {
                                settled.push(path.clone());
                            }
                        }
                        current => {
                            entry.stamp = current;
                            entry.last_change = std::time::Instant::now();
                        }
                    }
                }
                for path in gone {
                    debug!(path = %path.display(), "vanished before settling");
                    tracked.remove(&path);
                }
                for path in settled {
                    tracked.remove(&path);
                    if tx.send(WatchEvent::Add(path)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

fn stamp(path: &Path) -> Option<(u64, SystemTime)> {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok().map(|t| (m.len(), t)))
}
