use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::watch;
use ingest_core::config::{self, AppConfig};
use ingest_core::monitor::{Monitor, WatchEvent};
use ingest_core::scan;
use ingest_core::validate::{Validator, Verdict};
use providers::{FfprobeProber, MagicSniffer};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let cfg = config::load(args.config.as_deref())?;
    init_tracing(cfg.behavior.verbose);

    match args.command {
        Commands::Watch => run_watch(cfg).await,
        Commands::Scan { json } => run_scan(cfg, json).await,
        Commands::Check { path, json } => run_check(cfg, path, json).await,
    }
}

#[derive(Parser)]
#[command(name = "upload-monitor")]
#[command(about = "Watches a drop folder, validates arrivals, and files them away", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the source folder and ingest arrivals until interrupted
    Watch,
    /// Ingest everything currently in the source folder, then exit
    Scan {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Validate a single file without moving or deleting anything
    Check {
        path: String,
        /// Output the full validation result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_monitor(cfg: &AppConfig) -> Result<Monitor> {
    Ok(Monitor::new(
        cfg,
        Arc::new(FfprobeProber::default()),
        Arc::new(MagicSniffer),
    )?)
}

async fn run_watch(cfg: AppConfig) -> Result<()> {
    let monitor = build_monitor(&cfg)?;
    let root = monitor.source_root().to_path_buf();
    let (tx, rx) = mpsc::channel::<WatchEvent>(1024);

    let runner = tokio::spawn(async move { monitor.run(rx).await });

    // Anything already sitting in the drop folder goes through the same
    // debounce cycle as fresh arrivals.
    let existing = scan::existing_files(&root, &cfg.watch.exclude)?;
    info!(source = %root.display(), existing = existing.len(), "starting upload monitor");
    for path in existing {
        if tx.send(WatchEvent::Add(path)).await.is_err() {
            break;
        }
    }

    let handle = watch::start(&root, &cfg, tx.clone())?;

    shutdown_signal().await?;
    info!("interrupt received, shutting down");
    handle.shutdown();
    drop(tx);
    // A batch already in flight runs to completion before the loop exits.
    runner.await?;
    Ok(())
}

async fn run_scan(cfg: AppConfig, json: bool) -> Result<()> {
    let monitor = build_monitor(&cfg)?;
    let files = scan::existing_files(monitor.source_root(), &cfg.watch.exclude)?;
    let summary = monitor.run_batch(files).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "ok",
                "processed": summary.processed,
                "moved": summary.moved,
                "rejected": summary.rejected,
            }))?
        );
    } else {
        println!(
            "scan: processed {}, moved {}, rejected {}",
            summary.processed, summary.moved, summary.rejected
        );
    }
    Ok(())
}

async fn run_check(cfg: AppConfig, path: String, json: bool) -> Result<()> {
    let validator = Validator::new(
        &cfg,
        Arc::new(FfprobeProber::default()),
        Arc::new(MagicSniffer),
    );
    match validator.validate(Path::new(&path)).await {
        Verdict::Skipped => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "missing", "path": path })
                );
            } else {
                println!("{}: file not found", path);
            }
        }
        Verdict::Checked(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.valid {
                println!(
                    "{}: valid {:?} ({} bytes)",
                    path, result.category, result.file_size
                );
            } else {
                println!(
                    "{}: rejected: {}",
                    path,
                    result.reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
