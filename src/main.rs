use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use metaosc::prelude::*;

/// Stream MetaWear sensor data to OSC receivers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // RUST_LOG=metaosc=debug also prints every /euler sample.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Starting metaosc …");

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Config::load_or_default(cli.config.as_deref());

    // ── Worker ────────────────────────────────────────────────────────────────
    let shutdown = Shutdown::new();
    let coordinator = ShutdownCoordinator::new(shutdown.clone());
    coordinator.listen_for_interrupt();

    let worker = Worker::new(
        config,
        Arc::new(BtleRadio::new()),
        SinkSet::osc(),
        shutdown.clone(),
    );
    let mut handle = tokio::spawn(worker.run());

    // ── Supervise ─────────────────────────────────────────────────────────────
    // Either SIGINT arrives, or the worker ends on its own (startup failure).
    let joined = tokio::select! {
        _ = shutdown.triggered() => None,
        joined = &mut handle => Some(joined),
    };
    let exit = match joined {
        None => {
            info!("Received SIGINT, shutting down …");
            coordinator.stop_worker(handle).await
        }
        Some(joined) => WorkerExit::Finished(joined.context("worker task failed")?),
    };

    match exit {
        WorkerExit::Finished(Ok(mut pipeline)) => {
            coordinator.teardown(&mut pipeline).await;
        }
        WorkerExit::Finished(Err(e)) => {
            // Returning the error exits with status 1.
            return Err(e).context("startup failed");
        }
        WorkerExit::Aborted => {
            warn!("Worker was aborted; connections were dropped without teardown.");
        }
    }

    info!("Application terminated gracefully.");
    Ok(ExitCode::SUCCESS)
}
