// crates/server/src/main.rs
//! jobwatch daemon binary.
//!
//! Tails the batch server's live log in the background while a pool
//! of workers answers `date/jobid` status queries over TCP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobwatch_core::{IngestConfig, Ingestor, SpoolPaths};
use jobwatch_server::config::{resolve_spool_dir, Config, DEFAULT_PORT};
use jobwatch_server::{run_server, AppState};

#[derive(Parser, Debug)]
#[command(name = "jobwatch")]
#[command(version)]
#[command(about = "Job-status lookup daemon for PBS server logs")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Batch server spool directory (default: $PBS_SPOOL_DIR)
    #[arg(short, long)]
    spool_dir: Option<PathBuf>,

    /// Number of connection-handling workers
    #[arg(long, default_value_t = 8)]
    workers: usize,

    /// Query retry attempts against a busy cache
    #[arg(long, default_value_t = 10)]
    retry_budget: u32,

    /// Ingestion poll interval in seconds
    #[arg(long, default_value_t = 1)]
    poll_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Config {
        port: args.port,
        spool_dir: resolve_spool_dir(args.spool_dir),
        workers: args.workers,
        retry_budget: args.retry_budget,
        poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
        ..Config::default()
    };
    info!(
        port = config.port,
        spool_dir = %config.spool_dir.display(),
        workers = config.workers,
        "starting jobwatch"
    );

    let state = AppState::new(config.clone());
    let cancel = CancellationToken::new();

    // Failing to bind is the one genuinely fatal startup error.
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind listening socket on {addr}"))?;
    info!(%addr, "listening");

    let ingestor = Ingestor::new(
        SpoolPaths::new(config.spool_dir.clone()),
        state.cache.clone(),
        IngestConfig {
            poll_interval: config.poll_interval,
            buffer_capacity: config.buffer_capacity,
        },
    );
    let ingest_handle = tokio::spawn(ingestor.run(cancel.clone()));

    let server = tokio::spawn(run_server(listener, state, cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    cancel.cancel();

    let _ = ingest_handle.await;
    let _ = server.await;
    Ok(())
}
