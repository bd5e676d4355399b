//! Locus Binary Entry Point
//!
//! Reads location readings as JSON lines on stdin, buffers them durably and
//! delivers them to the configured collector. Core functionality is provided
//! by the `locus` library crate.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use locus::{
    config::{AppConfig, parse_duration},
    delivery::{DeliveryCoordinator, Endpoint, HttpPoster},
    service::{ChannelLocationProvider, LocationService, ReadingSender, parse_reading_batch},
    storage::{EventStore, StorageBuilder},
};
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reading batches queued between stdin and the ingest worker.
const READING_QUEUE_CAPACITY: usize = 256;

/// Locus - Durable Location Telemetry Buffer
#[derive(Parser, Debug)]
#[command(name = "locus", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/locus.yaml",
        env = "LOCUS_CONFIG"
    )]
    config: String,

    /// Collector URL (overrides config file)
    #[arg(long, env = "LOCUS_COLLECTOR_URL")]
    collector_url: Option<String>,

    /// Database file path (overrides config file)
    #[arg(long, env = "LOCUS_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Transmission interval, e.g. "90s" or "5m" (overrides config file)
    #[arg(long, env = "LOCUS_TRANSMISSION_INTERVAL", value_parser = parse_duration)]
    transmission_interval: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,locus=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Locus - Durable Location Telemetry Buffer");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(url) = cli.collector_url {
        config.collector.url = url;
    }
    if let Some(path) = cli.db_path {
        config.database.path = path;
    }
    if let Some(interval) = cli.transmission_interval {
        config.collector.transmission_interval = interval;
    }
    config.validate()?;

    tracing::info!(
        collector = %config.collector.url,
        database = %config.database.path.display(),
        transmission_interval = ?config.collector.transmission_interval,
        "Configuration loaded"
    );

    // Build storage layer
    let handles = StorageBuilder::new(&config.database.path)
        .channel_capacity(config.database.channel_capacity)
        .build()
        .await?;
    let buffered = handles.store.count_or_sentinel().await;
    tracing::info!(buffered, "Storage initialized");

    // Wire delivery and the service
    let poster = HttpPoster::new(config.collector.request_timeout)?;
    let endpoint =
        Endpoint::new(&config.collector.url).with_headers(config.collector.resolved_headers());
    let coordinator =
        DeliveryCoordinator::new(Arc::new(handles.store.clone()), Arc::new(poster), endpoint);

    let (provider, sender) = ChannelLocationProvider::new(READING_QUEUE_CAPACITY);
    let mut service = LocationService::builder(coordinator, Arc::new(provider), &config.state_path)
        .collecting_fields(config.collecting_fields)
        .advertising(config.advertising.clone())
        .transmission_interval(config.collector.transmission_interval)
        .flush_check_interval(config.collector.flush_check_interval)
        .build();

    // A clean stop persists `false`; a leftover `true` means the last run died
    // before its final flush. Its events are still buffered and go out with
    // this session's deliveries.
    if service.is_started() {
        tracing::warn!(buffered, "Previous session did not stop cleanly");
    }
    service.start()?;

    let stdin_closed = spawn_stdin_reader(sender);
    tracing::info!("Reading JSON lines from stdin; press Ctrl+C to stop");

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = stdin_closed => {
            tracing::info!("Input closed");
        }
    }

    tracing::info!("Stopping location service...");
    match service.stop().await {
        Ok(outcome) => tracing::info!(?outcome, "Final flush complete"),
        Err(e) => tracing::error!("Failed to stop location service: {}", e),
    }

    let stats = service.stats().await;
    tracing::info!(
        buffered = stats.buffered,
        ingested = stats.ingested,
        rejected = stats.rejected,
        delivered = stats.delivery.delivered,
        rebuffered = stats.delivery.rebuffered,
        dropped = stats.delivery.dropped,
        lost = stats.delivery.lost,
        "Session totals"
    );

    tracing::info!("Shutting down storage...");
    if let Err(e) = handles.shutdown().await {
        tracing::error!("Failed to shutdown storage: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Forward stdin lines to the service on a dedicated thread.
///
/// Blocking reads stay off the runtime so shutdown never waits for input.
/// The returned receiver resolves when stdin reaches EOF.
fn spawn_stdin_reader(sender: ReadingSender) -> oneshot::Receiver<()> {
    let (closed_tx, closed_rx) = oneshot::channel();
    let runtime = tokio::runtime::Handle::current();

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_reading_batch(line) {
                Ok(batch) => {
                    if runtime.block_on(sender.send(batch)).is_err() {
                        tracing::warn!("Service is not accepting readings");
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Skipping malformed reading line"),
            }
        }
        let _ = closed_tx.send(());
    });

    closed_rx
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
