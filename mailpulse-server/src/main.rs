//! Mailpulse Server
//!
//! Polls the Mailgun Events API on a fixed cadence, correlates accepted
//! events with their delivered/failed counterparts across poll windows,
//! and exposes delivery-latency and delivery-error metrics for
//! Prometheus scraping.

mod config;
mod server;
mod shutdown;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mailpulse_core::correlation::{self, DEFAULT_SWEEP_INTERVAL, PendingStore};
use mailpulse_core::metrics::DeliveryMetrics;
use mailpulse_core::processors::{Correlator, Poller};
use mailpulse_core::source::mailgun::{FetchWindow, MailgunEventSource};
use mailpulse_sdk::client::EventsClient;

use config::{ConfigLoader, get_api_key};
use server::{build_router, run_server};

/// Mailpulse - Mailgun delivery latency and error exporter
#[derive(Parser, Debug)]
#[command(name = "mailpulse-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./mailpulse-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:2112)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting mailpulse-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let cfg = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get the API key from the environment
    let api_key = get_api_key().map_err(|e| {
        tracing::error!("MAILGUN_API_KEY environment variable not set");
        e
    })?;

    // Build the correlation pipeline
    let metrics = Arc::new(DeliveryMetrics::new()?);
    let store = Arc::new(PendingStore::new());

    let client = EventsClient::new(cfg.api_base.clone(), cfg.domain.clone(), api_key);
    let source = MailgunEventSource::new(
        client,
        FetchWindow {
            offset: cfg.window_offset,
            width: cfg.window_width,
            timeout: cfg.fetch_timeout,
        },
    );
    let correlator = Correlator::new(
        store.clone(),
        metrics.clone(),
        cfg.domain.clone(),
        cfg.retention,
    );

    // Spawn the poll loop and the store sweeper
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let poller = Poller::new(source, correlator, cfg.poll_interval, shutdown_rx.clone());
    let poller_handle = tokio::spawn(poller.run());
    let sweeper_handle = tokio::spawn(correlation::run_sweeper(
        store.clone(),
        DEFAULT_SWEEP_INTERVAL,
        shutdown_rx,
    ));

    // Build the router and serve until a shutdown signal fires
    let router = build_router(metrics);

    tracing::info!(
        domain = %cfg.domain,
        poll_interval_secs = cfg.poll_interval.as_secs(),
        "Starting scrape endpoint on {}",
        cfg.listen
    );
    let result = run_server(router, cfg.listen).await;

    // Server exit means a shutdown signal fired; stop the background tasks.
    let _ = shutdown_tx.send(true);
    let _ = poller_handle.await;
    let _ = sweeper_handle.await;

    tracing::info!("Exporter shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
