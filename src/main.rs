//! Pump Tracker - Entry Point
//!
//! Initializes configuration, logging, the trader store and the global
//! market state, then serves the HTTP API until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Init the global market state
//! 4. Open the SQLite trader store and hydrate the trader cache
//! 5. Spawn the HTTP API on `metrics.bind_address`
//! 6. Spawn the market event monitor
//! 7. Wait for SIGINT, then broadcast shutdown and drain tasks

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use pump_tracker::adapters::api::{self, ApiState};
use pump_tracker::adapters::metrics::{EventMonitor, MetricsRegistry};
use pump_tracker::adapters::persistence::SqlTraderStore;
use pump_tracker::config;
use pump_tracker::state::init_global_state_with;
use pump_tracker::usecases::TraderTracker;

/// Config path, overridable with the first CLI argument.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database.url,
        "Starting Pump Tracker"
    );

    // ── 3. Shared state and shutdown channel ────────────────
    let state = init_global_state_with(&config.market);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Trader store + cache hydration ───────────────────
    let store = Arc::new(
        SqlTraderStore::from_config(&config)
            .await
            .context("Failed to open trader store")?,
    );

    let metrics = if config.metrics.enabled {
        Some(Arc::new(
            MetricsRegistry::new().context("Failed to create metrics registry")?,
        ))
    } else {
        None
    };

    let mut tracker = TraderTracker::new(store, state, config.traders.tiers);
    if let Some(metrics) = &metrics {
        tracker = tracker.with_metrics(Arc::clone(metrics));
    }
    let tracker = Arc::new(tracker);

    let hydrated = tracker
        .hydrate()
        .await
        .context("Failed to load traders from store")?;
    info!(traders = hydrated, "Trader cache ready");

    // ── 5. Spawn HTTP API ───────────────────────────────────
    let app = api::router(ApiState {
        tracker: Arc::clone(&tracker),
        metrics: metrics.clone(),
    });
    let api_shutdown = shutdown_tx.subscribe();
    let bind_address = config.metrics.bind_address.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(app, bind_address, api_shutdown).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // ── 6. Spawn event monitor ──────────────────────────────
    let monitor_handle = metrics.map(|metrics| {
        let monitor = EventMonitor::new(state, metrics);
        let monitor_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = monitor.run(monitor_shutdown).await {
                error!(error = %e, "Event monitor failed");
            }
        })
    });

    info!("All tasks spawned, tracker is running");

    // ── 7. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(10), api_handle).await;
    if let Some(handle) = monitor_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}
