//! HTTP API Adapter
//!
//! Exposes the tracker over axum 0.7: liveness/readiness probes,
//! market-state reads, trader writes and the Prometheus `/metrics`
//! route.
//!
//! Sub-modules:
//! - `handlers`: Route handlers
//! - `error`: Handler error type and status mapping

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::adapters::metrics::MetricsRegistry;
use crate::ports::repository::TraderRepository;
use crate::usecases::trader_tracker::TraderTracker;

pub use error::ApiError;

/// Shared handler state.
pub struct ApiState<R: TraderRepository> {
    pub tracker: Arc<TraderTracker<R>>,
    /// `None` disables `/metrics`.
    pub metrics: Option<Arc<MetricsRegistry>>,
}

impl<R: TraderRepository> Clone for ApiState<R> {
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
            metrics: self.metrics.clone(),
        }
    }
}

/// Build the full router.
pub fn router<R: TraderRepository>(state: ApiState<R>) -> Router {
    use handlers::{
        forget_trader, get_trader, list_tokens, list_traders, live, metrics, push_token, ready,
        reclassify, record_transaction, register_trader, set_sol_price, snapshot,
        subscribe_token, subscribe_trader, tier_members, unsubscribe_token, unsubscribe_trader,
    };

    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready::<R>))
        .route("/metrics", get(metrics::<R>))
        .route("/state", get(snapshot::<R>))
        .route("/tokens", get(list_tokens::<R>).post(push_token::<R>))
        .route("/sol-price", put(set_sol_price::<R>))
        .route(
            "/traders",
            get(list_traders::<R>).post(register_trader::<R>),
        )
        .route(
            "/traders/:address",
            get(get_trader::<R>).delete(forget_trader::<R>),
        )
        .route(
            "/traders/:address/transactions",
            post(record_transaction::<R>),
        )
        .route("/traders/:address/profit", put(reclassify::<R>))
        .route("/tiers/:tier", get(tier_members::<R>))
        .route(
            "/subscriptions/tokens/:mint",
            put(subscribe_token::<R>).delete(unsubscribe_token::<R>),
        )
        .route(
            "/subscriptions/traders/:address",
            put(subscribe_trader::<R>).delete(unsubscribe_trader::<R>),
        )
        .with_state(state)
}

/// Serve the router until a shutdown signal arrives.
#[instrument(skip(app, shutdown_rx))]
pub async fn serve(
    app: Router,
    bind_address: String,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
