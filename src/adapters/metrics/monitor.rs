//! Event Monitor - Market Events to Logs and Gauges
//!
//! Subscribes to the market-state event bus and mirrors what it sees
//! into structured logs and the Prometheus registry. Runs until the
//! shutdown broadcast fires or the bus closes.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::prometheus::MetricsRegistry;
use crate::state::{MarketEvent, MarketState};

/// Background consumer of [`MarketEvent`]s.
pub struct EventMonitor {
    state: &'static MarketState,
    metrics: Arc<MetricsRegistry>,
}

impl EventMonitor {
    pub fn new(state: &'static MarketState, metrics: Arc<MetricsRegistry>) -> Self {
        Self { state, metrics }
    }

    /// Run until shutdown. Event-driven via `tokio::select!`.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let mut events = self.state.subscribe_events();
        info!("Event monitor started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Event monitor shutting down");
                    return Ok(());
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle(&event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(dropped = n, "Event monitor lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Market event bus closed");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn handle(&self, event: &MarketEvent) {
        match event {
            MarketEvent::SolPriceUpdated { price, .. } => {
                self.metrics.sol_price_usd.set(*price);
                debug!(price, "SOL price updated");
            }
            MarketEvent::TokenCreated(token) => {
                debug!(mint = %token.mint, symbol = %token.symbol, "Token created");
            }
            MarketEvent::TraderUpdated(trader) => {
                debug!(
                    address = %trader.address,
                    tier = ?trader.profit_tier,
                    "Trader updated"
                );
            }
            MarketEvent::TraderRemoved { address } => {
                debug!(%address, "Trader removed");
            }
        }
    }
}
