//! Event Bus - Fan-out of Market Events
//!
//! A thin wrapper over a `tokio::sync::broadcast` channel. Every
//! subscriber sees every event published after it subscribed; a
//! subscriber that falls more than the buffer size behind receives
//! `RecvError::Lagged` and skips ahead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::token::TokenData;
use crate::domain::trader::{TraderAddress, TraderData};

/// Change notifications emitted by the market state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MarketEvent {
    /// A token was added to the token store for the first time.
    TokenCreated(TokenData),
    /// The SOL/USD reference price changed.
    SolPriceUpdated { price: f64, at: DateTime<Utc> },
    /// A trader was inserted or changed in the trader cache.
    TraderUpdated(TraderData),
    /// A trader left the trader cache.
    TraderRemoved { address: TraderAddress },
}

impl MarketEvent {
    /// Short name used as a log and metric label.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TokenCreated(_) => "token_created",
            Self::SolPriceUpdated { .. } => "sol_price_updated",
            Self::TraderUpdated(_) => "trader_updated",
            Self::TraderRemoved { .. } => "trader_removed",
        }
    }
}

/// Broadcast event bus shared by all state consumers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns how many subscribers will see it;
    /// publishing with nobody listening is not an error.
    pub fn publish(&self, event: MarketEvent) -> usize {
        let kind = event.kind();
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(kind, delivered, "Market event published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
