//! Market State - Live Tokens, Prices, Subscriptions and Trader Tiers
//!
//! All collections sit behind one `tokio::sync::RwLock`; every mutation
//! takes the write lock, updates the collections and publishes the
//! matching `MarketEvent` before releasing it, so subscribers never see
//! an event for a change that is not yet visible.
//!
//! Trader invariant: a cached trader's address is in exactly one tier
//! set, the one matching its `profit_tier`. Tierless traders are never
//! cached.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument};

use super::events::{EventBus, MarketEvent};
use crate::config::MarketConfig;
use crate::domain::token::TokenData;
use crate::domain::trader::{Mint, ProfitTier, TraderAddress, TraderData};

#[derive(Debug, Default)]
struct MarketInner {
    /// Newest first, at most `token_capacity` entries.
    tokens: VecDeque<TokenData>,
    active_tokens: Vec<TokenData>,
    sol_price: f64,
    last_price_update: Option<DateTime<Utc>>,
    subscribed_tokens: HashSet<Mint>,
    traders: HashMap<TraderAddress, TraderData>,
    /// Indexed by `ProfitTier::index`.
    tiers: [HashSet<TraderAddress>; 5],
    subscribed_traders: HashSet<TraderAddress>,
}

impl MarketInner {
    fn detach_trader(&mut self, address: &str) -> Option<TraderData> {
        for set in &mut self.tiers {
            set.remove(address);
        }
        self.traders.remove(address)
    }

    fn tier_counts(&self) -> BTreeMap<ProfitTier, usize> {
        ProfitTier::ALL
            .into_iter()
            .map(|tier| (tier, self.tiers[tier.index()].len()))
            .collect()
    }
}

/// Serializable summary of the market state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub token_count: usize,
    pub active_token_count: usize,
    pub sol_price: f64,
    pub last_price_update: Option<DateTime<Utc>>,
    pub subscribed_tokens: usize,
    pub subscribed_traders: usize,
    pub trader_count: usize,
    pub tiers: BTreeMap<ProfitTier, usize>,
    pub event_subscribers: usize,
}

/// Shared live market state.
#[derive(Debug)]
pub struct MarketState {
    inner: RwLock<MarketInner>,
    events: EventBus,
    token_capacity: usize,
}

impl MarketState {
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            inner: RwLock::new(MarketInner::default()),
            events: EventBus::new(config.event_buffer),
            token_capacity: config.token_capacity.max(1),
        }
    }

    // ── Events ──────────────────────────────────────────────

    pub fn subscribe_events(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    // ── Tokens ──────────────────────────────────────────────

    /// Add a token at the front of the token store.
    ///
    /// A token whose mint is already stored replaces the old entry and
    /// moves to the front without a `TokenCreated` event. Returns
    /// whether the mint was new.
    #[instrument(skip(self, token), fields(mint = %token.mint))]
    pub async fn push_token(&self, mut token: TokenData) -> bool {
        let mut inner = self.inner.write().await;

        if inner.sol_price > 0.0 {
            token.reprice(inner.sol_price);
        }

        let existing = inner.tokens.iter().position(|t| t.mint == token.mint);
        let is_new = existing.is_none();
        if let Some(pos) = existing {
            inner.tokens.remove(pos);
        }

        inner.tokens.push_front(token.clone());
        if inner.tokens.len() > self.token_capacity {
            inner.tokens.truncate(self.token_capacity);
            debug!(capacity = self.token_capacity, "Token store at capacity");
        }

        if is_new {
            self.events.publish(MarketEvent::TokenCreated(token));
        }
        is_new
    }

    /// Replace the list of currently active tokens.
    pub async fn set_active_tokens(&self, tokens: Vec<TokenData>) {
        let mut inner = self.inner.write().await;
        inner.active_tokens = tokens;
    }

    /// Token store contents, newest first.
    pub async fn tokens(&self) -> Vec<TokenData> {
        self.inner.read().await.tokens.iter().cloned().collect()
    }

    pub async fn active_tokens(&self) -> Vec<TokenData> {
        self.inner.read().await.active_tokens.clone()
    }

    /// Look a token up by mint, active tokens first.
    pub async fn token(&self, mint: &str) -> Option<TokenData> {
        let inner = self.inner.read().await;
        inner
            .active_tokens
            .iter()
            .chain(inner.tokens.iter())
            .find(|t| t.mint == mint)
            .cloned()
    }

    // ── SOL price ───────────────────────────────────────────

    /// Record a new SOL/USD price and reprice every stored token.
    pub async fn set_sol_price(&self, price: f64) -> anyhow::Result<()> {
        anyhow::ensure!(
            price.is_finite() && price >= 0.0,
            "SOL price must be a non-negative number, got {price}"
        );

        let now = Utc::now();
        let mut inner = self.inner.write().await;
        inner.sol_price = price;
        inner.last_price_update = Some(now);

        let MarketInner {
            tokens,
            active_tokens,
            ..
        } = &mut *inner;
        for token in tokens.iter_mut().chain(active_tokens.iter_mut()) {
            token.reprice(price);
        }

        self.events
            .publish(MarketEvent::SolPriceUpdated { price, at: now });
        Ok(())
    }

    pub async fn sol_price(&self) -> f64 {
        self.inner.read().await.sol_price
    }

    pub async fn last_price_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_price_update
    }

    // ── Subscriptions ───────────────────────────────────────

    /// Returns `true` if the mint was not subscribed before.
    pub async fn subscribe_token(&self, mint: &str) -> bool {
        self.inner
            .write()
            .await
            .subscribed_tokens
            .insert(mint.to_string())
    }

    /// Returns `true` if the mint was subscribed.
    pub async fn unsubscribe_token(&self, mint: &str) -> bool {
        self.inner.write().await.subscribed_tokens.remove(mint)
    }

    pub async fn is_token_subscribed(&self, mint: &str) -> bool {
        self.inner.read().await.subscribed_tokens.contains(mint)
    }

    /// Subscribed mints, sorted.
    pub async fn subscribed_tokens(&self) -> Vec<Mint> {
        let mut mints: Vec<_> = self
            .inner
            .read()
            .await
            .subscribed_tokens
            .iter()
            .cloned()
            .collect();
        mints.sort();
        mints
    }

    pub async fn subscribe_trader(&self, address: &str) -> bool {
        self.inner
            .write()
            .await
            .subscribed_traders
            .insert(address.to_string())
    }

    pub async fn unsubscribe_trader(&self, address: &str) -> bool {
        self.inner.write().await.subscribed_traders.remove(address)
    }

    pub async fn is_trader_subscribed(&self, address: &str) -> bool {
        self.inner.read().await.subscribed_traders.contains(address)
    }

    pub async fn subscribed_traders(&self) -> Vec<TraderAddress> {
        let mut addresses: Vec<_> = self
            .inner
            .read()
            .await
            .subscribed_traders
            .iter()
            .cloned()
            .collect();
        addresses.sort();
        addresses
    }

    // ── Traders ─────────────────────────────────────────────

    /// Cache a trader under its current tier.
    ///
    /// A trader without a tier is removed from the cache instead.
    #[instrument(skip(self, trader), fields(address = %trader.address, tier = ?trader.profit_tier))]
    pub async fn upsert_trader(&self, trader: TraderData) {
        let Some(tier) = trader.profit_tier else {
            self.remove_trader(&trader.address).await;
            return;
        };

        let mut inner = self.inner.write().await;
        inner.detach_trader(&trader.address);
        inner.tiers[tier.index()].insert(trader.address.clone());
        inner.traders.insert(trader.address.clone(), trader.clone());

        self.events.publish(MarketEvent::TraderUpdated(trader));
    }

    /// Drop a trader from the cache and every tier set.
    pub async fn remove_trader(&self, address: &str) -> Option<TraderData> {
        let mut inner = self.inner.write().await;
        let removed = inner.detach_trader(address);

        if removed.is_some() {
            self.events.publish(MarketEvent::TraderRemoved {
                address: address.to_string(),
            });
        }
        removed
    }

    /// Replace the whole trader cache, e.g. after loading from storage.
    ///
    /// Publishes no per-trader events.
    pub async fn replace_traders(&self, traders: Vec<TraderData>) {
        let mut inner = self.inner.write().await;
        inner.traders.clear();
        for set in &mut inner.tiers {
            set.clear();
        }

        for trader in traders {
            if let Some(tier) = trader.profit_tier {
                inner.tiers[tier.index()].insert(trader.address.clone());
                inner.traders.insert(trader.address.clone(), trader);
            }
        }

        info!(traders = inner.traders.len(), "Trader cache replaced");
    }

    pub async fn trader(&self, address: &str) -> Option<TraderData> {
        self.inner.read().await.traders.get(address).cloned()
    }

    /// All cached traders, sorted by address.
    pub async fn traders(&self) -> Vec<TraderData> {
        let mut traders: Vec<_> = self.inner.read().await.traders.values().cloned().collect();
        traders.sort_by(|a, b| a.address.cmp(&b.address));
        traders
    }

    /// Addresses in one tier, sorted.
    pub async fn traders_in_tier(&self, tier: ProfitTier) -> Vec<TraderAddress> {
        let mut addresses: Vec<_> = self.inner.read().await.tiers[tier.index()]
            .iter()
            .cloned()
            .collect();
        addresses.sort();
        addresses
    }

    pub async fn tier_counts(&self) -> BTreeMap<ProfitTier, usize> {
        self.inner.read().await.tier_counts()
    }

    pub async fn snapshot(&self) -> MarketSnapshot {
        let inner = self.inner.read().await;
        MarketSnapshot {
            token_count: inner.tokens.len(),
            active_token_count: inner.active_tokens.len(),
            sol_price: inner.sol_price,
            last_price_update: inner.last_price_update,
            subscribed_tokens: inner.subscribed_tokens.len(),
            subscribed_traders: inner.subscribed_traders.len(),
            trader_count: inner.traders.len(),
            tiers: inner.tier_counts(),
            event_subscribers: self.events.subscriber_count(),
        }
    }
}
