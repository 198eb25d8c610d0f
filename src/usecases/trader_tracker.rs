//! Trader Tracker - Keeps the Store and the Live Trader Cache in Step
//!
//! Every write goes to the repository first; the market state is only
//! touched once the store has accepted the change, so the cache never
//! holds a trader the store rejected. A trader the store reports as
//! gone (deleted, or tierless) is dropped from the cache as well.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::tier::TierThresholds;
use crate::domain::trader::{TraderData, TraderTransaction, TraderUpdate};
use crate::ports::repository::{StoreError, StoreResult, TraderRepository};
use crate::state::MarketState;

/// Coordinates trader persistence with the shared market state.
pub struct TraderTracker<R: TraderRepository> {
  /// Persistence port.
  repository: Arc<R>,
  /// Live cache the HTTP API reads from.
  state: &'static MarketState,
  /// Profit floors used by `reclassify`.
  tiers: TierThresholds,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<R: TraderRepository> TraderTracker<R> {
  /// Create a new tracker.
  pub fn new(
    repository: Arc<R>,
    state: &'static MarketState,
    tiers: TierThresholds,
  ) -> Self {
    Self {
      repository,
      state,
      tiers,
      metrics: None,
    }
  }

  /// Report store latency and tier sizes to Prometheus.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub const fn state(&self) -> &'static MarketState {
    self.state
  }

  pub fn repository(&self) -> &R {
    &self.repository
  }

  /// Load every tiered trader from the store into the cache.
  #[instrument(skip(self))]
  pub async fn hydrate(&self) -> StoreResult<usize> {
    let started = Instant::now();
    let traders = self.repository.get_all_traders().await?;
    self.observe("get_all_traders", started);

    let count = traders.len();
    self.state.replace_traders(traders).await;
    self.refresh_tier_gauges().await;

    info!(traders = count, "Trader cache hydrated from store");
    Ok(count)
  }

  /// Store a new trader and cache it under its tier.
  #[instrument(skip(self, data), fields(address = %data.address))]
  pub async fn register_trader(&self, data: &TraderData) -> StoreResult<TraderData> {
    let started = Instant::now();
    let created = self.repository.create_trader(data).await?;
    self.observe("create_trader", started);

    self.state.upsert_trader(created.clone()).await;
    self.refresh_tier_gauges().await;
    Ok(created)
  }

  /// Record a trade for a tracked trader.
  ///
  /// Returns `None` when the trader no longer qualifies for tracking;
  /// it is then gone from both the store and the cache.
  #[instrument(skip(self, transaction), fields(signature = %transaction.signature))]
  pub async fn record_transaction(
    &self,
    address: &str,
    transaction: &TraderTransaction,
  ) -> StoreResult<Option<TraderData>> {
    let started = Instant::now();
    let result = self.repository.add_transaction(address, transaction).await;
    self.observe("add_transaction", started);

    let trader = result?;
    if let Some(metrics) = &self.metrics {
      metrics.transactions_recorded.inc();
    }

    self.sync(address, trader.clone(), "tierless").await;
    Ok(trader)
  }

  /// Recompute a trader's tier from a new total profit and persist both.
  ///
  /// A profit below the lowest tier floor removes the trader.
  #[instrument(skip(self))]
  pub async fn reclassify(
    &self,
    address: &str,
    total_profit: f64,
  ) -> StoreResult<Option<TraderData>> {
    let tier = self.tiers.classify(total_profit);
    debug!(?tier, "Classified trader");

    let update = TraderUpdate {
      total_profit: Some(total_profit),
      profit_tier: Some(tier),
      ..Default::default()
    };

    let started = Instant::now();
    let result = self.repository.update_trader(address, &update).await;
    self.observe("update_trader", started);

    let trader = result?;
    self.sync(address, trader.clone(), "below_threshold").await;
    Ok(trader)
  }

  /// Apply an arbitrary partial update.
  #[instrument(skip(self, update))]
  pub async fn update(
    &self,
    address: &str,
    update: &TraderUpdate,
  ) -> StoreResult<Option<TraderData>> {
    let started = Instant::now();
    let result = self.repository.update_trader(address, update).await;
    self.observe("update_trader", started);

    let trader = result?;
    self.sync(address, trader.clone(), "tier_cleared").await;
    Ok(trader)
  }

  /// Fetch a trader from the store, refreshing the cache entry.
  #[instrument(skip(self))]
  pub async fn lookup(&self, address: &str) -> StoreResult<Option<TraderData>> {
    let started = Instant::now();
    let result = self.repository.get_trader(address).await;
    self.observe("get_trader", started);

    let trader = result?;
    self.sync(address, trader.clone(), "tierless").await;
    Ok(trader)
  }

  /// Stop tracking a trader.
  ///
  /// The cache entry is dropped even if the store no longer knew the
  /// trader; the `NotFound` error is still returned. Any other store
  /// failure leaves the cache untouched.
  #[instrument(skip(self))]
  pub async fn forget(&self, address: &str) -> StoreResult<()> {
    let started = Instant::now();
    let result = self.repository.delete_trader(address).await;
    self.observe("delete_trader", started);

    if !matches!(result, Ok(()) | Err(StoreError::NotFound(_))) {
      return result;
    }

    let cached = self.state.remove_trader(address).await.is_some();
    if cached {
      self.count_removal("deleted");
      self.refresh_tier_gauges().await;
    }

    if result.is_err() {
      warn!(cached, "Trader was not in the store");
    }
    result
  }

  /// Mirror the store's view of one trader into the cache.
  async fn sync(&self, address: &str, trader: Option<TraderData>, reason: &str) {
    match trader {
      Some(trader) => self.state.upsert_trader(trader).await,
      None => {
        if self.state.remove_trader(address).await.is_some() {
          self.count_removal(reason);
        }
      }
    }
    self.refresh_tier_gauges().await;
  }

  fn observe(&self, op: &str, started: Instant) {
    if let Some(metrics) = &self.metrics {
      metrics
        .store_latency
        .with_label_values(&[op])
        .observe(started.elapsed().as_secs_f64());
    }
  }

  fn count_removal(&self, reason: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.traders_removed.with_label_values(&[reason]).inc();
    }
  }

  async fn refresh_tier_gauges(&self) {
    if let Some(metrics) = &self.metrics {
      metrics.set_tier_counts(&self.state.tier_counts().await);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::persistence::schema::init_schema;
  use crate::adapters::persistence::SqlTraderStore;
  use crate::config::MarketConfig;
  use crate::domain::trader::{ProfitTier, TxType};
  use chrono::Utc;
  use sqlx::sqlite::SqlitePoolOptions;

  async fn tracker() -> TraderTracker<SqlTraderStore> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .unwrap();
    init_schema(&pool).await.unwrap();

    let state: &'static MarketState =
      Box::leak(Box::new(MarketState::new(&MarketConfig::default())));
    TraderTracker::new(
      Arc::new(SqlTraderStore::new(pool, 100)),
      state,
      TierThresholds::default(),
    )
    .with_metrics(Arc::new(MetricsRegistry::new().unwrap()))
  }

  fn sell(signature: &str) -> TraderTransaction {
    TraderTransaction {
      signature: signature.to_string(),
      mint: "mint".to_string(),
      tx_type: TxType::Sell,
      amount: 2.0,
      token_amount: 5000.0,
      timestamp: Utc::now(),
      profit: Some(1.0),
    }
  }

  #[tokio::test]
  async fn test_register_then_record_updates_cache() {
    let tracker = tracker().await;
    tracker
      .register_trader(&TraderData::new("alice", 120.0, Some(ProfitTier::Tier3)))
      .await
      .unwrap();
    assert_eq!(
      tracker.state().traders_in_tier(ProfitTier::Tier3).await,
      vec!["alice"]
    );

    let trader = tracker
      .record_transaction("alice", &sell("s1"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(trader.transactions.len(), 1);
    assert_eq!(
      tracker.state().trader("alice").await.unwrap().transactions.len(),
      1
    );
  }

  #[tokio::test]
  async fn test_reclassify_promotes_and_drops() {
    let tracker = tracker().await;
    tracker
      .register_trader(&TraderData::new("bob", 20.0, Some(ProfitTier::Tier5)))
      .await
      .unwrap();

    let promoted = tracker.reclassify("bob", 750.0).await.unwrap().unwrap();
    assert_eq!(promoted.profit_tier, Some(ProfitTier::Tier2));
    assert_eq!(
      tracker.state().traders_in_tier(ProfitTier::Tier2).await,
      vec!["bob"]
    );
    assert!(tracker.state().traders_in_tier(ProfitTier::Tier5).await.is_empty());

    assert!(tracker.reclassify("bob", 1.0).await.unwrap().is_none());
    assert!(tracker.state().trader("bob").await.is_none());
    assert!(tracker.lookup("bob").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_hydrate_loads_tiered_traders() {
    let tracker = tracker().await;
    let store = tracker.repository();
    store
      .create_trader(&TraderData::new("a", 2000.0, Some(ProfitTier::Tier1)))
      .await
      .unwrap();
    store
      .create_trader(&TraderData::new("b", 0.0, None))
      .await
      .unwrap();

    assert_eq!(tracker.hydrate().await.unwrap(), 1);
    assert!(tracker.state().trader("a").await.is_some());
    assert!(tracker.state().trader("b").await.is_none());
  }

  #[tokio::test]
  async fn test_update_replaces_history_and_clears_tier() {
    let tracker = tracker().await;
    tracker
      .register_trader(&TraderData::new("dana", 300.0, Some(ProfitTier::Tier3)))
      .await
      .unwrap();

    let unchanged = tracker
      .update("dana", &TraderUpdate::default())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(unchanged.total_profit, 300.0);

    let err = tracker
      .update("nobody", &TraderUpdate::default())
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let update = TraderUpdate {
      transactions: Some(vec![sell("s1"), sell("s2")]),
      ..Default::default()
    };
    let trader = tracker.update("dana", &update).await.unwrap().unwrap();
    assert_eq!(trader.transactions.len(), 2);
    assert_eq!(
      tracker.state().trader("dana").await.unwrap().transactions.len(),
      2
    );

    let clear = TraderUpdate {
      profit_tier: Some(None),
      ..Default::default()
    };
    assert!(tracker.update("dana", &clear).await.unwrap().is_none());
    assert!(tracker.state().trader("dana").await.is_none());
  }

  #[tokio::test]
  async fn test_forget_unknown_trader_still_errors() {
    let tracker = tracker().await;
    let err = tracker.forget("ghost").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
  }

  #[tokio::test]
  async fn test_forget_removes_from_cache() {
    let tracker = tracker().await;
    tracker
      .register_trader(&TraderData::new("carl", 60.0, Some(ProfitTier::Tier4)))
      .await
      .unwrap();

    tracker.forget("carl").await.unwrap();
    assert!(tracker.state().trader("carl").await.is_none());
    assert!(tracker.lookup("carl").await.unwrap().is_none());
  }
}
