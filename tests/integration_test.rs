//! Integration Tests - Tracker, Market State and HTTP API
//!
//! Tests the interaction between the trader tracker, the live market
//! state and the HTTP router against a mocked repository port.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use mockall::mock;
use mockall::predicate::*;
use tower::ServiceExt;

use pump_tracker::adapters::api::{router, ApiState};
use pump_tracker::config::MarketConfig;
use pump_tracker::domain::tier::TierThresholds;
use pump_tracker::domain::trader::{
    ProfitTier, TraderData, TraderTransaction, TraderUpdate, TxType,
};
use pump_tracker::ports::repository::{StoreError, StoreResult, TraderRepository};
use pump_tracker::state::{MarketEvent, MarketState};
use pump_tracker::usecases::TraderTracker;

// ---- Mock Definitions ----

mock! {
    pub Store {}

    #[async_trait::async_trait]
    impl TraderRepository for Store {
        async fn create_trader(&self, data: &TraderData) -> StoreResult<TraderData>;
        async fn get_trader(&self, address: &str) -> StoreResult<Option<TraderData>>;
        async fn update_trader(
            &self,
            address: &str,
            update: &TraderUpdate,
        ) -> StoreResult<Option<TraderData>>;
        async fn add_transaction(
            &self,
            address: &str,
            transaction: &TraderTransaction,
        ) -> StoreResult<Option<TraderData>>;
        async fn delete_trader(&self, address: &str) -> StoreResult<()>;
        async fn get_all_traders(&self) -> StoreResult<Vec<TraderData>>;
        async fn is_healthy(&self) -> bool;
    }
}

// ---- Helpers ----

fn leaked_state() -> &'static MarketState {
    Box::leak(Box::new(MarketState::new(&MarketConfig::default())))
}

fn tracker(store: MockStore, state: &'static MarketState) -> TraderTracker<MockStore> {
    TraderTracker::new(Arc::new(store), state, TierThresholds::default())
}

fn buy(signature: &str) -> TraderTransaction {
    TraderTransaction {
        signature: signature.to_string(),
        mint: "mint".to_string(),
        tx_type: TxType::Buy,
        amount: 1.5,
        token_amount: 20_000.0,
        timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        profit: None,
    }
}

// ---- Integration Tests ----

#[tokio::test]
async fn test_hydrate_replaces_cache_from_store() {
    let state = leaked_state();
    state
        .upsert_trader(TraderData::new("stale", 50.0, Some(ProfitTier::Tier4)))
        .await;

    let mut store = MockStore::new();
    store.expect_get_all_traders().times(1).returning(|| {
        Ok(vec![
            TraderData::new("whale", 5000.0, Some(ProfitTier::Tier1)),
            TraderData::new("minnow", 15.0, Some(ProfitTier::Tier5)),
        ])
    });

    let tracker = tracker(store, state);
    assert_eq!(tracker.hydrate().await.unwrap(), 2);

    assert!(state.trader("stale").await.is_none());
    assert_eq!(state.traders_in_tier(ProfitTier::Tier1).await, vec!["whale"]);
    assert_eq!(state.traders_in_tier(ProfitTier::Tier5).await, vec!["minnow"]);
}

#[tokio::test]
async fn test_rejected_create_leaves_cache_untouched() {
    let state = leaked_state();
    let mut store = MockStore::new();
    store
        .expect_create_trader()
        .times(1)
        .returning(|data| Err(StoreError::AlreadyExists(data.address.clone())));

    let tracker = tracker(store, state);
    let err = tracker
        .register_trader(&TraderData::new("dup", 200.0, Some(ProfitTier::Tier3)))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::AlreadyExists(ref a) if a == "dup"));
    assert!(state.traders().await.is_empty());
}

#[tokio::test]
async fn test_transaction_that_drops_trader_clears_cache() {
    let state = leaked_state();
    state
        .upsert_trader(TraderData::new("fading", 12.0, Some(ProfitTier::Tier5)))
        .await;
    let mut events = state.subscribe_events();

    let mut store = MockStore::new();
    store
        .expect_add_transaction()
        .with(eq("fading"), always())
        .times(1)
        .returning(|_, _| Ok(None));

    let tracker = tracker(store, state);
    let result = tracker
        .record_transaction("fading", &buy("sig"))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(state.trader("fading").await.is_none());
    match events.recv().await.unwrap() {
        MarketEvent::TraderRemoved { address } => assert_eq!(address, "fading"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_reclassify_sends_profit_and_tier() {
    let state = leaked_state();
    let mut store = MockStore::new();
    store
        .expect_update_trader()
        .withf(|address, update| {
            address == "riser"
                && update.total_profit == Some(600.0)
                && update.profit_tier == Some(Some(ProfitTier::Tier2))
                && update.transactions.is_none()
        })
        .times(1)
        .returning(|address, _| {
            Ok(Some(TraderData::new(address, 600.0, Some(ProfitTier::Tier2))))
        });

    let tracker = tracker(store, state);
    let trader = tracker.reclassify("riser", 600.0).await.unwrap().unwrap();

    assert_eq!(trader.profit_tier, Some(ProfitTier::Tier2));
    assert_eq!(state.traders_in_tier(ProfitTier::Tier2).await, vec!["riser"]);
}

#[tokio::test]
async fn test_reclassify_below_floor_clears_tier() {
    let state = leaked_state();
    state
        .upsert_trader(TraderData::new("loser", 40.0, Some(ProfitTier::Tier5)))
        .await;

    let mut store = MockStore::new();
    store
        .expect_update_trader()
        .withf(|_, update| update.profit_tier == Some(None))
        .times(1)
        .returning(|_, _| Ok(None));

    let tracker = tracker(store, state);
    assert!(tracker.reclassify("loser", -5.0).await.unwrap().is_none());
    assert!(state.trader("loser").await.is_none());
}

#[tokio::test]
async fn test_store_failure_keeps_cached_trader() {
    let state = leaked_state();
    state
        .upsert_trader(TraderData::new("steady", 150.0, Some(ProfitTier::Tier3)))
        .await;

    let mut store = MockStore::new();
    store
        .expect_update_trader()
        .times(1)
        .returning(|_, _| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));

    let tracker = tracker(store, state);
    let err = tracker.reclassify("steady", 900.0).await.unwrap_err();

    assert!(matches!(err, StoreError::Database(_)));
    let cached = state.trader("steady").await.unwrap();
    assert_eq!(cached.profit_tier, Some(ProfitTier::Tier3));
}

#[tokio::test]
async fn test_forget_drops_cache_even_when_store_misses() {
    let state = leaked_state();
    state
        .upsert_trader(TraderData::new("ghost", 75.0, Some(ProfitTier::Tier4)))
        .await;

    let mut store = MockStore::new();
    store
        .expect_delete_trader()
        .with(eq("ghost"))
        .times(1)
        .returning(|address| Err(StoreError::NotFound(address.to_string())));

    let tracker = tracker(store, state);
    assert!(matches!(
        tracker.forget("ghost").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(state.trader("ghost").await.is_none());
}

#[tokio::test]
async fn test_forget_keeps_cache_when_store_fails() {
    let state = leaked_state();
    state
        .upsert_trader(TraderData::new("kept", 75.0, Some(ProfitTier::Tier4)))
        .await;

    let mut store = MockStore::new();
    store
        .expect_delete_trader()
        .with(eq("kept"))
        .times(1)
        .returning(|_| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));

    let tracker = tracker(store, state);
    assert!(matches!(
        tracker.forget("kept").await,
        Err(StoreError::Database(_))
    ));
    assert_eq!(state.traders_in_tier(ProfitTier::Tier4).await, vec!["kept"]);
}

#[tokio::test]
async fn test_ready_probe_reflects_store_health() {
    let state = leaked_state();
    let mut store = MockStore::new();
    store.expect_is_healthy().returning(|| false);

    let app = router(ApiState {
        tracker: Arc::new(tracker(store, state)),
        metrics: None,
    });

    let ready = app
        .clone()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);

    let metrics = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_maps_store_errors() {
    let state = leaked_state();
    let mut store = MockStore::new();
    store
        .expect_add_transaction()
        .returning(|address, _| Err(StoreError::NotFound(address.to_string())));
    store
        .expect_get_trader()
        .returning(|_| Err(StoreError::InvalidData("bad tier".to_string())));

    let app = router(ApiState {
        tracker: Arc::new(tracker(store, state)),
        metrics: None,
    });

    let body = serde_json::to_string(&buy("sig")).unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/traders/nobody/transactions")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/traders/corrupt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
