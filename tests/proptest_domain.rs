//! Property-Based Tests - Domain and Store Invariants
//!
//! Uses `proptest` to verify tier classification and transaction
//! retention across random inputs.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use sqlx::sqlite::SqlitePoolOptions;

use pump_tracker::adapters::persistence::schema::init_schema;
use pump_tracker::adapters::persistence::SqlTraderStore;
use pump_tracker::domain::tier::TierThresholds;
use pump_tracker::domain::trader::{ProfitTier, TraderData, TraderTransaction, TxType};
use pump_tracker::ports::repository::TraderRepository;

// ── Tier Classification Properties ──────────────────────────

proptest! {
    /// More profit never lands in a worse tier.
    #[test]
    fn classification_is_monotonic(
        low in -1.0e6f64..1.0e6,
        delta in 0.0f64..1.0e6,
    ) {
        let tiers = TierThresholds::default();
        let rank = |t: Option<ProfitTier>| t.map_or(ProfitTier::ALL.len(), ProfitTier::index);
        let a = rank(tiers.classify(low));
        let b = rank(tiers.classify(low + delta));
        prop_assert!(b <= a, "profit {} ranked {a}, {} ranked {b}", low, low + delta);
    }

    /// A classified profit meets its tier floor and misses the next one up.
    #[test]
    fn classification_respects_floors(profit in -100.0f64..5000.0) {
        let tiers = TierThresholds::default();
        let floors = tiers.floors();
        match tiers.classify(profit) {
            Some(tier) => {
                let i = tier.index();
                prop_assert!(profit >= floors[i]);
                if i > 0 {
                    prop_assert!(profit < floors[i - 1]);
                }
            }
            None => prop_assert!(profit < tiers.tier5),
        }
    }

    /// Tier names survive a string round trip.
    #[test]
    fn tier_names_parse_back(i in 0usize..5) {
        let tier = ProfitTier::ALL[i];
        prop_assert_eq!(tier.as_str().parse::<ProfitTier>().unwrap(), tier);
    }
}

// ── Retention Properties ────────────────────────────────────

fn tx(n: usize) -> TraderTransaction {
    TraderTransaction {
        signature: format!("sig-{n}"),
        mint: "mint".to_string(),
        tx_type: if n % 2 == 0 { TxType::Buy } else { TxType::Sell },
        amount: 1.0,
        token_amount: 100.0,
        timestamp: Utc
            .timestamp_millis_opt(1_700_000_000_000 + i64::try_from(n).unwrap() * 1000)
            .unwrap(),
        profit: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// The store keeps at most `max` transactions, newest first.
    #[test]
    fn store_retains_newest_transactions(max in 1usize..8, added in 0usize..20) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let trader = runtime.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap();
            init_schema(&pool).await.unwrap();
            let store = SqlTraderStore::new(pool, max);

            store
                .create_trader(&TraderData::new("t", 100.0, Some(ProfitTier::Tier3)))
                .await
                .unwrap();
            for n in 0..added {
                store.add_transaction("t", &tx(n)).await.unwrap();
            }
            store.get_trader("t").await.unwrap().unwrap()
        });

        prop_assert_eq!(trader.transactions.len(), added.min(max));
        let expected: Vec<String> = (0..added).rev().take(max).map(|n| format!("sig-{n}")).collect();
        let actual: Vec<String> = trader.transactions.iter().map(|t| t.signature.clone()).collect();
        prop_assert_eq!(actual, expected);
    }
}
