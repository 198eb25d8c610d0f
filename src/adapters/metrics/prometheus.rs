//! Prometheus Metrics Registry - Tracker Observability
//!
//! Registers the tracker's metrics and renders them in the Prometheus
//! text format for the `/metrics` route. All metrics follow the naming
//! convention `pump_tracker_*`.

use std::collections::BTreeMap;

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::domain::trader::ProfitTier;

/// Centralized Prometheus metrics for the tracker.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Cached traders per profit tier.
    pub traders_per_tier: IntGaugeVec,
    /// Transactions accepted through `record_transaction`.
    pub transactions_recorded: IntCounter,
    /// Traders dropped from tracking, by reason.
    pub traders_removed: IntCounterVec,
    /// Last known SOL/USD price.
    pub sol_price_usd: Gauge,
    /// Repository call latency in seconds, by operation.
    pub store_latency: HistogramVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let traders_per_tier = IntGaugeVec::new(
            Opts::new(
                "pump_tracker_traders_per_tier",
                "Tracked traders per profit tier",
            ),
            &["tier"],
        )?;

        let transactions_recorded = IntCounter::new(
            "pump_tracker_transactions_recorded_total",
            "Trader transactions recorded",
        )?;

        let traders_removed = IntCounterVec::new(
            Opts::new(
                "pump_tracker_traders_removed_total",
                "Traders dropped from tracking",
            ),
            &["reason"],
        )?;

        let sol_price_usd = Gauge::new(
            "pump_tracker_sol_price_usd",
            "Last known SOL/USD price",
        )?;

        let store_latency = HistogramVec::new(
            HistogramOpts::new(
                "pump_tracker_store_latency_seconds",
                "Trader repository call latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["op"],
        )?;

        // Register all metrics
        registry.register(Box::new(traders_per_tier.clone()))?;
        registry.register(Box::new(transactions_recorded.clone()))?;
        registry.register(Box::new(traders_removed.clone()))?;
        registry.register(Box::new(sol_price_usd.clone()))?;
        registry.register(Box::new(store_latency.clone()))?;

        Ok(Self {
            registry,
            traders_per_tier,
            transactions_recorded,
            traders_removed,
            sol_price_usd,
            store_latency,
        })
    }

    /// Overwrite the per-tier gauges.
    pub fn set_tier_counts(&self, counts: &BTreeMap<ProfitTier, usize>) {
        for tier in ProfitTier::ALL {
            let n = counts.get(&tier).copied().unwrap_or(0);
            self.traders_per_tier
                .with_label_values(&[tier.as_str()])
                .set(i64::try_from(n).unwrap_or(i64::MAX));
        }
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
