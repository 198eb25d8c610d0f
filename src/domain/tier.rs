//! Profit tier classification.
//!
//! Maps a trader's cumulative profit onto one of five tiers. A trader
//! below the tier-5 floor has no tier and stops being tracked.

use serde::Deserialize;

use super::trader::ProfitTier;

/// Minimum total profit (SOL) required for each tier, best tier first.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TierThresholds {
    pub tier1: f64,
    pub tier2: f64,
    pub tier3: f64,
    pub tier4: f64,
    pub tier5: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            tier1: 1000.0,
            tier2: 500.0,
            tier3: 100.0,
            tier4: 50.0,
            tier5: 10.0,
        }
    }
}

impl TierThresholds {
    /// Floors in tier order, matching [`ProfitTier::ALL`].
    pub const fn floors(&self) -> [f64; 5] {
        [self.tier1, self.tier2, self.tier3, self.tier4, self.tier5]
    }

    /// Highest tier whose floor `total_profit` meets, if any.
    pub fn classify(&self, total_profit: f64) -> Option<ProfitTier> {
        if !total_profit.is_finite() {
            return None;
        }
        ProfitTier::ALL
            .into_iter()
            .zip(self.floors())
            .find(|(_, floor)| total_profit >= *floor)
            .map(|(tier, _)| tier)
    }

    /// Floors must be finite and strictly decreasing from tier1 to tier5.
    pub fn validate(&self) -> anyhow::Result<()> {
        let floors = self.floors();
        anyhow::ensure!(
            floors.iter().all(|f| f.is_finite()),
            "tier thresholds must be finite, got {floors:?}"
        );
        anyhow::ensure!(
            floors.windows(2).all(|w| w[0] > w[1]),
            "tier thresholds must be strictly decreasing, got {floors:?}"
        );
        Ok(())
    }
}
