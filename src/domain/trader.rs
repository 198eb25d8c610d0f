//! Trader domain types.
//!
//! Defines tracked traders, their buy/sell transactions and the five
//! profit tiers. These types cross every layer: the repository persists
//! them, the market state caches them and the HTTP API serializes them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Type aliases
// ────────────────────────────────────────────

/// Wallet address of a trader (base58 Solana public key).
pub type TraderAddress = String;

/// Token mint address.
pub type Mint = String;

// ────────────────────────────────────────────
// Enums
// ────────────────────────────────────────────

/// Profit tier of a tracked trader. `Tier1` is the most profitable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProfitTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
    Tier5,
}

impl ProfitTier {
    /// All tiers, best first.
    pub const ALL: [Self; 5] = [
        Self::Tier1,
        Self::Tier2,
        Self::Tier3,
        Self::Tier4,
        Self::Tier5,
    ];

    /// Zero-based slot of this tier in [`ProfitTier::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Tier1 => 0,
            Self::Tier2 => 1,
            Self::Tier3 => 2,
            Self::Tier4 => 3,
            Self::Tier5 => 4,
        }
    }

    /// Stored / wire representation (`"tier1"` .. `"tier5"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
            Self::Tier3 => "tier3",
            Self::Tier4 => "tier4",
            Self::Tier5 => "tier5",
        }
    }
}

impl fmt::Display for ProfitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl FromStr for ProfitTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "profit tier",
                value: s.to_string(),
            })
    }
}

/// Direction of a trader transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Buy,
    Sell,
}

impl TxType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(ParseEnumError {
                kind: "transaction type",
                value: other.to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────
// Records
// ────────────────────────────────────────────

/// A single buy or sell performed by a tracked trader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderTransaction {
    /// Chain transaction signature.
    pub signature: String,
    /// Mint of the traded token.
    pub mint: Mint,
    pub tx_type: TxType,
    /// SOL spent or received.
    pub amount: f64,
    /// Token units bought or sold.
    pub token_amount: f64,
    pub timestamp: DateTime<Utc>,
    /// Realized profit in SOL. Absent for buys.
    pub profit: Option<f64>,
}

/// A tracked trader with its most recent transactions (newest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderData {
    pub address: TraderAddress,
    /// Cumulative realized profit in SOL.
    pub total_profit: f64,
    /// `None` means the trader no longer qualifies for tracking.
    pub profit_tier: Option<ProfitTier>,
    pub transactions: Vec<TraderTransaction>,
    pub last_active_timestamp: DateTime<Utc>,
}

impl TraderData {
    /// Create a trader with no transactions, active now.
    pub fn new(
        address: impl Into<TraderAddress>,
        total_profit: f64,
        profit_tier: Option<ProfitTier>,
    ) -> Self {
        Self {
            address: address.into(),
            total_profit,
            profit_tier,
            transactions: Vec::new(),
            last_active_timestamp: Utc::now(),
        }
    }
}

/// Partial update applied by `update_trader`.
///
/// `None` leaves a field unchanged. `profit_tier` is tri-state:
/// `Some(None)` clears the tier, which removes the trader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraderUpdate {
    pub total_profit: Option<f64>,
    pub profit_tier: Option<Option<ProfitTier>>,
    pub last_active_timestamp: Option<DateTime<Utc>>,
    /// Replaces the whole transaction history when present.
    pub transactions: Option<Vec<TraderTransaction>>,
}

impl TraderUpdate {
    pub fn is_empty(&self) -> bool {
        self.total_profit.is_none()
            && self.profit_tier.is_none()
            && self.last_active_timestamp.is_none()
            && self.transactions.is_none()
    }
}
