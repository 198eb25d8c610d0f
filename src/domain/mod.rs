//! Domain layer - Core models for the token tracker.
//!
//! Pure data types and classification rules. No I/O happens here;
//! persistence and shared state live in the outer layers.

pub mod tier;
pub mod token;
pub mod trader;

// Re-export core types for convenience
pub use tier::TierThresholds;
pub use token::TokenData;
pub use trader::{
    Mint, ProfitTier, TraderAddress, TraderData, TraderTransaction, TraderUpdate, TxType,
};
