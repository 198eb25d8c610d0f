//! Token domain types.
//!
//! A `TokenData` describes one launched token as shown in the live
//! token lists. Tokens are identified by their mint address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trader::Mint;

/// A launched token tracked by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub mint: Mint,
    pub name: String,
    pub symbol: String,
    /// Deployer wallet, when known.
    pub creator: Option<String>,
    /// Market cap denominated in SOL.
    pub market_cap_sol: f64,
    /// Market cap in USD at the SOL price of the last update.
    pub usd_market_cap: f64,
    pub created_timestamp: DateTime<Utc>,
    pub image_uri: Option<String>,
}

impl TokenData {
    /// Recompute the USD market cap from a SOL/USD price.
    pub fn reprice(&mut self, sol_price: f64) {
        self.usd_market_cap = self.market_cap_sol * sol_price;
    }
}
