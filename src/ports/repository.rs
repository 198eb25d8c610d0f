//! Repository Port - Trader Persistence Interface
//!
//! Defines the trait the use-case layer needs from a trader store.
//! Implementations own the retention policy: at most `max_transactions`
//! transactions are kept per trader, oldest dropped first, and a trader
//! whose tier is cleared is deleted rather than kept around.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::trader::{TraderData, TraderTransaction, TraderUpdate};

/// Default number of transactions retained per trader.
pub const MAX_TRANSACTIONS: usize = 100;

/// Errors surfaced by trader stores.
#[derive(Debug, Error)]
pub enum StoreError {
  /// A trader with this address is already stored.
  #[error("Trader with address {0} already exists")]
  AlreadyExists(String),

  /// No trader with this address is stored.
  #[error("Trader with address {0} not found")]
  NotFound(String),

  /// A stored row could not be mapped back into a domain value.
  #[error("Invalid stored data: {0}")]
  InvalidData(String),

  /// Underlying database failure.
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for trader persistence providers.
#[async_trait]
pub trait TraderRepository: Send + Sync + 'static {
  /// Insert a new trader with its transactions.
  ///
  /// Fails with [`StoreError::AlreadyExists`] when the address is taken.
  /// Transactions beyond the retention limit are trimmed oldest-first.
  async fn create_trader(&self, data: &TraderData) -> StoreResult<TraderData>;

  /// Load a trader with transactions newest first.
  ///
  /// A stored trader without a tier is deleted and reported as `None`.
  async fn get_trader(&self, address: &str) -> StoreResult<Option<TraderData>>;

  /// Apply a partial update.
  ///
  /// A transaction list replaces the stored history (first
  /// `max_transactions` entries kept). Returns `None` when the trader
  /// ends up without a tier, in which case it has been deleted.
  async fn update_trader(
    &self,
    address: &str,
    update: &TraderUpdate,
  ) -> StoreResult<Option<TraderData>>;

  /// Append one transaction, evicting the oldest when at capacity, and
  /// return the trader as [`TraderRepository::get_trader`] would.
  async fn add_transaction(
    &self,
    address: &str,
    transaction: &TraderTransaction,
  ) -> StoreResult<Option<TraderData>>;

  /// Delete a trader and all of its transactions.
  async fn delete_trader(&self, address: &str) -> StoreResult<()>;

  /// All traders that currently hold a tier.
  async fn get_all_traders(&self) -> StoreResult<Vec<TraderData>>;

  /// Check that the store answers queries.
  async fn is_healthy(&self) -> bool;
}
