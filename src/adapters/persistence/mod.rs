//! Persistence Adapters - SQLite Trader Store
//!
//! Implements the `TraderRepository` port on top of sqlx. Traders and
//! their transactions live in two tables; every multi-statement write
//! runs inside one database transaction.

pub mod schema;
pub mod trader_store;

pub use trader_store::SqlTraderStore;
