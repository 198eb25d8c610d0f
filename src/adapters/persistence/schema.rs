//! Database schema and connection setup.
//!
//! Only defines tables and pool construction; the query logic lives in
//! `trader_store`. Timestamps are stored as Unix milliseconds so that
//! ordering by recency is a plain integer comparison.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection pool for the configured database.
///
/// `sqlite::memory:` URLs get a single connection, since every SQLite
/// connection to `:memory:` would otherwise see its own empty database.
/// File databases run in WAL mode, and a missing parent directory is
/// created first.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let in_memory = config.url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { config.max_connections };

    if !in_memory {
        if let Some(dir) = options
            .get_filename()
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;
        }
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if in_memory {
        // Closing the only connection would drop the whole database
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    info!(
        url = %config.url,
        max_connections,
        "Database pool ready"
    );

    Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS traders (
            address TEXT PRIMARY KEY NOT NULL,
            total_profit REAL NOT NULL DEFAULT 0,
            profit_tier TEXT,
            last_active_ms INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS trader_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trader_address TEXT NOT NULL
                REFERENCES traders(address) ON DELETE CASCADE,
            signature TEXT NOT NULL,
            mint TEXT NOT NULL,
            tx_type TEXT NOT NULL CHECK (tx_type IN ('buy', 'sell')),
            amount REAL NOT NULL,
            token_amount REAL NOT NULL,
            timestamp_ms INTEGER NOT NULL,
            profit REAL
        )",
    )
    .execute(pool)
    .await?;

    // Retention and newest-first reads both scan by (trader, time)
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_trader_transactions_recent
            ON trader_transactions(trader_address, timestamp_ms)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_creation() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        };
        let pool = connect(&config).await.unwrap();
        init_schema(&pool).await.unwrap();
        // Idempotent
        init_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert!(tables.contains(&"traders".to_string()));
        assert!(tables.contains(&"trader_transactions".to_string()));
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_directory() {
        let root = std::env::temp_dir().join(format!(
            "pump-tracker-schema-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let file = root.join("nested").join("traders.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", file.display()),
            max_connections: 2,
        };

        let pool = connect(&config).await.unwrap();
        init_schema(&pool).await.unwrap();
        assert!(file.exists());

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        pool.close().await;
        let _ = std::fs::remove_dir_all(root);
    }
}
