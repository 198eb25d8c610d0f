//! SQL Trader Store - Relational Adapter for the Repository Port
//!
//! Persists traders and their transactions in two tables linked by
//! the trader address. Every multi-statement operation runs inside a
//! database transaction, so a failed write never leaves a trader
//! half-updated.
//!
//! Retention: at most `max_transactions` rows per trader survive any
//! write; the oldest (by timestamp, then insertion order) go first.
//!
//! Writes are serialized through `write_lock`. A deferred SQLite
//! transaction that reads before writing cannot upgrade its lock while
//! another connection does the same, so two writers must never overlap.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::FromRow;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::schema;
use crate::config::AppConfig;
use crate::domain::trader::{
    ProfitTier, TraderData, TraderTransaction, TraderUpdate,
};
use crate::ports::repository::{StoreError, StoreResult, TraderRepository};

const TRADER_COLUMNS: &str = "address, total_profit, profit_tier, last_active_ms";

const TRANSACTION_COLUMNS: &str = "trader_address, signature, mint, tx_type, amount, \
     token_amount, timestamp_ms, profit";

/// Row shape of the `traders` table.
#[derive(Debug, FromRow)]
struct TraderRow {
    address: String,
    total_profit: f64,
    profit_tier: Option<String>,
    last_active_ms: i64,
}

impl TraderRow {
    fn tier(&self) -> StoreResult<Option<ProfitTier>> {
        self.profit_tier
            .as_deref()
            .map(str::parse::<ProfitTier>)
            .transpose()
            .map_err(invalid)
    }

    fn into_domain(
        self,
        transactions: Vec<TraderTransaction>,
    ) -> StoreResult<TraderData> {
        let profit_tier = self.tier()?;
        Ok(TraderData {
            address: self.address,
            total_profit: self.total_profit,
            profit_tier,
            transactions,
            last_active_timestamp: from_millis(self.last_active_ms)?,
        })
    }
}

/// Row shape of the `trader_transactions` table.
#[derive(Debug, FromRow)]
struct TransactionRow {
    trader_address: String,
    signature: String,
    mint: String,
    tx_type: String,
    amount: f64,
    token_amount: f64,
    timestamp_ms: i64,
    profit: Option<f64>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<(String, TraderTransaction)> {
        let transaction = TraderTransaction {
            signature: self.signature,
            mint: self.mint,
            tx_type: self.tx_type.parse().map_err(invalid)?,
            amount: self.amount,
            token_amount: self.token_amount,
            timestamp: from_millis(self.timestamp_ms)?,
            profit: self.profit,
        };
        Ok((self.trader_address, transaction))
    }
}

fn invalid(err: impl Display) -> StoreError {
    StoreError::InvalidData(err.to_string())
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| invalid(format!("timestamp out of range: {ms}")))
}

/// A unique violation on insert means another writer created the trader.
fn insert_error(address: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::AlreadyExists(address.to_string())
        }
        other => StoreError::Database(other),
    }
}

fn limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// SQLite-backed implementation of [`TraderRepository`].
#[derive(Debug, Clone)]
pub struct SqlTraderStore {
    pool: SqlitePool,
    /// Per-trader retention limit.
    max_transactions: usize,
    /// Held for the whole of every write transaction.
    write_lock: Arc<Mutex<()>>,
}

impl SqlTraderStore {
    /// Wrap an existing pool. The schema must already exist.
    pub fn new(pool: SqlitePool, max_transactions: usize) -> Self {
        Self {
            pool,
            max_transactions,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Connect to the configured database and create the schema.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = schema::connect(&config.database).await?;
        schema::init_schema(&pool)
            .await
            .context("Failed to initialize database schema")?;
        Ok(Self::new(pool, config.traders.max_transactions))
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ── Statement helpers (run on a pooled connection or open transaction) ──

async fn fetch_row(
    conn: &mut SqliteConnection,
    address: &str,
) -> StoreResult<Option<TraderRow>> {
    let row = sqlx::query_as::<_, TraderRow>(&format!(
        "SELECT {TRADER_COLUMNS} FROM traders WHERE address = ?1"
    ))
    .bind(address)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Transactions of one trader, newest first.
async fn fetch_transactions(
    conn: &mut SqliteConnection,
    address: &str,
) -> StoreResult<Vec<TraderTransaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM trader_transactions
         WHERE trader_address = ?1
         ORDER BY timestamp_ms DESC, id DESC"
    ))
    .bind(address)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|row| row.into_domain().map(|(_, tx)| tx))
        .collect()
}

async fn insert_transactions(
    conn: &mut SqliteConnection,
    address: &str,
    transactions: &[TraderTransaction],
) -> StoreResult<()> {
    for tx in transactions {
        sqlx::query(
            "INSERT INTO trader_transactions
                (trader_address, signature, mint, tx_type, amount,
                 token_amount, timestamp_ms, profit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(address)
        .bind(&tx.signature)
        .bind(&tx.mint)
        .bind(tx.tx_type.as_str())
        .bind(tx.amount)
        .bind(tx.token_amount)
        .bind(tx.timestamp.timestamp_millis())
        .bind(tx.profit)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Delete all but the `keep` newest transactions. Returns rows removed.
async fn retain_newest(
    conn: &mut SqliteConnection,
    address: &str,
    keep: usize,
) -> StoreResult<u64> {
    let result = sqlx::query(
        "DELETE FROM trader_transactions
         WHERE trader_address = ?1
           AND id NOT IN (
               SELECT id FROM trader_transactions
               WHERE trader_address = ?1
               ORDER BY timestamp_ms DESC, id DESC
               LIMIT ?2
           )",
    )
    .bind(address)
    .bind(limit(keep))
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Delete a trader's transactions, then the trader. Returns traders removed.
async fn delete_all(conn: &mut SqliteConnection, address: &str) -> StoreResult<u64> {
    sqlx::query("DELETE FROM trader_transactions WHERE trader_address = ?1")
        .bind(address)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("DELETE FROM traders WHERE address = ?1")
        .bind(address)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl TraderRepository for SqlTraderStore {
    #[instrument(skip(self, data), fields(address = %data.address))]
    async fn create_trader(&self, data: &TraderData) -> StoreResult<TraderData> {
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if fetch_row(&mut tx, &data.address).await?.is_some() {
            return Err(StoreError::AlreadyExists(data.address.clone()));
        }

        let last_active_ms = data.last_active_timestamp.timestamp_millis();
        sqlx::query(
            "INSERT INTO traders (address, total_profit, profit_tier, last_active_ms)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&data.address)
        .bind(data.total_profit)
        .bind(data.profit_tier.map(ProfitTier::as_str))
        .bind(last_active_ms)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(&data.address, e))?;

        insert_transactions(&mut tx, &data.address, &data.transactions).await?;

        let trimmed = retain_newest(&mut tx, &data.address, self.max_transactions).await?;
        if trimmed > 0 {
            debug!(trimmed, "Trimmed transactions beyond retention limit");
        }

        let transactions = fetch_transactions(&mut tx, &data.address).await?;
        tx.commit().await?;

        info!(
            tier = ?data.profit_tier,
            transactions = transactions.len(),
            "Trader created"
        );

        Ok(TraderData {
            address: data.address.clone(),
            total_profit: data.total_profit,
            profit_tier: data.profit_tier,
            transactions,
            last_active_timestamp: from_millis(last_active_ms)?,
        })
    }

    #[instrument(skip(self))]
    async fn get_trader(&self, address: &str) -> StoreResult<Option<TraderData>> {
        // May delete a tierless row
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let Some(row) = fetch_row(&mut tx, address).await? else {
            return Ok(None);
        };

        if row.tier()?.is_none() {
            delete_all(&mut tx, address).await?;
            tx.commit().await?;
            info!("Removed trader without profit tier");
            return Ok(None);
        }

        let transactions = fetch_transactions(&mut tx, address).await?;
        tx.commit().await?;

        row.into_domain(transactions).map(Some)
    }

    #[instrument(skip(self, update))]
    async fn update_trader(
        &self,
        address: &str,
        update: &TraderUpdate,
    ) -> StoreResult<Option<TraderData>> {
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let row = fetch_row(&mut tx, address)
            .await?
            .ok_or_else(|| StoreError::NotFound(address.to_string()))?;

        let profit_tier = match update.profit_tier {
            Some(tier) => tier,
            None => row.tier()?,
        };

        if profit_tier.is_none() {
            delete_all(&mut tx, address).await?;
            tx.commit().await?;
            info!("Trader lost its profit tier and was removed");
            return Ok(None);
        }

        if update.is_empty() {
            let transactions = fetch_transactions(&mut tx, address).await?;
            tx.commit().await?;
            return row.into_domain(transactions).map(Some);
        }

        let total_profit = update.total_profit.unwrap_or(row.total_profit);
        let last_active_ms = update
            .last_active_timestamp
            .map_or(row.last_active_ms, |t| t.timestamp_millis());

        sqlx::query(
            "UPDATE traders
             SET total_profit = ?2, profit_tier = ?3, last_active_ms = ?4
             WHERE address = ?1",
        )
        .bind(address)
        .bind(total_profit)
        .bind(profit_tier.map(ProfitTier::as_str))
        .bind(last_active_ms)
        .execute(&mut *tx)
        .await?;

        if let Some(replacement) = &update.transactions {
            sqlx::query("DELETE FROM trader_transactions WHERE trader_address = ?1")
                .bind(address)
                .execute(&mut *tx)
                .await?;

            let keep = replacement.len().min(self.max_transactions);
            insert_transactions(&mut tx, address, &replacement[..keep]).await?;
            debug!(
                given = replacement.len(),
                stored = keep,
                "Replaced transaction history"
            );
        }

        let transactions = fetch_transactions(&mut tx, address).await?;
        tx.commit().await?;

        Ok(Some(TraderData {
            address: address.to_string(),
            total_profit,
            profit_tier,
            transactions,
            last_active_timestamp: from_millis(last_active_ms)?,
        }))
    }

    #[instrument(skip(self, transaction), fields(signature = %transaction.signature))]
    async fn add_transaction(
        &self,
        address: &str,
        transaction: &TraderTransaction,
    ) -> StoreResult<Option<TraderData>> {
        let write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if fetch_row(&mut tx, address).await?.is_none() {
            return Err(StoreError::NotFound(address.to_string()));
        }

        // Make room first so the new row always survives
        let evicted = retain_newest(
            &mut tx,
            address,
            self.max_transactions.saturating_sub(1),
        )
        .await?;

        insert_transactions(&mut tx, address, std::slice::from_ref(transaction)).await?;
        tx.commit().await?;
        drop(write);

        if evicted > 0 {
            debug!(evicted, "Evicted oldest transaction");
        }

        self.get_trader(address).await
    }

    #[instrument(skip(self))]
    async fn delete_trader(&self, address: &str) -> StoreResult<()> {
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        if delete_all(&mut tx, address).await? == 0 {
            return Err(StoreError::NotFound(address.to_string()));
        }

        tx.commit().await?;
        info!("Trader deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_all_traders(&self) -> StoreResult<Vec<TraderData>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, TraderRow>(&format!(
            "SELECT {TRADER_COLUMNS} FROM traders
             WHERE profit_tier IS NOT NULL
             ORDER BY address"
        ))
        .fetch_all(&mut *conn)
        .await?;

        let tx_rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT t.trader_address, t.signature, t.mint, t.tx_type, t.amount,
                    t.token_amount, t.timestamp_ms, t.profit
             FROM trader_transactions t
             JOIN traders r ON r.address = t.trader_address
             WHERE r.profit_tier IS NOT NULL
             ORDER BY t.timestamp_ms DESC, t.id DESC",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut grouped: HashMap<String, Vec<TraderTransaction>> = HashMap::new();
        for row in tx_rows {
            let (address, transaction) = row.into_domain()?;
            grouped.entry(address).or_default().push(transaction);
        }

        let traders = rows
            .into_iter()
            .map(|row| {
                let transactions = grouped.remove(&row.address).unwrap_or_default();
                row.into_domain(transactions)
            })
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(count = traders.len(), "Loaded tiered traders");
        Ok(traders)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
