//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`, with the
//! database URL overridable through the `DATABASE_URL` environment
//! variable. Every section except `[service]` may be omitted.

pub mod loader;

use serde::Deserialize;

use crate::domain::tier::TierThresholds;
use crate::ports::repository::MAX_TRANSACTIONS;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Relational store connection.
  #[serde(default)]
  pub database: DatabaseConfig,
  /// Trader retention and tiering.
  #[serde(default)]
  pub traders: TraderConfig,
  /// Live market state sizing.
  #[serde(default)]
  pub market: MarketConfig,
  /// HTTP API and metrics endpoint.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
  /// SQLite URL, e.g. `sqlite://data/pump-tracker.db` or `sqlite::memory:`.
  #[serde(default = "default_database_url")]
  pub url: String,
  /// Pool size for file-backed databases.
  #[serde(default = "default_max_connections")]
  pub max_connections: u32,
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      url: default_database_url(),
      max_connections: default_max_connections(),
    }
  }
}

/// Trader tracking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TraderConfig {
  /// Transactions retained per trader.
  #[serde(default = "default_max_transactions")]
  pub max_transactions: usize,
  /// Minimum total profit per tier.
  #[serde(default)]
  pub tiers: TierThresholds,
}

impl Default for TraderConfig {
  fn default() -> Self {
    Self {
      max_transactions: MAX_TRANSACTIONS,
      tiers: TierThresholds::default(),
    }
  }
}

/// Live market state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
  /// Maximum tokens kept in the token store (newest kept).
  #[serde(default = "default_token_capacity")]
  pub token_capacity: usize,
  /// Event bus buffer; slow subscribers past this lag drop events.
  #[serde(default = "default_event_buffer")]
  pub event_buffer: usize,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self {
      token_capacity: default_token_capacity(),
      event_buffer: default_event_buffer(),
    }
  }
}

/// HTTP API / metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable the Prometheus `/metrics` route.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Bind address of the HTTP server.
  #[serde(default = "default_bind_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_bind_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_database_url() -> String {
  "sqlite://data/pump-tracker.db".to_string()
}

const fn default_max_connections() -> u32 {
  5
}

const fn default_max_transactions() -> usize {
  MAX_TRANSACTIONS
}

const fn default_token_capacity() -> usize {
  500
}

const fn default_event_buffer() -> usize {
  1024
}

const fn default_true() -> bool {
  true
}

fn default_bind_addr() -> String {
  "0.0.0.0:9090".to_string()
}
