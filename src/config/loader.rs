//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages
//! for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;

  if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
    if !url.is_empty() {
      config.database.url = url;
    }
  }

  validate_config(&config)?;

  info!(
    database = %config.database.url,
    max_transactions = config.traders.max_transactions,
    token_capacity = config.market.token_capacity,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty names and URLs
/// - Positive sizes and limits
/// - Strictly decreasing tier thresholds
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.service.name.is_empty(),
    "service.name must not be empty"
  );

  // Database validation
  anyhow::ensure!(
    !config.database.url.is_empty(),
    "database.url must not be empty"
  );
  anyhow::ensure!(
    config.database.max_connections > 0,
    "database.max_connections must be positive"
  );

  // Trader validation
  anyhow::ensure!(
    config.traders.max_transactions > 0,
    "traders.max_transactions must be positive, got {}",
    config.traders.max_transactions
  );
  config
    .traders
    .tiers
    .validate()
    .context("Invalid traders.tiers")?;

  // Market validation
  anyhow::ensure!(
    config.market.token_capacity > 0,
    "market.token_capacity must be positive"
  );
  anyhow::ensure!(
    config.market.event_buffer > 0,
    "market.event_buffer must be positive"
  );

  anyhow::ensure!(
    !config.metrics.bind_address.is_empty(),
    "metrics.bind_address must not be empty"
  );

  Ok(())
}
