//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `api`: axum HTTP API over the tracker and market state
//! - `metrics`: Prometheus export and the market event monitor
//! - `persistence`: SQLite trader store via sqlx

pub mod api;
pub mod metrics;
pub mod persistence;
