//! Metrics and Monitoring Adapters
//!
//! Provides the Prometheus registry rendered on `/metrics` and a
//! background monitor that mirrors market events into logs and gauges.

pub mod monitor;
pub mod prometheus;

pub use monitor::EventMonitor;
pub use prometheus::MetricsRegistry;
