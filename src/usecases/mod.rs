//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `TraderTracker`: Store-first trader writes mirrored into the live cache

pub mod trader_tracker;

pub use trader_tracker::TraderTracker;
