//! Global State - Process-wide Live Market State
//!
//! Holds the single `MarketState` instance shared by every request
//! handler and background task. The instance is created lazily on the
//! first call to [`init_global_state`] and lives for the rest of the
//! process; later calls return the same instance regardless of the
//! config they pass.

pub mod events;
pub mod market;

use std::sync::OnceLock;

use tracing::info;

use crate::config::MarketConfig;

pub use events::{EventBus, MarketEvent};
pub use market::{MarketSnapshot, MarketState};

static GLOBAL_STATE: OnceLock<MarketState> = OnceLock::new();

/// Initialize the global market state with default sizing, if needed.
pub fn init_global_state() -> &'static MarketState {
    init_global_state_with(&MarketConfig::default())
}

/// Initialize the global market state, if needed, and return it.
pub fn init_global_state_with(config: &MarketConfig) -> &'static MarketState {
    GLOBAL_STATE.get_or_init(|| {
        info!(
            token_capacity = config.token_capacity,
            event_buffer = config.event_buffer,
            "Initializing global market state"
        );
        MarketState::new(config)
    })
}

/// The global market state, if it has been initialized.
pub fn global_state() -> Option<&'static MarketState> {
    GLOBAL_STATE.get()
}
