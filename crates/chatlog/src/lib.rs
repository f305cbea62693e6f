//! Public surface for chatlog.
//!
//! This crate re-exports the store, config and service crates and wires a
//! loaded [`ChatlogConfig`](config::ChatlogConfig) into runtime components.

mod error;
mod runtime;

/// Re-export for convenience.
pub use chatlog_config as config;
/// Re-export for convenience.
pub use chatlog_services as services;
/// Re-export for convenience.
pub use chatlog_store as store;

pub use error::ChatlogError;
pub use runtime::{
    OBJECT_STORE_FILE, avatar_client, build_adapter, open_settings, open_store, store_options,
};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
