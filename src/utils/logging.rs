//! Structured logging setup.
//!
//! Builds a `tracing-subscriber` from [`LoggingConfig`]. The `RUST_LOG`
//! environment variable, when set, overrides the configured level.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `config`.
///
/// Safe to call more than once: a second install attempt (common in tests)
/// is ignored.
pub fn init(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // Err means a subscriber is already installed; keep it.
    let _ = result;
}
