//! Tracing subscriber configuration for mesh nodes.
//!
//! Log levels follow these conventions:
//! - ERROR: Failures the engine can't retry around
//! - WARN: Recoverable errors, dropped commands, refused sends
//! - INFO: Commissioning milestones (joined, left, peer found)
//! - DEBUG: State transitions, ignored responses, simulated stack activity
//! - TRACE: Timer arm/cancel/expiry

use tracing_subscriber::EnvFilter;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`, which usually comes
/// from the `[logging]` section of the config.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the tracing subscriber with JSON output.
///
/// Activated by setting `RUST_LOG_FORMAT=json`.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` so repeated calls across tests don't panic.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
