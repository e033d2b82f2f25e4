//! Tracing setup.

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Installs the global fmt subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - overrides everything
/// - `RUST_LOG=payflow_app=trace` - trace for the application layer only
/// - Default: `AppConfig::log_level`
///
/// Returns `false` when a subscriber is already installed (tests, embedding
/// applications); calling it twice is harmless.
pub fn init_tracing(config: &AppConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
