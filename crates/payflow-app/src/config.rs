//! Application configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use payflow_core::Money;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::webhook::RetryConfig;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub log_level: String,

    /// Payment ceiling for tenants whose policy sets none
    pub default_max_payment_cents: u64,

    /// Delay before the first webhook retry
    pub webhook_initial_delay_ms: u64,

    /// Upper bound for the backoff delay
    pub webhook_max_delay_ms: u64,

    /// Attempts for tenants whose policy sets none
    pub webhook_default_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: "info".to_string(),
            default_max_payment_cents: 100_000,
            webhook_initial_delay_ms: 500,
            webhook_max_delay_ms: 30_000,
            webhook_default_retries: 3,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let config = AppConfig {
            log_level: lookup("PAYFLOW_LOG_LEVEL").unwrap_or(defaults.log_level),

            default_max_payment_cents: parse_or(
                &lookup,
                "PAYFLOW_DEFAULT_MAX_PAYMENT_CENTS",
                defaults.default_max_payment_cents,
            )?,

            webhook_initial_delay_ms: parse_or(
                &lookup,
                "PAYFLOW_WEBHOOK_INITIAL_DELAY_MS",
                defaults.webhook_initial_delay_ms,
            )?,

            webhook_max_delay_ms: parse_or(
                &lookup,
                "PAYFLOW_WEBHOOK_MAX_DELAY_MS",
                defaults.webhook_max_delay_ms,
            )?,

            webhook_default_retries: parse_or(
                &lookup,
                "PAYFLOW_WEBHOOK_DEFAULT_RETRIES",
                defaults.webhook_default_retries,
            )?,
        };

        if config.webhook_default_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "PAYFLOW_WEBHOOK_DEFAULT_RETRIES".to_string(),
            ));
        }

        if config.webhook_initial_delay_ms > config.webhook_max_delay_ms {
            return Err(ConfigError::Inconsistent(
                "PAYFLOW_WEBHOOK_INITIAL_DELAY_MS exceeds PAYFLOW_WEBHOOK_MAX_DELAY_MS".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn default_max_payment(&self) -> Money {
        Money::from_cents(self.default_max_payment_cents)
    }

    /// Backoff schedule for a delivery allowed `attempts` tries.
    pub fn webhook_retry(&self, attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts: attempts.max(1),
            initial_delay: Duration::from_millis(self.webhook_initial_delay_ms),
            max_delay: Duration::from_millis(self.webhook_max_delay_ms),
            multiplier: 2.0,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}
