//! # Application Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (rule / transition / validation)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AppError (this module) ← adds NotFound, StaleWrite, Repository,        │
//! │       │                   Webhook, Config                               │
//! │       ▼                                                                 │
//! │  Caller maps to HTTP / gRPC status                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use payflow_core::{CoreError, ValidationError};
use thiserror::Error;

use crate::config::ConfigError;

/// Application layer errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// A domain rule, transition or validation rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Optimistic concurrency check failed.
    ///
    /// ## When This Occurs
    /// - Two writers loaded the same version and the other one saved first
    /// - A caller saved a stale copy after a reload elsewhere
    #[error("Stale write on {entity} {id}: expected version {expected}, stored version is {found}")]
    StaleWrite {
        entity: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },

    /// Storage failed or returned a row that no longer validates.
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Webhook delivery failed: {0}")]
    Webhook(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Core(err.into())
    }
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }

    pub fn is_stale_write(&self) -> bool {
        matches!(self, AppError::StaleWrite { .. })
    }

    pub fn is_business_rule_violation(&self) -> bool {
        matches!(self, AppError::Core(e) if e.is_business_rule_violation())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_pass_through() {
        let err: AppError = CoreError::rule("tenant has no admin").into();
        assert!(err.is_business_rule_violation());
        assert_eq!(err.to_string(), CoreError::rule("tenant has no admin").to_string());
    }

    #[test]
    fn test_stale_write_message() {
        let err = AppError::StaleWrite {
            entity: "payment",
            id: "pay_1".to_string(),
            expected: 2,
            found: 3,
        };
        assert!(err.is_stale_write());
        assert!(err.to_string().contains("expected version 2"));
    }
}
