//! # Domain Services
//!
//! Stateless rule engines. Every function is pure: same input, same
//! answer, no I/O and no retained state.
//!
//! - [`payment_service`] - processing, fees, refunds, auto-capture, expiry
//! - [`tenant_service`] - tenant creation, activation and deletion guards

pub mod payment_service;
pub mod tenant_service;

pub use payment_service::{PaymentDomainService, RefundEligibility};
pub use tenant_service::TenantDomainService;

use crate::error::{CoreError, CoreResult};

/// Answer of a "can X happen" rule: allowed, or denied with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl RuleDecision {
    pub fn allow() -> Self {
        RuleDecision {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        RuleDecision {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Converts a denial into `CoreError::BusinessRuleViolation`.
    pub fn into_result(self) -> CoreResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(CoreError::rule(
                self.reason.unwrap_or_else(|| "operation not allowed".to_string()),
            ))
        }
    }
}
