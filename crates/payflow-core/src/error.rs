//! # Error Types
//!
//! Domain-specific error types for payflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  payflow-core errors (this file)                                       │
//! │  ├── CoreError        - State machine and business rule failures       │
//! │  └── ValidationError  - Bad constructor arguments for value objects    │
//! │                                                                         │
//! │  payflow-app errors (separate crate)                                   │
//! │  └── AppError         - Repository, conflict and delivery failures     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → AppError → caller response        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (payment id, status, amounts)
//! 3. Errors are enum variants, never String
//! 4. The core never retries or swallows an error

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// Every failure is synchronous and carries a human-readable message.
/// Application callers translate these into user-facing responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A state-machine guard was violated.
    ///
    /// ## When This Occurs
    /// - `capture()` on a PENDING payment (must be authorized first)
    /// - `authorize()` on anything but PENDING
    /// - `cancel()` once the payment was captured
    /// - `complete()` on a transaction that never started processing
    #[error("{entity} {id} is {status}, cannot {action}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: String,
        action: &'static str,
    },

    /// A tenant policy or business rule rejected the operation.
    ///
    /// ## When This Occurs
    /// - Amount above the tenant's `max_payment_amount`
    /// - Provider not enabled in the tenant's payment methods
    /// - Tenant lifecycle guard (active payments, missing admin)
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),

    /// Refund larger than the payment's original amount.
    ///
    /// The bound is the ORIGINAL amount, not what remains after earlier
    /// partial refunds.
    #[error("Business rule violation: refund exceeds original amount ({requested} > {original})")]
    RefundExceedsOriginal { requested: String, original: String },

    /// The aggregate was soft-deleted and rejects mutation.
    #[error("{entity} {id} is deleted")]
    Deleted { entity: &'static str, id: String },

    /// The operation conflicts with the aggregate's current state.
    ///
    /// ## When This Occurs
    /// - Soft-deleting a CAPTURED payment
    /// - Soft-deleting a COMPLETED transaction
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Money subtraction would produce a negative amount.
    #[error("Money underflow: {minuend} - {subtrahend} is negative")]
    Underflow { minuend: String, subtrahend: String },

    /// Money addition would exceed `Money::MAX_CENTS`.
    #[error("Money overflow: {augend} + {addend} exceeds the supported range")]
    Overflow { augend: String, addend: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidTransition error.
    pub fn invalid_transition(
        entity: &'static str,
        id: impl Into<String>,
        status: impl ToString,
        action: &'static str,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            id: id.into(),
            status: status.to_string(),
            action,
        }
    }

    /// Creates a BusinessRuleViolation error.
    pub fn rule(reason: impl Into<String>) -> Self {
        CoreError::BusinessRuleViolation(reason.into())
    }

    /// True for tenant-policy rejections (including refund over-amount).
    pub fn is_business_rule_violation(&self) -> bool {
        matches!(
            self,
            CoreError::BusinessRuleViolation(_) | CoreError::RefundExceedsOriginal { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at construction time by value objects and factories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed slug, email, number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., slug already taken).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Creates an InvalidFormat error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
