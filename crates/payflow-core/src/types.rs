//! # Value Objects
//!
//! Small immutable types shared by every aggregate.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Value Objects                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Identifiers    │   │    Provider     │   │    FeeRate      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  PaymentId      │   │  Stripe         │   │  bps (u32)      │       │
//! │  │  TenantId       │   │  Pagarme        │   │  349 = 3.49%    │       │
//! │  │  UserId         │   └─────────────────┘   └─────────────────┘       │
//! │  │  TransactionId  │                                                    │
//! │  │  (≥ 3 chars)    │   ┌─────────────────┐   ┌─────────────────┐       │
//! │  └─────────────────┘   │  ChargeMethod   │   │  Description    │       │
//! │                        │  Card / Other   │   │  1..=255 chars  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Equality is structural (`PartialEq` derives); there is no shared base type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{validate_description, validate_identifier};

// =============================================================================
// Identifiers
// =============================================================================

/// Defines an opaque string identifier validated at construction.
///
/// Deserialization goes through the same constructor, so a persisted id
/// shorter than the minimum length is rejected on load.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $field:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier, rejecting values shorter than 3 chars.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                validate_identifier($field, &value)?;
                Ok($name(value))
            }

            /// Mints a fresh identifier (`<prefix>_<uuid v4 simple>`).
            pub fn generate() -> Self {
                $name(format!("{}_{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a Payment aggregate.
    PaymentId,
    "payment id",
    "pay"
);
define_id!(
    /// Identifier of a Tenant.
    TenantId,
    "tenant id",
    "ten"
);
define_id!(
    /// Identifier of a User inside a tenant.
    UserId,
    "user id",
    "usr"
);
define_id!(
    /// Identifier of a Transaction aggregate.
    TransactionId,
    "transaction id",
    "txn"
);

// =============================================================================
// Description
// =============================================================================

/// Free-text payment description shown on statements and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Description(String);

impl Description {
    /// Trims and validates the description (1 to 255 characters).
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let value = value.as_ref().trim();
        validate_description(value)?;
        Ok(Description(value.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Description {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Description::new(value)
    }
}

impl From<Description> for String {
    fn from(d: Description) -> String {
        d.0
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Fee Rate
// =============================================================================

/// Fee rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 349 bps = 3.49% (Stripe card rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeeRate(u32);

impl FeeRate {
    /// Creates a fee rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        FeeRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Provider
// =============================================================================

/// External payment gateway that moves the funds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Stripe.
    Stripe,
    /// Pagar.me.
    Pagarme,
}

impl Provider {
    /// All supported providers.
    pub const ALL: [Provider; 2] = [Provider::Stripe, Provider::Pagarme];

    /// Stable lowercase code used in persistence and policy maps.
    pub const fn code(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Pagarme => "pagarme",
        }
    }

    /// Human-readable gateway name.
    pub const fn label(&self) -> &'static str {
        match self {
            Provider::Stripe => "Stripe",
            Provider::Pagarme => "Pagar.me",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(Provider::Stripe),
            "pagarme" | "pagar.me" => Ok(Provider::Pagarme),
            _ => Err(ValidationError::NotAllowed {
                field: "provider".to_string(),
                allowed: Provider::ALL.iter().map(|p| p.code().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Charge Method
// =============================================================================

/// How the payer is charged; selects the provider fee tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ChargeMethod {
    /// Credit or debit card.
    #[default]
    Card,
    /// Anything else (PIX, boleto, bank transfer).
    Other,
}

// =============================================================================
// Unit Tests
// =============================================================================
