//! # Money Module
//!
//! Provides the `Money` and `Currency` types for handling payment amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Gateways (Stripe, Pagar.me) all speak minor units:                     │
//! │    R$ 50,00 is sent as amount=5000                                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents, never negative                            │
//! │    Major-unit input is rounded to the nearest cent ONCE, at the edge.   │
//! │    Every later operation is exact integer math.                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use payflow_core::money::Money;
//!
//! let amount = Money::from_major(50.0).unwrap();   // R$ 50,00
//! assert_eq!(amount.cents(), 5000);
//!
//! let total = amount.add(Money::from_cents(250)).unwrap(); // R$ 52,50
//! assert_eq!(total.to_major(), 52.5);
//!
//! // Subtraction never goes below zero
//! assert!(amount.subtract(Money::from_cents(5001)).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::FeeRate;

// =============================================================================
// Money Type
// =============================================================================

/// A non-negative monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **u64 (unsigned)**: A payment amount is never negative; refunds are
///   modelled by status and transaction type, not by sign
/// - **Single field tuple struct**: Zero-cost abstraction over u64
/// - **No `Sub` impl**: subtraction is fallible, see [`Money::subtract`]
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  request amount (major) ──► Money::from_major ──► Payment.amount       │
/// │                                                     │                   │
/// │                      ┌──────────────────────────────┼──────────────┐   │
/// │                      ▼                              ▼              ▼   │
/// │            provider fee (bps)          refund ceiling     policy max   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(u64);

impl Money {
    /// Largest representable amount: the signed 64-bit ceiling of the
    /// persistence column.
    pub const MAX_CENTS: u64 = i64::MAX as u64;

    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from a signed cent count (persistence input).
    ///
    /// Negative values are rejected.
    pub fn try_from_cents(cents: i64) -> Result<Self, ValidationError> {
        u64::try_from(cents)
            .map(Money)
            .map_err(|_| ValidationError::Negative {
                field: "amount".to_string(),
            })
    }

    /// Creates a Money value from a major-unit decimal, rounding to the
    /// nearest cent (ties away from zero).
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(10.99).unwrap().cents(), 1099);
    /// assert_eq!(Money::from_major(0.005).unwrap().cents(), 1);
    /// assert!(Money::from_major(-1.0).is_err());
    /// ```
    pub fn from_major(amount: f64) -> Result<Self, ValidationError> {
        if !amount.is_finite() {
            return Err(ValidationError::invalid_format("amount", "must be a finite number"));
        }
        if amount < 0.0 {
            return Err(ValidationError::Negative {
                field: "amount".to_string(),
            });
        }

        let cents = (amount * 100.0).round();
        if cents >= Self::MAX_CENTS as f64 {
            return Err(ValidationError::invalid_format("amount", "is too large"));
        }
        Ok(Money(cents as u64))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the value in cents as a signed integer (persistence output).
    ///
    /// Exact for every amount built through `from_major`, `multiply`, `add`
    /// or `try_from_cents`, which all stay within `MAX_CENTS`.
    #[inline]
    pub fn cents_i64(&self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }

    /// Converts back to a major-unit decimal.
    ///
    /// The division happens once on an exact integer, so no rounding error
    /// accumulates across operations.
    #[inline]
    pub fn to_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major_part(&self) -> u64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> u64 {
        self.0 % 100
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Adds `other`, failing with `Overflow` past `MAX_CENTS`.
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    ///
    /// let a = Money::from_cents(1000);
    /// assert_eq!(a.add(Money::from_cents(250)).unwrap().cents(), 1250);
    /// assert!(Money::from_cents(Money::MAX_CENTS).add(Money::from_cents(1)).is_err());
    /// ```
    pub fn add(&self, other: Money) -> CoreResult<Money> {
        self.0
            .checked_add(other.0)
            .filter(|cents| *cents <= Self::MAX_CENTS)
            .map(Money)
            .ok_or_else(|| CoreError::Overflow {
                augend: self.to_string(),
                addend: other.to_string(),
            })
    }

    /// Subtracts `other`, failing with `Underflow` if the result would be negative.
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    ///
    /// let a = Money::from_cents(1000);
    /// assert_eq!(a.subtract(Money::from_cents(400)).unwrap().cents(), 600);
    /// assert!(a.subtract(Money::from_cents(1001)).is_err());
    /// ```
    pub fn subtract(&self, other: Money) -> CoreResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| CoreError::Underflow {
                minuend: self.to_string(),
                subtrahend: other.to_string(),
            })
    }

    /// Multiplies by a non-negative factor, rounding to the nearest cent.
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    ///
    /// let amount = Money::from_cents(1000);
    /// assert_eq!(amount.multiply(0.5).unwrap().cents(), 500);
    /// assert_eq!(amount.multiply(0.0333).unwrap().cents(), 33);
    /// ```
    pub fn multiply(&self, factor: f64) -> Result<Money, ValidationError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ValidationError::invalid_format(
                "factor",
                "must be a finite, non-negative number",
            ));
        }
        let cents = (self.0 as f64 * factor).round();
        if cents >= Self::MAX_CENTS as f64 {
            return Err(ValidationError::invalid_format("factor", "result is too large"));
        }
        Ok(Money(cents as u64))
    }

    /// Applies a basis-point rate with half-up rounding in integer math.
    ///
    /// ## Implementation
    /// `(amount * bps + 5000) / 10000`; the +5000 is the 0.5 rounding term.
    /// u128 keeps large amounts from overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    /// use payflow_core::types::FeeRate;
    ///
    /// let amount = Money::from_cents(10_000);           // 100.00
    /// let fee = amount.apply_rate(FeeRate::from_bps(349)); // 3.49%
    /// assert_eq!(fee.cents(), 349);
    /// ```
    pub fn apply_rate(&self, rate: FeeRate) -> Money {
        let cents = (self.0 as u128 * rate.bps() as u128 + 5000) / 10000;
        Money(cents as u64)
    }

    /// Structural equality.
    #[inline]
    pub const fn equals(&self, other: &Money) -> bool {
        self.0 == other.0
    }

    #[inline]
    pub const fn greater_than(&self, other: &Money) -> bool {
        self.0 > other.0
    }

    #[inline]
    pub const fn greater_than_or_equal(&self, other: &Money) -> bool {
        self.0 >= other.0
    }

    #[inline]
    pub const fn less_than(&self, other: &Money) -> bool {
        self.0 < other.0
    }

    #[inline]
    pub const fn less_than_or_equal(&self, other: &Money) -> bool {
        self.0 <= other.0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount as a plain decimal ("50.00").
///
/// ## Note
/// Currency symbols and locale formatting belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major_part(), self.minor_part())
    }
}

// =============================================================================
// Currency
// =============================================================================

/// Supported settlement currencies. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Brazilian real.
    #[default]
    Brl,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
}

impl Currency {
    /// All supported currencies.
    pub const ALL: [Currency; 3] = [Currency::Brl, Currency::Usd, Currency::Eur];

    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Brl => "BRL",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            Currency::Brl => "R$",
            Currency::Usd => "$",
            Currency::Eur => "€",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BRL" => Ok(Currency::Brl),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(ValidationError::NotAllowed {
                field: "currency".to_string(),
                allowed: Currency::ALL.iter().map(|c| c.code().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
