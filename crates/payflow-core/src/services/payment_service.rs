//! # Payment Domain Service
//!
//! Rules that need a payment plus tenant settings, or no aggregate at all.
//!
//! ## Where the Rules Sit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  application service                                                    │
//! │      │ load Payment + TenantSettings                                    │
//! │      ▼                                                                  │
//! │  PaymentDomainService::can_process_payment(..)  ← THIS MODULE           │
//! │      │ allowed?                                                         │
//! │      ▼                                                                  │
//! │  payment.authorize() / capture() / refund(..)                           │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  repository.save(payment)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fee Table
//! | Provider | Card  | Other |
//! |----------|-------|-------|
//! | Stripe   | 3.49% | 1.49% |
//! | Pagar.me | 3.99% | 1.99% |
//! | unknown  | 3.99% | 3.99% |
//!
//! Every fee is floored at 50 cents.

use chrono::{DateTime, Duration, Utc};

use crate::error::CoreResult;
use crate::money::Money;
use crate::payment::{Payment, PaymentStatus};
use crate::services::RuleDecision;
use crate::tenant::TenantSettings;
use crate::transaction::{NewTransaction, Transaction, TransactionType};
use crate::types::{ChargeMethod, FeeRate, Provider};

/// Smallest fee ever charged, whatever the amount.
pub const MINIMUM_PROVIDER_FEE: Money = Money::from_cents(50);

/// Expiration horizon for providers without a dedicated default.
pub const DEFAULT_EXPIRATION_DAYS: u32 = 5;

/// Card / other rates of one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub card: FeeRate,
    pub other: FeeRate,
}

impl FeeSchedule {
    /// Applied when the provider code is not recognised.
    pub const DEFAULT: FeeSchedule = FeeSchedule {
        card: FeeRate::from_bps(399),
        other: FeeRate::from_bps(399),
    };

    pub const fn for_provider(provider: Provider) -> FeeSchedule {
        match provider {
            Provider::Stripe => FeeSchedule {
                card: FeeRate::from_bps(349),
                other: FeeRate::from_bps(149),
            },
            Provider::Pagarme => FeeSchedule {
                card: FeeRate::from_bps(399),
                other: FeeRate::from_bps(199),
            },
        }
    }

    pub const fn rate(&self, method: ChargeMethod) -> FeeRate {
        match method {
            ChargeMethod::Card => self.card,
            ChargeMethod::Other => self.other,
        }
    }
}

/// Outcome of [`PaymentDomainService::can_process_refund`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundEligibility {
    pub allowed: bool,
    pub reason: Option<String>,
    /// Upper bound for a single refund: the ORIGINAL payment amount.
    pub max_refundable: Money,
}

impl RefundEligibility {
    fn deny(reason: impl Into<String>, max_refundable: Money) -> Self {
        RefundEligibility {
            allowed: false,
            reason: Some(reason.into()),
            max_refundable,
        }
    }

    pub fn decision(&self) -> RuleDecision {
        RuleDecision {
            allowed: self.allowed,
            reason: self.reason.clone(),
        }
    }
}

/// Stateless payment rule engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentDomainService;

impl PaymentDomainService {
    /// Whether the tenant may process this payment now.
    ///
    /// ## Rejections
    /// - deleted payment
    /// - status FAILED, CANCELLED or REFUNDED
    /// - expired
    /// - amount above the tenant ceiling (default 1000.00)
    /// - provider not enabled for the tenant
    pub fn can_process_payment(payment: &Payment, settings: &TenantSettings) -> RuleDecision {
        Self::can_process_payment_at(payment, settings, Utc::now())
    }

    pub fn can_process_payment_at(
        payment: &Payment,
        settings: &TenantSettings,
        now: DateTime<Utc>,
    ) -> RuleDecision {
        if payment.is_deleted() {
            return RuleDecision::deny(format!("payment {} is deleted", payment.id()));
        }

        if matches!(
            payment.status(),
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        ) {
            return RuleDecision::deny(format!(
                "payment is {} and cannot be processed",
                payment.status()
            ));
        }

        if payment.is_expired_at(now) {
            return RuleDecision::deny("payment has expired");
        }

        let ceiling = settings.policy().max_payment_amount();
        if payment.amount().greater_than(&ceiling) {
            return RuleDecision::deny(format!(
                "amount {} exceeds the tenant maximum of {}",
                payment.amount(),
                ceiling
            ));
        }

        if !settings.accepts_provider(payment.provider()) {
            return RuleDecision::deny(format!(
                "provider {} is not enabled for this tenant",
                payment.provider().label()
            ));
        }

        RuleDecision::allow()
    }

    /// Percentage fee for the provider and charge method, never below 50 cents.
    ///
    /// ## Example
    /// ```rust
    /// use payflow_core::money::Money;
    /// use payflow_core::services::PaymentDomainService;
    /// use payflow_core::types::{ChargeMethod, Provider};
    ///
    /// let fee = PaymentDomainService::calculate_provider_fee(
    ///     Money::from_cents(10_000),
    ///     Provider::Stripe,
    ///     ChargeMethod::Card,
    /// );
    /// assert_eq!(fee.cents(), 349);
    ///
    /// let tiny = PaymentDomainService::calculate_provider_fee(
    ///     Money::from_cents(1),
    ///     Provider::Stripe,
    ///     ChargeMethod::Card,
    /// );
    /// assert_eq!(tiny.cents(), 50);
    /// ```
    pub fn calculate_provider_fee(amount: Money, provider: Provider, method: ChargeMethod) -> Money {
        Self::fee_with_schedule(amount, FeeSchedule::for_provider(provider), method)
    }

    /// Fee lookup by raw provider code; unknown codes get the default 3.99%.
    pub fn calculate_provider_fee_for_code(amount: Money, provider_code: &str, method: ChargeMethod) -> Money {
        let schedule = provider_code
            .parse::<Provider>()
            .map(FeeSchedule::for_provider)
            .unwrap_or(FeeSchedule::DEFAULT);
        Self::fee_with_schedule(amount, schedule, method)
    }

    /// `amount - fee`.
    ///
    /// ## Errors
    /// `Underflow` when the 50-cent floor exceeds the amount itself.
    pub fn calculate_net_amount(amount: Money, provider: Provider, method: ChargeMethod) -> CoreResult<Money> {
        let fee = Self::calculate_provider_fee(amount, provider, method);
        amount.subtract(fee)
    }

    /// Whether a refund may be issued and for how much at most.
    ///
    /// The ceiling is the original amount; refunds already issued are not
    /// deducted.
    pub fn can_process_refund(payment: &Payment, requested: Option<Money>) -> RefundEligibility {
        let original = payment.amount();

        if payment.is_refunded() {
            return RefundEligibility::deny("payment is already fully refunded", original);
        }

        if !payment.can_be_refunded() {
            return RefundEligibility::deny(
                format!("payment cannot be refunded in status {}", payment.status()),
                original,
            );
        }

        if let Some(requested) = requested {
            if requested.is_zero() {
                return RefundEligibility::deny("refund amount must be positive", original);
            }
            if requested.greater_than(&original) {
                return RefundEligibility::deny(
                    format!("refund exceeds original amount ({requested} > {original})"),
                    original,
                );
            }
        }

        RefundEligibility {
            allowed: true,
            reason: None,
            max_refundable: original,
        }
    }

    /// Maps a gateway status onto the payment state machine.
    ///
    /// ```text
    /// current      provider status     next
    /// ──────────   ─────────────────   ──────────
    /// PENDING      succeeded           CAPTURED
    /// PENDING      requires_action     AUTHORIZED
    /// PENDING      failed              FAILED
    /// AUTHORIZED   succeeded           CAPTURED
    /// AUTHORIZED   failed              FAILED
    /// anything     anything else       unchanged
    /// ```
    pub fn determine_next_payment_status(current: PaymentStatus, provider_status: &str) -> PaymentStatus {
        match (current, provider_status) {
            (PaymentStatus::Pending, "succeeded") => PaymentStatus::Captured,
            (PaymentStatus::Pending, "requires_action") => PaymentStatus::Authorized,
            (PaymentStatus::Pending, "failed") => PaymentStatus::Failed,
            (PaymentStatus::Authorized, "succeeded") => PaymentStatus::Captured,
            (PaymentStatus::Authorized, "failed") => PaymentStatus::Failed,
            (current, _) => current,
        }
    }

    /// True iff the tenant enabled auto-capture and the payment is an
    /// unexpired, uncancelled AUTHORIZED payment.
    pub fn should_auto_capture(payment: &Payment, settings: &TenantSettings) -> bool {
        settings.policy().auto_capture_enabled()
            && payment.is_authorized()
            && !payment.is_expired()
            && !payment.is_cancelled()
    }

    /// Default expiry horizon for a provider, in days.
    pub const fn default_expiration_days(provider: Provider) -> u32 {
        match provider {
            Provider::Stripe => 7,
            Provider::Pagarme => 3,
        }
    }

    /// Expiry for a payment opened now.
    pub fn calculate_expiration_date(provider: Provider, settings: &TenantSettings) -> DateTime<Utc> {
        Self::calculate_expiration_date_from(provider, settings, Utc::now())
    }

    /// `now + days`, where the tenant's `payment_expiration_days` overrides
    /// the provider default.
    pub fn calculate_expiration_date_from(
        provider: Provider,
        settings: &TenantSettings,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let days = settings
            .policy()
            .payment_expiration_days
            .unwrap_or_else(|| Self::default_expiration_days(provider));
        now + Duration::days(i64::from(days))
    }

    /// Expiry by raw provider code; unknown codes get 5 days.
    pub fn calculate_expiration_date_for_code(
        provider_code: &str,
        settings: &TenantSettings,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match provider_code.parse::<Provider>() {
            Ok(provider) => Self::calculate_expiration_date_from(provider, settings, now),
            Err(_) => {
                let days = settings
                    .policy()
                    .payment_expiration_days
                    .unwrap_or(DEFAULT_EXPIRATION_DAYS);
                now + Duration::days(i64::from(days))
            }
        }
    }

    /// Opens the settlement record matching the payment's current state.
    ///
    /// REFUNDED and PARTIALLY_REFUNDED payments produce a REFUND transaction,
    /// everything else a PAYMENT. `amount` defaults to the payment amount.
    pub fn create_transaction_from_payment(
        payment: &Payment,
        provider_transaction_id: impl Into<String>,
        amount: Option<Money>,
    ) -> CoreResult<Transaction> {
        let transaction_type = match payment.status() {
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => TransactionType::Refund,
            _ => TransactionType::Payment,
        };

        Transaction::create(NewTransaction {
            payment_id: payment.id().clone(),
            tenant_id: payment.tenant_id().clone(),
            transaction_type,
            amount: amount.unwrap_or(payment.amount()),
            provider_transaction_id: provider_transaction_id.into(),
            provider_data: payment.provider_data().clone(),
        })
    }

    fn fee_with_schedule(amount: Money, schedule: FeeSchedule, method: ChargeMethod) -> Money {
        amount.apply_rate(schedule.rate(method)).max(MINIMUM_PROVIDER_FEE)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
