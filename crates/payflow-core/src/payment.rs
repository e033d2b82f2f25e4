//! # Payment Aggregate
//!
//! The aggregate root of the payment domain. Owns the status state machine
//! and every money-affecting mutation.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   PENDING ──authorize──► AUTHORIZED ──capture──► CAPTURED               │
//! │      │                       │                     │                    │
//! │      └───────cancel──────────┴──► CANCELLED        ├─refund(full)──► REFUNDED
//! │                                                    └─refund(part)──► PARTIALLY_REFUNDED
//! │                                                            │            │
//! │                                                            └─refund─────┘
//! │                                                                         │
//! │   any status ──fail──► FAILED                                          │
//! │                                                                         │
//! │   Terminal: FAILED, CANCELLED, REFUNDED                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! - [`Payment::create`] mints a PENDING payment with fresh timestamps.
//! - [`Payment::from_persistence`] rehydrates a stored [`PaymentRecord`],
//!   re-validating every value object.
//! - Destruction is always soft (`deleted_at`).
//!
//! Mutators are check-then-set on an in-memory instance. Concurrent writers
//! of the same payment are detected by the repository through `version`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::events::{DomainEvent, PaymentEventKind};
use crate::money::{Currency, Money};
use crate::types::{Description, PaymentId, Provider, TenantId, UserId};

/// Free-form JSON map used for provider payloads and caller metadata.
pub type JsonMap = HashMap<String, Value>;

const ENTITY: &str = "Payment";

// =============================================================================
// Payment Status
// =============================================================================

/// The status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created, waiting for the gateway.
    #[default]
    Pending,
    /// Funds reserved, not yet captured.
    Authorized,
    /// Funds captured.
    Captured,
    /// Rejected by the gateway or force-failed.
    Failed,
    /// Abandoned before capture.
    Cancelled,
    /// Fully refunded.
    Refunded,
    /// At least one partial refund issued.
    PartiallyRefunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 7] = [
        PaymentStatus::Pending,
        PaymentStatus::Authorized,
        PaymentStatus::Captured,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
    ];

    /// Persistence code (`PARTIALLY_REFUNDED`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }

    /// Human-readable label for dashboards.
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Authorized => "Authorized",
            PaymentStatus::Captured => "Captured",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Refunded => "Refunded",
            PaymentStatus::PartiallyRefunded => "Partially refunded",
        }
    }

    /// No transition other than `fail` leaves these states.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }

    /// Pure transition table.
    ///
    /// Entering FAILED is allowed from every state, terminal ones included.
    pub const fn can_transition_to(&self, to: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (*self, to) {
            (_, Failed) => true,
            (Pending, Authorized) => true,
            (Authorized, Captured) => true,
            (Pending | Authorized, Cancelled) => true,
            (Captured | PartiallyRefunded, Refunded | PartiallyRefunded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment status".to_string(),
                allowed: PaymentStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Construction Input
// =============================================================================

/// Everything a caller supplies to open a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub tenant_id: String,
    pub user_id: Option<String>,
    /// Major-unit amount (50.0 = R$ 50,00).
    pub amount: f64,
    pub currency: String,
    pub provider: Provider,
    /// Opaque gateway reference minted by the provider adapter.
    pub provider_payment_id: String,
    pub description: String,
    #[serde(default)]
    pub metadata: JsonMap,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Persistence Record
// =============================================================================

/// Flat projection consumed by the payment repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRecord {
    pub id: String,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub provider_payment_id: String,
    pub provider_data: JsonMap,
    pub description: String,
    pub metadata: JsonMap,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token owned by the repository.
    pub version: u64,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment processed through an external gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    id: PaymentId,
    tenant_id: TenantId,
    user_id: Option<UserId>,
    amount: Money,
    currency: Currency,
    status: PaymentStatus,
    provider: Provider,
    provider_payment_id: String,
    provider_data: JsonMap,
    description: Description,
    metadata: JsonMap,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
    events: Vec<DomainEvent>,
}

impl Payment {
    // -------------------------------------------------------------------------
    // Factories
    // -------------------------------------------------------------------------

    /// Opens a new PENDING payment and records `payment.created`.
    ///
    /// ## Errors
    /// `Validation` when an id is shorter than 3 chars, the amount is not a
    /// positive finite number, the currency code is unknown, the provider
    /// reference is blank or the description is empty.
    pub fn create(input: NewPayment) -> CoreResult<Self> {
        Self::create_with_id(PaymentId::generate(), input)
    }

    /// Same as [`Payment::create`] with a caller-chosen id.
    pub fn create_with_id(id: PaymentId, input: NewPayment) -> CoreResult<Self> {
        let amount = Money::from_major(input.amount)?;
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        if input.provider_payment_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "provider payment id".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut payment = Payment {
            id,
            tenant_id: TenantId::new(input.tenant_id)?,
            user_id: input.user_id.map(UserId::new).transpose()?,
            amount,
            currency: input.currency.parse()?,
            status: PaymentStatus::Pending,
            provider: input.provider,
            provider_payment_id: input.provider_payment_id,
            provider_data: JsonMap::new(),
            description: Description::new(&input.description)?,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
            paid_at: None,
            expires_at: input.expires_at,
            deleted_at: None,
            version: 0,
            events: Vec::new(),
        };
        payment.record(PaymentEventKind::Created, None, None);
        Ok(payment)
    }

    /// Rehydrates a stored payment, re-validating every field.
    pub fn from_persistence(record: PaymentRecord) -> CoreResult<Self> {
        Ok(Payment {
            id: PaymentId::new(record.id)?,
            tenant_id: TenantId::new(record.tenant_id)?,
            user_id: record.user_id.map(UserId::new).transpose()?,
            amount: Money::try_from_cents(record.amount_cents)?,
            currency: record.currency.parse()?,
            status: record.status.parse()?,
            provider: record.provider.parse()?,
            provider_payment_id: record.provider_payment_id,
            provider_data: record.provider_data,
            description: Description::new(&record.description)?,
            metadata: record.metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
            paid_at: record.paid_at,
            expires_at: record.expires_at,
            deleted_at: record.deleted_at,
            version: record.version,
            events: Vec::new(),
        })
    }

    /// Flat record for the repository.
    pub fn to_persistence(&self) -> PaymentRecord {
        PaymentRecord {
            id: self.id.to_string(),
            tenant_id: self.tenant_id.to_string(),
            user_id: self.user_id.as_ref().map(ToString::to_string),
            amount_cents: self.amount.cents_i64(),
            currency: self.currency.code().to_string(),
            status: self.status.as_str().to_string(),
            provider: self.provider.code().to_string(),
            provider_payment_id: self.provider_payment_id.clone(),
            provider_data: self.provider_data.clone(),
            description: self.description.to_string(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            expires_at: self.expires_at,
            deleted_at: self.deleted_at,
            version: self.version,
        }
    }

    // -------------------------------------------------------------------------
    // State transitions
    // -------------------------------------------------------------------------

    /// PENDING → AUTHORIZED.
    pub fn authorize(&mut self) -> CoreResult<()> {
        self.ensure_status(&[PaymentStatus::Pending], "authorize")?;
        self.status = PaymentStatus::Authorized;
        self.touch();
        self.record(PaymentEventKind::Authorized, None, None);
        Ok(())
    }

    /// AUTHORIZED → CAPTURED, stamping `paid_at`.
    pub fn capture(&mut self) -> CoreResult<()> {
        self.ensure_status(&[PaymentStatus::Authorized], "capture")?;
        self.status = PaymentStatus::Captured;
        self.paid_at = Some(Utc::now());
        self.touch();
        self.record(PaymentEventKind::Captured, None, None);
        Ok(())
    }

    /// Any status → FAILED.
    ///
    /// There is no status guard: this is the gateway's force-fail path and
    /// also applies to captured or terminal payments.
    pub fn fail(&mut self, reason: Option<&str>) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        self.status = PaymentStatus::Failed;
        self.merge_reason("failureReason", reason);
        self.touch();
        self.record(PaymentEventKind::Failed, reason, None);
        Ok(())
    }

    /// PENDING | AUTHORIZED → CANCELLED.
    pub fn cancel(&mut self, reason: Option<&str>) -> CoreResult<()> {
        self.ensure_status(
            &[PaymentStatus::Pending, PaymentStatus::Authorized],
            "cancel",
        )?;
        self.status = PaymentStatus::Cancelled;
        self.merge_reason("cancellationReason", reason);
        self.touch();
        self.record(PaymentEventKind::Cancelled, reason, None);
        Ok(())
    }

    /// CAPTURED | PARTIALLY_REFUNDED → REFUNDED | PARTIALLY_REFUNDED.
    ///
    /// `amount` defaults to the full original amount. The ceiling is the
    /// ORIGINAL amount: earlier partial refunds are not subtracted, so a
    /// sequence of partial refunds can exceed the original total.
    pub fn refund(&mut self, amount: Option<Money>, reason: Option<&str>) -> CoreResult<()> {
        self.ensure_status(
            &[PaymentStatus::Captured, PaymentStatus::PartiallyRefunded],
            "refund",
        )?;

        let refund_amount = amount.unwrap_or(self.amount);
        if refund_amount.is_zero() {
            return Err(ValidationError::MustBePositive {
                field: "refund amount".to_string(),
            }
            .into());
        }
        if refund_amount.greater_than(&self.amount) {
            return Err(CoreError::RefundExceedsOriginal {
                requested: refund_amount.to_string(),
                original: self.amount.to_string(),
            });
        }

        self.status = if refund_amount == self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.metadata
            .insert("refundAmount".to_string(), Value::from(refund_amount.cents()));
        self.merge_reason("refundReason", reason);
        self.touch();
        self.record(PaymentEventKind::Refunded, reason, Some(refund_amount));
        Ok(())
    }

    /// Moves the expiry of a PENDING payment.
    pub fn extend_expiration(&mut self, new_date: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_status(&[PaymentStatus::Pending], "extend expiration")?;
        self.expires_at = Some(new_date);
        self.touch();
        Ok(())
    }

    /// Shallow-merges `patch` into the provider payload.
    pub fn update_provider_data(&mut self, patch: JsonMap) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        self.provider_data.extend(patch);
        self.touch();
        Ok(())
    }

    /// Shallow-merges `patch` into the caller metadata.
    pub fn update_metadata(&mut self, patch: JsonMap) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        self.metadata.extend(patch);
        self.touch();
        Ok(())
    }

    /// Marks the payment deleted. Captured money cannot be hidden.
    pub fn soft_delete(&mut self) -> CoreResult<()> {
        if self.status == PaymentStatus::Captured {
            return Err(CoreError::Conflict(format!(
                "payment {} is CAPTURED and cannot be deleted",
                self.id
            )));
        }
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Clears the soft-delete flag.
    pub fn restore(&mut self) {
        self.deleted_at = None;
        self.touch();
    }

    /// Drains the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    /// Records an externally-detected lifecycle event (e.g. expiry).
    pub fn record_event(&mut self, kind: PaymentEventKind, reason: Option<&str>) {
        self.record(kind, reason, None);
    }

    // -------------------------------------------------------------------------
    // Derived predicates
    // -------------------------------------------------------------------------

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// `expires_at < now`; a payment without expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn is_authorized(&self) -> bool {
        self.status == PaymentStatus::Authorized
    }

    pub fn is_captured(&self) -> bool {
        self.status == PaymentStatus::Captured
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == PaymentStatus::Cancelled
    }

    pub fn is_failed(&self) -> bool {
        self.status == PaymentStatus::Failed
    }

    pub fn is_refunded(&self) -> bool {
        self.status == PaymentStatus::Refunded
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Non-terminal and not deleted: money may still move.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && !self.is_deleted()
    }

    pub fn can_be_captured(&self) -> bool {
        self.is_authorized() && !self.is_deleted()
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Authorized
        ) && !self.is_deleted()
    }

    pub fn can_be_refunded(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Captured | PaymentStatus::PartiallyRefunded
        ) && !self.is_deleted()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> &PaymentId {
        &self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn provider_payment_id(&self) -> &str {
        &self.provider_payment_id
    }

    pub fn provider_data(&self) -> &JsonMap {
        &self.provider_data
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    pub fn metadata(&self) -> &JsonMap {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_not_deleted(&self) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::Deleted {
                entity: ENTITY,
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// Guard for status-constrained transitions. A deleted payment reports
    /// an invalid transition rather than `Deleted`.
    fn ensure_status(&self, allowed: &[PaymentStatus], action: &'static str) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::invalid_transition(ENTITY, self.id.as_str(), "deleted", action));
        }
        if !allowed.contains(&self.status) {
            return Err(CoreError::invalid_transition(
                ENTITY,
                self.id.as_str(),
                self.status,
                action,
            ));
        }
        Ok(())
    }

    fn merge_reason(&mut self, key: &str, reason: Option<&str>) {
        if let Some(reason) = reason {
            self.metadata
                .insert(key.to_string(), Value::String(reason.to_string()));
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn record(&mut self, kind: PaymentEventKind, reason: Option<&str>, refund: Option<Money>) {
        let event = DomainEvent::for_payment(kind, self, reason, refund);
        self.events.push(event);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn new_payment(amount: f64, provider: Provider) -> NewPayment {
        NewPayment {
            tenant_id: "ten_acme".to_string(),
            user_id: Some("usr_owner".to_string()),
            amount,
            currency: "BRL".to_string(),
            provider,
            provider_payment_id: "pi_3Nabc".to_string(),
            description: "Order #1001".to_string(),
            metadata: JsonMap::new(),
            expires_at: None,
        }
    }

    pub(crate) fn pending(amount: f64) -> Payment {
        Payment::create(new_payment(amount, Provider::Stripe)).unwrap()
    }

    fn captured(amount: f64) -> Payment {
        let mut payment = pending(amount);
        payment.authorize().unwrap();
        payment.capture().unwrap();
        payment
    }

    #[test]
    fn test_create_starts_pending() {
        let mut payment = pending(50.00);
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert_eq!(payment.amount().to_major(), 50.00);
        assert_eq!(payment.currency(), Currency::Brl);
        assert_eq!(payment.created_at(), payment.updated_at());

        let events = payment.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "payment.created");
        assert!(payment.take_events().is_empty());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let mut input = new_payment(50.0, Provider::Stripe);
        input.currency = "JPY".to_string();
        assert!(matches!(Payment::create(input), Err(CoreError::Validation(_))));

        let mut input = new_payment(50.0, Provider::Stripe);
        input.tenant_id = "t".to_string();
        assert!(Payment::create(input).is_err());

        assert!(Payment::create(new_payment(0.0, Provider::Stripe)).is_err());
        assert!(Payment::create(new_payment(-5.0, Provider::Stripe)).is_err());
    }

    #[test]
    fn test_authorize_then_capture() {
        let payment = captured(50.00);
        assert_eq!(payment.status(), PaymentStatus::Captured);
        assert!(payment.paid_at().is_some());
        assert!(payment.can_be_refunded());
        assert!(!payment.can_be_cancelled());
    }

    #[test]
    fn test_capture_requires_authorized() {
        let mut payment = pending(50.00);
        let err = payment.capture().unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { action: "capture", .. }));
        assert_eq!(payment.status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_authorize_only_from_pending() {
        let mut payment = pending(10.0);
        payment.authorize().unwrap();
        assert!(payment.authorize().is_err());
    }

    #[test]
    fn test_cancel_from_pending_and_authorized() {
        let mut payment = pending(10.0);
        payment.cancel(Some("customer gave up")).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Cancelled);
        assert_eq!(payment.metadata()["cancellationReason"], "customer gave up");

        let mut payment = pending(10.0);
        payment.authorize().unwrap();
        payment.cancel(None).unwrap();
        assert!(payment.is_cancelled());

        let mut payment = captured(10.0);
        assert!(payment.cancel(None).is_err());
    }

    #[test]
    fn test_terminal_states_reject_forward_transitions() {
        let mut failed = pending(10.0);
        failed.fail(Some("card declined")).unwrap();

        let mut cancelled = pending(10.0);
        cancelled.cancel(None).unwrap();

        let mut refunded = captured(10.0);
        refunded.refund(None, None).unwrap();

        for payment in [&mut failed, &mut cancelled, &mut refunded] {
            assert!(payment.is_terminal());
            assert!(payment.authorize().is_err());
            assert!(payment.capture().is_err());
            assert!(payment.cancel(None).is_err());
        }
    }

    #[test]
    fn test_fail_has_no_status_guard() {
        let mut payment = captured(10.0);
        payment.fail(Some("chargeback")).unwrap();
        assert!(payment.is_failed());
        assert_eq!(payment.metadata()["failureReason"], "chargeback");
    }

    #[test]
    fn test_partial_refund() {
        let mut payment = captured(50.00);
        payment
            .refund(Some(Money::from_major(25.00).unwrap()), Some("partial"))
            .unwrap();
        assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(payment.metadata()["refundReason"], "partial");
        assert_eq!(payment.metadata()["refundAmount"], 2500);
    }

    #[test]
    fn test_full_refund_without_amount() {
        let mut payment = captured(50.00);
        payment.refund(None, None).unwrap();
        assert_eq!(payment.status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_refund_exceeding_original_fails() {
        let mut payment = captured(50.00);
        let err = payment
            .refund(Some(Money::from_major(100.00).unwrap()), None)
            .unwrap_err();
        assert!(err.to_string().contains("refund exceeds original amount"));
        assert_eq!(payment.status(), PaymentStatus::Captured);
    }

    #[test]
    fn test_partial_refunds_are_bounded_by_original_not_remaining() {
        let mut payment = captured(50.00);
        let thirty = Money::from_major(30.00).unwrap();
        payment.refund(Some(thirty), None).unwrap();
        // 30 + 30 > 50, still accepted: only the original amount bounds a refund
        payment.refund(Some(thirty), None).unwrap();
        assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);
    }

    #[test]
    fn test_refund_requires_captured() {
        let mut payment = pending(10.0);
        assert!(matches!(
            payment.refund(None, None),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_soft_delete_rules() {
        let mut payment = captured(10.0);
        assert!(matches!(payment.soft_delete(), Err(CoreError::Conflict(_))));
        assert!(payment.deleted_at().is_none());

        let mut payment = pending(10.0);
        payment.soft_delete().unwrap();
        assert!(payment.is_deleted());
        assert!(payment.authorize().is_err());
        assert!(matches!(
            payment.update_metadata(JsonMap::new()),
            Err(CoreError::Deleted { .. })
        ));
        assert!(matches!(payment.fail(None), Err(CoreError::Deleted { .. })));

        payment.restore();
        assert!(!payment.is_deleted());
        payment.authorize().unwrap();
    }

    #[test]
    fn test_extend_expiration_only_when_pending() {
        let mut payment = pending(10.0);
        let later = Utc::now() + Duration::days(3);
        payment.extend_expiration(later).unwrap();
        assert_eq!(payment.expires_at(), Some(later));

        payment.authorize().unwrap();
        assert!(payment.extend_expiration(later).is_err());
    }

    #[test]
    fn test_is_expired() {
        let mut input = new_payment(10.0, Provider::Stripe);
        input.expires_at = Some(Utc::now() - Duration::minutes(1));
        let payment = Payment::create(input).unwrap();
        assert!(payment.is_expired());
        assert!(!pending(10.0).is_expired());
    }

    #[test]
    fn test_metadata_merge_is_shallow() {
        let mut payment = pending(10.0);
        let mut patch = JsonMap::new();
        patch.insert("order".into(), serde_json::json!({ "id": 1 }));
        payment.update_metadata(patch).unwrap();

        let mut patch = JsonMap::new();
        patch.insert("order".into(), serde_json::json!({ "sku": "A" }));
        payment.update_provider_data(patch.clone()).unwrap();
        payment.update_metadata(patch).unwrap();

        assert_eq!(payment.metadata()["order"], serde_json::json!({ "sku": "A" }));
        assert_eq!(payment.provider_data()["order"], serde_json::json!({ "sku": "A" }));
    }

    #[test]
    fn test_mutators_bump_updated_at() {
        let mut payment = pending(10.0);
        let before = payment.updated_at();
        payment.authorize().unwrap();
        assert!(payment.updated_at() >= before);
    }

    #[test]
    fn test_persistence_round_trip_revalidates() {
        let mut payment = captured(42.5);
        payment.take_events();
        let record = payment.to_persistence();
        assert_eq!(record.amount_cents, 4250);
        assert_eq!(record.status, "CAPTURED");

        let restored = Payment::from_persistence(record.clone()).unwrap();
        assert_eq!(restored, payment);

        let mut broken = record;
        broken.status = "SETTLED".to_string();
        assert!(Payment::from_persistence(broken).is_err());
    }

    #[test]
    fn test_transition_table() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Authorized));
        assert!(Authorized.can_transition_to(Captured));
        assert!(Captured.can_transition_to(PartiallyRefunded));
        assert!(PartiallyRefunded.can_transition_to(Refunded));
        assert!(Refunded.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Captured));
        assert!(!Captured.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Authorized));
        assert_eq!("partially_refunded".parse::<PaymentStatus>().unwrap(), PartiallyRefunded);
    }
}
