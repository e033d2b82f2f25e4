//! # Domain Events
//!
//! Immutable event values produced by the aggregates.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Payment::capture()                                                    │
//! │       │  records                                                        │
//! │       ▼                                                                 │
//! │  DomainEvent { eventName: "payment.captured", data: {...} }            │
//! │       │  drained by caller with take_events()                           │
//! │       ▼                                                                 │
//! │  Event bus (payflow-app) ──► webhook fan-out, audit, metrics           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core only PRODUCES events. Dispatch is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;
use crate::payment::Payment;

/// Current schema version of every payment event payload.
pub const PAYMENT_EVENT_VERSION: u32 = 1;

// =============================================================================
// Event Names
// =============================================================================

/// Lifecycle events a payment can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Created,
    Authorized,
    Captured,
    Failed,
    Cancelled,
    Refunded,
    Expired,
}

impl PaymentEventKind {
    /// Dotted wire name (`payment.captured`).
    pub const fn event_name(&self) -> &'static str {
        match self {
            PaymentEventKind::Created => "payment.created",
            PaymentEventKind::Authorized => "payment.authorized",
            PaymentEventKind::Captured => "payment.captured",
            PaymentEventKind::Failed => "payment.failed",
            PaymentEventKind::Cancelled => "payment.cancelled",
            PaymentEventKind::Refunded => "payment.refunded",
            PaymentEventKind::Expired => "payment.expired",
        }
    }
}

impl fmt::Display for PaymentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

// =============================================================================
// Domain Event
// =============================================================================

/// A JSON-serializable event record.
///
/// ```json
/// {
///   "eventId": "5b0e…",
///   "eventName": "payment.refunded",
///   "eventVersion": 1,
///   "occurredOn": "2026-10-18T12:00:00Z",
///   "data": { "paymentId": "pay_…", "tenantId": "ten_…", "refundAmount": 2500 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    #[ts(as = "String")]
    pub event_id: Uuid,
    pub event_name: String,
    pub event_version: u32,
    #[ts(as = "String")]
    pub occurred_on: DateTime<Utc>,
    pub data: Value,
}

impl DomainEvent {
    /// Creates an event with a fresh id and the current time.
    pub fn new(event_name: impl Into<String>, event_version: u32, data: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_name: event_name.into(),
            event_version,
            occurred_on: Utc::now(),
            data,
        }
    }

    /// Builds a payment lifecycle event from the aggregate's current state.
    ///
    /// `reason` and `refund_amount` are included only when present.
    pub fn for_payment(
        kind: PaymentEventKind,
        payment: &Payment,
        reason: Option<&str>,
        refund_amount: Option<Money>,
    ) -> Self {
        let mut data = json!({
            "paymentId": payment.id().as_str(),
            "tenantId": payment.tenant_id().as_str(),
            "amount": payment.amount().cents(),
            "currency": payment.currency().code(),
            "status": payment.status().as_str(),
            "provider": payment.provider().code(),
            "providerPaymentId": payment.provider_payment_id(),
        });

        if let Value::Object(map) = &mut data {
            if let Some(user_id) = payment.user_id() {
                map.insert("userId".into(), json!(user_id.as_str()));
            }
            if let Some(reason) = reason {
                map.insert("reason".into(), json!(reason));
            }
            if let Some(refund) = refund_amount {
                map.insert("refundAmount".into(), json!(refund.cents()));
            }
        }

        DomainEvent::new(kind.event_name(), PAYMENT_EVENT_VERSION, data)
    }

    /// Tenant the event belongs to, when the payload carries one.
    pub fn tenant_id(&self) -> Option<&str> {
        self.data.get("tenantId").and_then(Value::as_str)
    }

    /// Aggregate id the event refers to, when the payload carries one.
    pub fn payment_id(&self) -> Option<&str> {
        self.data.get("paymentId").and_then(Value::as_str)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
