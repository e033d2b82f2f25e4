//! # Transaction Aggregate
//!
//! Provider-side settlement history. Several transactions may reference one
//! payment (charge, refunds, fees, chargebacks) and each follows its own
//! lifecycle, independent of the parent payment's status.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   PENDING ──start_processing──► PROCESSING ──complete──► COMPLETED      │
//! │     │  ▲                           │                                    │
//! │     │  └────────retry──────┐       │                                    │
//! │     │                      │       │                                    │
//! │     ├──fail──► FAILED ─────┘  ◄────┤ fail                               │
//! │     └──cancel──► CANCELLED ◄───────┘ cancel                             │
//! │                                                                         │
//! │   COMPLETED is terminal and cannot be deleted.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::payment::JsonMap;
use crate::types::{PaymentId, TenantId, TransactionId};

const ENTITY: &str = "Transaction";

// =============================================================================
// Transaction Type
// =============================================================================

/// What kind of money movement the transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Refund,
    Chargeback,
    Adjustment,
    Fee,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Payment,
        TransactionType::Refund,
        TransactionType::Chargeback,
        TransactionType::Adjustment,
        TransactionType::Fee,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::Refund => "REFUND",
            TransactionType::Chargeback => "CHARGEBACK",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Fee => "FEE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "transaction type".to_string(),
                allowed: TransactionType::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 5] = [
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    /// Pure transition table.
    pub const fn can_transition_to(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        match (*self, to) {
            (Pending, Processing) => true,
            (Processing, Completed) => true,
            (Pending | Processing, Cancelled) => true,
            (Pending | Processing | Failed | Cancelled, Failed) => true,
            (Failed, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "transaction status".to_string(),
                allowed: TransactionStatus::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Construction Input & Persistence Record
// =============================================================================

/// Everything needed to open a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub payment_id: PaymentId,
    pub tenant_id: TenantId,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub provider_transaction_id: String,
    pub provider_data: JsonMap,
}

/// Flat projection consumed by the transaction repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionRecord {
    pub id: String,
    pub payment_id: String,
    pub tenant_id: String,
    pub transaction_type: String,
    pub amount_cents: i64,
    pub status: String,
    pub provider_transaction_id: String,
    pub provider_data: JsonMap,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

// =============================================================================
// Transaction
// =============================================================================

/// A provider-side settlement event linked to a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: TransactionId,
    payment_id: PaymentId,
    tenant_id: TenantId,
    transaction_type: TransactionType,
    amount: Money,
    status: TransactionStatus,
    provider_transaction_id: String,
    provider_data: JsonMap,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Transaction {
    /// Opens a PENDING transaction with a generated id.
    pub fn create(input: NewTransaction) -> CoreResult<Self> {
        Self::create_with_id(TransactionId::generate(), input)
    }

    pub fn create_with_id(id: TransactionId, input: NewTransaction) -> CoreResult<Self> {
        if input.provider_transaction_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "provider transaction id".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        Ok(Transaction {
            id,
            payment_id: input.payment_id,
            tenant_id: input.tenant_id,
            transaction_type: input.transaction_type,
            amount: input.amount,
            status: TransactionStatus::Pending,
            provider_transaction_id: input.provider_transaction_id,
            provider_data: input.provider_data,
            processed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        })
    }

    /// Rehydrates a stored transaction, re-validating every field.
    pub fn from_persistence(record: TransactionRecord) -> CoreResult<Self> {
        Ok(Transaction {
            id: TransactionId::new(record.id)?,
            payment_id: PaymentId::new(record.payment_id)?,
            tenant_id: TenantId::new(record.tenant_id)?,
            transaction_type: record.transaction_type.parse()?,
            amount: Money::try_from_cents(record.amount_cents)?,
            status: record.status.parse()?,
            provider_transaction_id: record.provider_transaction_id,
            provider_data: record.provider_data,
            processed_at: record.processed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
            version: record.version,
        })
    }

    pub fn to_persistence(&self) -> TransactionRecord {
        TransactionRecord {
            id: self.id.to_string(),
            payment_id: self.payment_id.to_string(),
            tenant_id: self.tenant_id.to_string(),
            transaction_type: self.transaction_type.as_str().to_string(),
            amount_cents: self.amount.cents_i64(),
            status: self.status.as_str().to_string(),
            provider_transaction_id: self.provider_transaction_id.clone(),
            provider_data: self.provider_data.clone(),
            processed_at: self.processed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            version: self.version,
        }
    }

    // -------------------------------------------------------------------------
    // State transitions
    // -------------------------------------------------------------------------

    /// PENDING → PROCESSING.
    pub fn start_processing(&mut self) -> CoreResult<()> {
        self.transition(TransactionStatus::Processing, "start processing")
    }

    /// PROCESSING → COMPLETED, stamping `processed_at`.
    pub fn complete(&mut self) -> CoreResult<()> {
        self.transition(TransactionStatus::Completed, "complete")?;
        self.processed_at = Some(self.updated_at);
        Ok(())
    }

    /// Any non-completed status → FAILED.
    pub fn fail(&mut self, reason: Option<&str>) -> CoreResult<()> {
        self.transition(TransactionStatus::Failed, "fail")?;
        self.merge_reason("failureReason", reason);
        Ok(())
    }

    /// PENDING | PROCESSING → CANCELLED.
    pub fn cancel(&mut self, reason: Option<&str>) -> CoreResult<()> {
        self.transition(TransactionStatus::Cancelled, "cancel")?;
        self.merge_reason("cancellationReason", reason);
        Ok(())
    }

    /// FAILED → PENDING so the settlement can be attempted again.
    pub fn retry(&mut self) -> CoreResult<()> {
        self.transition(TransactionStatus::Pending, "retry")
    }

    /// Shallow-merges `patch` into the provider payload.
    pub fn update_provider_data(&mut self, patch: JsonMap) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        self.provider_data.extend(patch);
        self.touch();
        Ok(())
    }

    /// Marks the transaction deleted. Completed settlements are permanent.
    pub fn soft_delete(&mut self) -> CoreResult<()> {
        if self.status == TransactionStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "transaction {} is COMPLETED and cannot be deleted",
                self.id
            )));
        }
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn restore(&mut self) {
        self.deleted_at = None;
        self.touch();
    }

    // -------------------------------------------------------------------------
    // Predicates & accessors
    // -------------------------------------------------------------------------

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransactionStatus::Failed
    }

    pub fn can_be_retried(&self) -> bool {
        self.is_failed() && !self.is_deleted()
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn provider_transaction_id(&self) -> &str {
        &self.provider_transaction_id
    }

    pub fn provider_data(&self) -> &JsonMap {
        &self.provider_data
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
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

    fn transition(&mut self, to: TransactionStatus, action: &'static str) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::invalid_transition(ENTITY, self.id.as_str(), "deleted", action));
        }
        if !self.status.can_transition_to(to) {
            return Err(CoreError::invalid_transition(
                ENTITY,
                self.id.as_str(),
                self.status,
                action,
            ));
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn ensure_not_deleted(&self) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::Deleted {
                entity: ENTITY,
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    fn merge_reason(&mut self, key: &str, reason: Option<&str>) {
        if let Some(reason) = reason {
            self.provider_data
                .insert(key.to_string(), Value::String(reason.to_string()));
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_transaction() -> Transaction {
        Transaction::create(NewTransaction {
            payment_id: PaymentId::new("pay_1").unwrap(),
            tenant_id: TenantId::new("ten_1").unwrap(),
            transaction_type: TransactionType::Payment,
            amount: Money::from_cents(5000),
            provider_transaction_id: "ch_123".to_string(),
            provider_data: JsonMap::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_happy_path_completes() {
        let mut tx = pending_transaction();
        assert_eq!(tx.status(), TransactionStatus::Pending);
        tx.start_processing().unwrap();
        tx.complete().unwrap();
        assert!(tx.is_completed());
        assert!(tx.processed_at().is_some());
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut tx = pending_transaction();
        assert!(matches!(
            tx.complete(),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut tx = pending_transaction();
        tx.start_processing().unwrap();
        tx.complete().unwrap();
        assert!(tx.fail(None).is_err());
        assert!(tx.cancel(None).is_err());
        assert!(matches!(tx.soft_delete(), Err(CoreError::Conflict(_))));
    }

    #[test]
    fn test_fail_then_retry() {
        let mut tx = pending_transaction();
        tx.start_processing().unwrap();
        tx.fail(Some("gateway timeout")).unwrap();
        assert!(tx.can_be_retried());
        assert_eq!(tx.provider_data()["failureReason"], "gateway timeout");

        tx.retry().unwrap();
        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert!(tx.retry().is_err());
    }

    #[test]
    fn test_cancel_only_before_completion() {
        let mut tx = pending_transaction();
        tx.cancel(Some("duplicate")).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Cancelled);
        assert!(tx.start_processing().is_err());
    }

    #[test]
    fn test_deleted_rejects_mutation() {
        let mut tx = pending_transaction();
        tx.soft_delete().unwrap();
        assert!(tx.start_processing().is_err());
        assert!(matches!(
            tx.update_provider_data(JsonMap::new()),
            Err(CoreError::Deleted { .. })
        ));
        tx.restore();
        tx.start_processing().unwrap();
    }

    #[test]
    fn test_persistence_round_trip() {
        let tx = pending_transaction();
        let record = tx.to_persistence();
        assert_eq!(record.transaction_type, "PAYMENT");
        assert_eq!(Transaction::from_persistence(record).unwrap(), tx);
    }
}
