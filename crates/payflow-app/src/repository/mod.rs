//! # Repository Ports
//!
//! Narrow async interfaces the application services persist through.
//!
//! ## Optimistic Versioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load          → Payment { version: 4 }                                 │
//! │  mutate        → Payment { version: 4, status: CAPTURED }               │
//! │  save          → stored version == 4 ?                                  │
//! │                    yes → write, return Payment { version: 5 }           │
//! │                    no  → AppError::StaleWrite (nothing written)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! A brand-new aggregate carries version 0 and must not exist yet.
//! The aggregate handed to `save` should already have had its events
//! drained; the returned copy is rebuilt from the stored record.

pub mod in_memory;

pub use in_memory::{
    InMemoryPaymentRepository, InMemoryTenantRepository, InMemoryTransactionRepository,
    InMemoryUserDirectory,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payflow_core::{
    Payment, PaymentId, PaymentStatus, Provider, Tenant, TenantId, TenantUser, Transaction,
    TransactionId,
};

use crate::error::AppResult;

// =============================================================================
// Payment Filters
// =============================================================================

/// Query over payments. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub tenant_id: Option<TenantId>,
    pub status: Option<PaymentStatus>,
    pub provider: Option<Provider>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Only non-terminal payments (money may still move).
    pub active_only: bool,
    pub include_deleted: bool,
    /// Page size; ignored by counts.
    pub limit: Option<usize>,
    /// Rows to skip; ignored by counts.
    pub offset: usize,
}

impl PaymentFilter {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        PaymentFilter {
            tenant_id: Some(tenant_id),
            ..PaymentFilter::default()
        }
    }

    /// The "active payments" count that blocks tenant deactivation and deletion.
    pub fn active_for_tenant(tenant_id: TenantId) -> Self {
        PaymentFilter {
            active_only: true,
            ..PaymentFilter::for_tenant(tenant_id)
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        if !self.include_deleted && payment.is_deleted() {
            return false;
        }
        if self.active_only && !payment.is_active() {
            return false;
        }
        if self.tenant_id.as_ref().is_some_and(|t| t != payment.tenant_id()) {
            return false;
        }
        if self.status.is_some_and(|s| s != payment.status()) {
            return false;
        }
        if self.provider.is_some_and(|p| p != payment.provider()) {
            return false;
        }
        if self.created_from.is_some_and(|from| payment.created_at() < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| payment.created_at() > to) {
            return false;
        }
        true
    }
}

// =============================================================================
// Ports
// =============================================================================

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn save(&self, payment: Payment) -> AppResult<Payment>;
    async fn find_by_id(&self, id: &PaymentId) -> AppResult<Option<Payment>>;
    async fn find_by_provider_payment_id(
        &self,
        provider: Provider,
        provider_payment_id: &str,
    ) -> AppResult<Option<Payment>>;
    /// Non-deleted payments of a tenant, newest first.
    async fn find_by_tenant_id(&self, tenant_id: &TenantId) -> AppResult<Vec<Payment>>;
    /// Newest first, then paged by `offset` / `limit`.
    async fn find_with_filters(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>>;
    async fn count_by_tenant_id(&self, tenant_id: &TenantId) -> AppResult<u64>;
    async fn count_with_filters(&self, filter: &PaymentFilter) -> AppResult<u64>;
    /// Soft delete through the aggregate; a captured payment is refused.
    async fn delete(&self, id: &PaymentId) -> AppResult<()>;
    async fn restore(&self, id: &PaymentId) -> AppResult<()>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn save(&self, transaction: Transaction) -> AppResult<Transaction>;
    async fn find_by_id(&self, id: &TransactionId) -> AppResult<Option<Transaction>>;
    /// Oldest first.
    async fn find_by_payment_id(&self, payment_id: &PaymentId) -> AppResult<Vec<Transaction>>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn save(&self, tenant: Tenant) -> AppResult<Tenant>;
    async fn find_by_id(&self, id: &TenantId) -> AppResult<Option<Tenant>>;
    /// Case-insensitive; deleted tenants included.
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Tenant>>;
    /// Every tenant, deleted ones included, ordered by creation.
    async fn list(&self) -> AppResult<Vec<Tenant>>;
}

/// Read side of the user store, as far as tenant rules need it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_tenant_id(&self, tenant_id: &TenantId) -> AppResult<Vec<TenantUser>>;
}
