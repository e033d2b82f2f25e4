//! In-memory repositories.
//!
//! Each store keeps the persistence *record* of its aggregate behind an
//! `Arc<RwLock<HashMap<..>>>`, so every read goes through the same
//! `from_persistence` validation a database-backed store would use.

use async_trait::async_trait;
use payflow_core::payment::PaymentRecord;
use payflow_core::tenant::TenantRecord;
use payflow_core::transaction::TransactionRecord;
use payflow_core::{
    Payment, PaymentId, Provider, Tenant, TenantId, TenantUser, Transaction, TransactionId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::repository::{
    PaymentFilter, PaymentRepository, TenantRepository, TransactionRepository, UserDirectory,
};

/// Compares the stored version with the incoming one; absent rows count as 0.
fn check_version(entity: &'static str, id: &str, stored: Option<u64>, incoming: u64) -> AppResult<()> {
    let found = stored.unwrap_or(0);
    if found != incoming {
        return Err(AppError::StaleWrite {
            entity,
            id: id.to_string(),
            expected: incoming,
            found,
        });
    }
    Ok(())
}

fn corrupt(entity: &str, id: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Repository(format!("stored {entity} {id} failed validation: {err}"))
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemoryPaymentRepository {
    records: Arc<RwLock<HashMap<String, PaymentRecord>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(record: &PaymentRecord) -> AppResult<Payment> {
        Payment::from_persistence(record.clone()).map_err(|e| corrupt("payment", &record.id, e))
    }

    fn load_all(records: &HashMap<String, PaymentRecord>) -> AppResult<Vec<Payment>> {
        let mut payments = records.values().map(Self::load).collect::<AppResult<Vec<_>>>()?;
        payments.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(payments)
    }

    /// Applies `change` to a stored payment and writes it back with version + 1.
    async fn update<F>(&self, id: &PaymentId, change: F) -> AppResult<()>
    where
        F: FnOnce(&mut Payment) -> AppResult<()> + Send,
    {
        let mut records = self.records.write().await;
        let record = records
            .get(id.as_str())
            .ok_or_else(|| AppError::not_found("payment", id))?;

        let mut payment = Self::load(record)?;
        change(&mut payment)?;

        let mut record = payment.to_persistence();
        record.version += 1;
        records.insert(record.id.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn save(&self, payment: Payment) -> AppResult<Payment> {
        let mut records = self.records.write().await;
        let id = payment.id().as_str();
        check_version("payment", id, records.get(id).map(|r| r.version), payment.version())?;

        let mut record = payment.to_persistence();
        record.version += 1;
        debug!(payment_id = %record.id, version = record.version, "payment saved");

        let saved = Self::load(&record)?;
        records.insert(record.id.clone(), record);
        Ok(saved)
    }

    async fn find_by_id(&self, id: &PaymentId) -> AppResult<Option<Payment>> {
        let records = self.records.read().await;
        records.get(id.as_str()).map(Self::load).transpose()
    }

    async fn find_by_provider_payment_id(
        &self,
        provider: Provider,
        provider_payment_id: &str,
    ) -> AppResult<Option<Payment>> {
        let records = self.records.read().await;
        records
            .values()
            .find(|r| r.provider == provider.code() && r.provider_payment_id == provider_payment_id)
            .map(Self::load)
            .transpose()
    }

    async fn find_by_tenant_id(&self, tenant_id: &TenantId) -> AppResult<Vec<Payment>> {
        self.find_with_filters(&PaymentFilter::for_tenant(tenant_id.clone()))
            .await
    }

    async fn find_with_filters(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        let records = self.records.read().await;
        let matching = Self::load_all(&records)?
            .into_iter()
            .filter(|p| filter.matches(p))
            .skip(filter.offset);

        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn count_by_tenant_id(&self, tenant_id: &TenantId) -> AppResult<u64> {
        self.count_with_filters(&PaymentFilter::for_tenant(tenant_id.clone()))
            .await
    }

    async fn count_with_filters(&self, filter: &PaymentFilter) -> AppResult<u64> {
        let records = self.records.read().await;
        let count = Self::load_all(&records)?
            .iter()
            .filter(|p| filter.matches(p))
            .count();
        Ok(count as u64)
    }

    async fn delete(&self, id: &PaymentId) -> AppResult<()> {
        debug!(payment_id = %id, "soft-deleting payment");
        self.update(id, |payment| Ok(payment.soft_delete()?)).await
    }

    async fn restore(&self, id: &PaymentId) -> AppResult<()> {
        debug!(payment_id = %id, "restoring payment");
        self.update(id, |payment| {
            payment.restore();
            Ok(())
        })
        .await
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemoryTransactionRepository {
    records: Arc<RwLock<HashMap<String, TransactionRecord>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(record: &TransactionRecord) -> AppResult<Transaction> {
        Transaction::from_persistence(record.clone()).map_err(|e| corrupt("transaction", &record.id, e))
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn save(&self, transaction: Transaction) -> AppResult<Transaction> {
        let mut records = self.records.write().await;
        let id = transaction.id().as_str();
        check_version(
            "transaction",
            id,
            records.get(id).map(|r| r.version),
            transaction.version(),
        )?;

        let mut record = transaction.to_persistence();
        record.version += 1;
        debug!(transaction_id = %record.id, payment_id = %record.payment_id, "transaction saved");

        let saved = Self::load(&record)?;
        records.insert(record.id.clone(), record);
        Ok(saved)
    }

    async fn find_by_id(&self, id: &TransactionId) -> AppResult<Option<Transaction>> {
        let records = self.records.read().await;
        records.get(id.as_str()).map(Self::load).transpose()
    }

    async fn find_by_payment_id(&self, payment_id: &PaymentId) -> AppResult<Vec<Transaction>> {
        let records = self.records.read().await;
        let mut transactions = records
            .values()
            .filter(|r| r.payment_id == payment_id.as_str())
            .map(Self::load)
            .collect::<AppResult<Vec<_>>>()?;
        transactions.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(transactions)
    }
}

// =============================================================================
// Tenants
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemoryTenantRepository {
    records: Arc<RwLock<HashMap<String, TenantRecord>>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(record: &TenantRecord) -> AppResult<Tenant> {
        Tenant::from_persistence(record.clone()).map_err(|e| corrupt("tenant", &record.id, e))
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn save(&self, tenant: Tenant) -> AppResult<Tenant> {
        let mut records = self.records.write().await;
        let id = tenant.id().as_str();
        check_version("tenant", id, records.get(id).map(|r| r.version), tenant.version())?;

        let mut record = tenant.to_persistence();
        record.version += 1;
        debug!(tenant_id = %record.id, slug = %record.slug, "tenant saved");

        let saved = Self::load(&record)?;
        records.insert(record.id.clone(), record);
        Ok(saved)
    }

    async fn find_by_id(&self, id: &TenantId) -> AppResult<Option<Tenant>> {
        let records = self.records.read().await;
        records.get(id.as_str()).map(Self::load).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Tenant>> {
        let records = self.records.read().await;
        records
            .values()
            .find(|r| r.slug.eq_ignore_ascii_case(slug))
            .map(Self::load)
            .transpose()
    }

    async fn list(&self) -> AppResult<Vec<Tenant>> {
        let records = self.records.read().await;
        let mut tenants = records
            .values()
            .map(Self::load)
            .collect::<AppResult<Vec<_>>>()?;
        tenants.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(tenants)
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<Vec<TenantUser>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user: TenantUser) {
        self.users.write().await.push(user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_tenant_id(&self, tenant_id: &TenantId) -> AppResult<Vec<TenantUser>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| &u.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_core::{NewPayment, PaymentStatus};

    fn new_payment(tenant: &str, provider_payment_id: &str) -> Payment {
        let mut payment = Payment::create(NewPayment {
            tenant_id: tenant.to_string(),
            user_id: None,
            amount: 50.0,
            currency: "BRL".to_string(),
            provider: Provider::Stripe,
            provider_payment_id: provider_payment_id.to_string(),
            description: "Order #1".to_string(),
            metadata: Default::default(),
            expires_at: None,
        })
        .unwrap();
        payment.take_events();
        payment
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let repo = InMemoryPaymentRepository::new();
        let saved = repo.save(new_payment("ten_acme", "pi_1")).await.unwrap();
        assert_eq!(saved.version(), 1);

        let loaded = repo.find_by_id(saved.id()).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let repo = InMemoryPaymentRepository::new();
        let saved = repo.save(new_payment("ten_acme", "pi_1")).await.unwrap();

        let mut first = saved.clone();
        let mut second = saved;
        first.authorize().unwrap();
        repo.save(first).await.unwrap();

        second.cancel(Some("late writer")).unwrap();
        let err = repo.save(second).await.unwrap_err();
        assert!(err.is_stale_write());
    }

    #[tokio::test]
    async fn test_new_aggregate_with_nonzero_version_is_stale() {
        let repo = InMemoryPaymentRepository::new();
        let saved = repo.save(new_payment("ten_acme", "pi_1")).await.unwrap();

        let other = InMemoryPaymentRepository::new();
        assert!(other.save(saved).await.unwrap_err().is_stale_write());
    }

    #[tokio::test]
    async fn test_filters_and_counts() {
        let repo = InMemoryPaymentRepository::new();
        let a = repo.save(new_payment("ten_acme", "pi_1")).await.unwrap();
        repo.save(new_payment("ten_acme", "pi_2")).await.unwrap();
        repo.save(new_payment("ten_other", "pi_3")).await.unwrap();

        let mut failed = a;
        failed.fail(Some("card declined")).unwrap();
        repo.save(failed).await.unwrap();

        let acme = TenantId::new("ten_acme").unwrap();
        assert_eq!(repo.count_by_tenant_id(&acme).await.unwrap(), 2);
        assert_eq!(
            repo.count_with_filters(&PaymentFilter::active_for_tenant(acme.clone()))
                .await
                .unwrap(),
            1
        );

        let filter = PaymentFilter {
            status: Some(PaymentStatus::Failed),
            ..PaymentFilter::default()
        };
        let failed = repo.find_with_filters(&filter).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].provider_payment_id(), "pi_1");

        let page = PaymentFilter {
            limit: Some(1),
            ..PaymentFilter::default()
        };
        assert_eq!(repo.find_with_filters(&page).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_provider_payment_id() {
        let repo = InMemoryPaymentRepository::new();
        repo.save(new_payment("ten_acme", "pi_xyz")).await.unwrap();

        let found = repo
            .find_by_provider_payment_id(Provider::Stripe, "pi_xyz")
            .await
            .unwrap();
        assert!(found.is_some());
        let missing = repo
            .find_by_provider_payment_id(Provider::Pagarme, "pi_xyz")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_restore() {
        let repo = InMemoryPaymentRepository::new();
        let saved = repo.save(new_payment("ten_acme", "pi_1")).await.unwrap();
        let id = saved.id().clone();
        let tenant = saved.tenant_id().clone();

        repo.delete(&id).await.unwrap();
        assert!(repo.find_by_tenant_id(&tenant).await.unwrap().is_empty());
        let deleted = repo.find_by_id(&id).await.unwrap().unwrap();
        assert!(deleted.is_deleted());
        assert_eq!(deleted.version(), 2);

        repo.restore(&id).await.unwrap();
        assert_eq!(repo.find_by_tenant_id(&tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_captured_payment_conflicts() {
        let repo = InMemoryPaymentRepository::new();
        let mut payment = repo.save(new_payment("ten_acme", "pi_1")).await.unwrap();
        payment.authorize().unwrap();
        payment.capture().unwrap();
        let payment = repo.save(payment).await.unwrap();

        let err = repo.delete(payment.id()).await.unwrap_err();
        assert!(matches!(err, AppError::Core(_)));
        assert!(!repo.find_by_id(payment.id()).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let repo = InMemoryPaymentRepository::new();
        let err = repo.delete(&PaymentId::new("pay_missing").unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_tenant_lookup_by_slug_ignores_case() {
        let repo = InMemoryTenantRepository::new();
        let tenant = Tenant::create("Acme Store", "acme-store", "billing@acme.com").unwrap();
        repo.save(tenant).await.unwrap();

        assert!(repo.find_by_slug("ACME-STORE").await.unwrap().is_some());
        assert!(repo.find_by_slug("other").await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
