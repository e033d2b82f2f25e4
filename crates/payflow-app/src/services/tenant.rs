//! Tenant application service.

use payflow_core::{Tenant, TenantDomainService, TenantId, TenantSettings};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::repository::{PaymentFilter, PaymentRepository, TenantRepository, UserDirectory};

pub struct TenantService {
    tenants: Arc<dyn TenantRepository>,
    payments: Arc<dyn PaymentRepository>,
    users: Arc<dyn UserDirectory>,
}

impl TenantService {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        payments: Arc<dyn PaymentRepository>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        TenantService {
            tenants,
            payments,
            users,
        }
    }

    /// Registers an INACTIVE tenant. Without a slug one is derived from the
    /// name and made unique with a numeric suffix.
    pub async fn create_tenant(&self, name: &str, slug: Option<&str>, email: &str) -> AppResult<Tenant> {
        let existing = self.tenants.list().await?;
        let slug = match slug {
            Some(slug) => slug.to_string(),
            None => TenantDomainService::generate_unique_slug(name, &existing),
        };

        let decision = TenantDomainService::can_create_tenant(name, &slug, email, &existing);
        if !decision.allowed {
            warn!(slug = %slug, reason = decision.reason.as_deref().unwrap_or_default(), "tenant rejected");
        }
        decision.into_result()?;

        let tenant = Tenant::create(name, &slug, email)?;
        info!(tenant_id = %tenant.id(), slug = %slug, "tenant created");
        self.tenants.save(tenant).await
    }

    /// Requires at least one enabled ADMIN user.
    pub async fn activate_tenant(&self, id: &TenantId) -> AppResult<Tenant> {
        let mut tenant = self.load(id).await?;
        let users = self.users.find_by_tenant_id(id).await?;

        let decision = TenantDomainService::can_activate_tenant(&tenant, &users);
        if !decision.allowed {
            warn!(tenant_id = %id, reason = decision.reason.as_deref().unwrap_or_default(), "activation rejected");
        }
        decision.into_result()?;

        tenant.activate()?;
        info!(tenant_id = %id, "tenant activated");
        self.tenants.save(tenant).await
    }

    /// Refused while the tenant still has active payments.
    pub async fn deactivate_tenant(&self, id: &TenantId) -> AppResult<Tenant> {
        let mut tenant = self.load(id).await?;
        let active_payments = self.active_payments(id).await?;

        let decision = TenantDomainService::can_deactivate_tenant(&tenant, active_payments);
        if !decision.allowed {
            warn!(tenant_id = %id, active_payments, "deactivation rejected");
        }
        decision.into_result()?;

        tenant.deactivate()?;
        info!(tenant_id = %id, "tenant deactivated");
        self.tenants.save(tenant).await
    }

    /// Soft delete; refused while payments or enabled users remain.
    pub async fn delete_tenant(&self, id: &TenantId) -> AppResult<Tenant> {
        let mut tenant = self.load(id).await?;
        let active_payments = self.active_payments(id).await?;
        let active_users = self
            .users
            .find_by_tenant_id(id)
            .await?
            .iter()
            .filter(|u| u.is_enabled())
            .count() as u64;

        let decision = TenantDomainService::can_delete_tenant(&tenant, active_payments, active_users);
        if !decision.allowed {
            warn!(tenant_id = %id, active_payments, active_users, "deletion rejected");
        }
        decision.into_result()?;

        tenant.soft_delete()?;
        info!(tenant_id = %id, "tenant deleted");
        self.tenants.save(tenant).await
    }

    pub async fn update_settings(&self, id: &TenantId, settings: TenantSettings) -> AppResult<Tenant> {
        let mut tenant = self.load(id).await?;
        tenant.update_settings(settings)?;
        info!(tenant_id = %id, "tenant settings updated");
        self.tenants.save(tenant).await
    }

    pub async fn get_tenant(&self, id: &TenantId) -> AppResult<Tenant> {
        self.load(id).await
    }

    async fn load(&self, id: &TenantId) -> AppResult<Tenant> {
        self.tenants
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("tenant", id))
    }

    async fn active_payments(&self, id: &TenantId) -> AppResult<u64> {
        self.payments
            .count_with_filters(&PaymentFilter::active_for_tenant(id.clone()))
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryPaymentRepository, InMemoryTenantRepository, InMemoryUserDirectory};
    use payflow_core::{NewPayment, Payment, Provider, TenantPolicy, TenantUser, UserId, UserRole};

    struct Fixture {
        service: TenantService,
        payments: Arc<InMemoryPaymentRepository>,
        users: Arc<InMemoryUserDirectory>,
    }

    fn fixture() -> Fixture {
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let service = TenantService::new(tenants, payments.clone(), users.clone());
        Fixture {
            service,
            payments,
            users,
        }
    }

    fn user(tenant_id: &TenantId, role: UserRole, is_active: bool) -> TenantUser {
        TenantUser {
            id: UserId::generate(),
            tenant_id: tenant_id.clone(),
            email: "owner@acme.com".to_string(),
            role,
            is_active,
            deleted_at: None,
        }
    }

    async fn open_payment(fx: &Fixture, tenant_id: &TenantId) -> Payment {
        let mut payment = Payment::create(NewPayment {
            tenant_id: tenant_id.to_string(),
            user_id: None,
            amount: 10.0,
            currency: "BRL".to_string(),
            provider: Provider::Stripe,
            provider_payment_id: "pi_open".to_string(),
            description: "Open order".to_string(),
            metadata: Default::default(),
            expires_at: None,
        })
        .unwrap();
        payment.take_events();
        fx.payments.save(payment).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_tenant_derives_unique_slug() {
        let fx = fixture();
        let first = fx.service.create_tenant("Café Central", None, "a@cafe.com").await.unwrap();
        let second = fx.service.create_tenant("Cafe Central", None, "b@cafe.com").await.unwrap();

        assert_eq!(first.slug(), "cafe-central");
        assert_eq!(second.slug(), "cafe-central-1");
        assert!(!first.is_active());
        assert_eq!(first.version(), 1);
    }

    #[tokio::test]
    async fn test_create_tenant_rejects_duplicate_email() {
        let fx = fixture();
        fx.service.create_tenant("Acme", Some("acme"), "billing@acme.com").await.unwrap();
        let err = fx
            .service
            .create_tenant("Acme Two", Some("acme-two"), "BILLING@acme.com")
            .await
            .unwrap_err();
        assert!(err.is_business_rule_violation());
    }

    #[tokio::test]
    async fn test_activation_requires_enabled_admin() {
        let fx = fixture();
        let tenant = fx.service.create_tenant("Acme", Some("acme"), "billing@acme.com").await.unwrap();
        let id = tenant.id().clone();

        fx.users.add(user(&id, UserRole::Operator, true)).await;
        assert!(fx.service.activate_tenant(&id).await.unwrap_err().is_business_rule_violation());

        fx.users.add(user(&id, UserRole::Admin, true)).await;
        let active = fx.service.activate_tenant(&id).await.unwrap();
        assert!(active.is_active());
    }

    #[tokio::test]
    async fn test_deactivation_blocked_by_active_payment() {
        let fx = fixture();
        let tenant = fx.service.create_tenant("Acme", Some("acme"), "billing@acme.com").await.unwrap();
        let id = tenant.id().clone();
        fx.users.add(user(&id, UserRole::Admin, true)).await;
        fx.service.activate_tenant(&id).await.unwrap();

        let payment = open_payment(&fx, &id).await;
        let err = fx.service.deactivate_tenant(&id).await.unwrap_err();
        assert!(err.to_string().contains("1 active payment(s)"));

        let mut cancelled = payment;
        cancelled.cancel(None).unwrap();
        cancelled.take_events();
        fx.payments.save(cancelled).await.unwrap();

        let inactive = fx.service.deactivate_tenant(&id).await.unwrap();
        assert!(!inactive.is_active());
    }

    #[tokio::test]
    async fn test_delete_blocked_by_enabled_users() {
        let fx = fixture();
        let tenant = fx.service.create_tenant("Acme", Some("acme"), "billing@acme.com").await.unwrap();
        let id = tenant.id().clone();

        fx.users.add(user(&id, UserRole::Manager, true)).await;
        assert!(fx.service.delete_tenant(&id).await.is_err());

        let other = fx.service.create_tenant("Other", Some("other"), "ops@other.com").await.unwrap();
        fx.users.add(user(other.id(), UserRole::Admin, false)).await;
        let deleted = fx.service.delete_tenant(other.id()).await.unwrap();
        assert!(deleted.is_deleted());
    }

    #[tokio::test]
    async fn test_update_settings_persists_policy() {
        let fx = fixture();
        let tenant = fx.service.create_tenant("Acme", Some("acme"), "billing@acme.com").await.unwrap();
        let settings = TenantSettings::create().with_policy(TenantPolicy {
            auto_capture_enabled: Some(true),
            ..TenantPolicy::default()
        });

        fx.service.update_settings(tenant.id(), settings).await.unwrap();
        let stored = fx.service.get_tenant(tenant.id()).await.unwrap();
        assert!(stored.settings().policy().auto_capture_enabled());
        assert_eq!(stored.version(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_not_found() {
        let fx = fixture();
        let id = TenantId::new("ten_missing").unwrap();
        assert!(fx.service.activate_tenant(&id).await.unwrap_err().is_not_found());
    }
}
