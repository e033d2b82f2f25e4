//! # Tenant Domain Service
//!
//! Cross-aggregate tenant rules. Callers pass in the data a rule needs
//! (existing tenants, users, counts); nothing here touches storage.

use crate::services::RuleDecision;
use crate::tenant::{Tenant, TenantUser};
use crate::validation::{slugify, validate_email, validate_slug, validate_tenant_name};

/// Stateless tenant rule engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantDomainService;

impl TenantDomainService {
    /// Format checks, then case-insensitive uniqueness of slug and email
    /// among tenants that are not deleted.
    pub fn can_create_tenant(name: &str, slug: &str, email: &str, existing: &[Tenant]) -> RuleDecision {
        let format = validate_tenant_name(name)
            .and_then(|_| validate_slug(slug))
            .and_then(|_| validate_email(email));
        if let Err(e) = format {
            return RuleDecision::deny(e.to_string());
        }

        let live = || existing.iter().filter(|t| !t.is_deleted());

        if live().any(|t| t.slug().eq_ignore_ascii_case(slug)) {
            return RuleDecision::deny(format!("slug '{slug}' is already in use"));
        }

        if live().any(|t| t.email().eq_ignore_ascii_case(email)) {
            return RuleDecision::deny(format!("email '{email}' is already in use"));
        }

        RuleDecision::allow()
    }

    /// A tenant needs at least one enabled ADMIN user to go live.
    pub fn can_activate_tenant(tenant: &Tenant, users: &[TenantUser]) -> RuleDecision {
        if tenant.is_deleted() {
            return RuleDecision::deny("cannot activate a deleted tenant");
        }
        if tenant.is_active() {
            return RuleDecision::deny("tenant is already active");
        }

        let has_admin = users
            .iter()
            .any(|u| &u.tenant_id == tenant.id() && u.is_enabled() && u.is_admin());
        if !has_admin {
            return RuleDecision::deny("tenant must have at least one active admin user");
        }

        RuleDecision::allow()
    }

    pub fn can_deactivate_tenant(tenant: &Tenant, active_payments: u64) -> RuleDecision {
        if tenant.is_deleted() {
            return RuleDecision::deny("cannot deactivate a deleted tenant");
        }
        if !tenant.is_active() {
            return RuleDecision::deny("tenant is already inactive");
        }
        if active_payments > 0 {
            return RuleDecision::deny(format!(
                "cannot deactivate tenant with {active_payments} active payment(s)"
            ));
        }
        RuleDecision::allow()
    }

    pub fn can_delete_tenant(tenant: &Tenant, active_payments: u64, active_users: u64) -> RuleDecision {
        if tenant.is_deleted() {
            return RuleDecision::deny("tenant is already deleted");
        }
        if active_payments > 0 {
            return RuleDecision::deny(format!(
                "cannot delete tenant with {active_payments} active payment(s)"
            ));
        }
        if active_users > 0 {
            return RuleDecision::deny(format!(
                "cannot delete tenant with {active_users} active user(s)"
            ));
        }
        RuleDecision::allow()
    }

    /// `slugify(name)`, suffixed `-1`, `-2`, ... until no live tenant owns it.
    ///
    /// ```rust
    /// use payflow_core::services::TenantDomainService;
    ///
    /// assert_eq!(TenantDomainService::generate_unique_slug("Loja São João", &[]), "loja-sao-joao");
    /// ```
    pub fn generate_unique_slug(name: &str, existing: &[Tenant]) -> String {
        let base = slugify(name);
        let taken = |candidate: &str| {
            existing
                .iter()
                .any(|t| !t.is_deleted() && t.slug().eq_ignore_ascii_case(candidate))
        };

        if !taken(&base) {
            return base;
        }

        (1u64..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or(base)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::UserRole;
    use crate::types::UserId;

    fn tenant(slug: &str, email: &str) -> Tenant {
        Tenant::create("Acme Store", slug, email).unwrap()
    }

    fn user(tenant: &Tenant, role: UserRole, is_active: bool) -> TenantUser {
        TenantUser {
            id: UserId::generate(),
            tenant_id: tenant.id().clone(),
            email: "owner@acme.com".to_string(),
            role,
            is_active,
            deleted_at: None,
        }
    }

    #[test]
    fn test_can_create_tenant_checks_uniqueness() {
        let existing = vec![tenant("acme", "billing@acme.com")];

        let ok = TenantDomainService::can_create_tenant("Other", "other", "x@other.com", &existing);
        assert!(ok.is_allowed());

        let dup_slug = TenantDomainService::can_create_tenant("Acme Two", "ACME", "x@other.com", &existing);
        assert!(!dup_slug.is_allowed());
        assert!(dup_slug.reason.unwrap().contains("slug"));

        let dup_email = TenantDomainService::can_create_tenant("Acme Two", "acme-2", "Billing@Acme.com", &existing);
        assert!(!dup_email.is_allowed());
        assert!(dup_email.reason.unwrap().contains("email"));
    }

    #[test]
    fn test_can_create_tenant_ignores_deleted() {
        let mut gone = tenant("acme", "billing@acme.com");
        gone.soft_delete().unwrap();
        let decision = TenantDomainService::can_create_tenant("Acme", "acme", "billing@acme.com", &[gone]);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_can_create_tenant_rejects_bad_format() {
        assert!(!TenantDomainService::can_create_tenant("Ac", "acme", "a@b.co", &[]).is_allowed());
        assert!(!TenantDomainService::can_create_tenant("Acme", "Acme!", "a@b.co", &[]).is_allowed());
        assert!(!TenantDomainService::can_create_tenant("Acme", "acme", "nope", &[]).is_allowed());
    }

    #[test]
    fn test_can_activate_requires_enabled_admin() {
        let t = tenant("acme", "billing@acme.com");

        // Operators only
        let users = vec![user(&t, UserRole::Operator, true), user(&t, UserRole::Manager, true)];
        assert!(!TenantDomainService::can_activate_tenant(&t, &users).is_allowed());

        // Disabled admin
        let users = vec![user(&t, UserRole::Admin, false)];
        assert!(!TenantDomainService::can_activate_tenant(&t, &users).is_allowed());

        let users = vec![user(&t, UserRole::Admin, true)];
        assert!(TenantDomainService::can_activate_tenant(&t, &users).is_allowed());
    }

    #[test]
    fn test_admin_of_another_tenant_does_not_count() {
        let t = tenant("acme", "billing@acme.com");
        let other = tenant("other", "billing@other.com");
        let users = vec![user(&other, UserRole::Admin, true)];
        assert!(!TenantDomainService::can_activate_tenant(&t, &users).is_allowed());
    }

    #[test]
    fn test_can_deactivate_blocks_on_active_payments() {
        let mut t = tenant("acme", "billing@acme.com");
        assert!(!TenantDomainService::can_deactivate_tenant(&t, 0).is_allowed());

        t.activate().unwrap();
        let blocked = TenantDomainService::can_deactivate_tenant(&t, 2);
        assert_eq!(
            blocked.reason.as_deref(),
            Some("cannot deactivate tenant with 2 active payment(s)")
        );
        assert!(TenantDomainService::can_deactivate_tenant(&t, 0).is_allowed());
    }

    #[test]
    fn test_can_delete_tenant() {
        let t = tenant("acme", "billing@acme.com");
        assert!(TenantDomainService::can_delete_tenant(&t, 0, 0).is_allowed());
        assert!(!TenantDomainService::can_delete_tenant(&t, 1, 0).is_allowed());
        assert!(!TenantDomainService::can_delete_tenant(&t, 0, 3).is_allowed());

        let mut gone = tenant("gone", "billing@gone.com");
        gone.soft_delete().unwrap();
        assert!(!TenantDomainService::can_delete_tenant(&gone, 0, 0).is_allowed());
    }

    #[test]
    fn test_generate_unique_slug_appends_suffix() {
        let existing = vec![
            tenant("acme-store", "a@acme.com"),
            tenant("acme-store-1", "b@acme.com"),
        ];
        assert_eq!(
            TenantDomainService::generate_unique_slug("Acme Store", &existing),
            "acme-store-2"
        );
        assert_eq!(TenantDomainService::generate_unique_slug("Beta Shop", &existing), "beta-shop");
    }

    #[test]
    fn test_into_result_maps_denial_to_rule_violation() {
        let t = tenant("acme", "billing@acme.com");
        let err = TenantDomainService::can_delete_tenant(&t, 1, 0).into_result().unwrap_err();
        assert!(err.is_business_rule_violation());
    }
}
