//! # Payment Application Service
//!
//! ## Command Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. LOAD      payment + tenant (effective settings)                     │
//! │  2. CHECK     PaymentDomainService rule → BusinessRuleViolation         │
//! │  3. MUTATE    aggregate method (guards its own state machine)           │
//! │  4. SAVE      repository.save → StaleWrite on a concurrent update       │
//! │  5. PUBLISH   drained events → EventBus (failures only logged)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Nothing is retried here: a `StaleWrite` goes back to the caller, who
//! reloads and decides.

use payflow_core::events::PaymentEventKind;
use payflow_core::{
    ChargeMethod, CoreError, DomainEvent, Money, NewPayment, Payment, PaymentDomainService, PaymentId, PaymentStatus,
    Provider, Tenant, TenantId, TenantPolicy, TenantSettings, Transaction,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::events::EventBus;
use crate::repository::{PaymentRepository, TenantRepository, TransactionRepository};

/// Fee breakdown for a prospective charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub amount: Money,
    pub fee: Money,
    pub net: Money,
}

/// A refunded payment and the REFUND transaction recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    pub payment: Payment,
    pub transaction: Transaction,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    transactions: Arc<dyn TransactionRepository>,
    tenants: Arc<dyn TenantRepository>,
    bus: EventBus,
    config: AppConfig,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        transactions: Arc<dyn TransactionRepository>,
        tenants: Arc<dyn TenantRepository>,
        bus: EventBus,
        config: AppConfig,
    ) -> Self {
        PaymentService {
            payments,
            transactions,
            tenants,
            bus,
            config,
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Opens a payment for an active tenant.
    ///
    /// Without an explicit `expires_at` the expiry comes from the provider
    /// default or the tenant's `paymentExpirationDays`.
    pub async fn create_payment(&self, mut input: NewPayment) -> AppResult<Payment> {
        let tenant_id = TenantId::new(input.tenant_id.as_str())?;
        let tenant = self.load_tenant(&tenant_id).await?;
        if !tenant.is_active() {
            warn!(tenant_id = %tenant_id, "payment rejected: tenant inactive");
            return Err(CoreError::rule(format!("tenant {tenant_id} is not active")).into());
        }

        let settings = self.effective_settings(&tenant);
        if input.expires_at.is_none() {
            input.expires_at = Some(PaymentDomainService::calculate_expiration_date(
                input.provider,
                &settings,
            ));
        }

        let payment = Payment::create(input)?;
        self.check_processable(&payment, &settings)?;

        info!(
            payment_id = %payment.id(),
            tenant_id = %tenant_id,
            amount = %payment.amount(),
            provider = %payment.provider(),
            "payment created"
        );
        self.commit(payment).await
    }

    pub async fn authorize(&self, id: &PaymentId) -> AppResult<Payment> {
        let mut payment = self.load_payment(id).await?;
        let tenant = self.load_tenant(payment.tenant_id()).await?;
        self.check_processable(&payment, &self.effective_settings(&tenant))?;

        payment.authorize()?;
        info!(payment_id = %id, "payment authorized");
        self.commit(payment).await
    }

    pub async fn capture(&self, id: &PaymentId) -> AppResult<Payment> {
        let mut payment = self.load_payment(id).await?;
        let tenant = self.load_tenant(payment.tenant_id()).await?;
        self.check_processable(&payment, &self.effective_settings(&tenant))?;

        payment.capture()?;
        info!(payment_id = %id, "payment captured");
        self.commit(payment).await
    }

    pub async fn cancel(&self, id: &PaymentId, reason: Option<&str>) -> AppResult<Payment> {
        let mut payment = self.load_payment(id).await?;
        payment.cancel(reason)?;
        info!(payment_id = %id, reason = reason.unwrap_or_default(), "payment cancelled");
        self.commit(payment).await
    }

    pub async fn fail(&self, id: &PaymentId, reason: Option<&str>) -> AppResult<Payment> {
        let mut payment = self.load_payment(id).await?;
        payment.fail(reason)?;
        info!(payment_id = %id, reason = reason.unwrap_or_default(), "payment failed");
        self.commit(payment).await
    }

    /// Refunds `amount` (default: everything) and records a REFUND transaction
    /// under the gateway's refund id.
    pub async fn refund(
        &self,
        id: &PaymentId,
        amount: Option<Money>,
        reason: Option<&str>,
        provider_refund_id: &str,
    ) -> AppResult<RefundOutcome> {
        let mut payment = self.load_payment(id).await?;

        let eligibility = PaymentDomainService::can_process_refund(&payment, amount);
        if !eligibility.allowed {
            warn!(
                payment_id = %id,
                reason = eligibility.reason.as_deref().unwrap_or_default(),
                "refund rejected"
            );
            eligibility.decision().into_result()?;
        }

        let refund_amount = amount.unwrap_or(payment.amount());
        payment.refund(Some(refund_amount), reason)?;
        let transaction = PaymentDomainService::create_transaction_from_payment(
            &payment,
            provider_refund_id,
            Some(refund_amount),
        )?;

        info!(
            payment_id = %id,
            refund = %refund_amount,
            status = %payment.status(),
            "payment refunded"
        );
        // Events wait until the ledger row is stored too.
        let (payment, events) = self.save(payment).await?;
        let transaction = self.transactions.save(transaction).await?;
        self.publish(&payment, &events).await;

        Ok(RefundOutcome {
            payment,
            transaction,
        })
    }

    /// Applies a gateway status report, then auto-captures when the tenant
    /// asks for it.
    ///
    /// An unknown or irrelevant provider status leaves the payment untouched
    /// and nothing is saved.
    pub async fn apply_provider_status(&self, id: &PaymentId, provider_status: &str) -> AppResult<Payment> {
        let mut payment = self.load_payment(id).await?;
        let tenant = self.load_tenant(payment.tenant_id()).await?;
        let settings = self.effective_settings(&tenant);

        let current = payment.status();
        let next = PaymentDomainService::determine_next_payment_status(current, provider_status);

        match next {
            _ if next == current => {}
            PaymentStatus::Authorized => payment.authorize()?,
            PaymentStatus::Captured => {
                if payment.is_pending() {
                    payment.authorize()?;
                }
                payment.capture()?;
            }
            PaymentStatus::Failed => {
                let reason = format!("provider reported {provider_status}");
                payment.fail(Some(reason.as_str()))?;
            }
            // determine_next_payment_status yields no other targets
            _ => {}
        }

        if PaymentDomainService::should_auto_capture(&payment, &settings) {
            payment.capture()?;
            info!(payment_id = %id, "payment auto-captured");
        }

        if payment.status() == current {
            return Ok(payment);
        }

        info!(
            payment_id = %id,
            provider_status,
            from = %current,
            to = %payment.status(),
            "provider status applied"
        );
        self.commit(payment).await
    }

    /// Cancels a PENDING payment past its expiry and emits `payment.expired`.
    ///
    /// Returns `true` when the payment was expired by this call.
    pub async fn expire_if_due(&self, id: &PaymentId) -> AppResult<bool> {
        let mut payment = self.load_payment(id).await?;
        if !payment.is_pending() || !payment.is_expired() {
            return Ok(false);
        }

        payment.cancel(Some("expired"))?;
        payment.record_event(PaymentEventKind::Expired, Some("expired"));
        info!(payment_id = %id, "payment expired");
        self.commit(payment).await?;
        Ok(true)
    }

    /// Fee and net amount for a prospective charge.
    ///
    /// ## Errors
    /// `Underflow` when the minimum fee exceeds the amount.
    pub fn quote_fee(&self, amount: Money, provider: Provider, method: ChargeMethod) -> AppResult<FeeQuote> {
        let fee = PaymentDomainService::calculate_provider_fee(amount, provider, method);
        let net = PaymentDomainService::calculate_net_amount(amount, provider, method)?;
        Ok(FeeQuote { amount, fee, net })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_payment(&self, id: &PaymentId) -> AppResult<Payment> {
        self.load_payment(id).await
    }

    pub async fn list_transactions(&self, id: &PaymentId) -> AppResult<Vec<Transaction>> {
        self.transactions.find_by_payment_id(id).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_payment(&self, id: &PaymentId) -> AppResult<Payment> {
        self.payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("payment", id))
    }

    async fn load_tenant(&self, id: &TenantId) -> AppResult<Tenant> {
        self.tenants
            .find_by_id(id)
            .await?
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| AppError::not_found("tenant", id))
    }

    /// Tenant settings with the configured ceiling filled in when the
    /// tenant policy sets none.
    fn effective_settings(&self, tenant: &Tenant) -> TenantSettings {
        let policy = *tenant.settings().policy();
        if policy.max_payment_amount.is_some() {
            return tenant.settings().clone();
        }
        tenant.settings().clone().with_policy(TenantPolicy {
            max_payment_amount: Some(self.config.default_max_payment()),
            ..policy
        })
    }

    fn check_processable(&self, payment: &Payment, settings: &TenantSettings) -> AppResult<()> {
        let decision = PaymentDomainService::can_process_payment(payment, settings);
        if !decision.allowed {
            warn!(
                payment_id = %payment.id(),
                tenant_id = %payment.tenant_id(),
                reason = decision.reason.as_deref().unwrap_or_default(),
                "payment rejected"
            );
        }
        Ok(decision.into_result()?)
    }

    /// Saves the aggregate, then publishes what it recorded.
    async fn commit(&self, payment: Payment) -> AppResult<Payment> {
        let (saved, events) = self.save(payment).await?;
        self.publish(&saved, &events).await;
        Ok(saved)
    }

    /// Drains the recorded events and stores the aggregate. The events are
    /// handed back unpublished.
    async fn save(&self, mut payment: Payment) -> AppResult<(Payment, Vec<DomainEvent>)> {
        let events = payment.take_events();
        let saved = self.payments.save(payment).await?;
        Ok((saved, events))
    }

    async fn publish(&self, payment: &Payment, events: &[DomainEvent]) {
        let report = self.bus.publish(events).await;
        if !report.is_clean() {
            warn!(
                payment_id = %payment.id(),
                failed = report.failed(),
                "some event handlers failed"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventLog;
    use crate::repository::{
        InMemoryPaymentRepository, InMemoryTenantRepository, InMemoryTransactionRepository,
    };
    use chrono::{Duration, Utc};
    use payflow_core::TransactionType;

    struct Fixture {
        service: PaymentService,
        payments: Arc<InMemoryPaymentRepository>,
        log: InMemoryEventLog,
        tenant_id: TenantId,
    }

    async fn fixture_with(policy: TenantPolicy, config: AppConfig) -> Fixture {
        fixture_with_ledger(policy, config, Arc::new(InMemoryTransactionRepository::new())).await
    }

    async fn fixture_with_ledger(
        policy: TenantPolicy,
        config: AppConfig,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Fixture {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let tenants = Arc::new(InMemoryTenantRepository::new());

        let mut tenant = Tenant::create("Acme Store", "acme", "billing@acme.com").unwrap();
        tenant
            .update_settings(TenantSettings::create().with_policy(policy))
            .unwrap();
        tenant.activate().unwrap();
        let tenant_id = tenant.id().clone();
        tenants.save(tenant).await.unwrap();

        let log = InMemoryEventLog::new();
        let bus = EventBus::new().with_handler(Arc::new(log.clone()));
        let service = PaymentService::new(payments.clone(), transactions, tenants, bus, config);

        Fixture {
            service,
            payments,
            log,
            tenant_id,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(TenantPolicy::default(), AppConfig::default()).await
    }

    fn input(fx: &Fixture, amount: f64, provider: Provider) -> NewPayment {
        NewPayment {
            tenant_id: fx.tenant_id.to_string(),
            user_id: Some("usr_owner".to_string()),
            amount,
            currency: "BRL".to_string(),
            provider,
            provider_payment_id: format!("pi_{}", uuid::Uuid::new_v4().simple()),
            description: "Order #1001".to_string(),
            metadata: Default::default(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_happy_path_publishes_every_event() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();
        assert_eq!(payment.version(), 1);

        fx.service.authorize(payment.id()).await.unwrap();
        let captured = fx.service.capture(payment.id()).await.unwrap();
        assert!(captured.paid_at().is_some());
        assert_eq!(captured.version(), 3);

        assert_eq!(
            fx.log.names().await,
            vec!["payment.created", "payment.authorized", "payment.captured"]
        );
    }

    #[tokio::test]
    async fn test_create_sets_provider_expiry() {
        let fx = fixture().await;
        let before = Utc::now();
        let payment = fx.service.create_payment(input(&fx, 10.0, Provider::Pagarme)).await.unwrap();

        let expires = payment.expires_at().unwrap();
        assert!(expires >= before + Duration::days(3));
        assert!(expires <= Utc::now() + Duration::days(3));
    }

    #[tokio::test]
    async fn test_create_rejects_amount_over_configured_ceiling() {
        let config = AppConfig {
            default_max_payment_cents: 2_000,
            ..AppConfig::default()
        };
        let fx = fixture_with(TenantPolicy::default(), config).await;

        let err = fx
            .service
            .create_payment(input(&fx, 20.01, Provider::Stripe))
            .await
            .unwrap_err();
        assert!(err.is_business_rule_violation());
        assert!(fx.log.names().await.is_empty());

        // The tenant policy wins over the configured default.
        let fx = fixture_with(
            TenantPolicy {
                max_payment_amount: Some(Money::from_cents(5_000)),
                ..TenantPolicy::default()
            },
            AppConfig {
                default_max_payment_cents: 2_000,
                ..AppConfig::default()
            },
        )
        .await;
        assert!(fx.service.create_payment(input(&fx, 20.01, Provider::Stripe)).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_tenant() {
        let fx = fixture().await;
        let mut bad = input(&fx, 10.0, Provider::Stripe);
        bad.tenant_id = "ten_missing".to_string();
        assert!(fx.service.create_payment(bad).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_refund_records_refund_transaction() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();
        fx.service.authorize(payment.id()).await.unwrap();
        fx.service.capture(payment.id()).await.unwrap();

        let outcome = fx
            .service
            .refund(payment.id(), Some(Money::from_cents(2_000)), Some("damaged"), "re_1")
            .await
            .unwrap();
        assert_eq!(outcome.payment.status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(outcome.transaction.transaction_type(), TransactionType::Refund);
        assert_eq!(outcome.transaction.amount().cents(), 2_000);

        let ledger = fx.service.list_transactions(payment.id()).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].provider_transaction_id(), "re_1");
    }

    struct UnavailableLedger;

    #[async_trait::async_trait]
    impl TransactionRepository for UnavailableLedger {
        async fn save(&self, _transaction: Transaction) -> AppResult<Transaction> {
            Err(AppError::Repository("ledger unavailable".to_string()))
        }

        async fn find_by_id(&self, _id: &payflow_core::TransactionId) -> AppResult<Option<Transaction>> {
            Ok(None)
        }

        async fn find_by_payment_id(&self, _payment_id: &PaymentId) -> AppResult<Vec<Transaction>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_refund_event_withheld_when_ledger_write_fails() {
        let fx = fixture_with_ledger(
            TenantPolicy::default(),
            AppConfig::default(),
            Arc::new(UnavailableLedger),
        )
        .await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();
        fx.service.authorize(payment.id()).await.unwrap();
        fx.service.capture(payment.id()).await.unwrap();

        let err = fx.service.refund(payment.id(), None, None, "re_1").await.unwrap_err();
        assert!(matches!(err, AppError::Repository(_)));
        assert_eq!(
            fx.log.names().await,
            vec!["payment.created", "payment.authorized", "payment.captured"]
        );
    }

    #[tokio::test]
    async fn test_refund_over_original_is_rejected() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();
        fx.service.authorize(payment.id()).await.unwrap();
        fx.service.capture(payment.id()).await.unwrap();

        let err = fx
            .service
            .refund(payment.id(), Some(Money::from_cents(5_001)), None, "re_1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("refund exceeds original amount"));
        assert!(fx.service.list_transactions(payment.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_success_captures_pending_payment() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();

        let updated = fx.service.apply_provider_status(payment.id(), "succeeded").await.unwrap();
        assert_eq!(updated.status(), PaymentStatus::Captured);
        assert_eq!(
            fx.log.names().await,
            vec!["payment.created", "payment.authorized", "payment.captured"]
        );
    }

    #[tokio::test]
    async fn test_auto_capture_after_provider_authorization() {
        let fx = fixture_with(
            TenantPolicy {
                auto_capture_enabled: Some(true),
                ..TenantPolicy::default()
            },
            AppConfig::default(),
        )
        .await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();

        let updated = fx
            .service
            .apply_provider_status(payment.id(), "requires_action")
            .await
            .unwrap();
        assert_eq!(updated.status(), PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn test_irrelevant_provider_status_saves_nothing() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();

        let same = fx.service.apply_provider_status(payment.id(), "processing").await.unwrap();
        assert_eq!(same.status(), PaymentStatus::Pending);
        let stored = fx.payments.find_by_id(payment.id()).await.unwrap().unwrap();
        assert_eq!(stored.version(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_records_reason() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 50.0, Provider::Stripe)).await.unwrap();

        let failed = fx.service.apply_provider_status(payment.id(), "failed").await.unwrap();
        assert_eq!(failed.status(), PaymentStatus::Failed);
        assert_eq!(failed.metadata()["failureReason"], "provider reported failed");
    }

    #[tokio::test]
    async fn test_expire_if_due() {
        let fx = fixture().await;
        let mut expiring = input(&fx, 10.0, Provider::Stripe);
        expiring.expires_at = Some(Utc::now() + Duration::milliseconds(50));
        let payment = fx.service.create_payment(expiring).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert!(fx.service.expire_if_due(payment.id()).await.unwrap());
        let stored = fx.service.get_payment(payment.id()).await.unwrap();
        assert_eq!(stored.status(), PaymentStatus::Cancelled);
        assert!(fx.log.names().await.ends_with(&[
            "payment.cancelled".to_string(),
            "payment.expired".to_string()
        ]));

        assert!(!fx.service.expire_if_due(payment.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_if_due_leaves_fresh_payment_alone() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 10.0, Provider::Stripe)).await.unwrap();
        assert!(!fx.service.expire_if_due(payment.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_write_propagates() {
        let fx = fixture().await;
        let payment = fx.service.create_payment(input(&fx, 10.0, Provider::Stripe)).await.unwrap();

        let mut stale = payment.clone();
        fx.service.authorize(payment.id()).await.unwrap();

        stale.cancel(None).unwrap();
        stale.take_events();
        let err = fx.payments.save(stale).await.unwrap_err();
        assert!(err.is_stale_write());
    }

    #[tokio::test]
    async fn test_quote_fee() {
        let fx = fixture().await;
        let quote = fx
            .service
            .quote_fee(Money::from_cents(10_000), Provider::Pagarme, ChargeMethod::Other)
            .unwrap();
        assert_eq!(quote.fee.cents(), 199);
        assert_eq!(quote.net.cents(), 9_801);

        let err = fx
            .service
            .quote_fee(Money::from_cents(10), Provider::Stripe, ChargeMethod::Card)
            .unwrap_err();
        assert!(matches!(err, AppError::Core(CoreError::Underflow { .. })));
    }
}
