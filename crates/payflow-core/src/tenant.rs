//! # Tenant Model
//!
//! Per-tenant policy and the minimal tenant lifecycle.
//!
//! ## Policy Parsing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stored policy map (strings)            TenantPolicy (typed)            │
//! │  ─────────────────────────────          ─────────────────────────────   │
//! │  "maxPaymentAmount"     "250000"  ──►   max_payment_amount: Some(Money) │
//! │  "autoCaptureEnabled"   "true"    ──►   auto_capture_enabled: Some(true)│
//! │  "paymentExpirationDays" "2"      ──►   payment_expiration_days: Some(2)│
//! │  "webhookRetryAttempts" (absent)  ──►   webhook_retry_attempts: None    │
//! │                                                                         │
//! │  Parsed ONCE at the boundary (from_map); rules read typed fields.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Currency, Money};
use crate::types::{Provider, TenantId, UserId};
use crate::validation::{validate_email, validate_slug, validate_tenant_name, validate_webhook_url};

/// Payment ceiling applied when the tenant sets none (R$ 1.000,00).
pub const DEFAULT_MAX_PAYMENT_AMOUNT: Money = Money::from_cents(100_000);

/// Webhook delivery attempts when the tenant sets none.
pub const DEFAULT_WEBHOOK_RETRY_ATTEMPTS: u32 = 3;

const ENTITY: &str = "Tenant";

// =============================================================================
// Tenant Policy
// =============================================================================

/// Policy map keys as stored by the tenant repository.
pub mod policy_keys {
    pub const MAX_PAYMENT_AMOUNT: &str = "maxPaymentAmount";
    pub const AUTO_CAPTURE_ENABLED: &str = "autoCaptureEnabled";
    pub const PAYMENT_EXPIRATION_DAYS: &str = "paymentExpirationDays";
    pub const WEBHOOK_RETRY_ATTEMPTS: &str = "webhookRetryAttempts";
}

/// Typed tenant overrides. `None` means "use the default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TenantPolicy {
    pub max_payment_amount: Option<Money>,
    pub auto_capture_enabled: Option<bool>,
    pub payment_expiration_days: Option<u32>,
    pub webhook_retry_attempts: Option<u32>,
}

impl TenantPolicy {
    /// Parses the stored string map.
    ///
    /// ## Rules
    /// - Boolean keys are true only for the exact string `"true"`
    /// - Numeric keys must parse as non-negative integers
    /// - Unknown keys are ignored
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ValidationError> {
        use policy_keys::*;

        let number = |key: &str| -> Result<Option<u64>, ValidationError> {
            map.get(key)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|_| ValidationError::invalid_format(key, format!("'{raw}' is not a non-negative integer")))
                })
                .transpose()
        };
        let small = |key: &str| -> Result<Option<u32>, ValidationError> {
            number(key)?
                .map(|n| u32::try_from(n).map_err(|_| ValidationError::invalid_format(key, "is too large")))
                .transpose()
        };

        Ok(TenantPolicy {
            max_payment_amount: number(MAX_PAYMENT_AMOUNT)?.map(Money::from_cents),
            auto_capture_enabled: map.get(AUTO_CAPTURE_ENABLED).map(|raw| raw == "true"),
            payment_expiration_days: small(PAYMENT_EXPIRATION_DAYS)?,
            webhook_retry_attempts: small(WEBHOOK_RETRY_ATTEMPTS)?,
        })
    }

    /// Inverse of [`TenantPolicy::from_map`]; only set fields are written.
    pub fn to_map(&self) -> HashMap<String, String> {
        use policy_keys::*;

        let mut map = HashMap::new();
        if let Some(max) = self.max_payment_amount {
            map.insert(MAX_PAYMENT_AMOUNT.to_string(), max.cents().to_string());
        }
        if let Some(enabled) = self.auto_capture_enabled {
            map.insert(AUTO_CAPTURE_ENABLED.to_string(), enabled.to_string());
        }
        if let Some(days) = self.payment_expiration_days {
            map.insert(PAYMENT_EXPIRATION_DAYS.to_string(), days.to_string());
        }
        if let Some(attempts) = self.webhook_retry_attempts {
            map.insert(WEBHOOK_RETRY_ATTEMPTS.to_string(), attempts.to_string());
        }
        map
    }

    pub fn max_payment_amount(&self) -> Money {
        self.max_payment_amount.unwrap_or(DEFAULT_MAX_PAYMENT_AMOUNT)
    }

    pub fn auto_capture_enabled(&self) -> bool {
        self.auto_capture_enabled.unwrap_or(false)
    }

    pub fn webhook_retry_attempts(&self) -> u32 {
        self.webhook_retry_attempts
            .unwrap_or(DEFAULT_WEBHOOK_RETRY_ATTEMPTS)
    }
}

// =============================================================================
// Tenant Settings
// =============================================================================

/// Flat projection of [`TenantSettings`] for storage and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenantSettingsRecord {
    pub timezone: String,
    pub currency: String,
    pub language: String,
    pub payment_methods: Vec<String>,
    pub webhook_url: Option<String>,
    pub policy: HashMap<String, String>,
}

/// Per-tenant configuration consumed by the payment rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSettings {
    timezone: String,
    currency: Currency,
    language: String,
    payment_methods: BTreeSet<Provider>,
    webhook_url: Option<String>,
    policy: TenantPolicy,
}

impl TenantSettings {
    /// Defaults for a newly onboarded tenant.
    pub fn create() -> Self {
        TenantSettings {
            timezone: "America/Sao_Paulo".to_string(),
            currency: Currency::Brl,
            language: "pt-BR".to_string(),
            payment_methods: Provider::ALL.into_iter().collect(),
            webhook_url: None,
            policy: TenantPolicy::default(),
        }
    }

    /// Builds validated settings.
    pub fn new(
        timezone: impl Into<String>,
        currency: Currency,
        language: impl Into<String>,
        payment_methods: impl IntoIterator<Item = Provider>,
        webhook_url: Option<String>,
        policy: TenantPolicy,
    ) -> Result<Self, ValidationError> {
        let timezone = timezone.into();
        let language = language.into();
        if timezone.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "timezone".to_string(),
            });
        }
        if language.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "language".to_string(),
            });
        }
        if let Some(url) = &webhook_url {
            validate_webhook_url(url)?;
        }

        Ok(TenantSettings {
            timezone,
            currency,
            language,
            payment_methods: payment_methods.into_iter().collect(),
            webhook_url,
            policy,
        })
    }

    /// Rehydrates stored settings; the policy map is parsed here.
    pub fn from_persistence(record: TenantSettingsRecord) -> Result<Self, ValidationError> {
        let methods = record
            .payment_methods
            .iter()
            .map(|code| code.parse::<Provider>())
            .collect::<Result<Vec<_>, _>>()?;

        TenantSettings::new(
            record.timezone,
            record.currency.parse()?,
            record.language,
            methods,
            record.webhook_url,
            TenantPolicy::from_map(&record.policy)?,
        )
    }

    pub fn to_persistence(&self) -> TenantSettingsRecord {
        TenantSettingsRecord {
            timezone: self.timezone.clone(),
            currency: self.currency.code().to_string(),
            language: self.language.clone(),
            payment_methods: self.payment_methods.iter().map(|p| p.code().to_string()).collect(),
            webhook_url: self.webhook_url.clone(),
            policy: self.policy.to_map(),
        }
    }

    pub fn with_policy(mut self, policy: TenantPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_payment_methods(mut self, methods: impl IntoIterator<Item = Provider>) -> Self {
        self.payment_methods = methods.into_iter().collect();
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Result<Self, ValidationError> {
        let url = url.into();
        validate_webhook_url(&url)?;
        self.webhook_url = Some(url);
        Ok(self)
    }

    pub fn accepts_provider(&self, provider: Provider) -> bool {
        self.payment_methods.contains(&provider)
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn payment_methods(&self) -> &BTreeSet<Provider> {
        &self.payment_methods
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    pub fn policy(&self) -> &TenantPolicy {
        &self.policy
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        TenantSettings::create()
    }
}

// =============================================================================
// Tenant
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    /// New tenants start here until an admin exists.
    #[default]
    Inactive,
}

impl TenantStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "ACTIVE",
            TenantStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(TenantStatus::Active),
            "INACTIVE" => Ok(TenantStatus::Inactive),
            _ => Err(ValidationError::NotAllowed {
                field: "tenant status".to_string(),
                allowed: vec!["ACTIVE".to_string(), "INACTIVE".to_string()],
            }),
        }
    }
}

/// Flat projection consumed by the tenant repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub status: String,
    pub settings: TenantSettingsRecord,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// An isolated customer organization.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    id: TenantId,
    name: String,
    slug: String,
    email: String,
    status: TenantStatus,
    settings: TenantSettings,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Tenant {
    /// Creates an INACTIVE tenant with default settings.
    ///
    /// Uniqueness of slug and email is a cross-aggregate rule checked by
    /// `TenantDomainService::can_create_tenant`.
    pub fn create(name: &str, slug: &str, email: &str) -> CoreResult<Self> {
        Self::create_with_id(TenantId::generate(), name, slug, email)
    }

    pub fn create_with_id(id: TenantId, name: &str, slug: &str, email: &str) -> CoreResult<Self> {
        validate_tenant_name(name)?;
        validate_slug(slug)?;
        validate_email(email)?;

        let now = Utc::now();
        Ok(Tenant {
            id,
            name: name.trim().to_string(),
            slug: slug.to_string(),
            email: email.to_string(),
            status: TenantStatus::Inactive,
            settings: TenantSettings::create(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 0,
        })
    }

    pub fn from_persistence(record: TenantRecord) -> CoreResult<Self> {
        validate_tenant_name(&record.name)?;
        validate_slug(&record.slug)?;
        validate_email(&record.email)?;

        Ok(Tenant {
            id: TenantId::new(record.id)?,
            name: record.name,
            slug: record.slug,
            email: record.email,
            status: record.status.parse()?,
            settings: TenantSettings::from_persistence(record.settings)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
            version: record.version,
        })
    }

    pub fn to_persistence(&self) -> TenantRecord {
        TenantRecord {
            id: self.id.to_string(),
            name: self.name.clone(),
            slug: self.slug.clone(),
            email: self.email.clone(),
            status: self.status.as_str().to_string(),
            settings: self.settings.to_persistence(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            version: self.version,
        }
    }

    /// INACTIVE → ACTIVE.
    pub fn activate(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        if self.status == TenantStatus::Active {
            return Err(CoreError::invalid_transition(ENTITY, self.id.as_str(), self.status, "activate"));
        }
        self.status = TenantStatus::Active;
        self.touch();
        Ok(())
    }

    /// ACTIVE → INACTIVE.
    pub fn deactivate(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        if self.status == TenantStatus::Inactive {
            return Err(CoreError::invalid_transition(ENTITY, self.id.as_str(), self.status, "deactivate"));
        }
        self.status = TenantStatus::Inactive;
        self.touch();
        Ok(())
    }

    pub fn update_settings(&mut self, settings: TenantSettings) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        self.settings = settings;
        self.touch();
        Ok(())
    }

    /// Soft-deletes and deactivates the tenant.
    pub fn soft_delete(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        let now = Utc::now();
        self.status = TenantStatus::Inactive;
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn restore(&mut self) {
        self.deleted_at = None;
        self.touch();
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active && !self.is_deleted()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn settings(&self) -> &TenantSettings {
        &self.settings
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

    fn ensure_not_deleted(&self) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::Deleted {
                entity: ENTITY,
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Tenant Users
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Manager,
    Operator,
}

/// The slice of a user the tenant guards need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantUser {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantUser {
    /// Active, not deleted.
    pub fn is_enabled(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
