//! # payflow-core: Payment Domain Model and Rule Engine
//!
//! The pure core of Payflow, a multi-tenant payment orchestration backend.
//! Aggregates enforce their own state machines; domain services answer the
//! rules that span aggregates. Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payflow Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 payflow-app (application layer)                 │   │
//! │  │  PaymentService ─ TenantService ─ EventBus ─ WebhookHandler     │   │
//! │  │  repositories (async traits), config, tracing                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plain function calls                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ payflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │  payment  │  │  tenant   │  │ services  │  │   │
//! │  │   │   Money   │  │  Payment  │  │  Tenant   │  │  payment  │  │   │
//! │  │   │ Currency  │  │Transaction│  │ Settings  │  │  tenant   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE RULES                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - integer-cent Money and Currency
//! - [`types`] - identifiers, Description, FeeRate, Provider
//! - [`payment`] - Payment aggregate and its status machine
//! - [`transaction`] - Transaction aggregate (settlement ledger entries)
//! - [`tenant`] - Tenant, TenantSettings, TenantPolicy, TenantUser
//! - [`events`] - DomainEvent envelope
//! - [`services`] - PaymentDomainService, TenantDomainService
//! - [`validation`] - field validators and slugify
//! - [`error`] - CoreError and ValidationError
//!
//! ## Design Principles
//!
//! 1. **Integer Money**: amounts are whole cents (`u64`); floats only at the edge
//! 2. **Guarded Transitions**: every mutator checks the state machine first
//!    and leaves the aggregate untouched on error
//! 3. **Events, Not Callbacks**: aggregates queue `DomainEvent`s; the caller
//!    drains and dispatches them after a successful save
//! 4. **Explicit Errors**: all failures are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use payflow_core::payment::{NewPayment, Payment, PaymentStatus};
//! use payflow_core::money::Money;
//! use payflow_core::types::Provider;
//!
//! let mut payment = Payment::create(NewPayment {
//!     tenant_id: "ten_acme".into(),
//!     user_id: None,
//!     amount: 50.00,
//!     currency: "BRL".into(),
//!     provider: Provider::Stripe,
//!     provider_payment_id: "pi_123".into(),
//!     description: "Order #1".into(),
//!     metadata: Default::default(),
//!     expires_at: None,
//! })
//! .unwrap();
//!
//! payment.authorize().unwrap();
//! payment.capture().unwrap();
//! payment.refund(Some(Money::from_cents(2000)), Some("damaged")).unwrap();
//!
//! assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod money;
pub mod payment;
pub mod services;
pub mod tenant;
pub mod transaction;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use events::{DomainEvent, PaymentEventKind};
pub use money::{Currency, Money};
pub use payment::{NewPayment, Payment, PaymentRecord, PaymentStatus};
pub use services::{PaymentDomainService, RefundEligibility, RuleDecision, TenantDomainService};
pub use tenant::{Tenant, TenantPolicy, TenantSettings, TenantStatus, TenantUser, UserRole};
pub use transaction::{NewTransaction, Transaction, TransactionStatus, TransactionType};
pub use types::*;
