//! Application services: load, ask the domain, save, publish.

pub mod payment;
pub mod tenant;

pub use payment::{FeeQuote, PaymentService, RefundOutcome};
pub use tenant::TenantService;
