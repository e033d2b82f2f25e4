//! # payflow-app: Application Layer for Payflow
//!
//! Drives the pure domain in `payflow-core` through async repository ports,
//! then hands the recorded domain events to an explicit event bus.
//!
//! ## Modules
//!
//! - [`config`] - environment-driven `AppConfig`
//! - [`telemetry`] - tracing subscriber setup
//! - [`error`] - `AppError` (wraps `CoreError`)
//! - [`repository`] - repository ports and in-memory implementations
//! - [`events`] - `EventBus`, `EventHandler`, `InMemoryEventLog`
//! - [`webhook`] - webhook fan-out with exponential backoff
//! - [`services`] - `PaymentService`, `TenantService`
//!
//! ## Wiring
//!
//! ```rust
//! use std::sync::Arc;
//! use payflow_app::config::AppConfig;
//! use payflow_app::events::{EventBus, InMemoryEventLog};
//! use payflow_app::repository::{
//!     InMemoryPaymentRepository, InMemoryTenantRepository, InMemoryTransactionRepository,
//! };
//! use payflow_app::services::PaymentService;
//!
//! let config = AppConfig::default();
//! let bus = EventBus::new().with_handler(Arc::new(InMemoryEventLog::new()));
//! let service = PaymentService::new(
//!     Arc::new(InMemoryPaymentRepository::new()),
//!     Arc::new(InMemoryTransactionRepository::new()),
//!     Arc::new(InMemoryTenantRepository::new()),
//!     bus,
//!     config,
//! );
//! # let _ = service;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod events;
pub mod repository;
pub mod services;
pub mod telemetry;
pub mod webhook;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{AppError, AppResult};
pub use events::{DispatchReport, EventBus, EventHandler};
pub use services::{PaymentService, TenantService};
