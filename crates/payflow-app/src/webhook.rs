//! # Webhook Delivery
//!
//! Forwards payment events to the owning tenant's `webhook_url`.
//!
//! ## Delivery Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EventBus ──► WebhookHandler::handle(event)                             │
//! │                  │ tenantId from event data                             │
//! │                  ▼                                                      │
//! │               TenantRepository::find_by_id                              │
//! │                  │ no webhook_url / deleted tenant → skip               │
//! │                  ▼                                                      │
//! │               retry_on_transient ──► WebhookSender::send(url, json)     │
//! │                  attempt 1 ─fail─► sleep 500ms                          │
//! │                  attempt 2 ─fail─► sleep 1s                             │
//! │                  attempt 3 ─fail─► AppError::Webhook                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Attempts come from the tenant policy `webhookRetryAttempts`, falling
//! back to `AppConfig::webhook_default_retries`. 4xx answers other than
//! 408 and 429 are permanent and end the loop at once.

use async_trait::async_trait;
use payflow_core::{DomainEvent, TenantId};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::events::EventHandler;
use crate::repository::TenantRepository;

// =============================================================================
// Exponential Backoff
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Cap for any single delay
    pub max_delay: Duration,
    /// Growth factor between delays
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Every attempt failed with a transient error
    Failed(E),
    /// Gave up early on a non-retryable error
    PermanentFailure(E),
}

/// Whether an error is worth another attempt.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Runs `operation` until it succeeds, fails permanently or runs out of attempts.
pub async fn retry_on_transient<F, Fut, T, E>(config: RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    info!(attempt, "operation succeeded after retry");
                }
                return RetryResult::Success(result);
            }
            Err(error) => {
                if !error.is_transient() {
                    error!(error = %error, "permanent failure, not retrying");
                    return RetryResult::PermanentFailure(error);
                }

                if attempt >= config.max_attempts {
                    error!(attempt, error = %error, "operation failed after all retries");
                    return RetryResult::Failed(error);
                }

                let delay = config.delay_after(attempt);
                warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying after delay"
                );
                sleep(delay).await;
            }
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("endpoint answered HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl IsTransient for WebhookError {
    fn is_transient(&self) -> bool {
        match self {
            WebhookError::Status(code) => !(400..500).contains(code) || *code == 408 || *code == 429,
            WebhookError::Transport(_) => true,
        }
    }
}

/// Posts a JSON body to a URL. The HTTP client lives outside this crate.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, url: &str, body: &Value) -> Result<(), WebhookError>;
}

// =============================================================================
// Handler
// =============================================================================

pub struct WebhookHandler {
    tenants: Arc<dyn TenantRepository>,
    sender: Arc<dyn WebhookSender>,
    config: AppConfig,
}

impl WebhookHandler {
    pub fn new(tenants: Arc<dyn TenantRepository>, sender: Arc<dyn WebhookSender>, config: AppConfig) -> Self {
        WebhookHandler {
            tenants,
            sender,
            config,
        }
    }
}

#[async_trait]
impl EventHandler for WebhookHandler {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn handles(&self, event: &DomainEvent) -> bool {
        event.tenant_id().is_some()
    }

    async fn handle(&self, event: &DomainEvent) -> AppResult<()> {
        let Some(raw_tenant) = event.tenant_id() else {
            return Ok(());
        };
        let tenant_id = TenantId::new(raw_tenant)?;
        let tenant = self
            .tenants
            .find_by_id(&tenant_id)
            .await?
            .ok_or_else(|| AppError::not_found("tenant", &tenant_id))?;

        let Some(url) = tenant.settings().webhook_url().filter(|_| !tenant.is_deleted()) else {
            debug!(tenant_id = %tenant_id, event = %event.event_name, "no webhook configured");
            return Ok(());
        };
        let url = url.to_string();

        let body = serde_json::to_value(event).map_err(|e| AppError::Webhook(e.to_string()))?;
        let attempts = tenant
            .settings()
            .policy()
            .webhook_retry_attempts
            .unwrap_or(self.config.webhook_default_retries);

        let sender = &self.sender;
        let outcome = retry_on_transient(self.config.webhook_retry(attempts), |_attempt| {
            let sender = Arc::clone(sender);
            let url = url.clone();
            let body = body.clone();
            async move { sender.send(&url, &body).await }
        })
        .await;

        match outcome {
            RetryResult::Success(()) => {
                info!(tenant_id = %tenant_id, event = %event.event_name, "webhook delivered");
                Ok(())
            }
            RetryResult::Failed(e) => Err(AppError::Webhook(format!(
                "{} to {url} gave up after {attempts} attempt(s): {e}",
                event.event_name
            ))),
            RetryResult::PermanentFailure(e) => Err(AppError::Webhook(format!(
                "{} to {url} rejected: {e}",
                event.event_name
            ))),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
