//! # Event Bus
//!
//! Delivers drained `DomainEvent`s to an explicit list of handlers.
//!
//! ## Dispatch Rules
//! - Handlers are registered at construction; there is no global registry.
//! - Every event reaches every handler that `handles` it, in registration order.
//! - A failing handler is logged and counted; the remaining handlers still run.
//! - `publish` never fails; the caller inspects the returned `DispatchReport`.

use async_trait::async_trait;
use payflow_core::DomainEvent;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::AppResult;

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short label used in logs and failure reports.
    fn name(&self) -> &'static str;

    fn handles(&self, _event: &DomainEvent) -> bool {
        true
    }

    async fn handle(&self, event: &DomainEvent) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: &'static str,
    pub event_name: String,
    pub error: String,
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn publish(&self, events: &[DomainEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            report.merge(self.publish_one(event).await);
        }
        report
    }

    pub async fn publish_one(&self, event: &DomainEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for handler in self.handlers.iter().filter(|h| h.handles(event)) {
            match handler.handle(event).await {
                Ok(()) => {
                    debug!(handler = handler.name(), event = %event.event_name, "event handled");
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        handler = handler.name(),
                        event = %event.event_name,
                        event_id = %event.event_id,
                        error = %e,
                        "event handler failed"
                    );
                    report.failures.push(HandlerFailure {
                        handler: handler.name(),
                        event_name: event.event_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

/// Handler that keeps every event it sees; an audit trail and a test probe.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<DomainEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.read().await.clone()
    }

    pub async fn names(&self) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.event_name.clone())
            .collect()
    }
}

#[async_trait]
impl EventHandler for InMemoryEventLog {
    fn name(&self) -> &'static str {
        "event-log"
    }

    async fn handle(&self, event: &DomainEvent) -> AppResult<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
