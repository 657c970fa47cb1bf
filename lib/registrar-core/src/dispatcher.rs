//! Event dispatcher for container lifecycle events
//!
//! Events are handled strictly in delivery order, one at a time. A failed
//! event is logged and dropped; the next reconciliation sweep repairs whatever
//! it missed.

use crate::config::BindingMode;
use crate::context::Context;
use crate::descriptor::extract_by_id;
use crate::error::{ExtractionError, RuntimeError};
use crate::policy::{Decision, PolicyEngine, SkipReason};
use crate::registry::deregister_idempotent;
use crate::runtime::{EventStream, RuntimeEvent};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What an event asks the dispatcher to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Register(String),
    Deregister(String),
    Ignore,
}

/// Result of handling one event
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    Registered(Vec<String>),
    /// Service IDs actually removed; empty when nothing was registered
    Deregistered(Vec<String>),
    Skipped(SkipReason),
    Ignored,
    Failed(String),
}

/// Why a dispatch run returned
#[derive(Debug, PartialEq)]
pub enum StreamEnd {
    Shutdown,
    Closed,
    Failed(RuntimeError),
}

pub struct EventDispatcher {
    ctx: Arc<Context>,
}

impl EventDispatcher {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Map a raw event to an action. Only container start/destroy matter.
    pub fn classify(event: &RuntimeEvent) -> Action {
        if event.kind != "container" || event.actor_id.is_empty() {
            return Action::Ignore;
        }
        match event.action.as_str() {
            "start" => Action::Register(event.actor_id.clone()),
            "destroy" => Action::Deregister(event.actor_id.clone()),
            _ => Action::Ignore,
        }
    }

    /// Consume events until the stream ends or shutdown is signalled.
    /// An event being handled when shutdown arrives runs to completion.
    pub async fn run(&self, mut events: EventStream, shutdown: &mut watch::Receiver<bool>) -> StreamEnd {
        loop {
            if *shutdown.borrow() {
                return StreamEnd::Shutdown;
            }
            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => return StreamEnd::Shutdown,
                next = events.next() => next,
            };
            match next {
                None => return StreamEnd::Closed,
                Some(Err(e)) => return StreamEnd::Failed(e),
                Some(Ok(event)) => {
                    self.handle(&event).await;
                }
            }
        }
    }

    pub async fn handle(&self, event: &RuntimeEvent) -> DispatchOutcome {
        let action = Self::classify(event);
        if action == Action::Ignore {
            debug!(kind = %event.kind, action = %event.action, "Ignoring event");
            return DispatchOutcome::Ignored;
        }

        // Docker reports the container name among the actor attributes
        let name = event.attributes.get("name").map(String::as_str).unwrap_or_default();
        debug!(workload = %event.actor_id, name = %name, action = %event.action, "Handling event");
        match action {
            Action::Register(id) => self.on_start(&id).await,
            Action::Deregister(id) => self.on_destroy(&id).await,
            Action::Ignore => DispatchOutcome::Ignored,
        }
    }

    async fn on_start(&self, workload_id: &str) -> DispatchOutcome {
        let ctx = &self.ctx;
        let descriptor =
            match extract_by_id(ctx.runtime.as_ref(), workload_id, ctx.resolve_services()).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    if matches!(e, ExtractionError::MissingDependency { .. }) {
                        warn!(workload = %workload_id, outcome = "failed", kind = "extraction",
                            "{}; the next sweep or destroy event cleans up", e);
                    } else {
                        warn!(workload = %workload_id, outcome = "failed", kind = "extraction", "{}", e);
                    }
                    return DispatchOutcome::Failed(e.to_string());
                }
            };

        let records = match ctx.policy.evaluate(&descriptor) {
            Ok(Decision::Register(records)) => records,
            Ok(Decision::Skip(reason)) => {
                debug!(workload = %workload_id, name = %descriptor.display_name, outcome = "skipped",
                    "Not registering: {}", reason);
                return DispatchOutcome::Skipped(reason);
            }
            Err(e) => {
                warn!(workload = %workload_id, outcome = "failed", kind = "policy", "{}", e);
                return DispatchOutcome::Failed(e.to_string());
            }
        };

        let mut registered = Vec::with_capacity(records.len());
        let mut failures = Vec::new();
        for record in &records {
            match ctx.registry.register(record).await {
                Ok(()) => {
                    info!(workload = %workload_id, service_id = %record.service_id,
                        "Registered {} at {}:{}", record.service_name, record.address, record.port);
                    registered.push(record.service_id.clone());
                }
                Err(e) => {
                    warn!(workload = %workload_id, service_id = %record.service_id, outcome = "failed",
                        kind = "registration", payload = ?record, "{}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            DispatchOutcome::Registered(registered)
        } else {
            DispatchOutcome::Failed(failures.join("; "))
        }
    }

    async fn on_destroy(&self, workload_id: &str) -> DispatchOutcome {
        let registry = self.ctx.registry.as_ref();

        let candidates = match self.ctx.policy.binding_mode() {
            BindingMode::Canonical => vec![PolicyEngine::canonical_service_id(workload_id)],
            BindingMode::PerBinding => match registry.list_registered().await {
                Ok(registered) => registered
                    .into_keys()
                    .filter(|service_id| PolicyEngine::owns(workload_id, service_id))
                    .collect(),
                Err(e) => {
                    warn!(workload = %workload_id, outcome = "failed", kind = "deregistration", "{}", e);
                    return DispatchOutcome::Failed(e.to_string());
                }
            },
        };

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        for service_id in candidates {
            match deregister_idempotent(registry, &service_id).await {
                Ok(true) => {
                    info!(workload = %workload_id, service_id = %service_id, "Deregistered service");
                    removed.push(service_id);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(workload = %workload_id, service_id = %service_id, outcome = "failed",
                        kind = "deregistration", "{}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            DispatchOutcome::Deregistered(removed)
        } else {
            DispatchOutcome::Failed(failures.join("; "))
        }
    }
}
