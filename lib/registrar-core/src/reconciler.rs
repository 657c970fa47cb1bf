//! Full-state reconciliation sweeps
//!
//! A sweep re-reads both sources of truth, registers eligible live workloads
//! that are missing from the registry and deregisters orphan entries. Entries
//! present on both sides are left alone. Infrastructure entries (proxies,
//! gateways, reserved name patterns) are never touched.
//!
//! At most one sweep executes at a time.

use crate::context::Context;
use crate::descriptor::extract;
use crate::policy::{Decision, PolicyEngine, SkipReason};
use crate::record::ServiceRecord;
use crate::registry::deregister_idempotent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A per-item failure recorded during a sweep
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepFailure {
    /// Workload or service ID the failure concerns
    pub subject: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub registered: Vec<String>,
    pub deregistered: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
    pub errors: Vec<SweepFailure>,
}

impl SweepReport {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            registered: Vec::new(),
            deregistered: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, subject: &str, message: impl ToString) {
        self.errors.push(SweepFailure {
            subject: subject.to_string(),
            message: message.to_string(),
        });
    }

    fn skip(&mut self, workload_id: &str, reason: SkipReason) {
        self.skipped.push((workload_id.to_string(), reason));
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Reconciler {
    ctx: Arc<Context>,
    in_progress: Mutex<()>,
}

impl Reconciler {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            in_progress: Mutex::new(()),
        }
    }

    /// Run a sweep, waiting for one already in progress to finish first
    pub async fn reconcile(&self) -> SweepReport {
        let _guard = self.in_progress.lock().await;
        self.sweep().await
    }

    /// Run a sweep unless one is already in progress, in which case the
    /// request is dropped and None is returned
    pub async fn try_reconcile(&self) -> Option<SweepReport> {
        let _guard = self.in_progress.try_lock().ok()?;
        Some(self.sweep().await)
    }

    async fn sweep(&self) -> SweepReport {
        let ctx = &self.ctx;
        let mut report = SweepReport::begin();

        // Both sides are needed. Registry first, so an entry the dispatcher
        // adds in between is also seen live rather than as an orphan.
        let registered = match ctx.registry.list_registered().await {
            Ok(registered) => registered,
            Err(e) => {
                warn!(outcome = "failed", kind = "registry", "Sweep aborted, cannot list services: {}", e);
                report.fail("registry", e);
                return finish(report);
            }
        };
        let live = match ctx.runtime.list_running_workloads().await {
            Ok(live) => live,
            Err(e) => {
                warn!(outcome = "failed", kind = "runtime", "Sweep aborted, cannot list workloads: {}", e);
                report.fail("runtime", e);
                return finish(report);
            }
        };
        debug!("Sweep sees {} running workloads and {} registry entries", live.len(), registered.len());

        let mut desired: BTreeMap<String, ServiceRecord> = BTreeMap::new();
        // Workloads that exist but could not be evaluated this pass
        let mut unresolved: Vec<String> = Vec::new();

        for (workload_id, inspected) in live {
            let container = match inspected {
                Ok(container) => container,
                Err(e) => {
                    warn!(workload = %workload_id, outcome = "failed", kind = "inspect", "{}", e);
                    report.fail(&workload_id, e);
                    unresolved.push(workload_id);
                    continue;
                }
            };
            let descriptor = match extract(ctx.runtime.as_ref(), container, ctx.resolve_services()).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(workload = %workload_id, outcome = "failed", kind = "extraction", "{}", e);
                    report.fail(&workload_id, e);
                    unresolved.push(workload_id);
                    continue;
                }
            };
            match ctx.policy.evaluate(&descriptor) {
                Ok(Decision::Register(records)) => {
                    for record in records {
                        desired.insert(record.service_id.clone(), record);
                    }
                }
                Ok(Decision::Skip(reason)) => {
                    debug!(workload = %workload_id, outcome = "skipped", "Not registering: {}", reason);
                    report.skip(&workload_id, reason);
                }
                Err(e) => {
                    warn!(workload = %workload_id, outcome = "failed", kind = "policy", "{}", e);
                    report.fail(&workload_id, e);
                    unresolved.push(workload_id);
                }
            }
        }

        for (service_id, record) in &desired {
            if registered.contains_key(service_id) {
                continue;
            }
            match ctx.registry.register(record).await {
                Ok(()) => {
                    info!(service_id = %service_id, "Registered {} at {}:{}", record.service_name, record.address, record.port);
                    report.registered.push(service_id.clone());
                }
                Err(e) => {
                    warn!(service_id = %service_id, outcome = "failed", kind = "registration", payload = ?record, "{}", e);
                    report.fail(service_id, e);
                }
            }
        }

        for (service_id, summary) in &registered {
            if summary.is_infrastructure()
                || ctx.sweep.is_reserved(service_id, &summary.service_name)
                || desired.contains_key(service_id)
                || unresolved.iter().any(|w| PolicyEngine::owns(w, service_id))
            {
                continue;
            }
            match deregister_idempotent(ctx.registry.as_ref(), service_id).await {
                Ok(true) => {
                    info!(service_id = %service_id, "Deregistered orphan {} at {}:{}",
                        summary.service_name, summary.address, summary.port);
                    report.deregistered.push(service_id.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(service_id = %service_id, outcome = "failed", kind = "deregistration", "{}", e);
                    report.fail(service_id, e);
                }
            }
        }

        finish(report)
    }
}

fn finish(mut report: SweepReport) -> SweepReport {
    report.finished_at = Utc::now();
    info!(
        registered = report.registered.len(),
        deregistered = report.deregistered.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "Reconciliation sweep finished"
    );
    report
}
