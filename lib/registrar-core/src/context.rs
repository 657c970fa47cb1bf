//! Shared handles constructed once at startup
use crate::config::{RegistrarConfig, SweepConfig};
use crate::policy::PolicyEngine;
use crate::registry::ServiceRegistry;
use crate::runtime::WorkloadRuntime;
use std::sync::Arc;

/// Context is passed by handle into every component; there is no ambient
/// global client or configuration.
pub struct Context {
    pub runtime: Arc<dyn WorkloadRuntime>,
    pub registry: Arc<dyn ServiceRegistry>,
    pub policy: PolicyEngine,
    pub sweep: SweepConfig,
}

impl Context {
    pub fn new(
        config: RegistrarConfig,
        runtime: Arc<dyn WorkloadRuntime>,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            registry,
            policy: PolicyEngine::new(config.policy),
            sweep: config.sweep,
        })
    }

    /// Whether orchestrated tasks should be resolved through their service spec
    pub fn resolve_services(&self) -> bool {
        self.policy.config().orchestration_enabled
    }
}
