//! Service registry abstraction and an in-memory registry

use crate::error::RegistryError;
use crate::record::{ServiceRecord, ServiceRecordSummary};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Client for the service registry.
///
/// Calls are bounded by a short timeout and never retried here; the dispatcher
/// and the reconciler own retry policy. `register` overwrites an existing entry
/// with the same service ID.
#[async_trait::async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn register(&self, record: &ServiceRecord) -> Result<(), RegistryError>;

    /// Fails with [`RegistryError::NotFound`] when the entry is absent
    async fn deregister(&self, service_id: &str) -> Result<(), RegistryError>;

    async fn list_registered(&self) -> Result<BTreeMap<String, ServiceRecordSummary>, RegistryError>;

    /// Connectivity probe used once at startup
    async fn health_check_connectivity(&self) -> Result<(), RegistryError>;
}

/// Deregister, treating an absent entry as success.
/// Returns whether an entry was actually removed.
pub async fn deregister_idempotent(
    registry: &dyn ServiceRegistry,
    service_id: &str,
) -> Result<bool, RegistryError> {
    match registry.deregister(service_id).await {
        Ok(()) => Ok(true),
        Err(RegistryError::NotFound(_)) => {
            debug!(service_id = %service_id, "Service already absent from registry");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// InMemoryRegistry keeps registrations in process memory
pub struct InMemoryRegistry {
    services: Arc<RwLock<HashMap<String, ServiceRecord>>>,
    infrastructure: Arc<RwLock<HashMap<String, ServiceRecordSummary>>>,
    mutations: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            infrastructure: Arc::new(RwLock::new(HashMap::new())),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Seed an entry this engine did not create (proxies, foreign services)
    pub async fn insert_foreign(&self, summary: ServiceRecordSummary) {
        let mut infrastructure = self.infrastructure.write().await;
        infrastructure.insert(summary.service_id.clone(), summary);
    }

    /// Get a registered record
    pub async fn get(&self, service_id: &str) -> Option<ServiceRecord> {
        let services = self.services.read().await;
        services.get(service_id).cloned()
    }

    /// IDs of every entry, sorted
    pub async fn service_ids(&self) -> Vec<String> {
        let services = self.services.read().await;
        let infrastructure = self.infrastructure.read().await;
        let mut ids: Vec<String> = services.keys().chain(infrastructure.keys()).cloned().collect();
        ids.sort();
        ids
    }

    /// Get count of registered services
    pub async fn service_count(&self) -> usize {
        let services = self.services.read().await;
        let infrastructure = self.infrastructure.read().await;
        services.len() + infrastructure.len()
    }

    /// Number of calls that changed registry state
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ServiceRegistry for InMemoryRegistry {
    async fn register(&self, record: &ServiceRecord) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        let previous = services.insert(record.service_id.clone(), record.clone());
        if previous.as_ref() != Some(record) {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }

        debug!("Registered service: {}", record.service_id);
        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<(), RegistryError> {
        let mut removed = self.services.write().await.remove(service_id).is_some();
        if !removed {
            removed = self.infrastructure.write().await.remove(service_id).is_some();
        }

        if !removed {
            return Err(RegistryError::NotFound(service_id.to_string()));
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        debug!("Deregistered service: {}", service_id);
        Ok(())
    }

    async fn list_registered(&self) -> Result<BTreeMap<String, ServiceRecordSummary>, RegistryError> {
        let services = self.services.read().await;
        let infrastructure = self.infrastructure.read().await;
        Ok(services
            .values()
            .map(ServiceRecordSummary::from)
            .chain(infrastructure.values().cloned())
            .map(|summary| (summary.service_id.clone(), summary))
            .collect())
    }

    async fn health_check_connectivity(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}
