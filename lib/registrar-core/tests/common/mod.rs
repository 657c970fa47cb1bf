#![allow(dead_code)]

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use registrar_core::runtime::{PublishedPort, RawHostBinding, RawPortMapping, SWARM_SERVICE_ID_LABEL};
use registrar_core::{
    BindingMode, Context, ContainerRecord, EventStream, InMemoryRegistry, PolicyConfig,
    ListedWorkload, RegistrarConfig, RegistryError, RuntimeError, RuntimeEvent, ServiceRecord,
    ServiceRecordSummary, ServiceRegistry, ServiceSpecRecord, SweepConfig, WorkloadRuntime,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Scripted runtime backed by in-memory maps
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<BTreeMap<String, ContainerRecord>>,
    services: Mutex<HashMap<String, ServiceSpecRecord>>,
    subscriptions: Mutex<Vec<UnboundedReceiver<Result<RuntimeEvent, RuntimeError>>>>,
    fail_listing: AtomicBool,
    broken: Mutex<HashSet<String>>,
    gate_listing: AtomicBool,
    pub listing_entered: Notify,
    pub listing_release: Notify,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_container(&self, record: ContainerRecord) {
        self.containers.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn remove_container(&self, id: &str) {
        self.containers.lock().unwrap().remove(id);
    }

    pub fn add_service(&self, service: ServiceSpecRecord) {
        self.services.lock().unwrap().insert(service.id.clone(), service);
    }

    /// Queue a subscription; each `stream_events` call takes the next one
    pub fn subscription(&self) -> UnboundedSender<Result<RuntimeEvent, RuntimeError>> {
        let (tx, rx) = unbounded();
        self.subscriptions.lock().unwrap().push(rx);
        tx
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make inspection of `id` fail with a daemon error
    pub fn break_container(&self, id: &str) {
        self.broken.lock().unwrap().insert(id.to_string());
    }

    /// Make listing wait for `listing_release` after taking its snapshot and
    /// signalling `listing_entered`
    pub fn gate_listing(&self, gate: bool) {
        self.gate_listing.store(gate, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl WorkloadRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn list_running_workloads(&self) -> Result<Vec<ListedWorkload>, RuntimeError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unreachable("daemon down".to_string()));
        }
        let ids: Vec<String> = self.containers.lock().unwrap().keys().cloned().collect();
        if self.gate_listing.load(Ordering::SeqCst) {
            self.listing_entered.notify_one();
            self.listing_release.notified().await;
        }
        let mut listed = Vec::with_capacity(ids.len());
        for id in ids {
            let inspected = self.inspect_container(&id).await;
            listed.push((id, inspected));
        }
        Ok(listed)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord, RuntimeError> {
        if self.broken.lock().unwrap().contains(id) {
            return Err(RuntimeError::Api(format!("inspect container {} returned 500", id)));
        }
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn inspect_service(&self, id: &str) -> Result<ServiceSpecRecord, RuntimeError> {
        self.services
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    fn stream_events(&self) -> EventStream {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions.is_empty() {
            // Never yields; mirrors an idle daemon
            return futures::stream::pending().boxed();
        }
        subscriptions.remove(0).boxed()
    }
}

/// Registry wrapper that can be told to reject every write
pub struct FlakyRegistry {
    pub inner: InMemoryRegistry,
    reject: AtomicBool,
}

impl FlakyRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryRegistry::new(),
            reject: AtomicBool::new(false),
        })
    }

    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    fn rejection(&self) -> Result<(), RegistryError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(RegistryError::Rejected {
                status: 500,
                body: "rpc error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ServiceRegistry for FlakyRegistry {
    async fn register(&self, record: &ServiceRecord) -> Result<(), RegistryError> {
        self.rejection()?;
        self.inner.register(record).await
    }

    async fn deregister(&self, service_id: &str) -> Result<(), RegistryError> {
        self.rejection()?;
        self.inner.deregister(service_id).await
    }

    async fn list_registered(&self) -> Result<BTreeMap<String, ServiceRecordSummary>, RegistryError> {
        self.inner.list_registered().await
    }

    async fn health_check_connectivity(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

pub fn policy_config(mode: BindingMode) -> PolicyConfig {
    let mut policy = PolicyConfig::new("10.0.0.5".parse().unwrap());
    policy.opt_in_label = "register".to_string();
    policy.binding_mode = mode;
    policy
}

pub fn context(
    runtime: Arc<FakeRuntime>,
    registry: Arc<dyn ServiceRegistry>,
    mode: BindingMode,
) -> Arc<Context> {
    context_with_sweep(runtime, registry, mode, Duration::from_secs(3600))
}

pub fn context_with_sweep(
    runtime: Arc<FakeRuntime>,
    registry: Arc<dyn ServiceRegistry>,
    mode: BindingMode,
    interval: Duration,
) -> Arc<Context> {
    let sweep = SweepConfig {
        interval,
        ..SweepConfig::default()
    };
    let config = RegistrarConfig::new(policy_config(mode), sweep).unwrap();
    Context::new(config, runtime, registry)
}

/// Container with `(port spec, host ip, host port)` bindings
pub fn container(id: &str, labels: &[(&str, &str)], ports: &[(&str, &str, &str)]) -> ContainerRecord {
    ContainerRecord {
        id: id.to_string(),
        name: format!("/{}-name", id),
        image: "nginx:1.25".to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ports: ports
            .iter()
            .map(|(spec, ip, port)| RawPortMapping {
                container_port: spec.to_string(),
                bindings: vec![RawHostBinding {
                    host_ip: Some(ip.to_string()),
                    host_port: Some(port.to_string()),
                }],
            })
            .collect(),
    }
}

pub fn opted_in(id: &str) -> ContainerRecord {
    container(id, &[("register", "yes")], &[("80/tcp", "0.0.0.0", "8080")])
}

/// Task container of swarm service `service_id`
pub fn task(id: &str, service_id: &str) -> ContainerRecord {
    let mut record = container(id, &[], &[]);
    record
        .labels
        .insert(SWARM_SERVICE_ID_LABEL.to_string(), service_id.to_string());
    record
}

pub fn service(id: &str, name: &str, published: &[i64]) -> ServiceSpecRecord {
    ServiceSpecRecord {
        id: id.to_string(),
        name: name.to_string(),
        image: "api:2".to_string(),
        labels: HashMap::from([("register".to_string(), "yes".to_string())]),
        published_ports: published
            .iter()
            .map(|port| PublishedPort {
                protocol: Some("tcp".to_string()),
                target_port: Some(80),
                published_port: Some(*port),
            })
            .collect(),
    }
}

pub fn foreign(id: &str, name: &str, kind: Option<&str>) -> ServiceRecordSummary {
    ServiceRecordSummary {
        service_id: id.to_string(),
        service_name: name.to_string(),
        address: "10.0.0.9".to_string(),
        port: 21000,
        kind: kind.map(str::to_string),
    }
}
