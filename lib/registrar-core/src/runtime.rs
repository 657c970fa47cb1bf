//! Container runtime collaborator: raw records and the client trait

use crate::error::RuntimeError;
use futures::stream::BoxStream;
use std::collections::HashMap;

/// Label set by the orchestrator on task containers
pub const SWARM_SERVICE_ID_LABEL: &str = "com.docker.swarm.service.id";
/// Label carrying the owning service's name on task containers
pub const SWARM_SERVICE_NAME_LABEL: &str = "com.docker.swarm.service.name";

/// Inspect data of one container, as reported by the runtime
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContainerRecord {
    pub id: String,
    /// Container name, possibly with the runtime's leading '/'
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    /// Port table keyed by "<port>/<proto>", e.g. "80/tcp"
    pub ports: Vec<RawPortMapping>,
}

/// One entry of a container's port table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPortMapping {
    /// "<container port>/<protocol>"
    pub container_port: String,
    /// Host bindings; empty when the port is exposed but not published
    pub bindings: Vec<RawHostBinding>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawHostBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

/// Spec data of an orchestrated service
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceSpecRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub published_ports: Vec<PublishedPort>,
}

/// A port published through the orchestrator's routing mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishedPort {
    /// "tcp", "udp", ... as reported; None defaults to tcp
    pub protocol: Option<String>,
    pub target_port: Option<i64>,
    pub published_port: Option<i64>,
}

/// One message of the runtime's event stream
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuntimeEvent {
    /// Object type, e.g. "container", "network"
    pub kind: String,
    /// Action, e.g. "start", "destroy"
    pub action: String,
    /// ID of the object the event is about
    pub actor_id: String,
    pub attributes: HashMap<String, String>,
}

impl RuntimeEvent {
    pub fn container(action: &str, id: &str) -> Self {
        Self {
            kind: "container".to_string(),
            action: action.to_string(),
            actor_id: id.to_string(),
            attributes: HashMap::new(),
        }
    }
}

/// A listed container ID with its inspect data, or why inspection failed
pub type ListedWorkload = (String, Result<ContainerRecord, RuntimeError>);

/// Lazy, infinite, non-restartable event subscription
pub type EventStream = BoxStream<'static, Result<RuntimeEvent, RuntimeError>>;

/// Client for the container runtime. Every call carries a bounded timeout.
#[async_trait::async_trait]
pub trait WorkloadRuntime: Send + Sync {
    /// Connectivity probe used once at startup
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// Every running container with its own inspect result. Fails as a whole
    /// only when the listing itself fails; containers that vanish before
    /// inspection are left out.
    async fn list_running_workloads(&self) -> Result<Vec<ListedWorkload>, RuntimeError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord, RuntimeError>;

    async fn inspect_service(&self, id: &str) -> Result<ServiceSpecRecord, RuntimeError>;

    /// Open a fresh subscription to container events
    fn stream_events(&self) -> EventStream;
}
