use thiserror::Error;

/// Failures talking to the container runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Runtime unreachable: {0}")]
    Unreachable(String),

    #[error("Runtime object not found: {0}")]
    NotFound(String),

    #[error("Runtime call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Runtime API error: {0}")]
    Api(String),

    #[error("Malformed runtime payload: {0}")]
    Malformed(String),
}

/// Failures turning a raw record into a workload descriptor.
/// None of these are fatal; the workload is skipped for the pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Workload {workload_id}: owning service {service_id} no longer exists")]
    MissingDependency {
        workload_id: String,
        service_id: String,
    },

    #[error("Workload {workload_id}: {reason}")]
    Malformed { workload_id: String, reason: String },

    #[error("Workload {workload_id}: {source}")]
    Runtime {
        workload_id: String,
        #[source]
        source: RuntimeError,
    },
}

impl ExtractionError {
    pub fn workload_id(&self) -> &str {
        match self {
            ExtractionError::MissingDependency { workload_id, .. }
            | ExtractionError::Malformed { workload_id, .. }
            | ExtractionError::Runtime { workload_id, .. } => workload_id,
        }
    }
}

/// Descriptors the policy engine cannot turn into a record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Workload {0} has no usable service name")]
    MissingServiceName(String),

    #[error("Workload {workload_id} publishes invalid port {port}")]
    InvalidPort { workload_id: String, port: u16 },
}

/// Failures talking to the service registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Registry rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Service not registered: {0}")]
    NotFound(String),

    #[error("Registry unreachable: {0}")]
    Unreachable(String),

    #[error("Registry call timed out")]
    Timeout,

    #[error("Malformed registry response: {0}")]
    Decode(String),
}

/// Invalid operator configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
