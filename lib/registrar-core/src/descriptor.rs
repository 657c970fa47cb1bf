//! Workload descriptor extraction
//!
//! A [`WorkloadDescriptor`] is a fresh, runtime-agnostic snapshot built on every
//! event or sweep pass. Standalone containers take their ports and labels from
//! the container's own port table; orchestrated task containers take them from
//! the owning service's spec, because the task record does not carry the final
//! published ports.

use crate::error::{ExtractionError, RuntimeError};
use crate::runtime::{
    ContainerRecord, PublishedPort, RawPortMapping, ServiceSpecRecord, WorkloadRuntime,
    SWARM_SERVICE_ID_LABEL, SWARM_SERVICE_NAME_LABEL,
};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// Transport protocol of a binding. TCP orders before UDP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Parse a runtime protocol name; unknown protocols (sctp) yield None
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "" | "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published port of a workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortBinding {
    pub protocol: Protocol,
    pub container_port: u16,
    /// None for cluster-routed (orchestrated) ports
    pub host_ip: Option<IpAddr>,
    pub host_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    StandaloneContainer,
    OrchestratedService {
        /// Orchestrator ID of the owning service
        service_id: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadDescriptor {
    pub workload_id: String,
    pub kind: WorkloadKind,
    pub display_name: String,
    pub image_reference: String,
    pub labels: HashMap<String, String>,
    pub port_bindings: Vec<PortBinding>,
}

impl WorkloadDescriptor {
    pub fn is_orchestrated(&self) -> bool {
        matches!(self.kind, WorkloadKind::OrchestratedService { .. })
    }
}

/// Inspect a container by ID and describe it
pub async fn extract_by_id(
    runtime: &dyn WorkloadRuntime,
    workload_id: &str,
    resolve_services: bool,
) -> Result<WorkloadDescriptor, ExtractionError> {
    let record = runtime
        .inspect_container(workload_id)
        .await
        .map_err(|source| ExtractionError::Runtime {
            workload_id: workload_id.to_string(),
            source,
        })?;
    extract(runtime, record, resolve_services).await
}

/// Describe an inspected container, fetching the owning service spec for
/// orchestrated tasks when `resolve_services` is set.
pub async fn extract(
    runtime: &dyn WorkloadRuntime,
    record: ContainerRecord,
    resolve_services: bool,
) -> Result<WorkloadDescriptor, ExtractionError> {
    let service_id = record
        .labels
        .get(SWARM_SERVICE_ID_LABEL)
        .filter(|id| !id.is_empty())
        .cloned();

    let Some(service_id) = service_id else {
        return describe_container(record);
    };

    if !resolve_services {
        let mut descriptor = describe_container(record)?;
        descriptor.kind = WorkloadKind::OrchestratedService { service_id };
        return Ok(descriptor);
    }

    match runtime.inspect_service(&service_id).await {
        Ok(service) => describe_task(record, service),
        Err(RuntimeError::NotFound(_)) => Err(ExtractionError::MissingDependency {
            workload_id: record.id,
            service_id,
        }),
        Err(source) => Err(ExtractionError::Runtime {
            workload_id: record.id,
            source,
        }),
    }
}

/// Describe a standalone container from its own port table
pub fn describe_container(record: ContainerRecord) -> Result<WorkloadDescriptor, ExtractionError> {
    let workload_id = require_id(&record)?;
    let mut port_bindings = Vec::new();

    for mapping in &record.ports {
        let Some((container_port, protocol)) = parse_port_spec(&workload_id, mapping)? else {
            continue;
        };
        for binding in &mapping.bindings {
            let host_port = match binding.host_port.as_deref().map(str::trim) {
                None | Some("") => continue,
                Some(port) => parse_port(&workload_id, "host port", port)?,
            };
            let host_ip = match binding.host_ip.as_deref().map(str::trim) {
                None | Some("") => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                Some(ip) => ip.parse().map_err(|_| ExtractionError::Malformed {
                    workload_id: workload_id.clone(),
                    reason: format!("invalid host IP {:?}", ip),
                })?,
            };
            port_bindings.push(PortBinding {
                protocol,
                container_port,
                host_ip: Some(host_ip),
                host_port,
            });
        }
    }

    // The runtime reports the port table as an unordered map
    port_bindings.sort_by_key(|b| (b.container_port, b.protocol, b.host_port, b.host_ip));

    Ok(WorkloadDescriptor {
        workload_id,
        kind: WorkloadKind::StandaloneContainer,
        display_name: record.name.trim_start_matches('/').to_string(),
        image_reference: record.image,
        labels: record.labels,
        port_bindings,
    })
}

/// Describe an orchestrated task container using its owning service's spec
pub fn describe_task(
    record: ContainerRecord,
    service: ServiceSpecRecord,
) -> Result<WorkloadDescriptor, ExtractionError> {
    let workload_id = require_id(&record)?;

    let display_name = if service.name.is_empty() {
        record
            .labels
            .get(SWARM_SERVICE_NAME_LABEL)
            .cloned()
            .unwrap_or_default()
    } else {
        service.name
    };

    let image_reference = if service.image.is_empty() {
        record.image
    } else {
        service.image
    };

    let mut port_bindings = Vec::new();
    for port in &service.published_ports {
        if let Some(binding) = published_binding(&workload_id, port)? {
            port_bindings.push(binding);
        }
    }

    Ok(WorkloadDescriptor {
        workload_id,
        kind: WorkloadKind::OrchestratedService {
            service_id: service.id,
        },
        display_name,
        image_reference,
        labels: service.labels,
        port_bindings,
    })
}

fn require_id(record: &ContainerRecord) -> Result<String, ExtractionError> {
    if record.id.is_empty() {
        return Err(ExtractionError::Malformed {
            workload_id: record.name.clone(),
            reason: "record has no ID".to_string(),
        });
    }
    Ok(record.id.clone())
}

fn parse_port_spec(
    workload_id: &str,
    mapping: &RawPortMapping,
) -> Result<Option<(u16, Protocol)>, ExtractionError> {
    let (port, proto) = mapping
        .container_port
        .split_once('/')
        .unwrap_or((mapping.container_port.as_str(), "tcp"));
    let Some(protocol) = Protocol::parse(proto) else {
        debug!(workload = %workload_id, "Ignoring {} binding", mapping.container_port);
        return Ok(None);
    };
    Ok(Some((parse_port(workload_id, "container port", port)?, protocol)))
}

fn published_binding(
    workload_id: &str,
    port: &PublishedPort,
) -> Result<Option<PortBinding>, ExtractionError> {
    let Some(protocol) = Protocol::parse(port.protocol.as_deref().unwrap_or("tcp")) else {
        debug!(workload = %workload_id, "Ignoring published port with protocol {:?}", port.protocol);
        return Ok(None);
    };
    let Some(published) = port.published_port else {
        return Ok(None);
    };
    let host_port = port_from_i64(workload_id, "published port", published)?;
    let container_port = match port.target_port {
        Some(target) => port_from_i64(workload_id, "target port", target)?,
        None => host_port,
    };
    Ok(Some(PortBinding {
        protocol,
        container_port,
        host_ip: None,
        host_port,
    }))
}

fn parse_port(workload_id: &str, what: &str, value: &str) -> Result<u16, ExtractionError> {
    value.trim().parse().map_err(|_| ExtractionError::Malformed {
        workload_id: workload_id.to_string(),
        reason: format!("invalid {} {:?}", what, value),
    })
}

fn port_from_i64(workload_id: &str, what: &str, value: i64) -> Result<u16, ExtractionError> {
    u16::try_from(value).map_err(|_| ExtractionError::Malformed {
        workload_id: workload_id.to_string(),
        reason: format!("{} {} out of range", what, value),
    })
}
