//! Conversions from Docker Engine models to runtime records

use bollard::models::{
    ContainerInspectResponse, EndpointPortConfig, EndpointPortConfigProtocolEnum, EventMessage,
    Service,
};
use registrar_core::runtime::{PublishedPort, RawHostBinding, RawPortMapping};
use registrar_core::{ContainerRecord, RuntimeError, RuntimeEvent, ServiceSpecRecord};

pub fn container_record(inspect: ContainerInspectResponse) -> Result<ContainerRecord, RuntimeError> {
    let id = inspect
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RuntimeError::Malformed("container inspect without Id".to_string()))?;
    let config = inspect.config.unwrap_or_default();

    let ports = inspect
        .network_settings
        .and_then(|settings| settings.ports)
        .unwrap_or_default()
        .into_iter()
        .map(|(container_port, bindings)| RawPortMapping {
            container_port,
            bindings: bindings
                .unwrap_or_default()
                .into_iter()
                .map(|binding| RawHostBinding {
                    host_ip: binding.host_ip,
                    host_port: binding.host_port,
                })
                .collect(),
        })
        .collect();

    Ok(ContainerRecord {
        id,
        name: inspect.name.unwrap_or_default(),
        image: config.image.unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
        ports,
    })
}

pub fn service_record(service: Service) -> Result<ServiceSpecRecord, RuntimeError> {
    let id = service
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RuntimeError::Malformed("service inspect without ID".to_string()))?;
    let spec = service.spec.unwrap_or_default();

    let image = spec
        .task_template
        .as_ref()
        .and_then(|template| template.container_spec.as_ref())
        .and_then(|container| container.image.clone())
        .unwrap_or_default();

    // Actual endpoint ports carry assigned published ports; the spec only
    // has the requested ones
    let ports = service
        .endpoint
        .and_then(|endpoint| endpoint.ports)
        .or_else(|| spec.endpoint_spec.and_then(|endpoint| endpoint.ports))
        .unwrap_or_default();

    Ok(ServiceSpecRecord {
        id,
        name: spec.name.unwrap_or_default(),
        image,
        labels: spec.labels.unwrap_or_default(),
        published_ports: ports.into_iter().map(published_port).collect(),
    })
}

fn published_port(port: EndpointPortConfig) -> PublishedPort {
    let protocol = port.protocol.map(|protocol| match protocol {
        EndpointPortConfigProtocolEnum::UDP => "udp".to_string(),
        EndpointPortConfigProtocolEnum::SCTP => "sctp".to_string(),
        _ => "tcp".to_string(),
    });
    PublishedPort {
        protocol,
        target_port: port.target_port,
        published_port: port.published_port,
    }
}

pub fn runtime_event(message: EventMessage) -> RuntimeEvent {
    let kind = message.typ.map(|typ| typ.to_string()).unwrap_or_default();
    let actor = message.actor.unwrap_or_default();

    RuntimeEvent {
        kind,
        action: message.action.unwrap_or_default(),
        actor_id: actor.id.unwrap_or_default(),
        attributes: actor.attributes.unwrap_or_default(),
    }
}
