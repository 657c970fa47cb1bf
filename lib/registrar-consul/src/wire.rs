//! Conversions between registration records and agent payloads

use registrar_api::{AgentService, AgentServiceCheck, AgentServiceConnect, AgentServiceRegistration};
use registrar_core::{Protocol, ServiceRecord, ServiceRecordSummary};
use std::time::Duration;

/// Build the registration body for a record
pub fn registration(record: &ServiceRecord) -> AgentServiceRegistration {
    let endpoint = record.check.endpoint.clone();
    let (tcp, udp) = match record.check.protocol {
        Protocol::Tcp => (Some(endpoint), None),
        Protocol::Udp => (None, Some(endpoint)),
    };

    AgentServiceRegistration {
        id: record.service_id.clone(),
        name: record.service_name.clone(),
        address: record.address.to_string(),
        port: record.port,
        tags: record.tags.clone(),
        meta: record.meta.clone(),
        check: Some(AgentServiceCheck {
            tcp,
            udp,
            interval: go_duration(record.check.interval),
            timeout: go_duration(record.check.timeout),
            deregister_critical_service_after: go_duration(record.check.deregister_after),
        }),
        enable_tag_override: record.enable_tag_override,
        connect: record
            .connect_sidecar
            .then(AgentServiceConnect::default_sidecar),
    }
}

/// Summarize a listed agent service
pub fn summary(service: AgentService) -> ServiceRecordSummary {
    ServiceRecordSummary {
        service_id: service.id,
        service_name: service.service,
        address: service.address,
        port: service.port,
        kind: service.kind.filter(|kind| !kind.is_empty()),
    }
}

/// Durations in the agent's notation ("5s", "500ms")
pub fn go_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
