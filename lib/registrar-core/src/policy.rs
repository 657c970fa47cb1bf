//! Registration policy
//!
//! Decides whether a workload is registered and derives its records. The engine
//! is pure: it never talks to the registry or the runtime.
//!
//! Binding selection in [`BindingMode::Canonical`]: IPv6 binds are dropped,
//! wildcard IPv4 binds resolve to the configured self address, and the binding
//! with the lowest `(container_port, protocol, host_port, address)` wins, TCP
//! ordering before UDP. Orchestrated services use their first published port.

use crate::config::{BindingMode, PolicyConfig};
use crate::descriptor::{PortBinding, Protocol, WorkloadDescriptor};
use crate::error::PolicyError;
use crate::record::{CheckSpec, ServiceRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::IpAddr;
use tracing::warn;

/// Why a workload produced no records. Not a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotOptedIn,
    OrchestrationDisabled,
    NoPublishedPorts,
    UnsupportedAddressFamily,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NotOptedIn => "not opted in",
            SkipReason::OrchestrationDisabled => "orchestrated workloads disabled",
            SkipReason::NoPublishedPorts => "no published ports",
            SkipReason::UnsupportedAddressFamily => "only IPv6 bindings",
        };
        f.write_str(reason)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// Records to register; never empty
    Register(Vec<ServiceRecord>),
    Skip(SkipReason),
}

/// A binding with its resolved reachable address
#[derive(Clone, Copy, Debug)]
struct Endpoint<'a> {
    address: IpAddr,
    binding: &'a PortBinding,
}

impl Endpoint<'_> {
    fn sort_key(&self) -> (u16, Protocol, u16, IpAddr) {
        (
            self.binding.container_port,
            self.binding.protocol,
            self.binding.host_port,
            self.address,
        )
    }
}

pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn binding_mode(&self) -> BindingMode {
        self.config.binding_mode
    }

    /// Whether the opt-in label is set to an affirmative value
    pub fn is_opted_in(&self, descriptor: &WorkloadDescriptor) -> bool {
        descriptor
            .labels
            .get(&self.config.opt_in_label)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("yes"))
    }

    /// Whether a registry entry was derived from the given workload
    pub fn owns(workload_id: &str, service_id: &str) -> bool {
        service_id
            .strip_prefix(workload_id)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
    }

    /// The service ID a workload's record would carry in canonical mode
    pub fn canonical_service_id(workload_id: &str) -> String {
        workload_id.to_string()
    }

    pub fn evaluate(&self, descriptor: &WorkloadDescriptor) -> Result<Decision, PolicyError> {
        if !self.is_opted_in(descriptor) {
            return Ok(Decision::Skip(SkipReason::NotOptedIn));
        }
        if descriptor.is_orchestrated() && !self.config.orchestration_enabled {
            return Ok(Decision::Skip(SkipReason::OrchestrationDisabled));
        }

        let service_name = descriptor.display_name.trim();
        if service_name.is_empty() {
            return Err(PolicyError::MissingServiceName(descriptor.workload_id.clone()));
        }

        let mut ipv6_seen = false;
        let mut endpoints = Vec::with_capacity(descriptor.port_bindings.len());
        for binding in &descriptor.port_bindings {
            if binding.host_port == 0 {
                return Err(PolicyError::InvalidPort {
                    workload_id: descriptor.workload_id.clone(),
                    port: binding.host_port,
                });
            }
            let address = match binding.host_ip {
                Some(IpAddr::V6(_)) => {
                    ipv6_seen = true;
                    continue;
                }
                Some(ip) if !ip.is_unspecified() => ip,
                _ => self.config.self_address,
            };
            endpoints.push(Endpoint { address, binding });
        }

        if endpoints.is_empty() {
            let reason = if ipv6_seen {
                SkipReason::UnsupportedAddressFamily
            } else {
                SkipReason::NoPublishedPorts
            };
            return Ok(Decision::Skip(reason));
        }

        let selected = match self.config.binding_mode {
            BindingMode::Canonical => vec![self.canonical(descriptor, &endpoints)],
            BindingMode::PerBinding => endpoints,
        };

        let mut seen = HashSet::new();
        let records = selected
            .into_iter()
            .map(|endpoint| self.build_record(descriptor, service_name, endpoint))
            .filter(|record| seen.insert(record.service_id.clone()))
            .collect();

        Ok(Decision::Register(records))
    }

    fn canonical<'a>(
        &self,
        descriptor: &WorkloadDescriptor,
        endpoints: &[Endpoint<'a>],
    ) -> Endpoint<'a> {
        if descriptor.is_orchestrated() {
            if endpoints.len() > 1 {
                warn!(
                    workload = %descriptor.workload_id,
                    service = %descriptor.display_name,
                    "Service publishes {} ports, registering only the first",
                    endpoints.len()
                );
            }
            return endpoints[0];
        }
        endpoints
            .iter()
            .copied()
            .min_by_key(|endpoint| endpoint.sort_key())
            .unwrap_or(endpoints[0])
    }

    fn build_record(
        &self,
        descriptor: &WorkloadDescriptor,
        service_name: &str,
        endpoint: Endpoint<'_>,
    ) -> ServiceRecord {
        let binding = endpoint.binding;
        let service_id = match self.config.binding_mode {
            BindingMode::Canonical => Self::canonical_service_id(&descriptor.workload_id),
            BindingMode::PerBinding => format!(
                "{}_{}_{}",
                descriptor.workload_id, binding.protocol, binding.host_port
            ),
        };
        let check = &self.config.check;

        ServiceRecord {
            service_id,
            service_name: service_name.to_string(),
            address: endpoint.address,
            port: binding.host_port,
            tags: self.tags(descriptor),
            meta: descriptor
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            check: CheckSpec {
                protocol: binding.protocol,
                endpoint: format!("{}:{}", endpoint.address, binding.host_port),
                interval: check.interval,
                timeout: check.timeout,
                deregister_after: check.deregister_after,
            },
            enable_tag_override: self.config.enable_tag_override,
            connect_sidecar: self.wants_sidecar(descriptor),
        }
    }

    fn tags(&self, descriptor: &WorkloadDescriptor) -> Vec<String> {
        let mut tags = vec![descriptor.image_reference.clone()];
        if let Some(extra) = descriptor.labels.get(&self.config.tags_label) {
            tags.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string),
            );
        }
        tags
    }

    fn wants_sidecar(&self, descriptor: &WorkloadDescriptor) -> bool {
        self.config.sidecars_enabled
            && descriptor
                .labels
                .get(&self.config.sidecar_label)
                .is_some_and(|value| !value.trim().is_empty())
    }
}
