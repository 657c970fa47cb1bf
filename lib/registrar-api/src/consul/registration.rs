use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// AgentServiceRegistration is the body of a service registration request.
/// Registering the same `ID` twice replaces the previous definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentServiceRegistration {
    /// Unique service ID on this agent
    #[serde(rename = "ID")]
    pub id: String,

    /// Logical service name
    #[serde(rename = "Name")]
    pub name: String,

    /// Reachable address of the service
    #[serde(rename = "Address")]
    pub address: String,

    /// Reachable port of the service
    #[serde(rename = "Port")]
    pub port: u16,

    /// Ordered tags; duplicates are allowed
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,

    /// Free-form metadata
    #[serde(rename = "Meta", default)]
    pub meta: BTreeMap<String, String>,

    /// Health check declaration
    #[serde(rename = "Check", skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentServiceCheck>,

    /// Whether tags may be modified by other agents
    #[serde(rename = "EnableTagOverride", default)]
    pub enable_tag_override: bool,

    /// Service mesh settings
    #[serde(rename = "Connect", skip_serializing_if = "Option::is_none")]
    pub connect: Option<AgentServiceConnect>,
}

/// Health check attached to a registration. Exactly one of `tcp`/`udp` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentServiceCheck {
    /// `host:port` probed over TCP
    #[serde(rename = "TCP", skip_serializing_if = "Option::is_none")]
    pub tcp: Option<String>,

    /// `host:port` probed over UDP
    #[serde(rename = "UDP", skip_serializing_if = "Option::is_none")]
    pub udp: Option<String>,

    /// Interval between probes, e.g. "2s"
    #[serde(rename = "Interval")]
    pub interval: String,

    /// Timeout of a single probe, e.g. "3s"
    #[serde(rename = "Timeout")]
    pub timeout: String,

    /// How long a critical service stays registered, e.g. "5s"
    #[serde(rename = "DeregisterCriticalServiceAfter")]
    pub deregister_critical_service_after: String,
}

/// Connect settings of a registration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentServiceConnect {
    /// Request an agent-managed sidecar proxy with default settings
    #[serde(rename = "SidecarService", skip_serializing_if = "Option::is_none")]
    pub sidecar_service: Option<serde_json::Map<String, serde_json::Value>>,
}

impl AgentServiceConnect {
    /// Connect block requesting a default sidecar proxy
    pub fn default_sidecar() -> Self {
        Self {
            sidecar_service: Some(serde_json::Map::new()),
        }
    }
}
