use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// AgentService is one value of the `GET /v1/agent/services` mapping,
/// which is keyed by service ID.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,

    /// Logical service name
    #[serde(rename = "Service")]
    pub service: String,

    #[serde(rename = "Address", default)]
    pub address: String,

    #[serde(rename = "Port", default)]
    pub port: u16,

    #[serde(rename = "Tags", default)]
    pub tags: Option<Vec<String>>,

    #[serde(rename = "Meta", default)]
    pub meta: Option<BTreeMap<String, String>>,

    /// Set for proxies and gateways ("connect-proxy", "ingress-gateway", ...)
    #[serde(rename = "Kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
