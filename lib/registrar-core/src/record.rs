//! Canonical registration records
use crate::descriptor::Protocol;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

/// Health-check declaration; this system never executes it
#[derive(Clone, Debug, PartialEq)]
pub struct CheckSpec {
    pub protocol: Protocol,
    /// Always "address:port" of the record
    pub endpoint: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub deregister_after: Duration,
}

/// Registration payload, built, sent and discarded
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceRecord {
    pub service_id: String,
    pub service_name: String,
    pub address: IpAddr,
    pub port: u16,
    pub tags: Vec<String>,
    pub meta: BTreeMap<String, String>,
    pub check: CheckSpec,
    pub enable_tag_override: bool,
    /// Ask the registry to manage a sidecar proxy for this service
    pub connect_sidecar: bool,
}

/// What the registry reports for an entry
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceRecordSummary {
    pub service_id: String,
    pub service_name: String,
    pub address: String,
    pub port: u16,
    /// Set for proxies and gateways
    pub kind: Option<String>,
}

impl ServiceRecordSummary {
    /// Infrastructure entries (proxies, gateways) carry a kind
    pub fn is_infrastructure(&self) -> bool {
        self.kind.as_deref().is_some_and(|kind| !kind.is_empty())
    }
}

impl From<&ServiceRecord> for ServiceRecordSummary {
    fn from(record: &ServiceRecord) -> Self {
        Self {
            service_id: record.service_id.clone(),
            service_name: record.service_name.clone(),
            address: record.address.to_string(),
            port: record.port,
            kind: None,
        }
    }
}
