//! Validated configuration handed to the engine

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// How many registry entries a multi-binding workload produces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// One record per workload, on the canonical binding
    #[default]
    Canonical,
    /// One record per registrable binding
    PerBinding,
}

/// Static health-check declaration copied into every record
#[derive(Clone, Debug, PartialEq)]
pub struct CheckSettings {
    /// Interval between probes
    pub interval: Duration,
    /// Timeout of a single probe
    pub timeout: Duration,
    /// How long a critical service stays registered
    pub deregister_after: Duration,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(3),
            deregister_after: Duration::from_secs(5),
        }
    }
}

/// Inputs of the registration policy
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyConfig {
    /// Address substituted for wildcard binds and cluster-routed ports
    pub self_address: IpAddr,
    /// Label key that must be set to "yes" for a workload to register
    pub opt_in_label: String,
    /// Label whose comma-separated value is appended to the tags
    pub tags_label: String,
    /// Label requesting a sidecar proxy
    pub sidecar_label: String,
    pub sidecars_enabled: bool,
    pub orchestration_enabled: bool,
    pub binding_mode: BindingMode,
    pub enable_tag_override: bool,
    pub check: CheckSettings,
}

impl PolicyConfig {
    pub fn new(self_address: IpAddr) -> Self {
        Self {
            self_address,
            opt_in_label: "consul".to_string(),
            tags_label: "consul.tags".to_string(),
            sidecar_label: "sidecar".to_string(),
            sidecars_enabled: false,
            orchestration_enabled: true,
            binding_mode: BindingMode::Canonical,
            enable_tag_override: false,
            check: CheckSettings::default(),
        }
    }
}

/// Reconciliation settings
#[derive(Clone, Debug, PartialEq)]
pub struct SweepConfig {
    /// Period of the background sweep
    pub interval: Duration,
    /// Substrings of service IDs/names owned by another control plane
    pub reserved_patterns: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: CheckSettings::default().deregister_after,
            reserved_patterns: vec!["sidecar-proxy".to_string(), "ingress-service".to_string()],
        }
    }
}

impl SweepConfig {
    /// Whether an entry belongs to infrastructure this engine never touches
    pub fn is_reserved(&self, service_id: &str, service_name: &str) -> bool {
        self.reserved_patterns
            .iter()
            .any(|p| service_id.contains(p.as_str()) || service_name.contains(p.as_str()))
    }
}

/// Everything the engine needs, already validated
#[derive(Clone, Debug, PartialEq)]
pub struct RegistrarConfig {
    pub policy: PolicyConfig,
    pub sweep: SweepConfig,
}

impl RegistrarConfig {
    pub fn new(policy: PolicyConfig, sweep: SweepConfig) -> Result<Self, ConfigError> {
        let config = Self { policy, sweep };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.policy;
        match policy.self_address {
            IpAddr::V4(addr) if addr != Ipv4Addr::UNSPECIFIED => {}
            other => {
                return Err(ConfigError::Invalid {
                    key: "self_ip",
                    reason: format!("{} is not a reachable IPv4 address", other),
                })
            }
        }
        if policy.opt_in_label.trim().is_empty() {
            return Err(ConfigError::Missing("opt_in_label"));
        }
        for (key, value) in [
            ("check.interval_secs", policy.check.interval),
            ("check.timeout_secs", policy.check.timeout),
            ("check.deregister_after_secs", policy.check.deregister_after),
            ("sweep_interval_secs", self.sweep.interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}
