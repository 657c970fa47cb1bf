//! Operator configuration file and environment overrides

use registrar_core::{
    BindingMode, CheckSettings, ConfigError, PolicyConfig, RegistrarConfig, SweepConfig,
};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DOCKER_ENDPOINT: &str = "/var/run/docker.sock";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Health-check section of the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckFile {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub deregister_after_secs: Option<u64>,
}

/// Configuration file as written by the operator
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub consul: Option<String>,
    pub docker: Option<String>,
    pub self_ip: Option<String>,
    pub opt_in_label: Option<String>,
    pub tags_label: Option<String>,
    pub sidecar_label: Option<String>,
    pub enable_sidecars: Option<bool>,
    pub enable_orchestration: Option<bool>,
    pub binding_mode: Option<BindingMode>,
    pub enable_tag_override: Option<bool>,
    pub check: CheckFile,
    pub sweep_interval_secs: Option<u64>,
    pub reserved_service_patterns: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
}

impl SettingsFile {
    /// Parse JSON, or YAML when the path ends in `.yaml`/`.yml`
    pub fn parse(path: &Path, content: &str) -> Result<Self, SettingsError> {
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(content).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| SettingsError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }
}

/// Fully resolved settings of one process
#[derive(Debug, Clone)]
pub struct Settings {
    pub consul_url: String,
    pub docker_endpoint: String,
    pub request_timeout: Duration,
    pub registrar: RegistrarConfig,
}

impl Settings {
    /// Read the file at `path` and apply `REGISTRAR_*` environment overrides
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = SettingsFile::parse(path, &content)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge file values with overrides looked up through `env`
    pub fn resolve<F>(file: SettingsFile, env: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let consul_url = env("REGISTRAR_CONSUL")
            .or(file.consul)
            .ok_or(ConfigError::Missing("consul"))?;
        validate_url(&consul_url)?;

        let docker_endpoint = env("REGISTRAR_DOCKER")
            .or(file.docker)
            .unwrap_or_else(|| DEFAULT_DOCKER_ENDPOINT.to_string());

        let self_ip = env("REGISTRAR_SELF_IP")
            .or(file.self_ip)
            .ok_or(ConfigError::Missing("self_ip"))?;
        let self_address: IpAddr = self_ip.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "self_ip",
            reason: format!("{:?} is not an IP address", self_ip),
        })?;

        let defaults = CheckSettings::default();
        let check = CheckSettings {
            interval: secs_or(file.check.interval_secs, defaults.interval),
            timeout: secs_or(file.check.timeout_secs, defaults.timeout),
            deregister_after: secs_or(file.check.deregister_after_secs, defaults.deregister_after),
        };

        let mut policy = PolicyConfig::new(self_address);
        if let Some(label) = file.opt_in_label {
            policy.opt_in_label = label;
        }
        if let Some(label) = file.tags_label {
            policy.tags_label = label;
        }
        if let Some(label) = file.sidecar_label {
            policy.sidecar_label = label;
        }
        policy.sidecars_enabled = file.enable_sidecars.unwrap_or(policy.sidecars_enabled);
        policy.orchestration_enabled = file
            .enable_orchestration
            .unwrap_or(policy.orchestration_enabled);
        policy.binding_mode = file.binding_mode.unwrap_or_default();
        policy.enable_tag_override = file.enable_tag_override.unwrap_or(false);

        let mut sweep = SweepConfig {
            interval: secs_or(file.sweep_interval_secs, check.deregister_after),
            ..SweepConfig::default()
        };
        if let Some(patterns) = file.reserved_service_patterns {
            sweep.reserved_patterns = patterns;
        }
        policy.check = check;

        let request_timeout = Duration::from_secs(
            file.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );
        if request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(Self {
            consul_url,
            docker_endpoint,
            request_timeout,
            registrar: RegistrarConfig::new(policy, sweep)?,
        })
    }
}

fn secs_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

fn validate_url(value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "consul",
        reason,
    };
    let url = reqwest::Url::parse(value).map_err(|e| invalid(format!("{}: {}", value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid(format!("{} has no host", value)));
    }
    Ok(())
}
