//! Docker Engine API client

use bollard::{Docker, API_DEFAULT_VERSION};
use registrar_core::RuntimeError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// DockerClient wraps the Docker Engine client and bounds every call
#[derive(Clone)]
pub struct DockerClient {
    docker: Docker,
    timeout: Duration,
}

impl DockerClient {
    /// Connect to a daemon endpoint: a unix socket path (optionally
    /// `unix://`-prefixed) or a `tcp://`/`http://` address
    pub fn connect(endpoint: &str, timeout: Duration) -> Result<Self, RuntimeError> {
        let secs = timeout.as_secs().max(1);
        let docker = if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, secs, API_DEFAULT_VERSION)
        } else {
            let path = endpoint.strip_prefix("unix://").unwrap_or(endpoint);
            Docker::connect_with_unix(path, secs, API_DEFAULT_VERSION)
        }
        .map_err(|e| RuntimeError::Unreachable(format!("{}: {}", endpoint, e)))?;

        debug!("Docker client configured for {}", endpoint);
        Ok(Self { docker, timeout })
    }

    /// Get the underlying Docker client
    pub fn inner(&self) -> &Docker {
        &self.docker
    }

    /// Run a daemon call under the configured timeout
    pub(crate) async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, bollard::errors::Error>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| map_error(what, e)),
            Err(_) => Err(RuntimeError::Timeout(self.timeout)),
        }
    }
}

/// Translate a daemon error; 404 becomes NotFound so callers can detect races
pub(crate) fn map_error(what: &str, error: bollard::errors::Error) -> RuntimeError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(format!("{}: {}", what, message)),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Api(format!("{} returned {}: {}", what, status_code, message)),
        other => RuntimeError::Unreachable(format!("{}: {}", what, other)),
    }
}
