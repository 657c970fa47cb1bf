//! HTTP client for the local Consul agent

use crate::wire;
use async_trait::async_trait;
use registrar_api::AgentService;
use registrar_core::{RegistryError, ServiceRecord, ServiceRecordSummary, ServiceRegistry};
use reqwest::{Client, Response, StatusCode};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// ConsulRegistry registers services with the agent at `base_url`
#[derive(Clone)]
pub struct ConsulRegistry {
    client: Client,
    base_url: String,
}

impl ConsulRegistry {
    /// Create a client for an agent such as `http://127.0.0.1:8500`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn register(&self, record: &ServiceRecord) -> Result<(), RegistryError> {
        let body = wire::registration(record);
        let response = self
            .client
            .put(self.url("/v1/agent/service/register"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response).await?;
        debug!(service_id = %record.service_id, "Registered with agent");
        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<(), RegistryError> {
        let response = self
            .client
            .put(self.url(&format!("/v1/agent/service/deregister/{}", service_id)))
            .send()
            .await
            .map_err(transport_error)?;

        match check_status(response).await {
            Ok(()) => {
                debug!(service_id = %service_id, "Deregistered from agent");
                Ok(())
            }
            Err(RegistryError::Rejected { status, body }) if is_unknown_service(status, &body) => {
                Err(RegistryError::NotFound(service_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn list_registered(&self) -> Result<BTreeMap<String, ServiceRecordSummary>, RegistryError> {
        let response = self
            .client
            .get(self.url("/v1/agent/services"))
            .send()
            .await
            .map_err(transport_error)?;

        let response = ok_response(response).await?;
        let services: HashMap<String, AgentService> = response
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        Ok(services
            .into_iter()
            .map(|(id, mut service)| {
                if service.id.is_empty() {
                    service.id = id.clone();
                }
                (id, wire::summary(service))
            })
            .collect())
    }

    async fn health_check_connectivity(&self) -> Result<(), RegistryError> {
        let response = self
            .client
            .get(self.url("/v1/status/leader"))
            .send()
            .await
            .map_err(transport_error)?;

        ok_response(response).await?;
        Ok(())
    }
}

fn transport_error(error: reqwest::Error) -> RegistryError {
    if error.is_timeout() {
        RegistryError::Timeout
    } else {
        RegistryError::Unreachable(error.to_string())
    }
}

async fn ok_response(response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RegistryError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn check_status(response: Response) -> Result<(), RegistryError> {
    ok_response(response).await.map(|_| ())
}

// Older agents answer 500 instead of 404 for an unknown ID
fn is_unknown_service(status: u16, body: &str) -> bool {
    status == StatusCode::NOT_FOUND.as_u16()
        || (status == StatusCode::INTERNAL_SERVER_ERROR.as_u16()
            && body.contains("Unknown service"))
}
