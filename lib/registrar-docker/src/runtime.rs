use crate::client::{map_error, DockerClient};
use crate::convert;
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::service::InspectServiceOptions;
use bollard::system::EventsOptions;
use futures::StreamExt;
use registrar_core::{
    ContainerRecord, EventStream, ListedWorkload, RuntimeError, ServiceSpecRecord,
    WorkloadRuntime,
};
use std::collections::HashMap;
use tracing::{debug, warn};

#[async_trait]
impl WorkloadRuntime for DockerClient {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.bounded("ping", self.inner().ping()).await?;
        Ok(())
    }

    async fn list_running_workloads(&self) -> Result<Vec<ListedWorkload>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            filters: HashMap::from([("status".to_string(), vec!["running".to_string()])]),
            ..Default::default()
        };
        let summaries = self
            .bounded("list containers", self.inner().list_containers(Some(options)))
            .await?;

        let mut listed = Vec::with_capacity(summaries.len());
        for id in summaries.into_iter().filter_map(|summary| summary.id) {
            match self.inspect_container(&id).await {
                // Removed between listing and inspection
                Err(RuntimeError::NotFound(_)) => {
                    debug!(workload = %id, "Container vanished during listing");
                }
                Err(e) => {
                    warn!(workload = %id, outcome = "failed", kind = "inspect", "{}", e);
                    listed.push((id, Err(e)));
                }
                Ok(record) => listed.push((id, Ok(record))),
            }
        }
        debug!("Listed {} running containers", listed.len());
        Ok(listed)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord, RuntimeError> {
        let what = format!("inspect container {}", id);
        let inspect = self
            .bounded(
                &what,
                self.inner()
                    .inspect_container(id, None::<InspectContainerOptions>),
            )
            .await?;
        convert::container_record(inspect)
    }

    async fn inspect_service(&self, id: &str) -> Result<ServiceSpecRecord, RuntimeError> {
        let what = format!("inspect service {}", id);
        let service = self
            .bounded(
                &what,
                self.inner().inspect_service(id, None::<InspectServiceOptions>),
            )
            .await?;
        convert::service_record(service)
    }

    fn stream_events(&self) -> EventStream {
        let options = EventsOptions::<String> {
            filters: HashMap::from([
                ("type".to_string(), vec!["container".to_string()]),
                (
                    "event".to_string(),
                    vec!["start".to_string(), "destroy".to_string()],
                ),
            ]),
            ..Default::default()
        };

        self.inner()
            .events(Some(options))
            .map(|item| match item {
                Ok(message) => Ok(convert::runtime_event(message)),
                Err(e) => {
                    warn!("Docker event stream error: {}", e);
                    Err(map_error("event stream", e))
                }
            })
            .boxed()
    }
}
