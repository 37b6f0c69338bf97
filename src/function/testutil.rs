// ABOUTME: In-memory mock EngineClient used by function/pool unit tests.
// ABOUTME: Never touches a real container engine; assigns sequential fake IPs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps,
    ContainerState, ContainerSummary, ImageError, ImageOps, LogError, LogLine, LogOps,
    LogOptions, NetworkConfig, NetworkError, NetworkOps, RuntimeInfo, RuntimeInfoError,
    RuntimeMetadata,
};
use crate::runtime::traits::sealed::Sealed;
use crate::types::{ContainerId, NetworkId};

#[derive(Default)]
pub struct MockEngine {
    next_id: AtomicU64,
    containers: Mutex<HashMap<String, ContainerInfo>>,
}

impl Sealed for MockEngine {}

impl MockEngine {
    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerOps for MockEngine {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let n = self.fresh_id();
        let id = ContainerId::new(format!("mock-container-{n}"));
        let info = ContainerInfo {
            id: id.clone(),
            name: config.name.clone(),
            image: config.image.clone(),
            state: ContainerState::Created,
            created: "1970-01-01T00:00:00Z".to_string(),
            labels: config.labels.clone(),
            ip_address: None,
        };
        self.containers.lock().unwrap().insert(id.to_string(), info);
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut guard = self.containers.lock().unwrap();
        let info = guard
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        info.state = ContainerState::Running;
        let n = self.fresh_id();
        info.ip_address = Some(format!("10.42.0.{n}"));
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut guard = self.containers.lock().unwrap();
        let info = guard
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        info.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        self.containers.lock().unwrap().remove(id.as_str());
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        self.containers
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    async fn list_containers(
        &self,
        _filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .values()
            .map(|info| ContainerSummary {
                id: info.id.clone(),
                name: info.name.clone(),
                state: format!("{:?}", info.state),
            })
            .collect())
    }
}

#[async_trait]
impl ImageOps for MockEngine {
    async fn build_image(&self, _tag: &str, _tar_context: Bytes) -> Result<(), ImageError> {
        Ok(())
    }

    async fn image_exists(&self, _tag: &str) -> Result<bool, ImageError> {
        Ok(true)
    }

    async fn remove_image(&self, _tag: &str, _force: bool) -> Result<(), ImageError> {
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for MockEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        Ok(NetworkId::new(config.name.clone()))
    }

    async fn remove_network(&self, _id: &NetworkId) -> Result<(), NetworkError> {
        Ok(())
    }

    async fn connect_to_network(
        &self,
        _container: &ContainerId,
        _network: &NetworkId,
    ) -> Result<(), NetworkError> {
        Ok(())
    }

    async fn disconnect_from_network(
        &self,
        _container: &ContainerId,
        _network: &NetworkId,
    ) -> Result<(), NetworkError> {
        Ok(())
    }
}

#[async_trait]
impl LogOps for MockEngine {
    async fn container_logs(
        &self,
        _id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<Vec<LogLine>, LogError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl RuntimeInfo for MockEngine {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        Ok(RuntimeMetadata {
            name: "mock".to_string(),
            version: "0.0.0".to_string(),
            api_version: "0.0.0".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        Ok(())
    }
}
