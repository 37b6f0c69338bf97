// ABOUTME: FunctionHandler — the CP-side owner of one function's container fleet (spec.md §4.2).
// ABOUTME: Start/Add/StartContainer/IPs/Destroy/Delete, all safe under concurrent CP calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::http_client;
use crate::runtime::traits::{ContainerConfig, EngineClient, LogOptions};
use crate::types::{ContainerId, FunctionId, NetworkId};

use super::instance::{ContainerInstance, InstanceState};

struct HandlerState {
    containers: Vec<ContainerInstance>,
    container_ips: Vec<String>,
}

/// Owns the container fleet for one function. All operations are safe under
/// concurrent calls from the Control Plane (spec.md §4.2).
pub struct FunctionHandler {
    pub id: FunctionId,
    pub network_id: NetworkId,
    pub image_tag: String,
    max_instances: u32,
    engine: Arc<dyn EngineClient>,
    config: Arc<Config>,
    state: Mutex<HandlerState>,
}

impl FunctionHandler {
    pub fn new(
        id: FunctionId,
        network_id: NetworkId,
        image_tag: String,
        max_instances: u32,
        engine: Arc<dyn EngineClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            id,
            network_id,
            image_tag,
            max_instances,
            engine,
            config,
            state: Mutex::new(HandlerState {
                containers: Vec::new(),
                container_ips: Vec::new(),
            }),
        }
    }

    fn container_config(&self, name: String) -> ContainerConfig {
        ContainerConfig {
            name,
            image: self.image_tag.clone(),
            env: Default::default(),
            labels: std::collections::HashMap::from([(
                "aube.function".to_string(),
                self.id.to_string(),
            )]),
            command: None,
            working_dir: None,
            restart_policy: Default::default(),
            resources: None,
            healthcheck: None,
            stop_timeout: Some(Duration::from_secs(10)),
            network: Some(self.network_id.to_string()),
        }
    }

    /// Create `count` instances, named `<id>-<i>` for `i` in `[0, count)`.
    /// Used during initial provisioning (`Backend::create`).
    pub async fn provision(&self, count: u32) -> Result<()> {
        let mut guard = self.state.lock().await;
        for i in 0..count {
            let name = format!("{}-{}", self.id, i);
            let config = self.container_config(name);
            let container_id = self
                .engine
                .create_container(&config)
                .await
                .map_err(crate::runtime::RuntimeError::from)?;
            guard.containers.push(ContainerInstance::created(container_id));
        }
        Ok(())
    }

    /// Start every currently-created instance in parallel; after all have
    /// started, inspect each and append its IP to `container_ips`. Partial
    /// start failures are logged; the call succeeds if the inspection pass
    /// completes (spec.md §4.2).
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        let ids: Vec<ContainerId> = guard.containers.iter().map(|c| c.id.clone()).collect();

        let start_results = futures::future::join_all(
            ids.iter().map(|id| self.engine.start_container(id)),
        )
        .await;

        for (container, result) in guard.containers.iter_mut().zip(start_results.iter()) {
            match result {
                Ok(()) => container.state = InstanceState::Started,
                Err(e) => {
                    tracing::warn!("failed to start container {}: {}", container.id, e);
                    container.state = InstanceState::Failed;
                }
            }
        }

        for container in guard.containers.iter_mut() {
            if container.state != InstanceState::Started {
                continue;
            }
            match self.engine.inspect_container(&container.id).await {
                Ok(info) => {
                    if let Some(ip) = info.ip_address {
                        // Open Question 4: dedupe on append, the source appends unconditionally.
                        if !guard.container_ips.contains(&ip) {
                            guard.container_ips.push(ip.clone());
                        }
                        container.ip = Some(ip);
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to inspect container {}: {}", container.id, e);
                }
            }
        }

        Ok(())
    }

    /// Create exactly one additional instance, honoring the `max_instances`
    /// cap. Returns the newly created instance's id.
    ///
    /// Per spec.md §9 Open Question 3, at-cap returns a `Conflict` error
    /// rather than silently no-op-ing.
    pub async fn add(&self) -> Result<ContainerId> {
        let mut guard = self.state.lock().await;
        if guard.containers.len() as u32 >= self.max_instances {
            return Err(Error::conflict(format!(
                "function {} is at its instance cap ({})",
                self.id, self.max_instances
            )));
        }

        let name = format!("{}-{}", self.id, guard.containers.len());
        let config = self.container_config(name);
        let container_id = self
            .engine
            .create_container(&config)
            .await
            .map_err(crate::runtime::RuntimeError::from)?;

        guard
            .containers
            .push(ContainerInstance::created(container_id.clone()));
        Ok(container_id)
    }

    /// Start instance `id`, inspect it, append its IP, then health-probe it.
    /// On final probe failure, dump the container's logs and return an error
    /// without adding the IP to the caller's free set.
    pub async fn start_container(&self, id: &ContainerId) -> Result<()> {
        self.engine
            .start_container(id)
            .await
            .map_err(crate::runtime::RuntimeError::from)?;

        let info = self
            .engine
            .inspect_container(id)
            .await
            .map_err(crate::runtime::RuntimeError::from)?;
        let ip = info
            .ip_address
            .ok_or_else(|| Error::engine_failure("container has no private-network IP"))?;

        {
            let mut guard = self.state.lock().await;
            if let Some(container) = guard.containers.iter_mut().find(|c| &c.id == id) {
                container.state = InstanceState::Started;
                container.ip = Some(ip.clone());
            }
            if !guard.container_ips.contains(&ip) {
                guard.container_ips.push(ip.clone());
            }
        }

        match self.probe_health(&ip).await {
            Ok(()) => {
                let mut guard = self.state.lock().await;
                if let Some(container) = guard.containers.iter_mut().find(|c| &c.id == id) {
                    container.state = InstanceState::Healthy;
                }
                Ok(())
            }
            Err(e) => {
                self.dump_logs_on_failure(id).await;
                let mut guard = self.state.lock().await;
                if let Some(container) = guard.containers.iter_mut().find(|c| &c.id == id) {
                    container.state = InstanceState::Failed;
                }
                guard.container_ips.retain(|existing| existing != &ip);
                Err(e)
            }
        }
    }

    async fn probe_health(&self, ip: &str) -> Result<()> {
        let url = format!("http://{ip}:8080/health");
        let mut last_err = None;
        for attempt in 0..self.config.health_probe_attempts {
            match tokio::time::timeout(self.config.health_probe_timeout, http_client::get_status(&url)).await {
                Ok(Ok(status)) if status.is_success() => return Ok(()),
                Ok(Ok(status)) => last_err = Some(format!("health check returned {status}")),
                Ok(Err(e)) => last_err = Some(e.to_string()),
                Err(_) => last_err = Some("health check timed out".to_string()),
            }
            if attempt + 1 < self.config.health_probe_attempts {
                tokio::time::sleep(self.config.health_probe_backoff).await;
            }
        }
        Err(Error::health_timeout(last_err.unwrap_or_default()))
    }

    async fn dump_logs_on_failure(&self, id: &ContainerId) {
        match self.engine.container_logs(id, &LogOptions::both()).await {
            Ok(lines) => {
                for line in lines {
                    tracing::error!(container = %id, stream = ?line.stream, "{}", line.content);
                }
            }
            Err(e) => tracing::warn!("failed to fetch logs for {}: {}", id, e),
        }
    }

    /// Snapshot of `container_ips` in their current order.
    pub async fn ips(&self) -> Vec<String> {
        self.state.lock().await.container_ips.clone()
    }

    /// Stop and remove all instances in parallel, remove the network, then
    /// remove the image. Best-effort: every failure is logged but the call
    /// continues.
    pub async fn destroy(&self) -> Result<()> {
        let mut diagnostics = Diagnostics::default();
        let guard = self.state.lock().await;
        let ids: Vec<ContainerId> = guard.containers.iter().map(|c| c.id.clone()).collect();
        drop(guard);

        futures::future::join_all(ids.iter().map(|id| async {
            if let Err(e) = self.engine.stop_container(id, Duration::from_secs(10)).await {
                tracing::warn!("failed to stop container {}: {}", id, e);
            }
            if let Err(e) = self.engine.remove_container(id, true).await {
                Err(e)
            } else {
                Ok(())
            }
        }))
        .await
        .into_iter()
        .zip(ids.iter())
        .for_each(|(result, id): (Result<(), _>, &ContainerId)| {
            if let Err(e) = result {
                diagnostics.warn(Warning::container_cleanup(format!(
                    "failed to remove container {}: {}",
                    id, e
                )));
            }
        });

        if let Err(e) = self.engine.remove_network(&self.network_id).await {
            diagnostics.warn(Warning::network_cleanup(format!(
                "failed to remove network {}: {}",
                self.network_id, e
            )));
        }

        if let Err(e) = self.engine.remove_image(&self.image_tag, true).await {
            diagnostics.warn(Warning::image_cleanup(format!(
                "failed to remove image {}: {}",
                self.image_tag, e
            )));
        }

        {
            let mut guard = self.state.lock().await;
            guard.containers.clear();
            guard.container_ips.clear();
        }

        if diagnostics.has_warnings() {
            tracing::warn!(
                "destroy of function {} completed with {} warning(s)",
                self.id,
                diagnostics.warnings().len()
            );
        }
        Ok(())
    }

    /// Find the instance owning `ip`, stop+remove it, and remove both from
    /// `containers` and `container_ips`.
    pub async fn delete(&self, ip: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        let index = guard
            .containers
            .iter()
            .position(|c| c.ip.as_deref() == Some(ip))
            .ok_or_else(|| Error::not_found(format!("no instance with ip {ip}")))?;
        let container = guard.containers.remove(index);
        guard.container_ips.retain(|existing| existing != ip);
        drop(guard);

        if let Err(e) = self
            .engine
            .stop_container(&container.id, Duration::from_secs(10))
            .await
        {
            tracing::warn!("failed to stop container {}: {}", container.id, e);
        }
        self.engine
            .remove_container(&container.id, true)
            .await
            .map_err(crate::runtime::RuntimeError::from)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn container_count(&self) -> usize {
        self.state.lock().await.containers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::testutil::MockEngine;

    fn handler(max_instances: u32) -> FunctionHandler {
        FunctionHandler::new(
            FunctionId::new("echo-test".to_string()),
            NetworkId::new("net-echo".to_string()),
            "echo-test".to_string(),
            max_instances,
            Arc::new(MockEngine::default()),
            Arc::new(Config::default()),
        )
    }

    #[tokio::test]
    async fn add_respects_max_instances_cap() {
        let h = handler(2);
        h.add().await.unwrap();
        h.add().await.unwrap();
        let err = h.add().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert_eq!(h.container_count().await, 2);
    }

    #[tokio::test]
    async fn provision_and_start_collects_ips() {
        let h = handler(5);
        h.provision(3).await.unwrap();
        h.start().await.unwrap();
        assert_eq!(h.ips().await.len(), 3);
    }

    #[tokio::test]
    async fn start_container_deduplicates_ip_on_retry() {
        let h = handler(5);
        let id = h.add().await.unwrap();
        h.start_container(&id).await.unwrap();
        // Simulate a retry of the same start (Open Question 4).
        h.start_container(&id).await.unwrap();
        assert_eq!(h.ips().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_instance_and_its_ip() {
        let h = handler(5);
        let id = h.add().await.unwrap();
        h.start_container(&id).await.unwrap();
        let ip = h.ips().await[0].clone();
        h.delete(&ip).await.unwrap();
        assert_eq!(h.container_count().await, 0);
        assert!(h.ips().await.is_empty());
    }

    #[tokio::test]
    async fn destroy_clears_all_state() {
        let h = handler(5);
        h.provision(2).await.unwrap();
        h.start().await.unwrap();
        h.destroy().await.unwrap();
        assert_eq!(h.container_count().await, 0);
        assert!(h.ips().await.is_empty());
    }
}
