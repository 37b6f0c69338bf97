// ABOUTME: Bollard-based container engine adapter.
// ABOUTME: Implements the ContainerOps/NetworkOps/ImageOps/LogOps/RuntimeInfo capability set.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, HealthcheckConfig, ImageError, ImageOps, LogError, LogLine, LogOps,
    LogOptions, LogStream, NetworkConfig, NetworkError, NetworkOps, ResourceLimits,
    RestartPolicyConfig, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::types::{ContainerId, NetworkId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HealthConfig, HostConfig, NetworkingConfig,
    RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    LogsOptions, RemoveContainerOptions, RemoveImageOptions, StopContainerOptions,
};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error mapping helpers
// =============================================================================

fn map_image_build_error(e: bollard::errors::Error) -> ImageError {
    ImageError::BuildFailed(e.to_string())
}

fn map_image_remove_error(e: bollard::errors::Error, tag: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(tag.to_string())
        }
        _ => ImageError::Runtime(format!("failed to remove {}: {}", tag, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::NotRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_network_create_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => NetworkError::AlreadyExists(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_network_remove_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => NetworkError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 403 => NetworkError::InUse(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_network_connect_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => NetworkError::NotFound(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_network_disconnect_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => NetworkError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 403 => NetworkError::NotConnected(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

// =============================================================================
// BollardBackend
// =============================================================================

/// Container engine adapter backed by `bollard`, speaking the Docker-compatible
/// API exposed by both Docker and Podman.
pub struct BollardBackend {
    client: Docker,
}

impl Sealed for BollardBackend {}

impl BollardBackend {
    /// Connect using the engine socket found via the standard Docker
    /// environment variables (`DOCKER_HOST` etc.).
    pub fn connect_from_env() -> Result<Self, RuntimeInfoError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client })
    }

    /// Connect to a specific unix socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, RuntimeInfoError> {
        let client = Docker::connect_with_unix(socket_path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RuntimeInfo for BollardBackend {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::Runtime(e.to_string()))?;
        let version = self
            .client
            .version()
            .await
            .map_err(|e| RuntimeInfoError::Runtime(e.to_string()))?;
        Ok(RuntimeMetadata {
            name: info.name.unwrap_or_default(),
            version: version.version.unwrap_or_default(),
            api_version: version.api_version.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl ImageOps for BollardBackend {
    async fn build_image(&self, tag: &str, tar_context: Bytes) -> Result<(), ImageError> {
        let opts = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(tag.to_string()),
            rm: true,
            ..Default::default()
        };

        let mut stream = self.client.build_image(opts, None, Some(tar_context));
        while let Some(next) = stream.next().await {
            let info = next.map_err(map_image_build_error)?;
            if let Some(error) = info.error {
                return Err(ImageError::BuildFailed(error));
            }
        }
        Ok(())
    }

    async fn image_exists(&self, tag: &str) -> Result<bool, ImageError> {
        match self.client.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(e.to_string())),
        }
    }

    async fn remove_image(&self, tag: &str, force: bool) -> Result<(), ImageError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };
        self.client
            .remove_image(tag, Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, tag))?;
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardBackend {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut host_config = HostConfig {
            restart_policy: Some(RestartPolicy {
                name: Some(match &config.restart_policy {
                    RestartPolicyConfig::No => RestartPolicyNameEnum::NO,
                    RestartPolicyConfig::Always => RestartPolicyNameEnum::ALWAYS,
                    RestartPolicyConfig::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
                    RestartPolicyConfig::OnFailure { .. } => RestartPolicyNameEnum::ON_FAILURE,
                }),
                maximum_retry_count: match &config.restart_policy {
                    RestartPolicyConfig::OnFailure { max_retries } => {
                        max_retries.map(|r| r as i64)
                    }
                    _ => None,
                },
            }),
            ..Default::default()
        };

        if let Some(ResourceLimits { memory, cpus }) = config.resources {
            if let Some(memory) = memory {
                host_config.memory = Some(memory as i64);
            }
            if let Some(cpus) = cpus {
                host_config.nano_cpus = Some((cpus * 1_000_000_000.0) as i64);
            }
        }

        if let Some(ref network) = config.network {
            host_config.network_mode = Some(network.clone());
        }

        let healthcheck = config.healthcheck.as_ref().map(
            |HealthcheckConfig {
                 test,
                 interval,
                 timeout,
                 retries,
                 start_period,
             }| HealthConfig {
                test: Some(test.clone()),
                interval: Some(interval.as_nanos() as i64),
                timeout: Some(timeout.as_nanos() as i64),
                retries: Some(*retries as i64),
                start_period: Some(start_period.as_nanos() as i64),
                start_interval: None,
            },
        );

        let networking_config = config.network.as_ref().map(|network| NetworkingConfig {
            endpoints_config: Some(HashMap::from([(
                network.clone(),
                EndpointSettings::default(),
            )])),
        });

        let body = ContainerCreateBody {
            image: Some(config.image.clone()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            cmd: config.command.clone(),
            working_dir: config.working_dir.clone(),
            host_config: Some(host_config),
            healthcheck,
            networking_config,
            stop_timeout: config.stop_timeout.map(|d| d.as_secs() as i64),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };
        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                bollard::models::ContainerStateStatusEnum::CREATED => ContainerState::Created,
                bollard::models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
                bollard::models::ContainerStateStatusEnum::PAUSED => ContainerState::Paused,
                bollard::models::ContainerStateStatusEnum::RESTARTING => {
                    ContainerState::Restarting
                }
                bollard::models::ContainerStateStatusEnum::REMOVING => ContainerState::Removing,
                bollard::models::ContainerStateStatusEnum::EXITED => ContainerState::Exited,
                bollard::models::ContainerStateStatusEnum::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        let ip_address = details
            .network_settings
            .as_ref()
            .and_then(|ns| ns.networks.as_ref())
            .and_then(|nets| nets.values().next())
            .and_then(|endpoint| endpoint.ip_address.clone())
            .filter(|ip| !ip.is_empty());

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            created: details.created.unwrap_or_default(),
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
            ip_address,
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }
        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: if filter_map.is_empty() {
                None
            } else {
                Some(filter_map)
            },
            ..Default::default()
        };

        let summaries = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(summaries
            .into_iter()
            .map(|c| ContainerSummary {
                id: ContainerId::new(c.id.unwrap_or_default()),
                name: c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .unwrap_or_default(),
                state: c
                    .state
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl NetworkOps for BollardBackend {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };
        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(map_network_create_error)?;
        Ok(NetworkId::new(response.id))
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), NetworkError> {
        self.client
            .remove_network(id.as_str())
            .await
            .map_err(map_network_remove_error)
    }

    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<(), NetworkError> {
        let config = bollard::models::NetworkConnectRequest {
            container: container.to_string(),
            endpoint_config: Some(EndpointSettings::default()),
        };
        self.client
            .connect_network(network.as_str(), config)
            .await
            .map_err(map_network_connect_error)
    }

    async fn disconnect_from_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<(), NetworkError> {
        let config = bollard::models::NetworkDisconnectRequest {
            container: container.to_string(),
            force: Some(false),
        };
        self.client
            .disconnect_network(network.as_str(), config)
            .await
            .map_err(map_network_disconnect_error)
    }
}

#[async_trait]
impl LogOps for BollardBackend {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Vec<LogLine>, LogError> {
        let bollard_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let mut stream = self.client.logs(id.as_str(), Some(bollard_opts));
        let mut lines = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LogError::Runtime(e.to_string()))?;
            let (stream_kind, bytes) = match chunk {
                bollard::container::LogOutput::StdOut { message } => {
                    (LogStream::Stdout, message)
                }
                bollard::container::LogOutput::StdErr { message } => {
                    (LogStream::Stderr, message)
                }
                _ => continue,
            };
            lines.push(LogLine {
                content: String::from_utf8_lossy(&bytes).into_owned(),
                stream: stream_kind,
            });
        }
        Ok(lines)
    }
}
