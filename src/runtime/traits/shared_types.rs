// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, ContainerInfo, NetworkConfig, RuntimeMetadata, etc.

use crate::types::ContainerId;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Name for the container.
    pub name: String,
    /// Image tag to run (the function's unique id, per spec.md §3).
    pub image: String,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Labels to apply.
    pub labels: HashMap<String, String>,
    /// Command to run (overrides image CMD).
    pub command: Option<Vec<String>>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Restart policy.
    pub restart_policy: RestartPolicyConfig,
    /// Resource limits.
    pub resources: Option<ResourceLimits>,
    /// Healthcheck configuration.
    pub healthcheck: Option<HealthcheckConfig>,
    /// Stop timeout.
    pub stop_timeout: Option<Duration>,
    /// Network to connect to.
    pub network: Option<String>,
}

/// Restart policy configuration.
#[derive(Debug, Clone, Default)]
pub enum RestartPolicyConfig {
    /// Never restart.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart unless explicitly stopped.
    UnlessStopped,
    /// Restart on failure with optional max retries.
    OnFailure { max_retries: Option<u32> },
}

/// Resource limits for a container.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    /// Memory limit in bytes.
    pub memory: Option<u64>,
    /// CPU quota (1.0 = 1 CPU).
    pub cpus: Option<f64>,
}

/// Healthcheck configuration for a container.
#[derive(Debug, Clone)]
pub struct HealthcheckConfig {
    /// Command to run for health check.
    pub test: Vec<String>,
    /// Interval between checks.
    pub interval: Duration,
    /// Timeout for each check.
    pub timeout: Duration,
    /// Retries before unhealthy.
    pub retries: u32,
    /// Start period before health checks begin.
    pub start_period: Duration,
}

/// Information about a running container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state.
    pub state: ContainerState,
    /// Creation timestamp.
    pub created: String,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// IP address on the function's private network, if connected.
    pub ip_address: Option<String>,
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name.
    pub name: String,
    /// Network driver (bridge, host, overlay, etc.).
    pub driver: Option<String>,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "docker", "podman").
    pub name: String,
    /// Runtime version.
    pub version: String,
    /// API version.
    pub api_version: String,
}
