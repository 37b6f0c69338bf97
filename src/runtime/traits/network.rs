// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Create a function's private network and connect/disconnect containers.

use super::sealed::Sealed;
use super::shared_types::NetworkConfig;
use crate::types::{ContainerId, NetworkId};
use async_trait::async_trait;

/// Network operations: create, connect, disconnect.
#[async_trait]
pub trait NetworkOps: Sealed + Send + Sync {
    /// Create a network.
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    /// Remove a network.
    async fn remove_network(&self, id: &NetworkId) -> Result<(), NetworkError>;

    /// Connect a container to a network.
    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<(), NetworkError>;

    /// Disconnect a container from a network.
    async fn disconnect_from_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
    ) -> Result<(), NetworkError>;
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not connected to network: {0}")]
    NotConnected(String),

    #[error("network in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
