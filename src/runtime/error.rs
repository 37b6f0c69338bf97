// ABOUTME: Engine-adapter error type, unifying the per-capability error enums.
// ABOUTME: Exposes a stable kind() for mapping onto the crate-wide ErrorKind.

use super::traits::{ContainerError, ImageError, NetworkError, RuntimeInfoError};
use crate::error::Error as CrateError;
use thiserror::Error;

/// Unified engine-adapter error.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container operation failed: {0}")]
    Container(#[from] ContainerError),

    #[error("image operation failed: {0}")]
    Image(#[from] ImageError),

    #[error("network operation failed: {0}")]
    Network(#[from] NetworkError),

    #[error("runtime connection failed: {0}")]
    Connection(#[from] RuntimeInfoError),
}

impl From<RuntimeError> for CrateError {
    fn from(e: RuntimeError) -> Self {
        CrateError::engine_failure(e.to_string())
    }
}
