// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Build from a build context archive, check existence, and remove images.

use super::sealed::Sealed;
use async_trait::async_trait;
use bytes::Bytes;

/// Image operations: build, check existence, remove.
///
/// Unlike a typical registry-backed runtime, aube never pulls images: the
/// Backend always builds one from a freshly materialized build context
/// (spec.md §4.1).
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Build an image tagged `tag` from a tar archive build context, draining
    /// the build stream to completion and failing if it reports an error.
    async fn build_image(&self, tag: &str, tar_context: Bytes) -> Result<(), ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, tag: &str) -> Result<bool, ImageError>;

    /// Remove an image.
    async fn remove_image(&self, tag: &str, force: bool) -> Result<(), ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
