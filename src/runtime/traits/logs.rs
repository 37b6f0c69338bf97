// ABOUTME: Log operations trait for container runtimes.
// ABOUTME: Fetch a container's stdout+stderr, used to dump logs on health-probe failure.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;

/// Log fetching operations.
#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// Fetch a container's combined stdout+stderr as lines.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Vec<LogLine>, LogError>;
}

/// Options for log fetching.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Number of lines to show from end (`None` = all).
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Fetch both streams in full, used when dumping logs on health failure
    /// (spec.md §4.2).
    pub fn both() -> Self {
        Self {
            stdout: true,
            stderr: true,
            tail: None,
        }
    }
}

/// A single log line from a container.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// The log content.
    pub content: String,
    /// Whether this is from stdout or stderr.
    pub stream: LogStream,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
