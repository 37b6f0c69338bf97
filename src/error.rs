// ABOUTME: Crate-wide error type for aube.
// ABOUTME: Wraps an internal thiserror enum, exposing only a stable ErrorKind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Opaque crate-wide error. Callers should match on [`Error::kind`] rather
/// than the internal representation.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(#[from] Inner);

#[derive(Debug, Error)]
enum Inner {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("engine operation failed: {0}")]
    EngineFailure(String),

    #[error("instance did not become healthy: {0}")]
    HealthTimeout(String),

    #[error("transient I/O error: {0}")]
    Transient(String),
}

/// The seven error kinds named in the platform's error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Upstream,
    EngineFailure,
    HealthTimeout,
    Transient,
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(Inner::BadRequest(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(Inner::NotFound(msg.into()))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(Inner::Conflict(msg.into()))
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self(Inner::Upstream(msg.into()))
    }

    pub fn engine_failure(msg: impl Into<String>) -> Self {
        Self(Inner::EngineFailure(msg.into()))
    }

    pub fn health_timeout(msg: impl Into<String>) -> Self {
        Self(Inner::HealthTimeout(msg.into()))
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self(Inner::Transient(msg.into()))
    }

    /// Returns the error kind for programmatic handling (e.g. HTTP status mapping).
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            Inner::BadRequest(_) => ErrorKind::BadRequest,
            Inner::NotFound(_) => ErrorKind::NotFound,
            Inner::Conflict(_) => ErrorKind::Conflict,
            Inner::Upstream(_) => ErrorKind::Upstream,
            Inner::EngineFailure(_) => ErrorKind::EngineFailure,
            Inner::HealthTimeout(_) => ErrorKind::HealthTimeout,
            Inner::Transient(_) => ErrorKind::Transient,
        }
    }
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Upstream
            | ErrorKind::EngineFailure
            | ErrorKind::HealthTimeout
            | ErrorKind::Transient => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.kind().status_code();
        let body = self.to_string();
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
