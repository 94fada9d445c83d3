//! Error types for the tiddly server.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tiddly_store::StoreError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the tiddly server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// No trusted identity on a gated route.
    #[error("permission denied")]
    PermissionDenied,

    /// The route exists but not for this method.
    #[error("bad method")]
    BadMethod,

    /// Unknown path or missing record.
    #[error("{0}")]
    NotFound(String),

    /// The request body could not be read.
    #[error("cannot read data")]
    UnreadableBody(String),

    /// Empty tiddler title.
    #[error("invalid title")]
    InvalidTitle,

    /// Payload or stored metadata is not a JSON object.
    #[error("{0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Record store failure.
    #[error("{0}")]
    Store(StoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid startup configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a not-found error for an unrouted path.
    pub fn route_not_found() -> Self {
        ServerError::NotFound("not found".into())
    }

    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::PermissionDenied => StatusCode::FORBIDDEN,
            ServerError::BadMethod => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::UnreadableBody(_) | ServerError::InvalidTitle => StatusCode::BAD_REQUEST,
            ServerError::MalformedJson(_)
            | ServerError::Store(_)
            | ServerError::Internal(_)
            | ServerError::Config(_)
            | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => {
                ServerError::NotFound(format!("tiddler not found: {}", key.name))
            }
            StoreError::InvalidProject(project) => {
                ServerError::Config(format!("invalid project id: {project:?}"))
            }
            other => ServerError::Store(other),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        if let ServerError::UnreadableBody(detail) = &self {
            tracing::debug!(%detail, "body read failed");
        }

        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{self}\n"),
        )
            .into_response()
    }
}
