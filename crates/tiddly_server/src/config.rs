//! Server configuration.

use crate::auth::DEFAULT_AUTH_HEADER;
use crate::error::{ServerError, ServerResult};
use axum::http::HeaderName;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Default root directory of the file backend.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default request body limit (64 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Where records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Process memory; lost on exit.
    InMemory,
    /// Append-only log under `data_dir/<project>/`.
    File {
        /// Root directory holding one subdirectory per project.
        data_dir: PathBuf,
        /// Fsync every append.
        sync_writes: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            sync_writes: false,
        }
    }
}

/// Configuration for the tiddly server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Store project id. Required.
    pub project: String,
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Record storage.
    pub storage: StorageConfig,
    /// Header carrying the trusted user id.
    pub auth_header: String,
    /// Front-end page served at `/`; the built-in page when unset.
    pub index_path: Option<PathBuf>,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Creates a configuration for `project` listening on all interfaces.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            storage: StorageConfig::default(),
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            index_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the storage backend.
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the trusted identity header.
    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    /// Serves the given file at `/`.
    pub fn with_index(mut self, path: PathBuf) -> Self {
        self.index_path = Some(path);
        self
    }

    /// Sets the request body limit.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Parses the trusted header name.
    pub fn auth_header_name(&self) -> ServerResult<HeaderName> {
        HeaderName::from_bytes(self.auth_header.as_bytes()).map_err(|_| {
            ServerError::Config(format!("invalid auth header: {:?}", self.auth_header))
        })
    }

    /// Checks the configuration before startup.
    pub fn validate(&self) -> ServerResult<()> {
        if self.project.trim().is_empty() {
            return Err(ServerError::Config("must set GCP_PROJECT env var".into()));
        }
        self.auth_header_name()?;
        if self.max_body_bytes == 0 {
            return Err(ServerError::Config("max body size must be positive".into()));
        }
        Ok(())
    }
}
