//! Server startup and shutdown.

use std::sync::Arc;

use tiddly_store::{FileStore, InMemoryStore, RecordStore};
use tokio::signal;

use crate::auth::TrustedHeader;
use crate::config::{ServerConfig, StorageConfig};
use crate::error::{ServerError, ServerResult};
use crate::http::{router, AppState};

/// The tiddly HTTP server.
///
/// Owns the configuration until [`TiddlyServer::run`] opens the store,
/// binds the listener and serves until SIGINT or SIGTERM.
///
/// # Example
///
/// ```no_run
/// use tiddly_server::{ServerConfig, StorageConfig, TiddlyServer};
///
/// # async fn start() -> Result<(), tiddly_server::ServerError> {
/// let config = ServerConfig::new("my-wiki").with_storage(StorageConfig::InMemory);
/// TiddlyServer::new(config)?.run().await
/// # }
/// ```
pub struct TiddlyServer {
    config: ServerConfig,
    store: Arc<dyn RecordStore>,
}

impl TiddlyServer {
    /// Validates `config` and opens its store.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = open_store(&config)?;
        Ok(Self { config, store })
    }

    /// Creates a server over an existing store handle.
    pub fn with_store(config: ServerConfig, store: Arc<dyn RecordStore>) -> ServerResult<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the application state for this server.
    pub fn state(&self) -> ServerResult<AppState> {
        let identity = Arc::new(TrustedHeader::new(self.config.auth_header_name()?));
        let mut state = AppState::new(Arc::clone(&self.store), identity)
            .with_max_body_bytes(self.config.max_body_bytes);

        if let Some(path) = &self.config.index_path {
            let page = std::fs::read(path).map_err(|e| {
                ServerError::Config(format!("cannot read front end {}: {e}", path.display()))
            })?;
            tracing::info!(path = %path.display(), "serving front end from file");
            state = state.with_front_end(page);
        }
        Ok(state)
    }

    /// Serves requests until a shutdown signal arrives.
    pub async fn run(self) -> ServerResult<()> {
        let app = router(self.state()?);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("Listening on port {}", self.config.bind_addr.port());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Opens the store described by `config`.
pub fn open_store(config: &ServerConfig) -> ServerResult<Arc<dyn RecordStore>> {
    match &config.storage {
        StorageConfig::InMemory => {
            tracing::warn!(
                project = %config.project,
                "using in-memory store; records are lost on exit"
            );
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageConfig::File {
            data_dir,
            sync_writes,
        } => {
            let store =
                FileStore::open(data_dir, &config.project)?.with_sync_writes(*sync_writes);
            tracing::info!(path = %store.path().display(), "opened record store");
            Ok(Arc::new(store))
        }
    }
}

/// Listen for SIGTERM and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_rejects_missing_project() {
        let config = ServerConfig::new("").with_storage(StorageConfig::InMemory);
        assert!(matches!(
            TiddlyServer::new(config),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn file_storage_opens_project_dir() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::new("wiki").with_storage(StorageConfig::File {
            data_dir: dir.path().to_path_buf(),
            sync_writes: false,
        });
        let server = TiddlyServer::new(config).unwrap();
        assert_eq!(server.config().project, "wiki");
        assert!(dir.path().join("wiki").join(tiddly_store::LOG_FILE_NAME).exists());
    }

    #[test]
    fn file_storage_rejects_nested_project_as_config() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::new("team/wiki").with_storage(StorageConfig::File {
            data_dir: dir.path().to_path_buf(),
            sync_writes: false,
        });
        assert!(matches!(
            TiddlyServer::new(config),
            Err(ServerError::Config(_))
        ));
        assert!(!dir.path().join("team").exists());
    }

    #[test]
    fn state_loads_front_end_file() {
        let dir = tempdir().unwrap();
        let index = dir.path().join("index.html");
        std::fs::write(&index, "<html>wiki</html>").unwrap();

        let config = ServerConfig::new("wiki")
            .with_storage(StorageConfig::InMemory)
            .with_index(index);
        let state = TiddlyServer::new(config).unwrap().state().unwrap();
        assert_eq!(&state.front_end[..], b"<html>wiki</html>");
    }

    #[test]
    fn with_store_shares_the_handle() {
        let store = Arc::new(InMemoryStore::new());
        let server = TiddlyServer::with_store(ServerConfig::new("wiki"), store.clone()).unwrap();
        let state = server.state().unwrap();
        state.engine.put("Foo", b"{}").unwrap();
        assert_eq!(store.count(tiddly_store::Kind::Tiddler), 1);
    }

    #[test]
    fn state_rejects_missing_front_end_file() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::new("wiki")
            .with_storage(StorageConfig::InMemory)
            .with_index(dir.path().join("missing.html"));
        let server = TiddlyServer::new(config).unwrap();
        assert!(matches!(server.state(), Err(ServerError::Config(_))));
    }
}
