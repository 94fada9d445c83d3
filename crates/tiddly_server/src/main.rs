//! Tiddly server binary.
//!
//! Configuration comes from flags or the matching environment variables.
//! `GCP_PROJECT` is required; `PORT` defaults to 8080. An empty variable
//! counts as unset.

use clap::builder::{FalseyValueParser, OsStringValueParser, TypedValueParser};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tiddly_server::{
    ServerConfig, ServerError, ServerResult, StorageConfig, TiddlyServer, DEFAULT_DATA_DIR,
    DEFAULT_PORT,
};
use tracing_subscriber::EnvFilter;

/// Revisioning TiddlyWiki server for use behind an authenticating proxy.
#[derive(Parser)]
#[command(name = "tiddly")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store project id
    #[arg(long, env = "GCP_PROJECT")]
    project: String,

    /// Listen port [default: 8080]
    #[arg(long, env = "PORT")]
    port: Option<String>,

    /// Record storage backend: file or memory [default: file]
    #[arg(long, env = "TIDDLY_STORAGE")]
    storage: Option<String>,

    /// Root directory of the file store [default: data]
    #[arg(long, env = "TIDDLY_DATA_DIR", value_parser = OsStringValueParser::new().map(PathBuf::from))]
    data_dir: Option<PathBuf>,

    /// Fsync every write to the file store
    #[arg(long, env = "TIDDLY_SYNC_WRITES", value_parser = FalseyValueParser::new())]
    sync_writes: bool,

    /// Header the proxy sets to the signed-in user [default: X-Webauth-User]
    #[arg(long, env = "TIDDLY_AUTH_HEADER")]
    auth_header: Option<String>,

    /// HTML file served at /
    #[arg(long, env = "TIDDLY_INDEX", value_parser = OsStringValueParser::new().map(PathBuf::from))]
    index: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StorageKind {
    /// Append-only log on disk
    File,
    /// Process memory, lost on exit
    Memory,
}

impl Cli {
    /// Resolves flags into a server configuration.
    fn into_config(self) -> ServerResult<ServerConfig> {
        let port = match non_empty(self.port) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ServerError::Config(format!("invalid port {raw:?}: {e}")))?,
            None => {
                tracing::info!("Defaulting to port {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let kind = match non_empty(self.storage) {
            Some(raw) => <StorageKind as ValueEnum>::from_str(&raw, true)
                .map_err(|e| ServerError::Config(format!("invalid storage {raw:?}: {e}")))?,
            None => StorageKind::File,
        };
        let storage = match kind {
            StorageKind::File => StorageConfig::File {
                data_dir: non_empty_path(self.data_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
                sync_writes: self.sync_writes,
            },
            StorageKind::Memory => StorageConfig::InMemory,
        };

        let mut config = ServerConfig::new(self.project)
            .with_port(port)
            .with_storage(storage);
        if let Some(header) = non_empty(self.auth_header) {
            config = config.with_auth_header(header);
        }
        if let Some(index) = non_empty_path(self.index) {
            config = config.with_index(index);
        }
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.into_config()?;
    TiddlyServer::new(config)?.run().await?;
    Ok(())
}
