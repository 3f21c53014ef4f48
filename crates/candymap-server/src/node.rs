//! Server node - configuration and the main entry point.
//!
//! Architecture:
//! - Single process with one shared JSON document
//! - Read-only catalog loaded once at startup
//! - HTTP API for clients (votes, progress, notes, rankings)

use crate::api;
use crate::error::{Error, Result};
use crate::storage::Storage;
use candymap_core::Catalog;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a server node.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Path of the persisted JSON document
    pub db_file: PathBuf,

    /// Path of the prepared catalog (`casas.json`)
    pub catalog: PathBuf,

    /// Optional directory of frontend files served at `/`
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let mut api_addr: SocketAddr = std::env::var("CANDYMAP_API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| Error::Config(format!("CANDYMAP_API_ADDR: {}", e)))?;

        if let Ok(port) = std::env::var("PORT") {
            let port = port
                .parse()
                .map_err(|e| Error::Config(format!("PORT: {}", e)))?;
            api_addr.set_port(port);
        }

        let db_file = PathBuf::from(
            std::env::var("CANDYMAP_DB_FILE").unwrap_or_else(|_| "./db.json".to_string()),
        );

        let catalog = PathBuf::from(
            std::env::var("CANDYMAP_CATALOG").unwrap_or_else(|_| "./casas.json".to_string()),
        );

        let static_dir = std::env::var("CANDYMAP_STATIC_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_addr,
            db_file,
            catalog,
            static_dir,
        })
    }
}

/// Shared state for request handlers.
pub struct ServerState {
    pub storage: Storage,
    pub catalog: Arc<Catalog>,
}

impl ServerState {
    pub fn new(storage: Storage, catalog: Arc<Catalog>) -> Self {
        Self { storage, catalog }
    }
}

/// A server instance.
pub struct CandyServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl CandyServer {
    /// Load the catalog and open storage.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let raw = std::fs::read_to_string(&config.catalog).map_err(|e| {
            Error::Config(format!("cannot read catalog {:?}: {}", config.catalog, e))
        })?;
        let catalog = Arc::new(Catalog::from_json(&raw)?);
        tracing::info!("Loaded {} houses from {:?}", catalog.len(), config.catalog);

        let storage = Storage::open(&config.db_file)?;

        Ok(Self {
            state: Arc::new(ServerState::new(storage, catalog)),
            config,
        })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Run the HTTP server until the process is stopped.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Candymap server starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Data: {:?}", self.config.db_file);
        if let Some(dir) = &self.config.static_dir {
            tracing::info!("  Static: {:?}", dir);
        }

        let app = api::build_router(self.state(), self.config.static_dir.as_deref());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
