//! Client configuration.

use crate::error::{Error, Result};
use crate::gateway::{Gateway, LocalGateway, SharedGateway};
use candymap_core::Catalog;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for requests to the shared store.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Configuration for a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Shared server; local mode when unset
    pub server_url: Option<Url>,

    /// Directory of the local store
    pub data_dir: PathBuf,

    /// Timeout for each request to the shared store
    pub timeout: Duration,

    /// Path of the prepared catalog (`casas.json`)
    pub catalog: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            data_dir: PathBuf::from("./candymap-data"),
            timeout: DEFAULT_TIMEOUT,
            catalog: PathBuf::from("./casas.json"),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = std::env::var("CANDYMAP_SERVER_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            config.server_url = Some(
                url.parse()
                    .map_err(|e| Error::Config(format!("CANDYMAP_SERVER_URL: {}", e)))?,
            );
        }

        if let Ok(dir) = std::env::var("CANDYMAP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(ms) = std::env::var("CANDYMAP_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| Error::Config(format!("CANDYMAP_TIMEOUT_MS: {}", e)))?;
            config.timeout = Duration::from_millis(ms);
        }

        if let Ok(path) = std::env::var("CANDYMAP_CATALOG") {
            config.catalog = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Whether state is kept on a shared server.
    pub fn is_shared(&self) -> bool {
        self.server_url.is_some()
    }

    /// Open the gateway this configuration selects.
    pub fn open_gateway(&self) -> Result<Arc<dyn Gateway>> {
        match &self.server_url {
            Some(url) => Ok(Arc::new(SharedGateway::new(url.clone(), self.timeout)?)),
            None => {
                std::fs::create_dir_all(&self.data_dir)?;
                Ok(Arc::new(LocalGateway::open(&self.data_dir)?))
            }
        }
    }

    /// Load the catalog, preferring the one the gateway serves.
    ///
    /// Falls back to the catalog file when the gateway has none or cannot be
    /// reached.
    pub async fn load_catalog(&self, gateway: &dyn Gateway) -> Result<Catalog> {
        match gateway.load_catalog().await {
            Ok(Some(catalog)) => return Ok(catalog),
            Ok(None) => {}
            Err(e) => tracing::warn!("could not fetch catalog ({}); reading {:?}", e, self.catalog),
        }
        let raw = std::fs::read_to_string(&self.catalog).map_err(|e| {
            Error::Config(format!("cannot read catalog {:?}: {}", self.catalog, e))
        })?;
        Ok(Catalog::from_json(&raw)?)
    }
}
