//! Candymap server binary
//!
//! Serves the shared game state over HTTP.

use candymap_server::{CandyServer, ServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line overrides; everything else comes from the environment.
#[derive(Debug, Parser)]
#[command(name = "candymap-server", version, about = "Shared store for the Candymap game")]
struct Args {
    /// Listen address (overrides CANDYMAP_API_ADDR)
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// JSON document path (overrides CANDYMAP_DB_FILE)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Catalog path (overrides CANDYMAP_CATALOG)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Frontend directory to serve at / (overrides CANDYMAP_STATIC_DIR)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candymap_server=info,candymap_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.addr {
        config.api_addr = addr;
    }
    if let Some(db) = args.db {
        config.db_file = db;
    }
    if let Some(catalog) = args.catalog {
        config.catalog = catalog;
    }
    if args.static_dir.is_some() {
        config.static_dir = args.static_dir;
    }

    tracing::info!("Starting Candymap server");

    let server = CandyServer::new(config)?;
    server.run().await?;

    Ok(())
}
