//! Candymap Server - shared backing store for the visit and vote game
//!
//! Persists votes, visit progress, private notes, the public note feed and
//! published scores in a single JSON document, and serves them over HTTP.
//!
//! # Architecture
//!
//! - **Storage**: one JSON document, every mutation serialized behind a lock
//! - **API**: HTTP endpoints for votes, progress, notes and rankings
//! - **Node**: configuration and server startup
//!
//! # Example
//!
//! ```no_run
//! use candymap_server::{CandyServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_env()?;
//!     let server = CandyServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod node;
pub mod storage;

pub use api::build_router;
pub use error::{ApiError, Error, Result};
pub use node::{CandyServer, ServerConfig, ServerState};
pub use storage::{Document, Storage};
