//! Candymap client side: persistence gateways and player sessions.
//!
//! A [`Session`] holds one player's visits and notes and talks to a
//! [`Gateway`], which is either a per-device RocksDB store or the shared
//! server.
//!
//! ```no_run
//! use candymap_gateway::{ClientConfig, Session};
//! use std::sync::Arc;
//!
//! # async fn run() -> candymap_gateway::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let gateway = config.open_gateway()?;
//! let catalog = Arc::new(config.load_catalog(gateway.as_ref()).await?);
//!
//! let mut session = Session::open("ana", catalog, gateway).await?;
//! let visit = session.mark_visited("A").await?;
//! if visit.completed.is_some() {
//!     println!("every house visited!");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod session;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use gateway::{Gateway, LocalGateway, Scores, SharedGateway};
pub use session::{Session, Visit};
