//! R2 Uploader Library
//!
//! HTTP relay that stores files in Cloudflare R2 or any S3-compatible store.
//!
//! # Features
//!
//! - **URL ingestion**: fetch a remote file and store it under a given key
//! - **Direct upload**: accept a multipart file and store it
//! - **Bounded memory**: payloads above the configured limit are rejected,
//!   including when the remote server misreports the length
//! - **Shared token auth**: a single persisted bearer token guards uploads
//! - **Per-request credentials**: bucket, endpoint and keys travel with each call
//!
//! # Example
//!
//! ```no_run
//! use r2_uploader::{config::Config, server::{AppState, Server}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = Server::new(AppState::new(config)?).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod router;
pub mod s3;
pub mod server;
pub mod token;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
