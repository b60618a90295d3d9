//! Soul Player Server Client
//!
//! HTTP client for the Soul Player Server's stream endpoint.
//!
//! [`SoulServerClient`] resolves a track id to a time-limited stream URL
//! (`GET {base}/api/library/tracks/{id}/stream`) and implements
//! [`soul_core::StreamResolver`], so it can be handed straight to the
//! playback service.
//!
//! # Example
//!
//! ```no_run
//! use soul_server_client::{ServerConfig, SoulServerClient};
//! use soul_core::StreamResolver;
//! use std::sync::Arc;
//!
//! # fn run() -> soul_server_client::Result<()> {
//! let client = SoulServerClient::new(ServerConfig::with_token(
//!     "https://music.example.com",
//!     "token",
//! ))?;
//! let resolver: Arc<dyn StreamResolver> = Arc::new(client);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use client::SoulServerClient;
pub use error::{Result, ServerClientError};
pub use types::{ServerConfig, ServerInfo, StreamUrlResponse};
