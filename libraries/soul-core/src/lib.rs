//! Soul Player Core
//!
//! Platform-agnostic core types, traits, and error handling shared by the
//! playback engine, the visualizer, and the server client.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`
//! - **Collaborator Traits**: `StreamResolver` (track id to stream URL) and
//!   `HistoryStore` (persisted play history)
//! - **Error Handling**: Unified `SoulError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use soul_core::types::{Track, TrackId};
//! use std::time::Duration;
//!
//! let track = Track::new("t-1", "Intro", "Some Artist")
//!     .with_album("Debut")
//!     .with_duration(Duration::from_secs(212));
//!
//! assert_eq!(track.id, TrackId::new("t-1"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SoulError};
pub use traits::{HistoryStore, StreamResolver};
pub use types::{Track, TrackId};
