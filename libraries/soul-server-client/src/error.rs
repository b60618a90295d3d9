//! Error types for the Soul Server client.

use soul_core::SoulError;
use thiserror::Error;

/// Errors that can occur when interacting with a Soul Player server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Track unknown to the server
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// Server rejected the access token
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

impl From<ServerClientError> for SoulError {
    fn from(err: ServerClientError) -> Self {
        match err {
            ServerClientError::TrackNotFound(id) => SoulError::not_found("Track", id),
            other => SoulError::network(other.to_string()),
        }
    }
}
