//! Types for Soul Player Server API requests and responses.

use serde::{Deserialize, Serialize};

/// Configuration for connecting to a Soul Player server.
///
/// Missing fields fall back to defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "https://music.example.com")
    pub url: String,
    /// Current access token (if authenticated)
    pub access_token: Option<String>,
    /// Whole-request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Connect timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: None,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a config with an existing access token.
    pub fn with_token(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }
}

/// Information about the Soul Player server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub features: Vec<String>,
    /// Whether the server requires authentication
    #[serde(default)]
    pub requires_auth: bool,
}

/// Response from the stream URL endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamUrlResponse {
    pub url: String,
    /// URL validity in seconds
    pub expires_in: u64,
}
