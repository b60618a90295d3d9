//! Main Soul Player Server client.

use crate::error::{Result, ServerClientError};
use crate::types::{ServerConfig, ServerInfo, StreamUrlResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use soul_core::{StreamResolver, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Client for a Soul Player Server.
///
/// Resolves track ids to time-limited stream URLs and implements
/// [`StreamResolver`] so the playback service can use it directly.
///
/// # Example
///
/// ```no_run
/// use soul_server_client::{ServerConfig, SoulServerClient};
///
/// # async fn run() -> soul_server_client::Result<()> {
/// let client = SoulServerClient::new(ServerConfig::with_token(
///     "https://music.example.com",
///     "token",
/// ))?;
///
/// let stream = client.stream_url("track-1").await?;
/// println!("{} (valid for {}s)", stream.url, stream.expires_in);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SoulServerClient {
    http: Client,
    base: Url,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SoulServerClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let base = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(format!("SoulPlayer/{} (Web)", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            access_token: Arc::new(RwLock::new(config.access_token)),
        })
    }

    /// Get the server URL, without a trailing slash.
    pub fn url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Check if the client has an access token.
    pub async fn is_authenticated(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// Replace the access token (e.g., after the host refreshed it).
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    /// Test the connection to the server.
    ///
    /// This does not require authentication.
    pub async fn test_connection(&self) -> Result<ServerInfo> {
        let url = self.endpoint(&["api", "info"])?;
        debug!(url = %url, "Testing server connection");

        let response = self.http.get(url).send().await.map_err(connect_error)?;
        let status = response.status();

        if status.is_success() {
            let info: ServerInfo = response.json().await.map_err(|e| {
                ServerClientError::ParseError(format!("Failed to parse server info: {}", e))
            })?;

            info!(
                name = %info.name,
                version = %info.version,
                features = ?info.features,
                "Connected to server"
            );

            Ok(info)
        } else {
            Err(server_error(response).await)
        }
    }

    /// Get a streaming URL for a track.
    ///
    /// The URL is time-limited and should be used promptly.
    pub async fn stream_url(&self, track_id: &str) -> Result<StreamUrlResponse> {
        let url = self.endpoint(&["api", "library", "tracks", track_id, "stream"])?;
        debug!(url = %url, track_id = %track_id, "Getting stream URL");

        let mut request = self.http.get(url);
        if let Some(token) = self.access_token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(connect_error)?;
        match response.status() {
            status if status.is_success() => response.json().await.map_err(|e| {
                ServerClientError::ParseError(format!("Failed to parse stream response: {}", e))
            }),
            StatusCode::UNAUTHORIZED => Err(ServerClientError::AuthRequired),
            StatusCode::NOT_FOUND => Err(ServerClientError::TrackNotFound(track_id.to_string())),
            _ => Err(server_error(response).await),
        }
    }

    /// Base URL joined with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServerClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl StreamResolver for SoulServerClient {
    async fn resolve_stream(&self, track_id: &TrackId) -> soul_core::Result<String> {
        match self.stream_url(track_id.as_str()).await {
            Ok(stream) => {
                debug!(
                    track_id = %track_id,
                    expires_in = stream.expires_in,
                    "Resolved stream URL"
                );
                Ok(stream.url)
            }
            Err(e) => {
                warn!(track_id = %track_id, error = %e, "Stream resolution failed");
                Err(e.into())
            }
        }
    }
}

fn connect_error(e: reqwest::Error) -> ServerClientError {
    if e.is_connect() || e.is_timeout() {
        ServerClientError::ServerUnreachable(e.to_string())
    } else {
        ServerClientError::Request(e)
    }
}

async fn server_error(response: reqwest::Response) -> ServerClientError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ServerClientError::ServerError { status, message }
}
