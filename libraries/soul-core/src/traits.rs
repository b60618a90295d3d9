/// Collaborator traits for Soul Player
///
/// The playback core never talks to the network or to persistent storage
/// directly. Both are reached through these traits so that desktop, web and
/// test builds can plug in their own implementations.
use crate::error::Result;
use crate::types::{Track, TrackId};
use async_trait::async_trait;

/// Resolves a track id to a playable stream URL
///
/// Implementations must not retry on their own. A failed resolution is
/// reported once and the caller decides what happens to the pending load.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve the stream URL for a track
    ///
    /// # Errors
    /// Returns an error if the URL cannot be fetched or the track is unknown
    async fn resolve_stream(&self, track_id: &TrackId) -> Result<String>;
}

/// Key-value play history store
///
/// Contract: `read` returns the stored list (newest first) or `None` when
/// nothing has been written yet. `write` replaces the whole list.
pub trait HistoryStore: Send + Sync {
    /// Read the persisted history
    ///
    /// # Errors
    /// Returns an error if the store is unreadable or the payload is corrupt
    fn read(&self) -> Result<Option<Vec<Track>>>;

    /// Replace the persisted history
    ///
    /// # Errors
    /// Returns an error if the store rejects the write
    fn write(&self, tracks: &[Track]) -> Result<()>;
}
