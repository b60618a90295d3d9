//! Error types for playback management

use crate::types::SlotId;
use soul_core::SoulError;
use thiserror::Error;

/// Playback errors
///
/// Most of these never reach a command caller: the manager recovers locally
/// and leaves a log line plus a [`PlaybackEvent`](crate::PlaybackEvent).
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The platform refused to start playback (e.g. autoplay policy)
    #[error("Playback rejected: {0}")]
    PlayRejected(String),

    /// The audio context could not be created or resumed
    #[error("Audio context unavailable: {0}")]
    ContextUnavailable(String),

    /// A slot element could not be attached to the analysis tap
    #[error("Cannot attach slot {slot:?} to analyser: {reason}")]
    SourceAttach {
        /// Slot whose element failed to attach
        slot: SlotId,
        /// Platform-provided reason
        reason: String,
    },

    /// The playback service task has stopped
    #[error("Playback service stopped")]
    ServiceStopped,

    /// Error from a collaborator store
    #[error(transparent)]
    Store(#[from] SoulError),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
