//! Playback events and commands
//!
//! Commands flow in from the UI, events flow out to it. Events are queued by
//! the manager and drained in batches; nothing is delivered synchronously.

use crate::types::SlotId;
use serde::{Deserialize, Serialize};
use soul_core::types::{Track, TrackId};

/// Commands accepted by the playback manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackCommand {
    /// Start or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Seek the active slot (seconds)
    Seek(f64),
    /// Set volume, 0.0 to 1.0
    SetVolume(f32),
    /// Flip the repeat flag
    ToggleRepeat,
    /// Flip the shuffle flag
    ToggleShuffle,
    /// Skip to the next queued track
    Advance,
    /// Return to the previous track
    GoBack,
    /// Append a track to the upcoming list
    EnqueueNext(Track),
    /// Play a track now
    PlayImmediately(Track),
    /// Replace the queue from a collection and play `track`
    PlayFromCollection {
        /// Selected track
        track: Track,
        /// Ordered collection containing it
        collection: Vec<Track>,
    },
}

/// Events emitted by the playback system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback started or stopped
    StateChanged {
        /// Whether playback is now active
        is_playing: bool,
    },

    /// Queue contents changed
    QueueChanged {
        /// Current track
        current: Option<TrackId>,
        /// Number of upcoming tracks
        upcoming: usize,
        /// Number of played tracks
        played: usize,
    },

    /// The track behind the active slot changed
    ///
    /// Emitted when a load or transition settles.
    TrackChanged {
        /// ID of the new (current) track
        track_id: TrackId,
        /// ID of the previous track (if any)
        previous_track_id: Option<TrackId>,
    },

    /// Clock moved or duration became known
    PositionChanged {
        /// Elapsed seconds
        elapsed: f64,
        /// Duration in seconds
        duration: f64,
    },

    /// A source started loading into a slot
    LoadStarted {
        /// Track being loaded
        track_id: TrackId,
        /// Slot receiving it
        slot: SlotId,
    },

    /// Crossfade started between two tracks
    CrossfadeStarted {
        /// ID of the outgoing track
        from_track_id: Option<TrackId>,
        /// ID of the incoming track
        to_track_id: TrackId,
        /// Duration of the crossfade in milliseconds
        duration_ms: u32,
    },

    /// Crossfade progress update (for UI animations)
    CrossfadeProgress {
        /// Progress from 0.0 (just started) to 1.0 (complete)
        progress: f32,
    },

    /// Crossfade or silent swap finished and slot roles swapped
    CrossfadeCompleted,

    /// Track finished playing naturally (reached end)
    TrackFinished {
        /// ID of the finished track
        track_id: TrackId,
    },

    /// Volume changed
    VolumeChanged {
        /// New volume level (0.0 to 1.0)
        level: f32,
    },

    /// Repeat flag changed
    RepeatChanged {
        /// New value
        enabled: bool,
    },

    /// Shuffle flag changed
    ShuffleChanged {
        /// New value
        enabled: bool,
    },

    /// A track could not be loaded (resolution failed or metadata timed out)
    LoadFailed {
        /// Track that failed
        track_id: TrackId,
        /// Human-readable reason
        reason: String,
    },

    /// The platform refused to start playback
    PlaybackRejected {
        /// Platform-provided reason
        reason: String,
    },

    /// A slot plays without visual analysis
    AnalysisDegraded {
        /// Affected slot
        slot: SlotId,
    },
}
