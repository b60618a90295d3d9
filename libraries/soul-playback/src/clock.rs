//! Playback clock
//!
//! One elapsed/duration/seek view over whichever slot is currently
//! authoritative. Every write clamps `elapsed` into `[0, duration]`; bad input
//! is corrected silently.

use serde::{Deserialize, Serialize};

/// Observable clock state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClockState {
    /// Whether playback is active
    pub is_playing: bool,
    /// Elapsed seconds, always within `[0, duration]`
    pub elapsed: f64,
    /// Duration in seconds, 0 until metadata arrives
    pub duration: f64,
    /// Seek waiting to be applied to the active slot
    pub pending_seek: Option<f64>,
}

/// Playback clock
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    state: ClockState,
    suppressed: bool,
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl PlaybackClock {
    /// Create a stopped clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the state
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Whether playback is active
    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    /// Elapsed seconds
    pub fn elapsed(&self) -> f64 {
        self.state.elapsed
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.state.duration
    }

    /// Set the playing flag; returns `true` if it changed
    pub fn set_playing(&mut self, playing: bool) -> bool {
        let changed = self.state.is_playing != playing;
        self.state.is_playing = playing;
        changed
    }

    /// Adopt a duration reported by loaded metadata and re-clamp elapsed
    pub fn set_max_duration(&mut self, duration: f64) {
        self.state.duration = sanitize(duration).max(0.0);
        self.state.elapsed = self.clamp(self.state.elapsed);
    }

    /// Set elapsed, clamped into `[0, duration]`
    pub fn set_progress(&mut self, elapsed: f64) {
        self.state.elapsed = self.clamp(elapsed);
    }

    /// Feed a position reported by the active slot
    ///
    /// Dropped while updates are suppressed. Returns `true` if applied.
    pub fn observe_position(&mut self, position: f64) -> bool {
        if self.suppressed {
            return false;
        }
        self.set_progress(position);
        true
    }

    /// Request a seek; the controller applies it once
    ///
    /// Negative and non-finite requests become 0. The upper bound is applied
    /// when the seek lands, since the duration may not be known yet.
    pub fn request_seek(&mut self, position: f64) {
        self.state.pending_seek = Some(sanitize(position).max(0.0));
    }

    /// Take the pending seek, clearing it
    pub fn take_pending_seek(&mut self) -> Option<f64> {
        self.state.pending_seek.take()
    }

    /// Stop following slot positions (the authoritative slot is changing)
    pub fn suppress_updates(&mut self) {
        self.suppressed = true;
    }

    /// Follow slot positions again
    pub fn resume_updates(&mut self) {
        self.suppressed = false;
    }

    /// Whether slot positions are being ignored
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Back to a stopped, empty clock
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn clamp(&self, value: f64) -> f64 {
        sanitize(value).clamp(0.0, self.state.duration)
    }
}
