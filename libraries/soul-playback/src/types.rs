//! Core types for playback management

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One of the two fixed playback slots
///
/// Also used as the "active slot" marker: the controller keeps exactly one
/// `SlotId` as active and only reassigns it when a transition settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotId {
    /// First slot
    A,
    /// Second slot
    B,
}

impl SlotId {
    /// The opposite slot
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    /// Index into a two-element slot array
    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }

    /// Both slots in index order
    pub const ALL: [SlotId; 2] = [SlotId::A, SlotId::B];
}

/// Crossfade settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeSettings {
    /// Length of the gain crossfade in milliseconds (default: 1000)
    pub duration_ms: u32,

    /// Number of discrete gain steps per crossfade (default: 10)
    pub steps: u32,

    /// Delay before a silently swapped slot starts playing (default: 100)
    pub settle_delay_ms: u32,
}

impl Default for CrossfadeSettings {
    fn default() -> Self {
        Self {
            duration_ms: 1000,
            steps: 10,
            settle_delay_ms: 100,
        }
    }
}

impl CrossfadeSettings {
    /// Interval between two gain steps
    pub fn step_interval(&self) -> Duration {
        let steps = self.steps.max(1);
        Duration::from_millis(u64::from(self.duration_ms)) / steps
    }

    /// Settle delay as a `Duration`
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.settle_delay_ms))
    }
}

/// Frequency analyser settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserSettings {
    /// FFT window size, power of two (default: 512, i.e. 256 bins)
    pub fft_size: usize,

    /// Smoothing time constant in `[0, 1)` (default: 0.85)
    pub smoothing: f32,

    /// Level mapped to byte 0 (default: -100 dB)
    pub min_db: f32,

    /// Level mapped to byte 255 (default: -30 dB)
    pub max_db: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing: 0.85,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Configuration for the playback manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Maximum persisted history size (default: 50)
    pub history_size: usize,

    /// Initial volume, 0.0 to 1.0 (default: 1.0)
    pub volume: f32,

    /// Initial repeat flag (default: false)
    pub repeat: bool,

    /// Initial shuffle flag (default: false)
    pub shuffle: bool,

    /// Give up on a load whose metadata never arrives (default: 15000 ms)
    ///
    /// `None` leaves such a load pending forever.
    pub load_timeout_ms: Option<u64>,

    /// Driver tick interval used by the async service (default: 25 ms)
    pub tick_interval_ms: u64,

    /// Crossfade settings
    pub crossfade: CrossfadeSettings,

    /// Analyser settings
    pub analyser: AnalyserSettings,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            history_size: 50,
            volume: 1.0,
            repeat: false,
            shuffle: false,
            load_timeout_ms: Some(15_000),
            tick_interval_ms: 25,
            crossfade: CrossfadeSettings::default(),
            analyser: AnalyserSettings::default(),
        }
    }
}

impl PlaybackConfig {
    /// Parse a config from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json).map_err(soul_core::SoulError::from)?)
    }

    /// Load timeout as a `Duration`
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// Tick interval as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
