//! Audio graph: the audio context, the analyser, and the two playback slots
//!
//! The graph is created once per mounted player. Its two slots live for the
//! whole session and are reused for every track, because a platform media
//! element can only be wired into an audio context once.
//!
//! Construction of the expensive parts (context, analyser, source wiring) is
//! deferred to [`AudioGraph::initialize`], which callers invoke on the first
//! user interaction so the platform's autoplay policy is satisfied.

use crate::analyser::{Analyser, SharedAnalyser};
use crate::error::{PlaybackError, Result};
use crate::types::{AnalyserSettings, SlotId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Notification fired by a media element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// Metadata for the current source is available
    MetadataLoaded {
        /// Track duration in seconds
        duration: f64,
    },

    /// Playback position moved
    TimeUpdate {
        /// Position in seconds
        position: f64,
    },

    /// Playback reached the end of the source
    Ended,
}

/// Platform media element backing one slot
///
/// Mirrors the subset of an HTML media element the engine relies on. All
/// operations are fire-and-forget except `play`, which the platform may refuse.
pub trait MediaElement: Send {
    /// Set or clear the source URL; clearing also stops decoding
    fn set_source(&mut self, url: Option<&str>);

    /// Currently assigned source URL
    fn source(&self) -> Option<&str>;

    /// Start or resume playback
    ///
    /// # Errors
    /// Returns an error if the platform refuses to play (autoplay policy,
    /// missing source, decoder failure)
    fn play(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self);

    /// Whether the element is paused
    fn is_paused(&self) -> bool;

    /// Set output gain, 0.0 to 1.0
    fn set_gain(&mut self, gain: f32);

    /// Current output gain
    fn gain(&self) -> f32;

    /// Current position in seconds
    fn position(&self) -> f64;

    /// Jump to a position in seconds
    fn seek(&mut self, position: f64);

    /// Take the notifications fired since the last call
    fn drain_events(&mut self) -> Vec<MediaEvent>;
}

/// Audio context lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    /// Created but held back by the platform (autoplay policy)
    Suspended,
    /// Processing audio
    Running,
    /// Released; cannot be resumed
    Closed,
}

/// Platform audio processing context
pub trait AudioContext: Send {
    /// Current state
    fn state(&self) -> ContextState;

    /// Move a suspended context to running
    ///
    /// # Errors
    /// Returns an error if the platform refuses to resume
    fn resume(&mut self) -> Result<()>;

    /// Route a slot's element through the analyser to the output
    ///
    /// The context feeds the mixed signal into `analyser`.
    ///
    /// # Errors
    /// Returns an error if the element is already wired into a context
    fn connect_source(&mut self, slot: SlotId, analyser: SharedAnalyser) -> Result<()>;

    /// Release the context
    fn close(&mut self);
}

/// Creates the platform audio context on demand
pub trait ContextFactory: Send {
    /// Create a fresh context
    ///
    /// # Errors
    /// Returns an error if the platform cannot provide one
    fn create(&mut self) -> Result<Box<dyn AudioContext>>;
}

/// Analysis tap status of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapState {
    /// Not wired yet
    Detached,
    /// Feeding the analyser
    Attached,
    /// Wiring failed; the slot plays without analysis
    Degraded,
}

/// One of the two long-lived playback paths
pub struct PlaybackSlot {
    id: SlotId,
    element: Box<dyn MediaElement>,
    tap: TapState,
}

impl PlaybackSlot {
    fn new(id: SlotId, element: Box<dyn MediaElement>) -> Self {
        Self {
            id,
            element,
            tap: TapState::Detached,
        }
    }

    /// Slot identity
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Analysis tap status
    pub fn tap(&self) -> TapState {
        self.tap
    }

    /// Point the slot at a new source, silent and paused
    pub fn load(&mut self, url: &str) {
        self.element.pause();
        self.element.set_gain(0.0);
        self.element.set_source(Some(url));
    }

    /// Stop and release the current source
    pub fn clear(&mut self) {
        self.element.pause();
        self.element.set_source(None);
        self.element.set_gain(0.0);
    }

    /// Source URL, if any
    pub fn source(&self) -> Option<&str> {
        self.element.source()
    }

    /// Start the element
    pub fn play(&mut self) -> Result<()> {
        self.element.play()
    }

    /// Pause the element
    pub fn pause(&mut self) {
        self.element.pause();
    }

    /// Whether the element is paused
    pub fn is_paused(&self) -> bool {
        self.element.is_paused()
    }

    /// Set output gain, clamped to `[0, 1]`
    pub fn set_gain(&mut self, gain: f32) {
        self.element.set_gain(gain.clamp(0.0, 1.0));
    }

    /// Output gain
    pub fn gain(&self) -> f32 {
        self.element.gain()
    }

    /// Position in seconds
    pub fn position(&self) -> f64 {
        self.element.position()
    }

    /// Seek to a position in seconds
    pub fn seek(&mut self, position: f64) {
        self.element.seek(position.max(0.0));
    }

    /// Take pending media notifications
    pub fn drain_events(&mut self) -> Vec<MediaEvent> {
        self.element.drain_events()
    }
}

/// Owner of the audio context, the analyser and both slots
pub struct AudioGraph {
    factory: Box<dyn ContextFactory>,
    context: Option<Box<dyn AudioContext>>,
    analyser: Option<SharedAnalyser>,
    settings: AnalyserSettings,
    slots: [PlaybackSlot; 2],
}

impl AudioGraph {
    /// Create a graph around two platform elements
    ///
    /// Nothing is wired until [`initialize`](Self::initialize) runs.
    pub fn new(
        factory: Box<dyn ContextFactory>,
        slot_a: Box<dyn MediaElement>,
        slot_b: Box<dyn MediaElement>,
        settings: AnalyserSettings,
    ) -> Self {
        Self {
            factory,
            context: None,
            analyser: None,
            settings,
            slots: [
                PlaybackSlot::new(SlotId::A, slot_a),
                PlaybackSlot::new(SlotId::B, slot_b),
            ],
        }
    }

    /// Create the context and analyser and wire both slots
    ///
    /// Idempotent: once a context exists, further calls do nothing. A slot
    /// that cannot be wired is marked [`TapState::Degraded`] and keeps
    /// playing without analysis. Returns `true` when this call did the work.
    ///
    /// # Errors
    /// Returns an error only if the context itself cannot be created; slots
    /// still play through their elements in that case.
    pub fn initialize(&mut self) -> Result<bool> {
        if self.context.is_some() {
            return Ok(false);
        }

        let mut context = self
            .factory
            .create()
            .map_err(|e| PlaybackError::ContextUnavailable(e.to_string()))?;
        let analyser = Analyser::shared(&self.settings);

        for slot in &mut self.slots {
            if slot.tap == TapState::Attached {
                continue;
            }
            match context.connect_source(slot.id, analyser.clone()) {
                Ok(()) => slot.tap = TapState::Attached,
                Err(e) => {
                    warn!(slot = ?slot.id, error = %e, "Analysis tap unavailable, continuing without it");
                    slot.tap = TapState::Degraded;
                }
            }
        }

        info!(state = ?context.state(), "Audio graph initialized");
        self.context = Some(context);
        self.analyser = Some(analyser);
        Ok(true)
    }

    /// Whether a context exists
    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Context state, `None` before initialization
    pub fn context_state(&self) -> Option<ContextState> {
        self.context.as_ref().map(|c| c.state())
    }

    /// Read handle to the analyser, `None` before initialization
    pub fn analyser(&self) -> Option<SharedAnalyser> {
        self.analyser.clone()
    }

    /// Resume a suspended context
    ///
    /// Without a context this is a no-op: elements still play directly.
    ///
    /// # Errors
    /// Returns an error if the platform refuses to resume
    pub fn ensure_running(&mut self) -> Result<()> {
        let Some(context) = self.context.as_mut() else {
            return Ok(());
        };
        match context.state() {
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                debug!("Resuming suspended audio context");
                context.resume()
            }
            ContextState::Closed => Err(PlaybackError::ContextUnavailable(
                "audio context is closed".into(),
            )),
        }
    }

    /// Resume the context if needed, then start a slot
    ///
    /// A failed resume is logged and playback is still attempted.
    ///
    /// # Errors
    /// Returns the element's rejection
    pub fn start_slot(&mut self, id: SlotId) -> Result<()> {
        if let Err(e) = self.ensure_running() {
            warn!(error = %e, "Could not resume audio context before play");
        }
        self.slot_mut(id).play()
    }

    /// Release the context and analyser
    ///
    /// Safe to call when never initialized, and more than once. Slot sources
    /// are cleared; the slots themselves are kept.
    pub fn dispose(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
            slot.tap = TapState::Detached;
        }
        if let Some(mut context) = self.context.take() {
            context.close();
            info!("Audio graph disposed");
        }
        self.analyser = None;
    }

    /// Borrow a slot
    pub fn slot(&self, id: SlotId) -> &PlaybackSlot {
        &self.slots[id.index()]
    }

    /// Borrow a slot mutably
    pub fn slot_mut(&mut self, id: SlotId) -> &mut PlaybackSlot {
        &mut self.slots[id.index()]
    }

    /// Slots whose analysis tap failed
    pub fn degraded_slots(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .filter(|s| s.tap == TapState::Degraded)
            .map(|s| s.id)
            .collect()
    }
}
