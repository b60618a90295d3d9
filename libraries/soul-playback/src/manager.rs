//! Playback manager - main playback orchestrator
//!
//! Owns the audio graph, the crossfade controller, the queue, the clock and
//! the play history, and turns commands into changes on them.
//!
//! The manager does no I/O of its own. Time comes in as an explicit
//! `now` (elapsed since the engine started), stream URLs are requested through
//! [`take_stream_request`](PlaybackManager::take_stream_request) and fed back
//! with [`stream_resolved`](PlaybackManager::stream_resolved), and outward
//! events are collected until [`drain_events`](PlaybackManager::drain_events).

use crate::analyser::SharedAnalyser;
use crate::clock::{ClockState, PlaybackClock};
use crate::crossfade::{CrossfadeController, CrossfadePhase, MediaOutcome};
use crate::events::{PlaybackCommand, PlaybackEvent};
use crate::graph::{AudioGraph, MediaEvent};
use crate::history::PlayHistory;
use crate::queue::{QueueEngine, QueueState};
use crate::types::{PlaybackConfig, SlotId};
use serde::{Deserialize, Serialize};
use soul_core::types::{Track, TrackId};
use soul_core::HistoryStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request for a playable URL of the current track
///
/// Results are matched by `generation`; anything older than the latest
/// request is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Monotonic request number
    pub generation: u64,
    /// Track to resolve
    pub track_id: TrackId,
}

/// Everything the UI needs to render the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Queue contents
    pub queue: QueueState,
    /// Clock state
    pub clock: ClockState,
    /// Track behind the active slot
    pub active_track: Option<TrackId>,
    /// Volume, 0.0 to 1.0
    pub volume: f32,
    /// Repeat flag
    pub repeat: bool,
    /// Shuffle flag
    pub shuffle: bool,
    /// Crossfade controller phase
    pub phase: CrossfadePhase,
}

/// Main playback manager
pub struct PlaybackManager {
    graph: AudioGraph,
    crossfade: CrossfadeController,
    clock: PlaybackClock,
    queue: QueueEngine,
    history: PlayHistory,

    shuffle: bool,
    repeat: bool,

    // Stream resolution bookkeeping
    stream_generation: u64,
    pending_request: Option<StreamRequest>,
    outstanding_request: Option<StreamRequest>,

    // Last published clock values, for change detection
    last_position: (f64, f64),

    // Event queue for UI synchronization
    pending_events: Vec<PlaybackEvent>,
}

impl PlaybackManager {
    /// Create new playback manager
    ///
    /// The graph is not initialized here; the first command that can start
    /// audio does it.
    pub fn new(config: PlaybackConfig, graph: AudioGraph, store: Arc<dyn HistoryStore>) -> Self {
        let mut crossfade =
            CrossfadeController::new(config.crossfade, config.load_timeout(), config.volume);
        crossfade.set_repeat(config.repeat);

        Self {
            graph,
            crossfade,
            clock: PlaybackClock::new(),
            queue: QueueEngine::new(),
            history: PlayHistory::new(store, config.history_size),
            shuffle: config.shuffle,
            repeat: config.repeat,
            stream_generation: 0,
            pending_request: None,
            outstanding_request: None,
            last_position: (0.0, 0.0),
            pending_events: Vec::new(),
        }
    }

    /// Run a command
    pub fn execute(&mut self, command: PlaybackCommand) {
        debug!(command = ?command, "Executing playback command");
        match command {
            PlaybackCommand::Play => self.play(),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Seek(position) => self.seek(position),
            PlaybackCommand::SetVolume(level) => self.set_volume(level),
            PlaybackCommand::ToggleRepeat => self.toggle_repeat(),
            PlaybackCommand::ToggleShuffle => self.toggle_shuffle(),
            PlaybackCommand::Advance => self.advance(),
            PlaybackCommand::GoBack => self.go_back(),
            PlaybackCommand::EnqueueNext(track) => self.enqueue_next(track),
            PlaybackCommand::PlayImmediately(track) => self.play_immediately(track),
            PlaybackCommand::PlayFromCollection { track, collection } => {
                self.play_from_collection(track, &collection)
            }
        }
    }

    // ===== Playback Control =====

    /// Start or resume playback
    ///
    /// With nothing loaded yet, the current track (or the first upcoming one)
    /// is requested and starts once its stream arrives. The same happens when
    /// the loaded track is no longer the queue's current one, for example
    /// after the next track failed to resolve.
    pub fn play(&mut self) {
        self.ensure_graph();

        if self.queue.current().is_none()
            && self.crossfade.active_track().is_none()
            && self.queue.advance().is_some()
        {
            self.emit_queue_changed();
        }

        let current = self.queue.current().map(|t| t.id.clone());
        let stale = current.is_some()
            && current.as_ref() != self.crossfade.active_track()
            && current.as_ref() != self.crossfade.pending_track();

        if stale {
            if self.pending_request.is_none() && self.outstanding_request.is_none() {
                debug!(track_id = ?current, "Loaded track is not current, requesting it");
                self.request_current_stream();
            }
        } else {
            self.crossfade.play(&mut self.graph, &mut self.clock);
        }
        self.collect();
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.crossfade.pause(&mut self.graph, &mut self.clock);
        self.collect();
    }

    /// Seek the active track (seconds)
    pub fn seek(&mut self, position: f64) {
        self.crossfade
            .seek(&mut self.graph, &mut self.clock, position);
        self.collect();
    }

    /// Set volume (0.0 to 1.0)
    pub fn set_volume(&mut self, level: f32) {
        let previous = self.crossfade.volume();
        let level = self.crossfade.set_volume(&mut self.graph, level);
        if (level - previous).abs() > f32::EPSILON {
            self.pending_events.push(PlaybackEvent::VolumeChanged { level });
        }
        self.collect();
    }

    /// Flip the repeat flag
    pub fn toggle_repeat(&mut self) {
        self.repeat = !self.repeat;
        self.crossfade.set_repeat(self.repeat);
        self.pending_events.push(PlaybackEvent::RepeatChanged {
            enabled: self.repeat,
        });
    }

    /// Flip the shuffle flag
    ///
    /// Queue order is not affected.
    pub fn toggle_shuffle(&mut self) {
        self.shuffle = !self.shuffle;
        self.pending_events.push(PlaybackEvent::ShuffleChanged {
            enabled: self.shuffle,
        });
    }

    // ===== Queue Navigation =====

    /// Skip to the next queued track
    ///
    /// With nothing upcoming, playback pauses instead.
    pub fn advance(&mut self) {
        self.ensure_graph();
        self.advance_queue();
        self.collect();
    }

    /// Return to the previous track; a no-op if nothing was played
    pub fn go_back(&mut self) {
        self.ensure_graph();
        if self.queue.go_back().is_some() {
            self.emit_queue_changed();
            self.sync_current_track();
        } else {
            debug!("Nothing to go back to");
        }
        self.collect();
    }

    /// Append a track to the upcoming list
    pub fn enqueue_next(&mut self, track: Track) {
        if self.queue.enqueue_next(track) {
            self.emit_queue_changed();
        }
    }

    /// Play a track now and record it in the history
    pub fn play_immediately(&mut self, track: Track) {
        self.ensure_graph();
        self.history.record_play(&track);
        self.queue.play_immediately(track);
        self.emit_queue_changed();
        self.sync_current_track();
        self.collect();
    }

    /// Replace the queue from a collection and play `track`
    pub fn play_from_collection(&mut self, track: Track, collection: &[Track]) {
        self.ensure_graph();
        self.queue.play_from_collection(track.clone(), collection);

        let predecessors: Vec<Track> = self.queue.played().iter().cloned().collect();
        self.history
            .record_collection(&track, &predecessors, collection);

        self.emit_queue_changed();
        self.sync_current_track();
        self.collect();
    }

    // ===== Engine Driving =====

    /// Drain slot notifications and run timers
    pub fn tick(&mut self, now: Duration) {
        for slot in SlotId::ALL {
            for event in self.graph.slot_mut(slot).drain_events() {
                self.dispatch_media_event(slot, event, now);
            }
        }
        self.crossfade
            .poll(&mut self.graph, &mut self.clock, now);
        self.collect();
    }

    /// Feed one media notification from a slot
    pub fn handle_media_event(&mut self, slot: SlotId, event: MediaEvent, now: Duration) {
        self.dispatch_media_event(slot, event, now);
        self.collect();
    }

    /// Take the stream request for the current track, if one is due
    pub fn take_stream_request(&mut self) -> Option<StreamRequest> {
        let request = self.pending_request.take()?;
        self.outstanding_request = Some(request.clone());
        Some(request)
    }

    /// Feed a resolved stream URL back
    ///
    /// Returns `false` if the request is stale and the URL was dropped.
    pub fn stream_resolved(&mut self, request: &StreamRequest, url: String, now: Duration) -> bool {
        if !self.accept_result(request) {
            return false;
        }
        debug!(track_id = %request.track_id, url = %url, "Stream resolved");
        self.crossfade.load(
            &mut self.graph,
            &mut self.clock,
            request.track_id.clone(),
            url,
            now,
        );
        self.collect();
        true
    }

    /// Report that a stream could not be resolved
    ///
    /// The current track stays selected but nothing is loaded; a later
    /// `play` asks again. Returns `false` for stale requests.
    pub fn stream_failed(&mut self, request: &StreamRequest, reason: &str) -> bool {
        if !self.accept_result(request) {
            return false;
        }
        warn!(track_id = %request.track_id, reason, "Stream resolution failed");
        self.pending_events.push(PlaybackEvent::LoadFailed {
            track_id: request.track_id.clone(),
            reason: reason.to_string(),
        });
        self.crossfade.halt_if_ended(&mut self.clock);
        self.collect();
        true
    }

    /// Tear down the audio graph (player unmounted)
    ///
    /// Queue, flags and history survive; the next command re-initializes.
    pub fn dispose(&mut self) {
        self.graph.dispose();
        self.crossfade.reset();
        self.clock.reset();
        self.stream_generation += 1;
        self.pending_request = None;
        self.outstanding_request = None;
        info!("Playback manager disposed");
        self.collect();
    }

    // ===== State Queries =====

    /// Current state for the UI
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            queue: self.queue.state().clone(),
            clock: self.clock.state(),
            active_track: self.crossfade.active_track().cloned(),
            volume: self.crossfade.volume(),
            repeat: self.repeat,
            shuffle: self.shuffle,
            phase: self.crossfade.phase(),
        }
    }

    /// Queue state
    pub fn queue(&self) -> &QueueState {
        self.queue.state()
    }

    /// Clock state
    pub fn clock(&self) -> ClockState {
        self.clock.state()
    }

    /// Whether playback is active
    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    /// Slot currently driving the clock
    pub fn active_slot(&self) -> SlotId {
        self.crossfade.active_slot()
    }

    /// Read handle to the spectrum analyser, once initialized
    pub fn analyser(&self) -> Option<SharedAnalyser> {
        self.graph.analyser()
    }

    /// Play history
    pub fn history(&self) -> &PlayHistory {
        &self.history
    }

    /// Audio graph
    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    // ===== Event Queue =====

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Check if there are pending events
    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    // ===== Internals =====

    fn ensure_graph(&mut self) {
        if self.graph.is_initialized() {
            return;
        }
        match self.graph.initialize() {
            Ok(true) => {
                for slot in self.graph.degraded_slots() {
                    self.pending_events
                        .push(PlaybackEvent::AnalysisDegraded { slot });
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Audio graph unavailable, playing without analysis"),
        }
    }

    fn dispatch_media_event(&mut self, slot: SlotId, event: MediaEvent, now: Duration) {
        let outcome =
            self.crossfade
                .handle_media_event(&mut self.graph, &mut self.clock, slot, event, now);
        if outcome == MediaOutcome::TrackEnded {
            self.advance_queue();
        }
    }

    fn advance_queue(&mut self) {
        if self.queue.advance().is_some() {
            self.emit_queue_changed();
            self.sync_current_track();
        } else {
            debug!("Queue exhausted, pausing");
            self.crossfade.pause(&mut self.graph, &mut self.clock);
        }
    }

    /// Ask for the current track's stream unless it already plays
    fn sync_current_track(&mut self) {
        let Some(current) = self.queue.current() else {
            return;
        };
        if self.crossfade.active_track() == Some(&current.id)
            && self.crossfade.pending_track().is_none()
        {
            // Drop whatever was in flight for an earlier selection
            self.stream_generation += 1;
            self.pending_request = None;
            self.outstanding_request = None;
            return;
        }
        self.request_current_stream();
    }

    fn request_current_stream(&mut self) {
        let Some(current) = self.queue.current() else {
            return;
        };
        self.stream_generation += 1;
        let request = StreamRequest {
            generation: self.stream_generation,
            track_id: current.id.clone(),
        };
        debug!(track_id = %request.track_id, generation = request.generation, "Requesting stream");
        self.pending_request = Some(request);
        self.outstanding_request = None;
    }

    fn accept_result(&mut self, request: &StreamRequest) -> bool {
        if request.generation != self.stream_generation {
            debug!(
                track_id = %request.track_id,
                generation = request.generation,
                latest = self.stream_generation,
                "Dropping stale stream result"
            );
            return false;
        }
        self.outstanding_request = None;
        true
    }

    /// Move controller events out and publish clock movement
    fn collect(&mut self) {
        self.pending_events.extend(self.crossfade.drain_events());

        let position = (self.clock.elapsed(), self.clock.duration());
        if position != self.last_position {
            self.last_position = position;
            self.pending_events.push(PlaybackEvent::PositionChanged {
                elapsed: position.0,
                duration: position.1,
            });
        }
    }

    /// Emit a queue changed event
    fn emit_queue_changed(&mut self) {
        let state = self.queue.state();
        self.pending_events.push(PlaybackEvent::QueueChanged {
            current: state.current.as_ref().map(|t| t.id.clone()),
            upcoming: state.upcoming.len(),
            played: state.played.len(),
        });
    }
}

impl std::fmt::Debug for PlaybackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackManager")
            .field("queue", self.queue.state())
            .field("clock", &self.clock)
            .field("crossfade", &self.crossfade)
            .field("shuffle", &self.shuffle)
            .field("repeat", &self.repeat)
            .field("stream_generation", &self.stream_generation)
            .finish_non_exhaustive()
    }
}
