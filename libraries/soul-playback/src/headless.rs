//! Headless platform
//!
//! In-process stand-ins for the media elements and audio context. They keep
//! their state behind shared handles so a driver (test, CLI, server-side
//! preview) can play the role of the platform: report metadata, move time
//! forward, end tracks, refuse playback, and feed samples to the analyser.

use crate::analyser::SharedAnalyser;
use crate::error::{PlaybackError, Result};
use crate::graph::{AudioContext, ContextFactory, ContextState, MediaElement, MediaEvent};
use crate::types::SlotId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct MediaState {
    source: Option<String>,
    paused: bool,
    gain: f32,
    position: f64,
    duration: Option<f64>,
    events: Vec<MediaEvent>,
    reject_play: bool,
    play_calls: usize,
    gain_log: Vec<f32>,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            source: None,
            paused: true,
            gain: 1.0,
            position: 0.0,
            duration: None,
            events: Vec::new(),
            reject_play: false,
            play_calls: 0,
            gain_log: Vec::new(),
        }
    }
}

/// Control handle for a headless media element
#[derive(Debug, Clone, Default)]
pub struct HeadlessMedia {
    state: Arc<Mutex<MediaState>>,
}

impl HeadlessMedia {
    /// New paused element with no source
    pub fn new() -> Self {
        Self::default()
    }

    /// Element to hand to the audio graph
    pub fn element(&self) -> Box<dyn MediaElement> {
        Box::new(HeadlessElement {
            state: self.state.clone(),
            source: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, MediaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report metadata for the current source
    pub fn finish_loading(&self, duration: f64) {
        let mut state = self.lock();
        state.duration = Some(duration);
        state.events.push(MediaEvent::MetadataLoaded { duration });
    }

    /// Move playback forward by `seconds` if playing
    ///
    /// Reaching the known duration fires `Ended` and pauses the element.
    pub fn advance(&self, seconds: f64) {
        let mut state = self.lock();
        if state.paused || state.source.is_none() {
            return;
        }
        let mut position = state.position + seconds;
        let ended = match state.duration {
            Some(duration) if position >= duration => {
                position = duration;
                true
            }
            _ => false,
        };
        state.position = position;
        state.events.push(MediaEvent::TimeUpdate { position });
        if ended {
            state.paused = true;
            state.events.push(MediaEvent::Ended);
        }
    }

    /// Fire `Ended` right away
    pub fn end(&self) {
        let mut state = self.lock();
        state.paused = true;
        state.events.push(MediaEvent::Ended);
    }

    /// Make `play` fail until switched back
    pub fn reject_play(&self, reject: bool) {
        self.lock().reject_play = reject;
    }

    /// Move the playhead without firing events
    pub fn set_position(&self, position: f64) {
        self.lock().position = position;
    }

    /// Current source
    pub fn source(&self) -> Option<String> {
        self.lock().source.clone()
    }

    /// Current gain
    pub fn gain(&self) -> f32 {
        self.lock().gain
    }

    /// Every gain written, in order
    pub fn gain_log(&self) -> Vec<f32> {
        self.lock().gain_log.clone()
    }

    /// Whether paused
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Playhead in seconds
    pub fn position(&self) -> f64 {
        self.lock().position
    }

    /// Number of accepted `play` calls
    pub fn play_calls(&self) -> usize {
        self.lock().play_calls
    }
}

struct HeadlessElement {
    state: Arc<Mutex<MediaState>>,
    source: Option<String>,
}

impl HeadlessElement {
    fn lock(&self) -> MutexGuard<'_, MediaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaElement for HeadlessElement {
    fn set_source(&mut self, url: Option<&str>) {
        self.source = url.map(str::to_string);
        let mut state = self.lock();
        state.source = url.map(str::to_string);
        state.position = 0.0;
        state.duration = None;
        // Notifications for the previous source are stale
        state.events.clear();
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.lock();
        if state.reject_play {
            return Err(PlaybackError::PlayRejected(
                "play() request was not allowed".into(),
            ));
        }
        if state.source.is_none() {
            return Err(PlaybackError::PlayRejected("no supported source".into()));
        }
        state.paused = false;
        state.play_calls += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn set_gain(&mut self, gain: f32) {
        let mut state = self.lock();
        state.gain = gain;
        state.gain_log.push(gain);
    }

    fn gain(&self) -> f32 {
        self.lock().gain
    }

    fn position(&self) -> f64 {
        self.lock().position
    }

    fn seek(&mut self, position: f64) {
        let mut state = self.lock();
        state.position = match state.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
    }

    fn drain_events(&mut self) -> Vec<MediaEvent> {
        std::mem::take(&mut self.lock().events)
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    wired: [bool; 2],
    connect_calls: usize,
    contexts_created: usize,
    start_suspended: bool,
    refuse_create: bool,
    analysers: Vec<SharedAnalyser>,
}

/// Headless audio context factory
///
/// Remembers which elements were wired across contexts: like the real
/// platform, an element connected once cannot be connected again.
#[derive(Debug, Clone, Default)]
pub struct HeadlessContextFactory {
    state: Arc<Mutex<PlatformState>>,
}

impl HeadlessContextFactory {
    /// New factory producing running contexts
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a slot's element as already wired elsewhere
    pub fn prewire(&self, slot: SlotId) {
        self.lock().wired[slot.index()] = true;
    }

    /// Create contexts in the suspended state
    pub fn start_suspended(&self, suspended: bool) {
        self.lock().start_suspended = suspended;
    }

    /// Fail context creation
    pub fn refuse_create(&self, refuse: bool) {
        self.lock().refuse_create = refuse;
    }

    /// Contexts created so far
    pub fn contexts_created(&self) -> usize {
        self.lock().contexts_created
    }

    /// Successful source connections so far
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    /// Push mixed output samples into every connected analyser
    pub fn feed(&self, samples: &[f32]) {
        for analyser in &self.lock().analysers {
            analyser
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_samples(samples);
        }
    }
}

impl ContextFactory for HeadlessContextFactory {
    fn create(&mut self) -> Result<Box<dyn AudioContext>> {
        let mut platform = self.lock();
        if platform.refuse_create {
            return Err(PlaybackError::ContextUnavailable(
                "audio output not available".into(),
            ));
        }
        platform.contexts_created += 1;
        let state = if platform.start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Ok(Box::new(HeadlessContext {
            platform: self.state.clone(),
            state,
        }))
    }
}

struct HeadlessContext {
    platform: Arc<Mutex<PlatformState>>,
    state: ContextState,
}

impl AudioContext for HeadlessContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(PlaybackError::ContextUnavailable(
                "cannot resume a closed context".into(),
            )),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn connect_source(&mut self, slot: SlotId, analyser: SharedAnalyser) -> Result<()> {
        let mut platform = self.platform.lock().unwrap_or_else(PoisonError::into_inner);
        if platform.wired[slot.index()] {
            return Err(PlaybackError::SourceAttach {
                slot,
                reason: "element already connected to a source node".into(),
            });
        }
        platform.wired[slot.index()] = true;
        platform.connect_calls += 1;
        if !platform
            .analysers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &analyser))
        {
            platform.analysers.push(analyser);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
        self.platform
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .analysers
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_fires_ended_at_duration() {
        let media = HeadlessMedia::new();
        let mut element = media.element();
        element.set_source(Some("https://cdn/a.mp3"));
        media.finish_loading(10.0);
        element.play().unwrap();

        media.advance(4.0);
        media.advance(8.0);

        let events = element.drain_events();
        assert_eq!(
            events,
            vec![
                MediaEvent::MetadataLoaded { duration: 10.0 },
                MediaEvent::TimeUpdate { position: 4.0 },
                MediaEvent::TimeUpdate { position: 10.0 },
                MediaEvent::Ended,
            ]
        );
        assert!(media.is_paused());
    }

    #[test]
    fn play_without_source_is_rejected() {
        let media = HeadlessMedia::new();
        let mut element = media.element();
        assert!(matches!(element.play(), Err(PlaybackError::PlayRejected(_))));
    }

    #[test]
    fn new_source_drops_stale_events() {
        let media = HeadlessMedia::new();
        let mut element = media.element();
        element.set_source(Some("https://cdn/a.mp3"));
        media.finish_loading(10.0);
        element.set_source(Some("https://cdn/b.mp3"));
        assert!(element.drain_events().is_empty());
    }
}
