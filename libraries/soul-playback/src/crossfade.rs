//! Two-slot crossfade controller
//!
//! Decides which slot is active, loads new tracks into the other one, and
//! hands over between them:
//!
//! ```text
//! Idle -> Loading -> (metadata) -> Crossfading -> Settled -> Idle
//!                               \-> SilentSwap  -/
//! ```
//!
//! - **Crossfading** runs when playback is active and the outgoing track did
//!   not end by itself: both slots play while two gain ramps move in lockstep.
//! - **SilentSwap** runs otherwise: the incoming slot gets full volume and
//!   starts after a short settle delay.
//! - **Settled** is the only place the active slot changes. The old slot is
//!   cleared and the clock follows the new one.
//!
//! The very first load goes straight into the active slot and starts there.
//! A pause that arrives while a load is pending is remembered: the loaded
//! track is wired up but does not start.
//!
//! A track change for the target already in flight (same id and URL) is
//! ignored. A different target preempts: a pending load is overwritten in
//! place, a running transition is settled at once before the new load.

use crate::clock::PlaybackClock;
use crate::events::PlaybackEvent;
use crate::graph::{AudioGraph, MediaEvent};
use crate::ramp::GainRamp;
use crate::types::{CrossfadeSettings, SlotId};
use serde::{Deserialize, Serialize};
use soul_core::types::TrackId;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observable controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossfadePhase {
    /// One slot active, the other empty
    Idle,
    /// Waiting for metadata of a new source
    Loading,
    /// Both slots audible, gains ramping
    Crossfading,
    /// Incoming slot waiting out the settle delay
    SilentSwap,
}

/// What the manager has to do after a media event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOutcome {
    /// Nothing further
    Handled,
    /// The active track ended and repeat is off; the queue should advance
    TrackEnded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadTarget {
    track_id: TrackId,
    url: String,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Loading {
        target: LoadTarget,
        slot: SlotId,
        first: bool,
        deadline: Option<Duration>,
        paused: bool,
    },
    Crossfading {
        target: LoadTarget,
        incoming: SlotId,
        duration: f64,
        outgoing_ramp: GainRamp,
        incoming_ramp: GainRamp,
    },
    SilentSwap {
        target: LoadTarget,
        incoming: SlotId,
        duration: f64,
        settle_at: Duration,
        start_playback: bool,
    },
}

enum PollAction {
    Nothing,
    AbandonLoad,
    Finish,
}

/// Crossfade controller
#[derive(Debug)]
pub struct CrossfadeController {
    settings: CrossfadeSettings,
    load_timeout: Option<Duration>,
    active: SlotId,
    loaded: Option<LoadTarget>,
    phase: Phase,
    volume: f32,
    repeat: bool,
    ended_naturally: bool,
    pending_events: Vec<PlaybackEvent>,
}

impl CrossfadeController {
    /// Create a controller; slot A starts as active
    pub fn new(settings: CrossfadeSettings, load_timeout: Option<Duration>, volume: f32) -> Self {
        Self {
            settings,
            load_timeout,
            active: SlotId::A,
            loaded: None,
            phase: Phase::Idle,
            volume: volume.clamp(0.0, 1.0),
            repeat: false,
            ended_naturally: false,
            pending_events: Vec::new(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> CrossfadePhase {
        match self.phase {
            Phase::Idle => CrossfadePhase::Idle,
            Phase::Loading { .. } => CrossfadePhase::Loading,
            Phase::Crossfading { .. } => CrossfadePhase::Crossfading,
            Phase::SilentSwap { .. } => CrossfadePhase::SilentSwap,
        }
    }

    /// Slot that drives the clock and takes volume and seek
    pub fn active_slot(&self) -> SlotId {
        self.active
    }

    /// Track loaded in the active slot
    pub fn active_track(&self) -> Option<&TrackId> {
        self.loaded.as_ref().map(|t| &t.track_id)
    }

    /// Track being loaded or transitioned to
    pub fn pending_track(&self) -> Option<&TrackId> {
        self.in_flight().map(|t| &t.track_id)
    }

    /// Whether a crossfade or silent swap is running
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self.phase,
            Phase::Crossfading { .. } | Phase::SilentSwap { .. }
        )
    }

    /// Target volume
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the repeat flag
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Handle a track change with its resolved stream URL
    ///
    /// Returns `false` if the change was redundant and ignored.
    pub fn load(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        track_id: TrackId,
        url: String,
        now: Duration,
    ) -> bool {
        let target = LoadTarget { track_id, url };

        if self.in_flight() == Some(&target)
            || (matches!(self.phase, Phase::Idle) && self.loaded.as_ref() == Some(&target))
        {
            debug!(track_id = %target.track_id, "Ignoring redundant track change");
            return false;
        }

        // Switching back to what already plays: drop the pending load
        if let Phase::Loading {
            slot, first: false, ..
        } = self.phase
        {
            if self.loaded.as_ref() == Some(&target) {
                debug!(track_id = %target.track_id, "Abandoning pending load, target already active");
                graph.slot_mut(slot).clear();
                self.phase = Phase::Idle;
                return true;
            }
        }

        if self.is_transitioning() {
            debug!("Preempting in-flight transition");
            self.finish_transition(graph, clock);
        }

        let first = self.loaded.is_none();
        let slot = if first { self.active } else { self.active.other() };

        graph.slot_mut(slot).load(&target.url);
        info!(track_id = %target.track_id, slot = ?slot, first, "Loading track");

        self.pending_events.push(PlaybackEvent::LoadStarted {
            track_id: target.track_id.clone(),
            slot,
        });
        self.phase = Phase::Loading {
            target,
            slot,
            first,
            deadline: self.load_timeout.map(|timeout| now + timeout),
            paused: false,
        };
        true
    }

    /// Feed a media notification from one of the slots
    pub fn handle_media_event(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        slot: SlotId,
        event: MediaEvent,
        now: Duration,
    ) -> MediaOutcome {
        match event {
            MediaEvent::MetadataLoaded { duration } => {
                self.on_metadata(graph, clock, slot, duration, now);
            }
            MediaEvent::TimeUpdate { position } => {
                if slot == self.active && self.loaded.is_some() {
                    clock.observe_position(position);
                }
            }
            MediaEvent::Ended => {
                if slot == self.active && self.loaded.is_some() && !self.is_transitioning() {
                    return self.on_ended(graph, clock);
                }
                debug!(slot = ?slot, "Ignoring end of an inactive slot");
            }
        }
        MediaOutcome::Handled
    }

    /// Advance timers: ramps, settle delay, load deadline, pending seek
    pub fn poll(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock, now: Duration) {
        let outgoing = self.active;
        let action = match &mut self.phase {
            Phase::Idle => PollAction::Nothing,
            Phase::Loading { deadline, .. } => match deadline {
                Some(deadline) if now >= *deadline => PollAction::AbandonLoad,
                _ => PollAction::Nothing,
            },
            Phase::Crossfading {
                incoming,
                outgoing_ramp,
                incoming_ramp,
                ..
            } => {
                let out_gain = outgoing_ramp.poll(now);
                let in_gain = incoming_ramp.poll(now);
                if let Some(gain) = out_gain {
                    graph.slot_mut(outgoing).set_gain(gain);
                }
                if let Some(gain) = in_gain {
                    graph.slot_mut(*incoming).set_gain(gain);
                }
                if out_gain.is_some() || in_gain.is_some() {
                    self.pending_events.push(PlaybackEvent::CrossfadeProgress {
                        progress: outgoing_ramp.progress(),
                    });
                }
                if outgoing_ramp.is_finished() && incoming_ramp.is_finished() {
                    PollAction::Finish
                } else {
                    PollAction::Nothing
                }
            }
            Phase::SilentSwap { settle_at, .. } => {
                if now >= *settle_at {
                    PollAction::Finish
                } else {
                    PollAction::Nothing
                }
            }
        };

        match action {
            PollAction::Nothing => {}
            PollAction::AbandonLoad => {
                self.abandon_load(graph, clock, "metadata did not arrive in time");
            }
            PollAction::Finish => self.finish_transition(graph, clock),
        }

        self.apply_pending_seek(graph, clock);
    }

    /// Start or resume the active slot
    ///
    /// Returns `false` if there is nothing to play or the platform refused.
    pub fn play(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock) -> bool {
        match &mut self.phase {
            Phase::Crossfading { .. } => return true,
            Phase::SilentSwap { start_playback, .. } => {
                *start_playback = true;
                if clock.set_playing(true) {
                    self.pending_events
                        .push(PlaybackEvent::StateChanged { is_playing: true });
                }
                return true;
            }
            Phase::Loading { paused, .. } => {
                *paused = false;
                if self.ended_naturally {
                    // The finished track stays put; the pending one starts on arrival
                    if clock.set_playing(true) {
                        self.pending_events
                            .push(PlaybackEvent::StateChanged { is_playing: true });
                    }
                    return true;
                }
            }
            Phase::Idle => {}
        }

        if self.loaded.is_none() {
            debug!("Play requested with nothing loaded");
            return false;
        }

        let slot = self.active;
        if self.ended_naturally {
            graph.slot_mut(slot).seek(0.0);
            clock.set_progress(0.0);
            self.ended_naturally = false;
        }
        self.start(graph, clock, slot)
    }

    /// Pause playback
    ///
    /// A running crossfade is completed first so only one slot is left. A
    /// pending load is kept but will not start by itself.
    pub fn pause(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock) {
        if let Phase::SilentSwap { start_playback, .. } = &mut self.phase {
            *start_playback = false;
        } else if let Phase::Loading { paused, .. } = &mut self.phase {
            *paused = true;
        } else if matches!(self.phase, Phase::Crossfading { .. }) {
            self.finish_transition(graph, clock);
        }

        graph.slot_mut(self.active).pause();
        if clock.set_playing(false) {
            self.pending_events
                .push(PlaybackEvent::StateChanged { is_playing: false });
        }
    }

    /// Seek the active slot
    ///
    /// The request goes through the clock as a one-shot pending seek. It is
    /// applied immediately when a track is active, otherwise on a later poll.
    pub fn seek(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock, position: f64) {
        clock.request_seek(position);
        self.apply_pending_seek(graph, clock);
    }

    /// Change the target volume
    ///
    /// Written to the active slot. During a crossfade both ramps are scaled so
    /// the two slots keep summing to the new level; during a silent swap the
    /// incoming slot gets it too. Returns the clamped level, or the old one if
    /// `level` is not finite.
    pub fn set_volume(&mut self, graph: &mut AudioGraph, level: f32) -> f32 {
        if !level.is_finite() {
            return self.volume;
        }
        let previous = self.volume;
        self.volume = level.clamp(0.0, 1.0);

        match &mut self.phase {
            Phase::Crossfading {
                incoming,
                outgoing_ramp,
                incoming_ramp,
                ..
            } => {
                if previous > f32::EPSILON {
                    let factor = self.volume / previous;
                    outgoing_ramp.scale(factor);
                    incoming_ramp.scale(factor);
                } else {
                    incoming_ramp.retarget(self.volume);
                }
                graph.slot_mut(self.active).set_gain(outgoing_ramp.current());
                graph.slot_mut(*incoming).set_gain(incoming_ramp.current());
            }
            Phase::SilentSwap { incoming, .. } => {
                let incoming = *incoming;
                graph.slot_mut(incoming).set_gain(self.volume);
                graph.slot_mut(self.active).set_gain(self.volume);
            }
            Phase::Idle => graph.slot_mut(self.active).set_gain(self.volume),
            Phase::Loading { first, .. } => {
                // A first load is silent until it starts
                if !*first {
                    graph.slot_mut(self.active).set_gain(self.volume);
                }
            }
        }
        self.volume
    }

    /// Forget everything loaded (graph disposed)
    ///
    /// The active slot marker is left as is; the next load is a first load
    /// into it.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.loaded = None;
        self.ended_naturally = false;
    }

    /// Stop the clock when the active track already played to its end
    ///
    /// Called when the track meant to follow it cannot be loaded: nothing is
    /// audible any more.
    pub fn halt_if_ended(&mut self, clock: &mut PlaybackClock) {
        if self.ended_naturally && clock.set_playing(false) {
            debug!("Follow-up track failed after a natural end, stopping");
            self.pending_events
                .push(PlaybackEvent::StateChanged { is_playing: false });
        }
    }

    fn in_flight(&self) -> Option<&LoadTarget> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Loading { target, .. }
            | Phase::Crossfading { target, .. }
            | Phase::SilentSwap { target, .. } => Some(target),
        }
    }

    fn apply_pending_seek(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock) {
        if self.loaded.is_none() {
            return;
        }
        if let Some(position) = clock.take_pending_seek() {
            let position = position.clamp(0.0, clock.duration());
            debug!(position, slot = ?self.active, "Applying seek");
            graph.slot_mut(self.active).seek(position);
            clock.set_progress(position);
            self.ended_naturally = false;
        }
    }

    fn on_metadata(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        slot: SlotId,
        duration: f64,
        now: Duration,
    ) {
        let (target, loading, first, deadline, paused) =
            match std::mem::replace(&mut self.phase, Phase::Idle) {
                Phase::Loading {
                    target,
                    slot,
                    first,
                    deadline,
                    paused,
                } => (target, slot, first, deadline, paused),
                other => {
                    self.phase = other;
                    if slot == self.active && self.loaded.is_some() && !self.is_transitioning() {
                        clock.set_max_duration(duration);
                    }
                    return;
                }
            };

        if loading != slot {
            debug!(slot = ?slot, "Ignoring metadata from a slot that is not loading");
            self.phase = Phase::Loading {
                target,
                slot: loading,
                first,
                deadline,
                paused,
            };
            return;
        }

        if first {
            self.start_first(graph, clock, target, duration, !paused);
        } else if clock.is_playing() && !self.ended_naturally && !paused {
            self.begin_crossfade(graph, clock, target, slot, duration, now);
        } else {
            self.begin_silent_swap(graph, clock, target, slot, duration, now, !paused);
        }
    }

    fn start_first(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        target: LoadTarget,
        duration: f64,
        start_playback: bool,
    ) {
        let slot = self.active;
        clock.set_max_duration(duration);
        clock.set_progress(0.0);
        graph.slot_mut(slot).set_gain(self.volume);

        info!(track_id = %target.track_id, duration, "First track loaded");
        self.pending_events.push(PlaybackEvent::TrackChanged {
            track_id: target.track_id.clone(),
            previous_track_id: None,
        });
        self.loaded = Some(target);
        self.ended_naturally = false;

        if start_playback {
            self.start(graph, clock, slot);
        } else {
            debug!("Paused while loading, first track stays paused");
        }
    }

    fn begin_crossfade(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        target: LoadTarget,
        incoming: SlotId,
        duration: f64,
        now: Duration,
    ) {
        let outgoing = self.active;
        let from_gain = graph.slot(outgoing).gain();
        graph.slot_mut(incoming).set_gain(0.0);

        if !self.start(graph, clock, incoming) {
            // Incoming refused to play: hand over without overlap
            graph.slot_mut(outgoing).pause();
            graph.slot_mut(incoming).set_gain(self.volume);
            self.settle(graph, clock, target, incoming, duration);
            return;
        }

        clock.suppress_updates();
        let steps = self.settings.steps;
        let interval = self.settings.step_interval();

        info!(
            from = ?self.active_track(),
            to = %target.track_id,
            duration_ms = self.settings.duration_ms,
            "Crossfade started"
        );
        self.pending_events.push(PlaybackEvent::CrossfadeStarted {
            from_track_id: self.active_track().cloned(),
            to_track_id: target.track_id.clone(),
            duration_ms: self.settings.duration_ms,
        });

        self.phase = Phase::Crossfading {
            target,
            incoming,
            duration,
            outgoing_ramp: GainRamp::new(from_gain, 0.0, steps, interval, now),
            incoming_ramp: GainRamp::new(0.0, self.volume, steps, interval, now),
        };
    }

    fn begin_silent_swap(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        target: LoadTarget,
        incoming: SlotId,
        duration: f64,
        now: Duration,
        start_playback: bool,
    ) {
        graph.slot_mut(self.active).pause();
        graph.slot_mut(incoming).set_gain(self.volume);
        clock.suppress_updates();

        debug!(
            to = %target.track_id,
            ended_naturally = self.ended_naturally,
            start_playback,
            "Silent swap scheduled"
        );
        self.phase = Phase::SilentSwap {
            target,
            incoming,
            duration,
            settle_at: now + self.settings.settle_delay(),
            start_playback,
        };
    }

    /// Complete a crossfade or silent swap right away
    fn finish_transition(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock) {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match phase {
            Phase::Crossfading {
                target,
                incoming,
                duration,
                mut outgoing_ramp,
                mut incoming_ramp,
            } => {
                outgoing_ramp.finish();
                graph.slot_mut(incoming).set_gain(incoming_ramp.finish());
                self.settle(graph, clock, target, incoming, duration);
            }
            Phase::SilentSwap {
                target,
                incoming,
                duration,
                start_playback,
                ..
            } => {
                if start_playback {
                    self.start(graph, clock, incoming);
                }
                self.settle(graph, clock, target, incoming, duration);
            }
            other => self.phase = other,
        }
    }

    /// Clear the old slot and swap roles
    fn settle(
        &mut self,
        graph: &mut AudioGraph,
        clock: &mut PlaybackClock,
        target: LoadTarget,
        incoming: SlotId,
        duration: f64,
    ) {
        let outgoing = self.active;
        graph.slot_mut(outgoing).clear();
        self.active = incoming;

        let track_id = target.track_id.clone();
        let previous_track_id = self.loaded.replace(target).map(|t| t.track_id);
        self.ended_naturally = false;
        self.phase = Phase::Idle;

        clock.resume_updates();
        clock.set_max_duration(duration);
        clock.set_progress(graph.slot(incoming).position());

        info!(track_id = %track_id, slot = ?incoming, "Transition settled");
        self.pending_events.push(PlaybackEvent::CrossfadeCompleted);
        self.pending_events.push(PlaybackEvent::TrackChanged {
            track_id,
            previous_track_id,
        });
    }

    fn abandon_load(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock, reason: &str) {
        let (target, slot) = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Loading { target, slot, .. } => (target, slot),
            other => {
                self.phase = other;
                return;
            }
        };

        warn!(track_id = %target.track_id, slot = ?slot, reason, "Abandoning load");
        graph.slot_mut(slot).clear();
        self.pending_events.push(PlaybackEvent::LoadFailed {
            track_id: target.track_id,
            reason: reason.to_string(),
        });
        self.halt_if_ended(clock);
    }

    fn on_ended(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock) -> MediaOutcome {
        let Some(track_id) = self.active_track().cloned() else {
            return MediaOutcome::Handled;
        };
        let slot = self.active;

        if self.repeat {
            debug!(track_id = %track_id, "Repeat enabled, restarting active slot");
            graph.slot_mut(slot).seek(0.0);
            clock.set_progress(0.0);
            self.start(graph, clock, slot);
            return MediaOutcome::Handled;
        }

        self.ended_naturally = true;
        clock.set_progress(clock.duration());
        self.pending_events
            .push(PlaybackEvent::TrackFinished { track_id });
        MediaOutcome::TrackEnded
    }

    /// Start a slot; a rejection leaves playback paused
    fn start(&mut self, graph: &mut AudioGraph, clock: &mut PlaybackClock, slot: SlotId) -> bool {
        match graph.start_slot(slot) {
            Ok(()) => {
                if clock.set_playing(true) {
                    self.pending_events
                        .push(PlaybackEvent::StateChanged { is_playing: true });
                }
                true
            }
            Err(e) => {
                warn!(slot = ?slot, error = %e, "Playback rejected, staying paused");
                graph.slot_mut(slot).pause();
                if clock.set_playing(false) {
                    self.pending_events
                        .push(PlaybackEvent::StateChanged { is_playing: false });
                }
                self.pending_events.push(PlaybackEvent::PlaybackRejected {
                    reason: e.to_string(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessContextFactory, HeadlessMedia};
    use crate::types::AnalyserSettings;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    struct Rig {
        graph: AudioGraph,
        clock: PlaybackClock,
        fader: CrossfadeController,
        a: HeadlessMedia,
        b: HeadlessMedia,
    }

    impl Rig {
        fn new() -> Self {
            let a = HeadlessMedia::new();
            let b = HeadlessMedia::new();
            let mut graph = AudioGraph::new(
                Box::new(HeadlessContextFactory::new()),
                a.element(),
                b.element(),
                AnalyserSettings::default(),
            );
            graph.initialize().unwrap();
            Self {
                graph,
                clock: PlaybackClock::new(),
                fader: CrossfadeController::new(
                    CrossfadeSettings::default(),
                    Some(Duration::from_secs(15)),
                    0.8,
                ),
                a,
                b,
            }
        }

        fn load(&mut self, id: &str, now: Duration) -> bool {
            self.fader.load(
                &mut self.graph,
                &mut self.clock,
                TrackId::new(id),
                format!("https://cdn/{}.mp3", id),
                now,
            )
        }

        fn metadata(&mut self, slot: SlotId, duration: f64, now: Duration) {
            self.fader.handle_media_event(
                &mut self.graph,
                &mut self.clock,
                slot,
                MediaEvent::MetadataLoaded { duration },
                now,
            );
        }

        fn event(&mut self, slot: SlotId, event: MediaEvent) -> MediaOutcome {
            self.fader
                .handle_media_event(&mut self.graph, &mut self.clock, slot, event, ms(0))
        }

        fn poll(&mut self, now: Duration) {
            self.fader.poll(&mut self.graph, &mut self.clock, now);
        }

        /// First track playing in slot A
        fn playing(id: &str) -> Self {
            let mut rig = Self::new();
            rig.load(id, ms(0));
            rig.metadata(SlotId::A, 200.0, ms(0));
            rig.fader.drain_events();
            rig
        }
    }

    #[test]
    fn first_load_starts_directly() {
        let mut rig = Rig::new();
        assert!(rig.load("t1", ms(0)));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Loading);
        assert_eq!(rig.a.source().as_deref(), Some("https://cdn/t1.mp3"));

        rig.metadata(SlotId::A, 180.0, ms(10));

        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert_eq!(rig.fader.active_slot(), SlotId::A);
        assert_eq!(rig.clock.duration(), 180.0);
        assert_eq!(rig.clock.elapsed(), 0.0);
        assert!(rig.clock.is_playing());
        assert!(!rig.a.is_paused());
        assert!((rig.a.gain() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn redundant_change_is_ignored() {
        let mut rig = Rig::playing("t1");
        assert!(!rig.load("t1", ms(5)));

        assert!(rig.load("t2", ms(5)));
        assert!(!rig.load("t2", ms(6)));
        assert_eq!(rig.fader.pending_track(), Some(&TrackId::new("t2")));
    }

    #[test]
    fn same_id_new_url_counts_as_new() {
        let mut rig = Rig::playing("t1");
        let loaded = rig.fader.load(
            &mut rig.graph,
            &mut rig.clock,
            TrackId::new("t1"),
            "https://cdn/t1-refreshed.mp3".into(),
            ms(0),
        );
        assert!(loaded);
        assert_eq!(rig.b.source().as_deref(), Some("https://cdn/t1-refreshed.mp3"));
    }

    #[test]
    fn crossfade_keeps_gain_sum_at_volume() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(1000));
        rig.metadata(SlotId::B, 240.0, ms(1000));

        assert_eq!(rig.fader.phase(), CrossfadePhase::Crossfading);
        assert!(!rig.a.is_paused());
        assert!(!rig.b.is_paused());
        assert_eq!(rig.b.gain(), 0.0);

        for step in 1..10u64 {
            rig.poll(ms(1000 + step * 100));
            let sum = rig.a.gain() + rig.b.gain();
            assert!((sum - 0.8).abs() < 1e-4, "step {} sum {}", step, sum);
            assert!(rig.a.gain() > 0.0 && rig.b.gain() > 0.0);
            assert_eq!(rig.fader.active_slot(), SlotId::A);
        }

        rig.poll(ms(2000));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert_eq!(rig.fader.active_slot(), SlotId::B);
        assert!((rig.b.gain() - 0.8).abs() < 1e-6);
        assert!(rig.a.source().is_none());
        assert_eq!(rig.clock.duration(), 240.0);
        assert!(!rig.clock.is_suppressed());
    }

    #[test]
    fn clock_ignores_slots_during_crossfade() {
        let mut rig = Rig::playing("t1");
        rig.event(SlotId::A, MediaEvent::TimeUpdate { position: 150.0 });
        assert_eq!(rig.clock.elapsed(), 150.0);

        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 240.0, ms(0));
        rig.event(SlotId::A, MediaEvent::TimeUpdate { position: 151.0 });
        assert_eq!(rig.clock.elapsed(), 150.0);
    }

    #[test]
    fn paused_change_uses_silent_swap() {
        let mut rig = Rig::playing("t1");
        rig.fader.pause(&mut rig.graph, &mut rig.clock);

        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 120.0, ms(0));

        assert_eq!(rig.fader.phase(), CrossfadePhase::SilentSwap);
        assert!((rig.b.gain() - 0.8).abs() < 1e-6);
        assert!(rig.b.is_paused());

        rig.poll(ms(50));
        assert_eq!(rig.fader.phase(), CrossfadePhase::SilentSwap);

        rig.poll(ms(100));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert_eq!(rig.fader.active_slot(), SlotId::B);
        assert!(!rig.b.is_paused());
        assert!(rig.clock.is_playing());
    }

    #[test]
    fn natural_end_uses_silent_swap() {
        let mut rig = Rig::playing("t1");
        let outcome = rig.event(SlotId::A, MediaEvent::Ended);
        assert_eq!(outcome, MediaOutcome::TrackEnded);

        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 120.0, ms(0));
        assert_eq!(rig.fader.phase(), CrossfadePhase::SilentSwap);
    }

    #[test]
    fn repeat_restarts_active_slot() {
        let mut rig = Rig::playing("t1");
        rig.fader.set_repeat(true);
        rig.a.set_position(199.0);

        let outcome = rig.event(SlotId::A, MediaEvent::Ended);

        assert_eq!(outcome, MediaOutcome::Handled);
        assert_eq!(rig.a.position(), 0.0);
        assert_eq!(rig.clock.elapsed(), 0.0);
        assert_eq!(rig.fader.active_slot(), SlotId::A);
        assert!(!rig.a.is_paused());
    }

    #[test]
    fn seek_targets_active_slot_only() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.fader
            .seek(&mut rig.graph, &mut rig.clock, 42.0);

        assert_eq!(rig.a.position(), 42.0);
        assert_eq!(rig.b.position(), 0.0);
        assert_eq!(rig.clock.elapsed(), 42.0);
        assert_eq!(rig.clock.state().pending_seek, None);
    }

    #[test]
    fn seek_before_load_waits_for_track() {
        let mut rig = Rig::new();
        rig.fader.seek(&mut rig.graph, &mut rig.clock, 30.0);
        assert_eq!(rig.clock.state().pending_seek, Some(30.0));

        rig.load("t1", ms(0));
        rig.metadata(SlotId::A, 100.0, ms(0));
        rig.poll(ms(1));

        assert_eq!(rig.a.position(), 30.0);
        assert_eq!(rig.clock.elapsed(), 30.0);
        assert_eq!(rig.clock.state().pending_seek, None);
    }

    #[test]
    fn volume_goes_to_active_slot() {
        let mut rig = Rig::playing("t1");
        rig.fader.set_volume(&mut rig.graph, 0.3);
        assert!((rig.a.gain() - 0.3).abs() < 1e-6);
        assert_eq!(rig.b.gain(), 0.0);

        assert_eq!(rig.fader.set_volume(&mut rig.graph, 7.0), 1.0);
        assert_eq!(rig.fader.set_volume(&mut rig.graph, f32::NAN), 1.0);
    }

    #[test]
    fn volume_during_crossfade_scales_both_slots() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 100.0, ms(0));
        rig.poll(ms(500));

        rig.fader.set_volume(&mut rig.graph, 0.4);
        assert!((rig.a.gain() + rig.b.gain() - 0.4).abs() < 1e-4);
        rig.poll(ms(1000));

        assert_eq!(rig.fader.active_slot(), SlotId::B);
        assert!((rig.b.gain() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn lowering_volume_mid_fade_never_overshoots() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(1000));
        rig.metadata(SlotId::B, 100.0, ms(1000));
        rig.poll(ms(1500));

        rig.fader.set_volume(&mut rig.graph, 0.2);

        for now in [1600, 1700, 1800, 1900] {
            rig.poll(ms(now));
            let sum = rig.a.gain() + rig.b.gain();
            assert!((sum - 0.2).abs() < 1e-4, "at {}ms sum {}", now, sum);
        }
        rig.poll(ms(2000));
        assert!((rig.b.gain() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn volume_raised_from_silence_mid_fade_reaches_new_level() {
        let mut rig = Rig::playing("t1");
        rig.fader.set_volume(&mut rig.graph, 0.0);
        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 100.0, ms(0));
        rig.poll(ms(300));

        rig.fader.set_volume(&mut rig.graph, 0.6);
        for now in [400, 700, 900] {
            rig.poll(ms(now));
            assert!(rig.a.gain() + rig.b.gain() <= 0.6 + 1e-4);
        }
        rig.poll(ms(1000));
        assert!((rig.b.gain() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn pause_during_first_load_keeps_track_paused() {
        let mut rig = Rig::new();
        rig.load("t1", ms(0));
        rig.fader.pause(&mut rig.graph, &mut rig.clock);
        rig.metadata(SlotId::A, 100.0, ms(20));

        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert_eq!(rig.fader.active_track(), Some(&TrackId::new("t1")));
        assert!(rig.a.is_paused());
        assert!(!rig.clock.is_playing());
        assert_eq!(rig.clock.duration(), 100.0);

        assert!(rig.fader.play(&mut rig.graph, &mut rig.clock));
        assert!(!rig.a.is_paused());
        assert!(rig.clock.is_playing());
    }

    #[test]
    fn pause_during_later_load_swaps_without_starting() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.fader.pause(&mut rig.graph, &mut rig.clock);
        rig.metadata(SlotId::B, 100.0, ms(10));

        assert_eq!(rig.fader.phase(), CrossfadePhase::SilentSwap);
        rig.poll(ms(200));

        assert_eq!(rig.fader.active_track(), Some(&TrackId::new("t2")));
        assert!(rig.a.is_paused());
        assert!(rig.b.is_paused());
        assert!(!rig.clock.is_playing());
    }

    #[test]
    fn play_after_pause_during_load_starts_on_arrival() {
        let mut rig = Rig::new();
        rig.load("t1", ms(0));
        rig.fader.pause(&mut rig.graph, &mut rig.clock);
        assert!(!rig.fader.play(&mut rig.graph, &mut rig.clock));

        rig.metadata(SlotId::A, 100.0, ms(20));
        assert!(!rig.a.is_paused());
        assert!(rig.clock.is_playing());
    }

    #[test]
    fn play_after_natural_end_waits_for_pending_load() {
        let mut rig = Rig::playing("t1");
        rig.a.set_position(200.0);
        rig.event(SlotId::A, MediaEvent::Ended);
        rig.load("t2", ms(0));
        rig.fader.pause(&mut rig.graph, &mut rig.clock);

        assert!(rig.fader.play(&mut rig.graph, &mut rig.clock));
        // The finished track is not replayed while the next one loads
        assert!(rig.a.is_paused());
        assert!(rig.clock.is_playing());

        rig.metadata(SlotId::B, 100.0, ms(10));
        rig.poll(ms(200));
        assert_eq!(rig.fader.active_slot(), SlotId::B);
        assert!(!rig.b.is_paused());
    }

    #[test]
    fn failed_load_after_natural_end_stops_clock() {
        let mut rig = Rig::playing("t1");
        rig.event(SlotId::A, MediaEvent::Ended);
        assert!(rig.clock.is_playing());
        rig.load("t2", ms(0));
        rig.fader.drain_events();

        rig.poll(Duration::from_secs(15));

        assert!(!rig.clock.is_playing());
        let events = rig.fader.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::LoadFailed { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, PlaybackEvent::StateChanged { is_playing: false })));
    }

    #[test]
    fn new_target_preempts_pending_load() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.load("t3", ms(0));
        assert_eq!(rig.b.source().as_deref(), Some("https://cdn/t3.mp3"));

        rig.metadata(SlotId::B, 90.0, ms(0));
        rig.poll(ms(1000));
        assert_eq!(rig.fader.active_track(), Some(&TrackId::new("t3")));
    }

    #[test]
    fn new_target_settles_running_crossfade() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 90.0, ms(0));
        rig.poll(ms(300));

        rig.load("t3", ms(300));

        assert_eq!(rig.fader.active_slot(), SlotId::B);
        assert_eq!(rig.fader.active_track(), Some(&TrackId::new("t2")));
        assert_eq!(rig.a.source().as_deref(), Some("https://cdn/t3.mp3"));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Loading);
    }

    #[test]
    fn returning_to_active_track_drops_pending_load() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        assert!(rig.load("t1", ms(0)));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert!(rig.b.source().is_none());
    }

    #[test]
    fn stale_metadata_from_wrong_slot_is_ignored() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.metadata(SlotId::A, 10.0, ms(0));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Loading);
    }

    #[test]
    fn load_times_out() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.poll(Duration::from_secs(14));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Loading);

        rig.poll(Duration::from_secs(15));
        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert!(rig.b.source().is_none());
        assert!(rig
            .fader
            .drain_events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::LoadFailed { .. })));
        // The old track keeps playing
        assert!(!rig.a.is_paused());
    }

    #[test]
    fn rejected_play_reverts_to_paused() {
        let mut rig = Rig::new();
        rig.a.reject_play(true);
        rig.load("t1", ms(0));
        rig.metadata(SlotId::A, 100.0, ms(0));

        assert!(!rig.clock.is_playing());
        assert!(rig.a.is_paused());
        assert!(rig
            .fader
            .drain_events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::PlaybackRejected { .. })));
    }

    #[test]
    fn pause_mid_crossfade_settles_then_pauses() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 100.0, ms(0));
        rig.poll(ms(200));

        rig.fader.pause(&mut rig.graph, &mut rig.clock);

        assert_eq!(rig.fader.phase(), CrossfadePhase::Idle);
        assert_eq!(rig.fader.active_slot(), SlotId::B);
        assert!(rig.b.is_paused());
        assert!(rig.a.source().is_none());
        assert!(!rig.clock.is_playing());
    }

    #[test]
    fn end_of_outgoing_slot_during_crossfade_is_ignored() {
        let mut rig = Rig::playing("t1");
        rig.load("t2", ms(0));
        rig.metadata(SlotId::B, 100.0, ms(0));
        assert_eq!(rig.event(SlotId::A, MediaEvent::Ended), MediaOutcome::Handled);
        assert_eq!(rig.fader.phase(), CrossfadePhase::Crossfading);
    }
}
