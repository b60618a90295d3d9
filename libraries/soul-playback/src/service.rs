//! Async playback service
//!
//! Runs a [`PlaybackManager`] on a tokio task. Commands and platform media
//! events arrive over an mpsc channel, a fixed interval drives ramps and
//! timeouts, stream URLs are resolved on spawned tasks, and the results go out
//! as broadcast events plus a watched snapshot.

use crate::analyser::SharedAnalyser;
use crate::error::{PlaybackError, Result};
use crate::events::{PlaybackCommand, PlaybackEvent};
use crate::graph::MediaEvent;
use crate::manager::{PlaybackManager, PlaybackSnapshot, StreamRequest};
use crate::types::SlotId;
use soul_core::types::Track;
use soul_core::StreamResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

/// Message accepted by the service task
#[derive(Debug, Clone)]
pub enum ServiceMessage {
    /// User command
    Command(PlaybackCommand),
    /// Notification pushed by a platform media element
    Media {
        /// Slot that fired it
        slot: SlotId,
        /// The notification
        event: MediaEvent,
    },
    /// Dispose the graph and stop
    Shutdown,
}

struct Resolution {
    request: StreamRequest,
    result: soul_core::Result<String>,
}

/// Spawns the playback task
pub struct PlaybackService;

impl PlaybackService {
    /// Start the service on the current tokio runtime
    pub fn spawn(
        manager: PlaybackManager,
        resolver: Arc<dyn StreamResolver>,
        tick_interval: Duration,
    ) -> PlaybackHandle {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(manager.snapshot());
        let (analyser_tx, analyser_rx) = watch::channel(manager.analyser());

        let publisher = Publisher {
            events: event_tx.clone(),
            snapshot: snapshot_tx,
            analyser: analyser_tx,
        };
        tokio::spawn(run(manager, resolver, message_rx, publisher, tick_interval));

        PlaybackHandle {
            messages: message_tx,
            events: event_tx,
            snapshot: snapshot_rx,
            analyser: analyser_rx,
        }
    }
}

/// Cloneable handle to a running playback service
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    messages: mpsc::UnboundedSender<ServiceMessage>,
    events: broadcast::Sender<PlaybackEvent>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    analyser: watch::Receiver<Option<SharedAnalyser>>,
}

impl PlaybackHandle {
    /// Send a command
    ///
    /// # Errors
    /// Returns [`PlaybackError::ServiceStopped`] once the task has exited
    pub fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.post(ServiceMessage::Command(command))
    }

    /// Forward a media element notification
    pub fn media_event(&self, slot: SlotId, event: MediaEvent) -> Result<()> {
        self.post(ServiceMessage::Media { slot, event })
    }

    /// Start or resume playback
    pub fn play(&self) -> Result<()> {
        self.send(PlaybackCommand::Play)
    }

    /// Pause playback
    pub fn pause(&self) -> Result<()> {
        self.send(PlaybackCommand::Pause)
    }

    /// Seek the active track (seconds)
    pub fn seek(&self, position: f64) -> Result<()> {
        self.send(PlaybackCommand::Seek(position))
    }

    /// Set volume (0.0 to 1.0)
    pub fn set_volume(&self, level: f32) -> Result<()> {
        self.send(PlaybackCommand::SetVolume(level))
    }

    /// Flip repeat
    pub fn toggle_repeat(&self) -> Result<()> {
        self.send(PlaybackCommand::ToggleRepeat)
    }

    /// Flip shuffle
    pub fn toggle_shuffle(&self) -> Result<()> {
        self.send(PlaybackCommand::ToggleShuffle)
    }

    /// Skip to the next track
    pub fn advance(&self) -> Result<()> {
        self.send(PlaybackCommand::Advance)
    }

    /// Go to the previous track
    pub fn go_back(&self) -> Result<()> {
        self.send(PlaybackCommand::GoBack)
    }

    /// Append to the upcoming list
    pub fn enqueue_next(&self, track: Track) -> Result<()> {
        self.send(PlaybackCommand::EnqueueNext(track))
    }

    /// Play a track now
    pub fn play_immediately(&self, track: Track) -> Result<()> {
        self.send(PlaybackCommand::PlayImmediately(track))
    }

    /// Replace the queue from a collection
    pub fn play_from_collection(&self, track: Track, collection: Vec<Track>) -> Result<()> {
        self.send(PlaybackCommand::PlayFromCollection { track, collection })
    }

    /// Subscribe to playback events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshot changes
    pub fn watch_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    /// Spectrum analyser, once the graph is initialized
    pub fn analyser(&self) -> Option<SharedAnalyser> {
        self.analyser.borrow().clone()
    }

    /// Dispose the graph and wait for the task to exit
    pub async fn shutdown(&self) {
        // Already stopped if this fails
        let _ = self.messages.send(ServiceMessage::Shutdown);

        let mut snapshot = self.snapshot.clone();
        while snapshot.changed().await.is_ok() {}
    }

    fn post(&self, message: ServiceMessage) -> Result<()> {
        self.messages
            .send(message)
            .map_err(|_| PlaybackError::ServiceStopped)
    }
}

struct Publisher {
    events: broadcast::Sender<PlaybackEvent>,
    snapshot: watch::Sender<PlaybackSnapshot>,
    analyser: watch::Sender<Option<SharedAnalyser>>,
}

impl Publisher {
    fn publish(&self, manager: &mut PlaybackManager) {
        let snapshot = manager.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        let analyser = manager.analyser();
        self.analyser.send_if_modified(|current| {
            let same = match (current.as_ref(), analyser.as_ref()) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if !same {
                *current = analyser;
            }
            !same
        });

        for event in manager.drain_events() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

async fn run(
    mut manager: PlaybackManager,
    resolver: Arc<dyn StreamResolver>,
    mut messages: mpsc::UnboundedReceiver<ServiceMessage>,
    publisher: Publisher,
    tick_interval: Duration,
) {
    let started = Instant::now();
    let (resolved_tx, mut resolved_rx) = mpsc::unbounded_channel::<Resolution>();

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(tick_ms = tick_interval.as_millis() as u64, "Playback service started");

    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Some(ServiceMessage::Command(command)) => manager.execute(command),
                Some(ServiceMessage::Media { slot, event }) => {
                    manager.handle_media_event(slot, event, started.elapsed());
                }
                Some(ServiceMessage::Shutdown) | None => break,
            },
            Some(resolution) = resolved_rx.recv() => {
                let now = started.elapsed();
                match resolution.result {
                    Ok(url) => {
                        manager.stream_resolved(&resolution.request, url, now);
                    }
                    Err(e) => {
                        manager.stream_failed(&resolution.request, &e.to_string());
                    }
                }
            }
            _ = ticker.tick() => manager.tick(started.elapsed()),
        }

        if let Some(request) = manager.take_stream_request() {
            debug!(track_id = %request.track_id, generation = request.generation, "Resolving stream");
            let resolver = resolver.clone();
            let resolved_tx = resolved_tx.clone();
            tokio::spawn(async move {
                let result = resolver.resolve_stream(&request.track_id).await;
                // The service may have stopped meanwhile
                let _ = resolved_tx.send(Resolution { request, result });
            });
        }

        publisher.publish(&mut manager);
    }

    drop(messages);
    manager.dispose();
    publisher.publish(&mut manager);
    info!("Playback service stopped");
}
