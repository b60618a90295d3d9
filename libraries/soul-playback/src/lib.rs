//! Soul Player - Playback Management
//!
//! Platform-agnostic playback core for the Soul Player web client.
//!
//! This crate provides:
//! - Two-slot audio graph with a lazily created context and a shared
//!   spectrum analyser
//! - Crossfading between tracks (1 s, 10 gain steps) and silent swaps
//! - Queue with current, upcoming and played lists
//! - Playback clock with clamped elapsed/duration and one-shot seeks
//! - Persisted play history (capped, deduplicated)
//! - Async service wrapper on tokio
//!
//! # Architecture
//!
//! `soul-playback` never touches a browser or sound card directly:
//! - Media elements, the audio context and its factory are traits
//!   ([`MediaElement`], [`AudioContext`], [`ContextFactory`])
//! - Stream URLs come from a [`soul_core::StreamResolver`]
//! - History goes through a [`soul_core::HistoryStore`]
//! - Time is passed in explicitly
//!
//! The [`headless`] module implements the platform traits in-process.
//!
//! # Example: Driving the Manager
//!
//! ```rust
//! use soul_playback::headless::{HeadlessContextFactory, HeadlessMedia};
//! use soul_playback::{AudioGraph, MemoryHistoryStore, PlaybackConfig, PlaybackManager};
//! use soul_core::types::Track;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let a = HeadlessMedia::new();
//! let b = HeadlessMedia::new();
//! let config = PlaybackConfig::default();
//! let graph = AudioGraph::new(
//!     Box::new(HeadlessContextFactory::new()),
//!     a.element(),
//!     b.element(),
//!     config.analyser,
//! );
//! let mut manager = PlaybackManager::new(config, graph, Arc::new(MemoryHistoryStore::new()));
//!
//! manager.play_immediately(Track::new("t1", "Intro", "Artist"));
//!
//! // Resolve the stream the way a server client would
//! let request = manager.take_stream_request().unwrap();
//! manager.stream_resolved(&request, "https://cdn/t1.mp3".into(), Duration::ZERO);
//!
//! // The platform reports metadata; the next tick starts playback
//! a.finish_loading(180.0);
//! manager.tick(Duration::from_millis(25));
//! assert!(manager.is_playing());
//! ```
//!
//! # Example: Async Service
//!
//! ```rust,no_run
//! # use soul_playback::{PlaybackManager, PlaybackService};
//! # use soul_core::StreamResolver;
//! # use std::sync::Arc;
//! # async fn run(manager: PlaybackManager, resolver: Arc<dyn StreamResolver>) {
//! let handle = PlaybackService::spawn(manager, resolver, std::time::Duration::from_millis(25));
//! let mut events = handle.subscribe();
//!
//! handle.play().ok();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

mod analyser;
mod clock;
mod crossfade;
mod error;
mod events;
mod graph;
pub mod headless;
mod history;
mod manager;
mod queue;
mod ramp;
mod service;
pub mod types;

// Public exports
pub use analyser::{Analyser, SharedAnalyser};
pub use clock::{ClockState, PlaybackClock};
pub use crossfade::{CrossfadeController, CrossfadePhase, MediaOutcome};
pub use error::{PlaybackError, Result};
pub use events::{PlaybackCommand, PlaybackEvent};
pub use graph::{
    AudioContext, AudioGraph, ContextFactory, ContextState, MediaElement, MediaEvent,
    PlaybackSlot, TapState,
};
pub use history::{JsonFileHistoryStore, MemoryHistoryStore, PlayHistory, DEFAULT_HISTORY_SIZE};
pub use manager::{PlaybackManager, PlaybackSnapshot, StreamRequest};
pub use queue::{QueueEngine, QueueState};
pub use ramp::GainRamp;
pub use service::{PlaybackHandle, PlaybackService, ServiceMessage};
pub use types::{AnalyserSettings, CrossfadeSettings, PlaybackConfig, SlotId};
