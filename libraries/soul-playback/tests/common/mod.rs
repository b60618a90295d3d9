//! Shared helpers for playback integration tests

#![allow(dead_code)]

use soul_core::types::Track;
use soul_playback::headless::{HeadlessContextFactory, HeadlessMedia};
use soul_playback::{
    AudioGraph, MemoryHistoryStore, PlaybackConfig, PlaybackEvent, PlaybackManager, StreamRequest,
};
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Route tracing output through the test harness (RUST_LOG controls level)
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn create_test_track(id: &str) -> Track {
    Track::new(id, format!("Track {}", id), "Test Artist")
}

pub fn create_test_tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| create_test_track(id)).collect()
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Manager wired to a headless platform
pub struct TestPlayer {
    pub manager: PlaybackManager,
    pub a: HeadlessMedia,
    pub b: HeadlessMedia,
    pub factory: HeadlessContextFactory,
    pub store: Arc<MemoryHistoryStore>,
    pub events: Vec<PlaybackEvent>,
}

impl TestPlayer {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryHistoryStore::new()))
    }

    pub fn with_store(config: PlaybackConfig, store: Arc<MemoryHistoryStore>) -> Self {
        init_tracing();
        let a = HeadlessMedia::new();
        let b = HeadlessMedia::new();
        let factory = HeadlessContextFactory::new();
        let graph = AudioGraph::new(
            Box::new(factory.clone()),
            a.element(),
            b.element(),
            config.analyser,
        );
        let manager = PlaybackManager::new(config, graph, store.clone());
        Self {
            manager,
            a,
            b,
            factory,
            store,
            events: Vec::new(),
        }
    }

    /// Resolve the outstanding stream request to a CDN-style URL
    pub fn resolve(&mut self, now: Duration) -> StreamRequest {
        let request = self
            .manager
            .take_stream_request()
            .expect("no stream request pending");
        let url = format!("https://cdn/{}.mp3", request.track_id);
        assert!(self.manager.stream_resolved(&request, url, now));
        request
    }

    pub fn tick(&mut self, now: Duration) {
        self.manager.tick(now);
        self.collect();
    }

    pub fn collect(&mut self) {
        self.events.extend(self.manager.drain_events());
    }

    /// Play `id` from scratch until slot A is audible
    pub fn start(&mut self, id: &str, duration: f64) {
        self.manager.play_immediately(create_test_track(id));
        self.resolve(Duration::ZERO);
        self.a.finish_loading(duration);
        self.tick(ms(25));
        assert!(self.manager.is_playing());
    }

    pub fn current_id(&self) -> Option<String> {
        self.manager
            .queue()
            .current
            .as_ref()
            .map(|t| t.id.as_str().to_string())
    }

    pub fn has_event(&self, matches: impl Fn(&PlaybackEvent) -> bool) -> bool {
        self.events.iter().any(matches)
    }
}
