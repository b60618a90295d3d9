//! Crossfade scenarios through the playback manager
//!
//! Every test drives a headless platform: stream URLs are resolved by hand,
//! metadata and time are reported by the test, and time is passed to `tick`.

mod common;

use common::{create_test_track, ms, TestPlayer};
use soul_core::types::TrackId;
use soul_playback::{CrossfadePhase, PlaybackConfig, PlaybackEvent, SlotId};

// ===== Crossfade =====

#[test]
fn test_crossfade_keeps_combined_gain_constant() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(1000));
    player.b.finish_loading(180.0);
    player.tick(ms(1000));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::Crossfading);

    for step in 1..10 {
        player.tick(ms(1000 + step * 100));
        let sum = player.a.gain() + player.b.gain();
        assert!(
            (sum - 1.0).abs() < 1e-4,
            "gain sum {} at step {}",
            sum,
            step
        );
        assert_eq!(player.manager.active_slot(), SlotId::A);
    }

    player.tick(ms(2000));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::Idle);
    assert_eq!(player.manager.active_slot(), SlotId::B);
    assert_eq!(player.b.gain(), 1.0);
    assert!(player.a.source().is_none());
    assert!(player.a.is_paused());
}

#[test]
fn test_crossfade_emits_lifecycle_events() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);
    player.events.clear();

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(500));
    player.b.finish_loading(90.0);
    player.tick(ms(500));
    player.tick(ms(1500));

    assert!(player.has_event(|e| matches!(
        e,
        PlaybackEvent::CrossfadeStarted { from_track_id: Some(from), to_track_id, duration_ms: 1000 }
            if from.as_str() == "1" && to_track_id.as_str() == "2"
    )));
    assert!(player.has_event(|e| matches!(e, PlaybackEvent::CrossfadeProgress { .. })));
    assert!(player.has_event(|e| matches!(e, PlaybackEvent::CrossfadeCompleted)));
    assert!(player.has_event(|e| *e
        == PlaybackEvent::TrackChanged {
            track_id: TrackId::new("2"),
            previous_track_id: Some(TrackId::new("1")),
        }));
}

#[test]
fn test_clock_follows_incoming_slot_only_after_settle() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);
    player.a.advance(50.0);
    player.tick(ms(50));
    assert_eq!(player.manager.clock().elapsed, 50.0);

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(100));
    player.b.finish_loading(120.0);
    player.tick(ms(100));

    // Outgoing keeps playing but no longer drives the clock
    player.a.advance(0.5);
    player.tick(ms(600));
    assert_eq!(player.manager.clock().elapsed, 50.0);
    assert_eq!(player.manager.clock().duration, 200.0);

    player.tick(ms(1100));
    assert_eq!(player.manager.clock().duration, 120.0);
    assert_eq!(player.manager.clock().elapsed, 0.0);

    player.b.advance(3.0);
    player.tick(ms(1200));
    assert_eq!(player.manager.clock().elapsed, 3.0);
}

// ===== Silent Swap =====

#[test]
fn test_selection_while_paused_swaps_silently() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);
    player.manager.pause();
    assert!(player.a.is_paused());

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(100));
    player.b.finish_loading(60.0);
    player.tick(ms(100));

    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::SilentSwap);
    assert_eq!(player.b.gain(), 1.0);
    assert!(player
        .b
        .gain_log()
        .iter()
        .all(|gain| *gain == 0.0 || *gain == 1.0));

    player.tick(ms(200));
    assert_eq!(player.manager.active_slot(), SlotId::B);
    assert!(!player.b.is_paused());
    assert!(player.manager.is_playing());
}

#[test]
fn test_natural_end_advances_with_silent_swap() {
    let mut player = TestPlayer::new();
    let tracks = common::create_test_tracks(&["1", "2"]);
    player
        .manager
        .play_from_collection(create_test_track("1"), &tracks);
    player.resolve(ms(0));
    player.a.finish_loading(5.0);
    player.tick(ms(25));

    player.a.advance(5.0);
    player.tick(ms(50));
    assert_eq!(player.current_id().as_deref(), Some("2"));
    assert!(player.has_event(|e| matches!(
        e,
        PlaybackEvent::TrackFinished { track_id } if track_id.as_str() == "1"
    )));

    player.resolve(ms(50));
    player.b.finish_loading(8.0);
    player.tick(ms(75));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::SilentSwap);

    player.tick(ms(175));
    assert_eq!(player.manager.active_slot(), SlotId::B);
    assert!(!player.b.is_paused());
}

// ===== Preemption =====

#[test]
fn test_rapid_selection_loads_only_latest() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);

    player.manager.play_immediately(create_test_track("2"));
    let stale = player.manager.take_stream_request().unwrap();
    player.manager.play_immediately(create_test_track("3"));
    player.manager.play_immediately(create_test_track("4"));

    assert!(!player
        .manager
        .stream_resolved(&stale, "https://cdn/2.mp3".into(), ms(10)));
    player.resolve(ms(10));

    assert_eq!(player.b.source().as_deref(), Some("https://cdn/4.mp3"));
    assert_eq!(player.current_id().as_deref(), Some("4"));
}

#[test]
fn test_new_selection_mid_crossfade_settles_first() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(0));
    player.b.finish_loading(100.0);
    player.tick(ms(25));
    player.tick(ms(325));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::Crossfading);

    player.manager.play_immediately(create_test_track("3"));
    player.resolve(ms(330));

    assert_eq!(player.manager.active_slot(), SlotId::B);
    assert_eq!(player.b.gain(), 1.0);
    assert_eq!(player.a.source().as_deref(), Some("https://cdn/3.mp3"));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::Loading);
    assert_eq!(
        player.manager.snapshot().active_track,
        Some(TrackId::new("2"))
    );
}

// ===== Repeat / Seek / Volume =====

#[test]
fn test_repeat_restarts_without_queue_change() {
    let mut player = TestPlayer::new();
    player.manager.enqueue_next(create_test_track("next"));
    player.start("1", 10.0);
    player.manager.toggle_repeat();
    let queue = player.manager.queue().clone();

    player.a.advance(10.0);
    player.tick(ms(100));

    assert_eq!(player.manager.queue(), &queue);
    assert_eq!(player.a.position(), 0.0);
    assert!(!player.a.is_paused());
    assert!(player.manager.take_stream_request().is_none());
}

#[test]
fn test_seek_is_clamped_to_duration() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);

    player.manager.seek(500.0);
    assert_eq!(player.a.position(), 200.0);
    assert_eq!(player.manager.clock().elapsed, 200.0);

    player.manager.seek(-10.0);
    assert_eq!(player.a.position(), 0.0);
    assert_eq!(player.manager.clock().elapsed, 0.0);
    assert_eq!(player.manager.clock().pending_seek, None);
}

#[test]
fn test_volume_applies_to_active_slot() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);
    player.manager.set_volume(0.25);

    assert_eq!(player.a.gain(), 0.25);
    assert!(player.b.gain_log().is_empty());
    assert_eq!(player.manager.snapshot().volume, 0.25);
}

#[test]
fn test_volume_drop_mid_crossfade_rescales_both_slots() {
    let mut player = TestPlayer::new();
    player.manager.set_volume(0.8);
    player.start("1", 200.0);

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(1000));
    player.b.finish_loading(180.0);
    player.tick(ms(1000));
    player.tick(ms(1500));

    player.manager.set_volume(0.2);
    for now in [1700, 1800] {
        player.tick(ms(now));
        let sum = player.a.gain() + player.b.gain();
        assert!((sum - 0.2).abs() < 1e-4, "gain sum {} at {}ms", sum, now);
    }

    player.tick(ms(2000));
    assert_eq!(player.manager.active_slot(), SlotId::B);
    assert!((player.b.gain() - 0.2).abs() < 1e-6);
}

// ===== Failure Paths =====

#[test]
fn test_metadata_timeout_keeps_current_track() {
    let mut config = PlaybackConfig::default();
    config.load_timeout_ms = Some(2000);
    let mut player = TestPlayer::with_config(config);
    player.start("1", 200.0);

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(100));
    player.tick(ms(2000));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::Loading);

    player.tick(ms(2100));
    assert_eq!(player.manager.snapshot().phase, CrossfadePhase::Idle);
    assert!(player.has_event(|e| matches!(
        e,
        PlaybackEvent::LoadFailed { track_id, .. } if track_id.as_str() == "2"
    )));
    assert!(player.b.source().is_none());
    assert!(!player.a.is_paused());
    assert_eq!(
        player.manager.snapshot().active_track,
        Some(TrackId::new("1"))
    );
}

#[test]
fn test_rejected_play_stays_paused_until_retry() {
    let mut player = TestPlayer::new();
    player.a.reject_play(true);

    player.manager.play_immediately(create_test_track("1"));
    player.resolve(ms(0));
    player.a.finish_loading(30.0);
    player.tick(ms(25));

    assert!(!player.manager.is_playing());
    assert!(player.has_event(|e| matches!(e, PlaybackEvent::PlaybackRejected { .. })));

    player.a.reject_play(false);
    player.manager.play();
    assert!(player.manager.is_playing());
    assert!(!player.a.is_paused());
}

#[test]
fn test_degraded_slot_still_plays() {
    let mut player = TestPlayer::new();
    player.factory.prewire(SlotId::B);
    player.start("1", 200.0);
    assert!(player.has_event(|e| *e == PlaybackEvent::AnalysisDegraded { slot: SlotId::B }));

    player.manager.play_immediately(create_test_track("2"));
    player.resolve(ms(100));
    player.b.finish_loading(50.0);
    player.tick(ms(100));
    player.tick(ms(1100));

    assert_eq!(player.manager.active_slot(), SlotId::B);
    assert!(!player.b.is_paused());
}

#[test]
fn test_analyser_sees_fed_samples() {
    let mut player = TestPlayer::new();
    player.start("1", 200.0);

    let samples: Vec<f32> = (0..512)
        .map(|i| (2.0 * std::f32::consts::PI * 32.0 * i as f32 / 512.0).sin())
        .collect();
    player.factory.feed(&samples);

    let analyser = player.manager.analyser().expect("graph initialized");
    let mut analyser = analyser.lock().unwrap();
    let mut bins = vec![0u8; analyser.frequency_bin_count()];
    analyser.byte_frequency_data(&mut bins);
    assert!(bins.iter().any(|b| *b > 0));
}
