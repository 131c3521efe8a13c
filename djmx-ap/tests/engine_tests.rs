//! Playback engine behavior on virtual time
//!
//! Voices are mocks whose position follows the paused tokio clock; the driver
//! loop is replaced by explicit `tick()` calls between time advances.

mod helpers;

use djmx_ap::playback::SlotState;
use djmx_common::events::{DjmxEvent, StartReason};
use helpers::*;
use std::time::Duration;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn started(events: &[DjmxEvent]) -> Vec<(usize, StartReason)> {
    events
        .iter()
        .filter_map(|e| match e {
            DjmxEvent::TrackStarted { index, reason, .. } => Some((*index, *reason)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_crossfade_overlaps_last_two_seconds() {
    // Given a 10 s item followed by another
    let t = test_engine(MockVoiceFactory::default());
    let mut rx = t.bus.subscribe();
    t.engine
        .set_queue(vec![item("a", 10.0), item("b", 10.0), item("c", 10.0)])
        .await;
    assert_eq!(t.factory.live_voices(), 1);

    // Just before the window only the first voice plays
    run_for(&t.engine, secs(7.9)).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.crossfading);
    assert_eq!(snap.live_voices, 1);
    assert_eq!(snap.current_index, 0);

    // Inside the window both voices are live and the index has not moved
    run_for(&t.engine, secs(0.4)).await;
    let snap = t.engine.snapshot().await;
    assert!(snap.crossfading);
    assert_eq!(snap.live_voices, 2);
    assert_eq!(t.factory.live_voices(), 2);
    assert_eq!(snap.current_index, 0);
    assert_eq!(snap.current_state, SlotState::FadingOut);

    // After the window the outgoing voice is gone
    run_for(&t.engine, secs(2.1)).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.crossfading);
    assert_eq!(snap.current_index, 1);
    assert_eq!(snap.live_voices, 1);
    assert_eq!(t.factory.live_voices(), 1);
    assert!(snap.is_playing);
    assert_eq!(t.factory.volume_of("b"), Some(0.8));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        DjmxEvent::CrossfadeStarted {
            from_index: 0,
            to_index: 1,
            ..
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, DjmxEvent::CrossfadeCompleted { index: 1, .. })));
    assert_eq!(
        started(&events),
        vec![(0, StartReason::QueueStart), (1, StartReason::AutoAdvance)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_queue_is_idempotent() {
    let t = test_engine(MockVoiceFactory::default());
    let items = vec![item("a", 10.0), item("b", 10.0)];

    t.engine.set_queue(items.clone()).await;
    run_for(&t.engine, secs(3.0)).await;
    t.engine.set_queue(items.clone()).await;

    let snap = t.engine.snapshot().await;
    assert_eq!(snap.queue, items);
    assert_eq!(snap.current_index, 0);
    assert!(snap.is_playing);
    assert_eq!(snap.live_voices, 1);
    assert_eq!(t.factory.live_voices(), 1);
    assert_eq!(t.factory.loads(), vec!["a", "a"]);
}

#[tokio::test(start_paused = true)]
async fn test_next_and_previous_are_noops_at_boundaries() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine.set_queue(vec![item("a", 10.0), item("b", 10.0)]).await;

    assert!(!t.engine.previous().await);
    assert_eq!(t.engine.snapshot().await.current_index, 0);

    assert!(t.engine.next().await);
    assert_eq!(t.engine.snapshot().await.current_index, 1);

    assert!(!t.engine.next().await);
    let snap = t.engine.snapshot().await;
    assert_eq!(snap.current_index, 1);
    assert!(snap.is_playing);
    assert_eq!(t.factory.loads(), vec!["a", "b"]);

    assert!(t.engine.previous().await);
    assert_eq!(t.engine.snapshot().await.current_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_play_at_index_out_of_bounds_is_ignored() {
    let t = test_engine(MockVoiceFactory::default());
    let mut rx = t.bus.subscribe();
    t.engine
        .set_queue(vec![item("a", 10.0), item("b", 10.0), item("c", 10.0)])
        .await;

    assert!(!t.engine.play_at_index(3).await);
    assert_eq!(t.engine.snapshot().await.current_index, 0);

    assert!(t.engine.play_at_index(2).await);
    let snap = t.engine.snapshot().await;
    assert_eq!(snap.current_index, 2);
    assert_eq!(snap.live_voices, 1);

    let events = drain(&mut rx);
    assert_eq!(
        started(&events),
        vec![(0, StartReason::QueueStart), (2, StartReason::Jump)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_first_item_is_not_loaded() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine
        .set_queue(vec![silent_item("gap", 4.0), item("b", 10.0)])
        .await;

    let snap = t.engine.snapshot().await;
    assert!(!snap.is_playing);
    assert_eq!(snap.duration_seconds, 4.0);
    assert_eq!(snap.current_state, SlotState::Idle);
    assert_eq!(snap.live_voices, 0);
    assert!(t.factory.loads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_short_item_hard_advances_without_crossfade() {
    // Given an item shorter than the window
    let t = test_engine(MockVoiceFactory::default());
    let mut rx = t.bus.subscribe();
    t.engine.set_queue(vec![item("blip", 1.5), item("b", 10.0)]).await;

    run_for(&t.engine, secs(1.2)).await;
    assert!(!t.engine.snapshot().await.crossfading);

    run_for(&t.engine, secs(0.4)).await;
    let snap = t.engine.snapshot().await;
    assert_eq!(snap.current_index, 1);
    assert!(snap.is_playing);
    assert_eq!(snap.live_voices, 1);

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, DjmxEvent::CrossfadeStarted { .. })));
    assert_eq!(
        started(&events),
        vec![(0, StartReason::QueueStart), (1, StartReason::AutoAdvance)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_next_item_skips_crossfade() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine
        .set_queue(vec![item("a", 10.0), silent_item("gap", 5.0)])
        .await;

    run_for(&t.engine, secs(9.0)).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.crossfading);
    assert_eq!(snap.live_voices, 1);

    run_for(&t.engine, secs(1.2)).await;
    let snap = t.engine.snapshot().await;
    assert_eq!(snap.current_index, 1);
    assert!(!snap.is_playing);
    assert_eq!(snap.live_voices, 0);
    assert_eq!(t.factory.loads(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_queue_tail_ends_playback() {
    let t = test_engine(MockVoiceFactory::default());
    let mut rx = t.bus.subscribe();
    t.engine.set_queue(vec![item("only", 3.0)]).await;

    run_for(&t.engine, secs(3.2)).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Ended);
    assert_eq!(snap.current_time_seconds, 3.0);
    assert_eq!(snap.current_index, 0);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        DjmxEvent::PlaybackStateChanged {
            is_playing: false,
            ..
        }
    )));

    // Play after the end restarts the item
    t.engine.play().await;
    let snap = t.engine.snapshot().await;
    assert!(snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Playing);
    assert_eq!(t.factory.loads(), vec!["only", "only"]);
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_stalls_without_advancing() {
    let t = test_engine(MockVoiceFactory::failing_on(&["broken"]));
    t.engine
        .set_queue(vec![item("broken", 10.0), item("b", 10.0)])
        .await;

    run_for(&t.engine, secs(1.0)).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.is_playing);
    assert_eq!(snap.current_index, 0);
    assert_eq!(snap.current_state, SlotState::Idle);
    assert_eq!(snap.live_voices, 0);
    assert_eq!(t.factory.loads(), vec!["broken"]);

    // Skipping past it still works
    assert!(t.engine.next().await);
    assert!(t.engine.is_playing().await);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_position_and_play_resumes() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine.set_queue(vec![item("a", 30.0)]).await;

    run_for(&t.engine, secs(3.0)).await;
    t.engine.pause().await;
    tokio::time::advance(secs(5.0)).await;
    t.engine.play().await;
    run_for(&t.engine, secs(1.0)).await;

    let snap = t.engine.snapshot().await;
    assert!(snap.is_playing);
    assert!((snap.current_time_seconds - 4.0).abs() < 1e-6);
    assert_eq!(t.factory.loads(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_crossfade_holds_both_voices() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine.set_queue(vec![item("a", 10.0), item("b", 10.0)]).await;

    run_for(&t.engine, secs(8.5)).await;
    assert!(t.engine.snapshot().await.crossfading);

    t.engine.pause().await;
    run_for(&t.engine, secs(5.0)).await;
    let snap = t.engine.snapshot().await;
    assert!(snap.crossfading);
    assert_eq!(snap.live_voices, 2);
    assert_eq!(snap.current_index, 0);

    t.engine.play().await;
    assert_eq!(t.engine.snapshot().await.current_state, SlotState::FadingOut);
    run_for(&t.engine, secs(1.6)).await;
    let snap = t.engine.snapshot().await;
    assert_eq!(snap.current_index, 1);
    assert_eq!(snap.live_voices, 1);
}

#[tokio::test(start_paused = true)]
async fn test_seek_cancels_crossfade_and_rearms() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine.set_queue(vec![item("a", 10.0), item("b", 10.0)]).await;

    run_for(&t.engine, secs(8.5)).await;
    assert!(t.engine.snapshot().await.crossfading);

    t.engine.seek(2.0).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.crossfading);
    assert_eq!(snap.live_voices, 1);
    assert_eq!(t.factory.live_voices(), 1);
    assert_eq!(t.factory.volume_of("a"), Some(0.8));
    assert_eq!(snap.current_time_seconds, 2.0);

    // The window comes around again from the new position
    run_for(&t.engine, secs(6.3)).await;
    let snap = t.engine.snapshot().await;
    assert!(snap.crossfading);
    assert_eq!(snap.current_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_volume_scales_crossfade_ramp() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine.set_queue(vec![item("a", 10.0), item("b", 10.0)]).await;

    run_for(&t.engine, secs(9.0)).await;
    t.engine.set_volume(0.5).await;

    // Halfway through a linear ramp at volume 0.5
    let out_gain = t.factory.volume_of("a").unwrap();
    let in_gain = t.factory.volume_of("b").unwrap();
    assert!((out_gain - 0.25).abs() < 1e-4);
    assert!((in_gain - 0.25).abs() < 1e-4);
    assert_eq!(t.engine.volume().await, 0.5);

    t.engine.set_volume(3.0).await;
    assert_eq!(t.engine.volume().await, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_insert_after_current_plays_next() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine
        .set_queue(vec![item("a", 10.0), item("b", 10.0), item("c", 10.0)])
        .await;
    t.engine.next().await;

    t.engine.insert_after_current(dj_segment()).await;
    t.engine.append_to_queue(vec![item("d", 10.0)]).await;

    let snap = t.engine.snapshot().await;
    let ids: Vec<&str> = snap.queue.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "intro", "song", "outro", "c", "d"]);
    assert_eq!(snap.current_index, 1);

    t.engine.next().await;
    let current = t.engine.current_item().await.unwrap();
    assert_eq!(current.id, "intro");
}

#[tokio::test(start_paused = true)]
async fn test_insert_during_crossfade_retargets_next() {
    let t = test_engine(MockVoiceFactory::default());
    t.engine.set_queue(vec![item("a", 10.0), item("b", 10.0)]).await;

    run_for(&t.engine, secs(8.5)).await;
    assert!(t.engine.snapshot().await.crossfading);

    t.engine.insert_after_current(dj_segment()).await;
    let snap = t.engine.snapshot().await;
    assert!(!snap.crossfading);
    assert_eq!(snap.live_voices, 1);

    // Re-armed immediately; the new next item fades in
    run_for(&t.engine, secs(0.1)).await;
    run_for(&t.engine, secs(2.0)).await;
    let current = t.engine.current_item().await.unwrap();
    assert_eq!(current.id, "intro");
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_while_playing() {
    let t = test_engine(MockVoiceFactory::default());
    let mut rx = t.bus.subscribe();
    t.engine.set_queue(vec![item("a", 30.0)]).await;

    run_for(&t.engine, secs(2.0)).await;
    let events = drain(&mut rx);
    let progress = events
        .iter()
        .filter(|e| matches!(e, DjmxEvent::PlaybackProgress { .. }))
        .count();
    assert_eq!(progress, 2);
}

#[tokio::test(start_paused = true)]
async fn test_set_queue_reports_stopped_while_loading() {
    let t = test_engine(MockVoiceFactory::slow_on("slow", secs(3.0)));
    t.engine.set_queue(vec![item("a", 10.0)]).await;
    run_for(&t.engine, secs(1.0)).await;
    assert!(t.engine.is_playing().await);

    let engine = t.engine.clone();
    let replace = tokio::spawn(async move {
        engine.set_queue(vec![item("slow", 10.0)]).await;
    });
    settle().await;

    // Old voice is gone and the new one is not up yet
    let snap = t.engine.snapshot().await;
    assert!(!snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Loading);
    assert_eq!(snap.live_voices, 0);
    assert_eq!(snap.current_time_seconds, 0.0);

    run_for(&t.engine, secs(3.1)).await;
    replace.await.unwrap();
    let snap = t.engine.snapshot().await;
    assert!(snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Playing);
    assert_eq!(t.factory.live_voices(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_load_holds_item_paused() {
    let t = test_engine(MockVoiceFactory::slow_on("b", secs(3.0)));
    t.engine
        .set_queue(vec![item("a", 10.0), item("b", 10.0)])
        .await;

    let engine = t.engine.clone();
    let skip = tokio::spawn(async move { engine.next().await });
    settle().await;
    t.engine.pause().await;

    run_for(&t.engine, secs(3.1)).await;
    assert!(skip.await.unwrap());
    let snap = t.engine.snapshot().await;
    assert_eq!(snap.current_index, 1);
    assert!(!snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Paused);
    assert_eq!(snap.live_voices, 1);

    // Position holds until play
    run_for(&t.engine, secs(1.0)).await;
    assert_eq!(t.engine.snapshot().await.current_time_seconds, 0.0);

    t.engine.play().await;
    run_for(&t.engine, secs(1.0)).await;
    let snap = t.engine.snapshot().await;
    assert!(snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Playing);
    assert!((snap.current_time_seconds - 1.0).abs() < 0.15);
}

#[tokio::test(start_paused = true)]
async fn test_play_during_load_clears_held_pause() {
    let t = test_engine(MockVoiceFactory::slow_on("b", secs(3.0)));
    t.engine
        .set_queue(vec![item("a", 10.0), item("b", 10.0)])
        .await;

    let engine = t.engine.clone();
    let skip = tokio::spawn(async move { engine.next().await });
    settle().await;
    t.engine.pause().await;
    t.engine.play().await;

    run_for(&t.engine, secs(3.1)).await;
    assert!(skip.await.unwrap());
    let snap = t.engine.snapshot().await;
    assert!(snap.is_playing);
    assert_eq!(snap.current_state, SlotState::Playing);
}
