//! Reconciler integration tests
//!
//! The logical position catching up with the render side, both from the
//! background thread and from manual ticks.

use crate::helpers::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tactus::prelude::*;
use tactus::ClickOutput;

fn absolute_notes(blocks: &[RenderedBlock]) -> Vec<i64> {
    blocks
        .iter()
        .flat_map(|b| {
            b.notes
                .iter()
                .map(move |n| b.range.first.start + n.frame_offset as i64)
        })
        .collect()
}

#[test]
fn test_background_reconciler_follows_render() {
    let tempo = tactus::shared_tempo_map(TempoMap::default());
    let (backend, probe) = MockBackend::new(Arc::clone(&tempo));
    let engine = TactusEngine::builder()
        .backend(Box::new(backend))
        .tempo_map(tempo)
        .config(TransportConfig {
            reconcile_interval_ms: 5,
            ..Default::default()
        })
        .build()
        .expect("Failed to create test engine");
    assert!(engine.is_running());

    engine.play().unwrap();
    probe.render_frames(TEST_SAMPLE_RATE as usize, TEST_BUFFER_SIZE);

    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.position() != 1.0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(engine.position(), 1.0);

    engine.stop().unwrap();
    drop(engine);
}

#[test]
fn test_play_window_end_stops_transport() {
    let fx = fixture(
        TransportConfig {
            max_length: 2.0,
            timeline_length: 2.0,
            ..Default::default()
        },
        ClickConfig::default(),
        ClickOutput::Audio,
    );
    fx.engine.play().unwrap();
    fx.probe.render_frames(2 * TEST_SAMPLE_RATE as usize, TEST_BUFFER_SIZE);
    assert!(!fx.probe.playhead().unwrap().is_playing());
    assert!(fx.engine.is_playing());

    fx.engine.reconcile_at(Instant::now());
    assert!(!fx.engine.is_playing());
    assert_eq!(fx.engine.position(), 2.0);
    assert_eq!(
        fx.listener.states(),
        vec![TransportMode::Playing, TransportMode::Stopped]
    );
}

#[test]
fn test_disarmed_inputs_end_the_take() {
    let fx = test_fixture();
    fx.engine.record().unwrap();
    fx.probe.render_frames(24_000, TEST_BUFFER_SIZE);

    fx.engine.reconcile_at(Instant::now());
    assert!(fx.engine.is_recording());

    fx.probe.set_armed(false);
    fx.engine.reconcile_at(Instant::now());
    assert!(!fx.engine.is_recording());
    assert_eq!(fx.probe.log().finished.len(), 1);
}

/// A tempo change under a reallocation guard keeps the old click grid
/// until the guard drops and the reconciler rebuilds the graph.
#[test]
fn test_guarded_tempo_change_applies_on_next_tick() {
    let click = ClickConfig {
        enabled: true,
        ..Default::default()
    };
    let fx = fixture(
        TransportConfig {
            timeline_length: 60.0,
            ..Default::default()
        },
        click,
        ClickOutput::Midi,
    );
    fx.engine.play().unwrap();

    let guard = fx.engine.acquire_reallocation_guard();
    fx.engine.set_tempo_map(TempoMap::new(60.0));

    let before = fx.probe.render_frames(28_800, 480);
    assert_eq!(absolute_notes(&before), vec![0, 24_000]);
    assert_eq!(fx.probe.log().forced_allocations, 1);

    fx.engine.reconcile_at(Instant::now());
    assert_eq!(fx.probe.log().forced_allocations, 1);

    drop(guard);
    fx.engine.reconcile_at(Instant::now());
    assert_eq!(fx.probe.log().forced_allocations, 2);

    let after = fx.probe.render_frames(72_000, 480);
    assert_eq!(absolute_notes(&after), vec![48_000, 96_000]);
}

#[test]
fn test_stop_from_render_side_is_picked_up() {
    let fx = test_fixture();
    fx.engine.play().unwrap();
    fx.probe.render_frames(4_800, TEST_BUFFER_SIZE);

    fx.probe.playhead().unwrap().stop();
    fx.engine.reconcile_at(Instant::now());

    assert!(!fx.engine.is_playing());
    assert_eq!(fx.listener.states().last(), Some(&TransportMode::Stopped));
}
