//! Transport integration tests
//!
//! Play / record / stop through the engine, with listener and sync traffic.

use crate::helpers::*;
use tactus::prelude::*;
use tactus::Timecode;

fn without_goto(sent: &[MachineCommand]) -> Vec<MachineCommand> {
    sent.iter()
        .copied()
        .filter(|c| !matches!(c, MachineCommand::Goto(_)))
        .collect()
}

/// Test basic play/stop operations.
#[test]
fn test_transport_play_stop() {
    let fx = test_fixture();
    assert_eq!(fx.engine.mode(), TransportMode::Stopped);
    assert!(!fx.engine.transport().is_play_context_active());

    fx.engine.play().unwrap();
    assert!(fx.engine.is_playing());
    assert!(fx.engine.transport().is_play_context_active());

    let block = fx.probe.render(TEST_BUFFER_SIZE);
    assert_eq!(block.range.first.start, 0);
    assert_eq!(block.range.first.end, TEST_BUFFER_SIZE as i64);

    fx.engine.stop().unwrap();
    assert!(!fx.engine.is_playing());
    assert!(!fx.probe.playhead().unwrap().is_playing());

    assert_eq!(
        fx.listener.states(),
        vec![TransportMode::Playing, TransportMode::Stopped]
    );
    assert!(fx.listener.heard().contains(&Heard::ContextChanged));

    let log = fx.probe.log();
    assert_eq!(log.forced_allocations, 1);
    assert_eq!(log.releases, 0);
    assert_eq!(without_goto(&fx.sent.lock()), vec![MachineCommand::Stop]);
}

/// Playing twice is a no-op; toggling flips between the two states.
#[test]
fn test_transport_toggle_play() {
    let fx = test_fixture();

    fx.engine.toggle_play().unwrap();
    fx.engine.play().unwrap();
    assert!(fx.engine.is_playing());

    fx.engine.toggle_play().unwrap();
    assert!(!fx.engine.is_playing());
    assert_eq!(fx.listener.states().len(), 2);
}

#[test]
fn test_transport_rejection_reaches_caller_and_listener() {
    let fx = test_fixture();
    fx.engine.set_loop_range(TimeRange::new(1.0, 1.005));
    fx.engine.set_looping(true);

    let err = fx.engine.play().unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::LoopTooShortToPlay));
    assert_eq!(fx.listener.warnings(), vec![Rejection::LoopTooShortToPlay]);
    assert_eq!(fx.engine.mode(), TransportMode::Stopped);
    // the cursor was still moved into the loop
    assert_eq!(fx.engine.position(), 1.0);
}

#[test]
fn test_record_without_inputs_is_refused() {
    let fx = test_fixture();
    fx.probe.set_armed(false);

    let err = fx.engine.record().unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NoInputsArmed));
    assert!(!fx.engine.is_recording());

    // allowed explicitly
    fx.engine.transport().record(false, true).unwrap();
    assert!(fx.engine.is_recording());
}

#[test]
fn test_builder_requires_backend() {
    let result = TactusEngine::builder().build();
    assert!(matches!(result, Err(Error::NoBackend)));
}

#[test]
fn test_builder_validates_config() {
    let (backend, _) = MockBackend::new(tactus::shared_tempo_map(TempoMap::default()));
    let result = TactusEngine::builder()
        .backend(Box::new(backend))
        .config(TransportConfig {
            min_record_loop: 0.001,
            ..Default::default()
        })
        .manual_reconcile()
        .build();

    assert!(matches!(
        result,
        Err(Error::Core(tactus::core::Error::InvalidConfig(_)))
    ));
}

#[test]
fn test_seek_broadcasts_timecode() {
    let fx = test_fixture();
    fx.engine.set_position(125.0);

    assert_eq!(fx.engine.position(), 125.0);
    assert_eq!(
        fx.sent.lock().last().copied(),
        Some(MachineCommand::Goto(Timecode::new(0, 2, 5, 0)))
    );
    assert!(fx.listener.heard().contains(&Heard::Position(125.0)));
}

#[test]
fn test_wind_buttons_send_machine_commands() {
    let fx = test_fixture();
    {
        let mut transport = fx.engine.transport();
        transport.set_rewind_button_down(true);
        assert!(transport.is_nudging());
        assert!(transport.is_user_dragging());
        transport.set_rewind_button_down(false);
        assert!(!transport.is_user_dragging());
    }
    assert_eq!(
        without_goto(&fx.sent.lock()),
        vec![MachineCommand::Rewind, MachineCommand::Stop]
    );

    fx.sent.lock().clear();
    fx.engine.play().unwrap();
    {
        let mut transport = fx.engine.transport();
        transport.set_fast_forward_button_down(true);
        transport.set_fast_forward_button_down(false);
    }
    assert_eq!(
        without_goto(&fx.sent.lock()),
        vec![MachineCommand::FastForward, MachineCommand::Play]
    );
}

#[test]
fn test_record_and_stop_produces_take() {
    let fx = test_fixture();
    fx.engine.set_position(2.0);
    fx.engine.record().unwrap();
    assert_eq!(fx.engine.mode(), TransportMode::Recording);
    assert_eq!(fx.probe.log().prepared, vec![(2.0, 2.0)]);
    assert!(fx.sent.lock().contains(&MachineCommand::RecordStart));

    fx.probe.render_frames(TEST_SAMPLE_RATE as usize, TEST_BUFFER_SIZE);
    fx.engine.stop().unwrap();

    let take = TimeRange::new(2.0, 3.0);
    let expected = RecordedClip::Audio {
        source: "take-1.wav".into(),
        range: take,
    };
    assert!(fx
        .listener
        .heard()
        .contains(&Heard::RecordingFinished(vec![expected], take)));
    assert_eq!(fx.probe.log().finished, vec![(take, false)]);
    assert_eq!(fx.engine.position(), 3.0);
    assert_eq!(
        fx.listener.states(),
        vec![TransportMode::Recording, TransportMode::Stopped]
    );
}

#[test]
fn test_abort_recording_discards_take() {
    let fx = test_fixture();
    fx.engine.set_position(2.0);
    fx.engine.record().unwrap();
    fx.probe.render_frames(24000, TEST_BUFFER_SIZE);

    fx.engine.abort_recording().unwrap();

    let log = fx.probe.log();
    assert_eq!(log.finished.len(), 1);
    assert!(log.finished[0].1);
    assert!(fx.listener.heard().contains(&Heard::RecordingFinished(
        Vec::new(),
        TimeRange::new(2.0, 2.5)
    )));
    assert_eq!(fx.engine.position(), 2.0);
}

#[test]
fn test_abort_without_recording_warns() {
    let fx = test_fixture();
    fx.engine.play().unwrap();
    fx.engine.abort_recording().unwrap();

    assert!(!fx.engine.is_playing());
    assert_eq!(fx.listener.warnings(), vec![Rejection::NothingToAbort]);
}

#[test]
fn test_return_to_start_on_stop() {
    let fx = fixture(
        tactus::TransportConfig {
            timeline_length: 60.0,
            reset_cursor_on_stop: true,
            ..Default::default()
        },
        ClickConfig::default(),
        tactus::ClickOutput::Audio,
    );
    fx.engine.set_position(4.0);
    fx.engine.play().unwrap();
    fx.probe.render_frames(48000, TEST_BUFFER_SIZE);
    fx.engine.reconcile_at(std::time::Instant::now() + std::time::Duration::from_secs(1));
    assert_eq!(fx.engine.position(), 5.0);

    fx.engine.stop().unwrap();
    assert_eq!(fx.engine.position(), 4.0);

    // inverted for one stop
    fx.engine.play().unwrap();
    fx.probe.render_frames(48000, TEST_BUFFER_SIZE);
    fx.engine.reconcile_at(std::time::Instant::now() + std::time::Duration::from_secs(1));
    fx.engine
        .stop_with(StopOptions {
            invert_return_to_start: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(fx.engine.position(), 5.0);
}

#[test]
fn test_clear_devices_on_stop_releases_nodes() {
    let fx = test_fixture();
    fx.engine.play().unwrap();
    fx.engine
        .stop_with(StopOptions {
            clear_devices: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(fx.probe.log().releases, 1);
}
