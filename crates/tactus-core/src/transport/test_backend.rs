//! Recording backend shared by the transport unit tests.

use super::backend::PlaybackBackend;
use super::click::ClickState;
use super::playhead::Playhead;
use super::position::TimeRange;
use super::state::RecordedClip;
use super::state_machine::TransportStateMachine;
use crate::config::TransportConfig;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct Calls {
    pub armed: bool,
    pub created: u32,
    pub forced: u32,
    pub released: u32,
    pub finished: Vec<(TimeRange, bool)>,
    pub prepared: Vec<(f64, f64)>,
}

pub(crate) struct TestBackend {
    calls: Arc<Mutex<Calls>>,
    sample_rate: Option<f64>,
}

impl PlaybackBackend for TestBackend {
    fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    fn create_nodes(&mut self, _playhead: &Arc<Playhead>, _start: f64, force: bool) {
        let mut calls = self.calls.lock();
        calls.created += 1;
        if force {
            calls.forced += 1;
        }
    }

    fn release_nodes(&mut self) {
        self.calls.lock().released += 1;
    }

    fn any_inputs_armed(&self) -> bool {
        self.calls.lock().armed
    }

    fn prepare_for_recording(&mut self, preroll_start: f64, start: f64) {
        self.calls.lock().prepared.push((preroll_start, start));
    }

    fn recording_finished(&mut self, range: TimeRange, discard: bool) -> Vec<RecordedClip> {
        self.calls.lock().finished.push((range, discard));
        if discard {
            Vec::new()
        } else {
            vec![RecordedClip::Midi {
                range,
                note_count: 0,
            }]
        }
    }
}

/// Debug logs to the test writer; later calls are no-ops.
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn test_machine(
    config: TransportConfig,
    armed: bool,
    sample_rate: Option<f64>,
) -> (TransportStateMachine, Arc<Mutex<Calls>>) {
    init_test_logging();
    let calls = Arc::new(Mutex::new(Calls {
        armed,
        ..Default::default()
    }));
    let backend = TestBackend {
        calls: Arc::clone(&calls),
        sample_rate,
    };
    let tsm = TransportStateMachine::new(config, Box::new(backend), Arc::new(ClickState::new()))
        .expect("valid test config");
    (tsm, calls)
}
