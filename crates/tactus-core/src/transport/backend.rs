//! The host that owns the playback graph.

use super::playhead::Playhead;
use super::position::TimeRange;
use super::state::RecordedClip;
use std::sync::Arc;

/// Graph host driven by the transport state machine.
///
/// All methods are called on the control thread. The playhead handed to
/// [`create_nodes`](PlaybackBackend::create_nodes) is the one the render
/// thread must advance.
pub trait PlaybackBackend: Send {
    /// Device sample rate, `None` when no output device is open.
    fn sample_rate(&self) -> Option<f64>;

    /// Whether there is anything to play at all.
    fn should_play(&self) -> bool {
        true
    }

    /// Build (or with `force`, rebuild) the render nodes, starting at `start`.
    fn create_nodes(&mut self, playhead: &Arc<Playhead>, start: f64, force: bool);

    fn release_nodes(&mut self);

    /// The playback context is being dropped.
    fn free_context(&mut self) {}

    /// Output latency subtracted from the playhead for the audible position.
    fn latency_samples(&self) -> i64 {
        0
    }

    fn any_inputs_armed(&self) -> bool;

    fn prepare_for_recording(&mut self, preroll_start: f64, start: f64);

    /// Finish the takes covering `range`, or throw them away when `discard`.
    fn recording_finished(&mut self, range: TimeRange, discard: bool) -> Vec<RecordedClip>;
}

/// The playhead of one allocated playback graph.
#[derive(Debug, Clone)]
pub struct PlaybackContext {
    playhead: Arc<Playhead>,
}

impl PlaybackContext {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            playhead: Arc::new(Playhead::new(sample_rate)),
        }
    }

    #[inline]
    pub fn playhead(&self) -> &Arc<Playhead> {
        &self.playhead
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.playhead.sample_rate()
    }

    pub fn position(&self) -> f64 {
        self.playhead.samples_to_time(self.playhead.position())
    }

    pub fn unlooped_position(&self) -> f64 {
        self.playhead.samples_to_time(self.playhead.unlooped_position())
    }

    pub fn set_position(&self, time: f64) {
        self.playhead.set_position(self.playhead.time_to_samples(time));
    }

    pub fn play(&self, range: TimeRange, looped: bool) {
        self.playhead.play_range(range.to_samples(self.sample_rate()), looped);
    }

    pub fn set_loop_times(&self, looping: bool, range: TimeRange) {
        self.playhead
            .set_loop_range(looping, range.to_samples(self.sample_rate()));
    }

    pub fn set_roll_in_to_loop(&self, preroll_start: f64) {
        self.playhead
            .set_roll_in_to_loop(self.playhead.time_to_samples(preroll_start));
    }

    /// Playhead position minus output latency.
    pub fn audible_position(&self, latency_samples: i64) -> f64 {
        self.playhead
            .samples_to_time(self.playhead.position() - latency_samples)
    }
}
