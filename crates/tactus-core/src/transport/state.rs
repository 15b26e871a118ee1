//! Logical transport state and its observers.
//!
//! [`TransportState`] lives on the control thread only. Setters that change
//! something observers care about call every registered
//! [`TransportListener`] synchronously, in registration order.

use super::position::TimeRange;
use crate::error::Rejection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Unset value of [`TransportState::cursor_pos_at_start`].
pub const CURSOR_POS_UNSET: f64 = -1000.0;

const DEFAULT_SCRUB_INTERVAL: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stopped,
    Playing,
    Recording,
}

/// A take produced when recording stops.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedClip {
    Audio { source: PathBuf, range: TimeRange },
    Midi { range: TimeRange, note_count: usize },
}

impl RecordedClip {
    pub fn range(&self) -> TimeRange {
        match self {
            RecordedClip::Audio { range, .. } | RecordedClip::Midi { range, .. } => *range,
        }
    }
}

/// Transport observer. Every method defaults to a no-op.
pub trait TransportListener: Send + Sync {
    fn state_changed(&self, _mode: TransportMode) {}

    fn position_changed(&self, _position: f64) {}

    fn playback_context_changed(&self) {}

    fn loop_changed(&self, _enabled: bool, _range: TimeRange) {}

    fn recording_finished(&self, _clips: &[RecordedClip], _range: TimeRange) {}

    /// A command was refused; show `rejection` to the user.
    fn warning(&self, _rejection: &Rejection) {}

    fn video_position(&self, _time: f64, _force_jump: bool) {}

    fn start_video(&self) {}

    fn stop_video(&self) {}

    /// Recording just stopped and playback carries on.
    fn auto_save_now(&self) {}
}

pub struct TransportState {
    playing: bool,
    recording: bool,
    safe_recording: bool,
    start_time: f64,
    end_time: f64,
    position: f64,
    looping: bool,
    loop_point1: f64,
    loop_point2: f64,
    cursor_pos_at_start: f64,
    user_dragging: bool,
    last_user_drag_time: Option<Instant>,
    clear_devices_on_stop: bool,
    snap_to_timecode: bool,
    scrub_interval: f64,
    rewind_button_down: bool,
    fast_forward_button_down: bool,
    playback_context_allocation: u32,
    last_mode: TransportMode,
    listeners: Vec<Arc<dyn TransportListener>>,
}

impl TransportState {
    pub fn new() -> Self {
        Self {
            playing: false,
            recording: false,
            safe_recording: false,
            start_time: 0.0,
            end_time: 0.0,
            position: 0.0,
            looping: false,
            loop_point1: 0.0,
            loop_point2: 0.0,
            cursor_pos_at_start: CURSOR_POS_UNSET,
            user_dragging: false,
            last_user_drag_time: None,
            clear_devices_on_stop: false,
            snap_to_timecode: true,
            scrub_interval: DEFAULT_SCRUB_INTERVAL,
            rewind_button_down: false,
            fast_forward_button_down: false,
            playback_context_allocation: 0,
            last_mode: TransportMode::Stopped,
            listeners: Vec::new(),
        }
    }

    // --- listeners ---

    pub fn add_listener(&mut self, listener: Arc<dyn TransportListener>) {
        self.listeners.push(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn TransportListener>) {
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn num_listeners(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, f: impl Fn(&dyn TransportListener)) {
        for listener in &self.listeners {
            f(listener.as_ref());
        }
    }

    pub fn warn(&self, rejection: &Rejection) {
        tracing::warn!(%rejection, "transport command rejected");
        self.notify(|l| l.warning(rejection));
    }

    pub fn recording_finished(&self, clips: &[RecordedClip], range: TimeRange) {
        self.notify(|l| l.recording_finished(clips, range));
    }

    pub fn set_video_position(&self, time: f64, force_jump: bool) {
        self.notify(|l| l.video_position(time, force_jump));
    }

    // --- play flags ---

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    #[inline]
    pub fn is_safe_recording(&self) -> bool {
        self.recording && self.safe_recording
    }

    pub fn mode(&self) -> TransportMode {
        if self.recording {
            TransportMode::Recording
        } else if self.playing {
            TransportMode::Playing
        } else {
            TransportMode::Stopped
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn set_recording(&mut self, recording: bool, safe: bool) {
        self.recording = recording;
        self.safe_recording = recording && safe;
    }

    pub fn clear_play_flags(&mut self) {
        self.playing = false;
        self.recording = false;
        self.safe_recording = false;
    }

    /// Notify observers if the mode differs from the last notification.
    pub fn notify_if_mode_changed(&mut self) {
        let mode = self.mode();
        if mode == self.last_mode {
            return;
        }
        let was_recording = self.last_mode == TransportMode::Recording;
        self.last_mode = mode;
        tracing::debug!(?mode, "transport mode changed");

        self.notify(|l| l.state_changed(mode));

        if self.playing {
            let position = self.position;
            self.notify(|l| l.video_position(position, true));
            self.notify(|l| l.start_video());
            if was_recording {
                self.notify(|l| l.auto_save_now());
            }
        } else {
            self.notify(|l| l.stop_video());
        }
    }

    // --- play window ---

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn set_play_window(&mut self, start: f64, end: f64) {
        self.start_time = start;
        self.end_time = end;
    }

    pub fn cursor_pos_at_start(&self) -> f64 {
        self.cursor_pos_at_start
    }

    pub fn set_cursor_pos_at_start(&mut self, position: f64) {
        self.cursor_pos_at_start = position;
    }

    // --- position ---

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn set_position(&mut self, position: f64) {
        if self.position == position {
            return;
        }
        self.position = position;
        self.notify(|l| l.position_changed(position));
    }

    // --- loop ---

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        if self.looping == looping {
            return;
        }
        self.looping = looping;
        self.notify_loop_changed();
    }

    pub fn loop_points(&self) -> (f64, f64) {
        (self.loop_point1, self.loop_point2)
    }

    /// Loop range with `start <= end` whatever the point order.
    pub fn loop_range(&self) -> TimeRange {
        TimeRange::between(self.loop_point1, self.loop_point2)
    }

    pub fn set_loop_points(&mut self, point1: f64, point2: f64) {
        if (self.loop_point1, self.loop_point2) == (point1, point2) {
            return;
        }
        self.loop_point1 = point1;
        self.loop_point2 = point2;
        self.notify_loop_changed();
    }

    fn notify_loop_changed(&self) {
        let enabled = self.looping;
        let range = self.loop_range();
        self.notify(|l| l.loop_changed(enabled, range));
    }

    // --- drag ---

    pub fn is_user_dragging(&self) -> bool {
        self.user_dragging
    }

    pub fn set_user_dragging(&mut self, dragging: bool) {
        self.user_dragging = dragging;
    }

    pub fn last_user_drag_time(&self) -> Option<Instant> {
        self.last_user_drag_time
    }

    pub fn stamp_user_drag(&mut self, now: Instant) {
        self.last_user_drag_time = Some(now);
    }

    // --- misc flags ---

    pub fn clear_devices_on_stop(&self) -> bool {
        self.clear_devices_on_stop
    }

    pub fn set_clear_devices_on_stop(&mut self, clear: bool) {
        self.clear_devices_on_stop = clear;
    }

    pub fn snap_to_timecode(&self) -> bool {
        self.snap_to_timecode
    }

    pub fn set_snap_to_timecode(&mut self, snap: bool) {
        self.snap_to_timecode = snap;
    }

    pub fn scrub_interval(&self) -> f64 {
        self.scrub_interval
    }

    pub fn set_scrub_interval(&mut self, interval: f64) {
        self.scrub_interval = interval;
    }

    pub fn rewind_button_down(&self) -> bool {
        self.rewind_button_down
    }

    pub fn set_rewind_button_down(&mut self, down: bool) {
        self.rewind_button_down = down;
    }

    pub fn fast_forward_button_down(&self) -> bool {
        self.fast_forward_button_down
    }

    pub fn set_fast_forward_button_down(&mut self, down: bool) {
        self.fast_forward_button_down = down;
    }

    // --- playback context ---

    pub fn playback_context_allocation(&self) -> u32 {
        self.playback_context_allocation
    }

    pub fn context_allocated(&mut self) {
        self.playback_context_allocation += 1;
        self.notify(|l| l.playback_context_changed());
    }

    pub fn context_freed(&mut self) {
        self.playback_context_allocation = self.playback_context_allocation.saturating_sub(1);
        self.notify(|l| l.playback_context_changed());
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportState")
            .field("mode", &self.mode())
            .field("position", &self.position)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("looping", &self.looping)
            .field("loop_range", &self.loop_range())
            .field("user_dragging", &self.user_dragging)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
