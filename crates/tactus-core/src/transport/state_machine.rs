//! Play, record and stop semantics over the playhead and playback graph.
//!
//! [`TransportStateMachine`] runs on the control thread. It owns the logical
//! [`TransportState`], allocates the playback graph through a
//! [`PlaybackBackend`] and posts directives to the real-time [`Playhead`].
//! Refused commands return [`Error::Rejected`] after warning listeners; the
//! transport is left as it was.

use super::backend::{PlaybackBackend, PlaybackContext};
use super::click::ClickState;
use super::guard::{ReallocationGuard, ReallocationInhibitor};
use super::nudge::{NudgeAction, NudgeController, NudgeDirection};
use super::playhead::Playhead;
use super::position::{TimeRange, MIN_LOOP_LENGTH};
use super::snap::SnapGrid;
use super::state::{TransportListener, TransportMode, TransportState};
use super::sync::{timecode_for, SyncOutput, SyncOutputs, TempoSyncPeer};
use super::tempo_map::TempoMap;
use arc_swap::ArcSwap;
use crate::config::TransportConfig;
use crate::error::Rejection;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tactus_midi::MachineCommand;

/// Looped play restarts from the loop start when the cursor is this close to the end.
const LOOP_END_MARGIN: f64 = 0.1;

/// Free-run recording starting this close to zero starts at zero.
const ZERO_SNAP: f64 = 0.005;

/// Punch recording starts this long before the punch-in point.
const PUNCH_PREROLL: f64 = 1.0;

/// Offset that makes a nudge snap past the grid line under the cursor.
const SNAP_NUDGE: f64 = 1.0e-5;

/// Tempo map shared between the state machine and the graph builder.
pub type SharedTempoMap = Arc<ArcSwap<TempoMap>>;

pub fn shared_tempo_map(tempo_map: TempoMap) -> SharedTempoMap {
    Arc::new(ArcSwap::from_pointee(tempo_map))
}

/// Options for [`TransportStateMachine::stop_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOptions {
    /// Throw the recording away and return to where it started.
    pub discard: bool,
    /// Release the render nodes after stopping.
    pub clear_devices: bool,
    /// Broadcast STOP to sync outputs.
    pub send_sync_stop: bool,
    /// Flip the configured return-to-start behaviour for this stop.
    pub invert_return_to_start: bool,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            discard: false,
            clear_devices: false,
            send_sync_stop: true,
            invert_return_to_start: false,
        }
    }
}

/// A range being auditioned by [`TransportStateMachine::play_section_and_reset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionPlayback {
    pub range: TimeRange,
    pub was_looping: bool,
}

pub struct TransportStateMachine {
    config: TransportConfig,
    state: TransportState,
    backend: Box<dyn PlaybackBackend>,
    context: Option<PlaybackContext>,
    inhibitor: Arc<ReallocationInhibitor>,
    click: Arc<ClickState>,
    tempo_map: SharedTempoMap,
    sync: SyncOutputs,
    peer: Option<Box<dyn TempoSyncPeer>>,
    nudge: NudgeController,
    section: Option<SectionPlayback>,
    snap_grid: SnapGrid,
    punch_in_out: bool,
    count_in_beats: u32,
    playing_flag: bool,
    stop_in_progress: bool,
    recording_with_armed_inputs: bool,
}

impl TransportStateMachine {
    pub fn new(
        config: TransportConfig,
        backend: Box<dyn PlaybackBackend>,
        click: Arc<ClickState>,
    ) -> Result<Self> {
        Self::with_tempo_map(config, backend, click, shared_tempo_map(TempoMap::default()))
    }

    /// Share `tempo_map` with the backend so rebuilt click nodes follow tempo edits.
    pub fn with_tempo_map(
        config: TransportConfig,
        backend: Box<dyn PlaybackBackend>,
        click: Arc<ClickState>,
        tempo_map: SharedTempoMap,
    ) -> Result<Self> {
        config.validate()?;
        let mut state = TransportState::new();
        state.set_scrub_interval(config.scrub_interval);

        Ok(Self {
            config,
            state,
            backend,
            context: None,
            inhibitor: ReallocationInhibitor::new(),
            click,
            tempo_map,
            sync: SyncOutputs::new(),
            peer: None,
            nudge: NudgeController::new(Instant::now()),
            section: None,
            snap_grid: SnapGrid::default(),
            punch_in_out: false,
            count_in_beats: 0,
            playing_flag: false,
            stop_in_progress: false,
            recording_with_armed_inputs: false,
        })
    }

    // --- wiring ---

    pub fn add_listener(&mut self, listener: Arc<dyn TransportListener>) {
        self.state.add_listener(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn TransportListener>) {
        self.state.remove_listener(listener);
    }

    pub fn add_sync_output(&mut self, output: Box<dyn SyncOutput>) {
        self.sync.add(output);
    }

    pub fn set_tempo_sync_peer(&mut self, peer: Option<Box<dyn TempoSyncPeer>>) {
        self.peer = peer;
    }

    pub fn tempo_map(&self) -> Arc<TempoMap> {
        self.tempo_map.load_full()
    }

    pub fn shared_tempo_map(&self) -> &SharedTempoMap {
        &self.tempo_map
    }

    /// Replace the tempo map; the graph is rebuilt so the click grid follows.
    pub fn set_tempo_map(&mut self, tempo_map: TempoMap) {
        self.tempo_map.store(Arc::new(tempo_map));
        self.edit_has_changed();
    }

    pub fn click_state(&self) -> &Arc<ClickState> {
        &self.click
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn backend(&self) -> &dyn PlaybackBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn PlaybackBackend {
        self.backend.as_mut()
    }

    // --- play ---

    /// Start playback from the cursor, or over the loop when looping.
    ///
    /// With `sync_only`, a synced external machine is told to play instead
    /// when one is listening.
    pub fn play(&mut self, sync_only: bool) -> Result<()> {
        self.end_section();

        if !self.backend.should_play() || self.playing_flag {
            return Ok(());
        }
        if sync_only && self.send_sync_start(MachineCommand::Play) {
            return Ok(());
        }

        let (mut start, end) = if self.state.is_looping() {
            let loop_range = self.state.loop_range();
            let cursor = self.state.position();
            if cursor < loop_range.start || cursor > loop_range.end - LOOP_END_MARGIN {
                self.set_position(loop_range.start);
            }
            if loop_range.end < loop_range.start + self.config.min_play_loop {
                return self.reject(Rejection::LoopTooShortToPlay);
            }
            (loop_range.start, loop_range.end)
        } else {
            (self.state.position(), self.config.max_length)
        };

        if let Some(peer) = self.peer.as_ref().filter(|p| p.is_connected()) {
            let bar_length = self.tempo_map.load().time_signature().numerator as f64;
            let beats_until_cycle = peer.beats_until_next_cycle(bar_length);
            let cycle_pos = start % bar_length;
            let next_cycle = self.tempo_map.load().beats_to_seconds(beats_until_cycle);
            start = (start - cycle_pos) + (bar_length - next_cycle);
        }

        self.state.set_play_window(start, end);
        self.state.set_recording(false, false);
        self.click.set_recording(false);
        self.playing_flag = true;
        self.state.set_cursor_pos_at_start(self.state.position());

        self.ensure_context_allocated(false);

        if let Some(ctx) = &self.context {
            let looping = self.state.is_looping();
            ctx.play(TimeRange::new(start, end), looping);
            if looping {
                ctx.set_position(self.state.position());
            }
            self.state.set_playing(true);
            tracing::debug!(start, end, looping, "play");
        } else {
            self.clear_playing_flags();
        }

        self.click.clear_click_range();
        self.state.notify_if_mode_changed();
        Ok(())
    }

    /// Audition `range` with looping off; playback stops past its end.
    pub fn play_section_and_reset(&mut self, range: TimeRange) -> Result<()> {
        if self.state.is_playing() || range.is_empty() {
            return Ok(());
        }
        let was_looping = self.state.is_looping();
        self.set_position(range.start);
        self.set_looping(false);
        if let Err(e) = self.play(false) {
            self.set_looping(was_looping);
            return Err(e);
        }
        self.section = Some(SectionPlayback { range, was_looping });
        Ok(())
    }

    pub fn section_playback(&self) -> Option<SectionPlayback> {
        self.section
    }

    fn end_section(&mut self) {
        if let Some(section) = self.section.take() {
            if section.was_looping {
                self.set_looping(true);
            }
        }
    }

    // --- record ---

    /// Start recording from the cursor, the loop start or the punch-in point.
    ///
    /// Refused unless an input is armed or `allow_if_no_inputs_armed`.
    pub fn record(&mut self, sync_only: bool, allow_if_no_inputs_armed: bool) -> Result<()> {
        if !self.backend.should_play() {
            return Ok(());
        }
        self.end_section();
        self.stop(false, false)?;

        if self.state.is_user_dragging() {
            tracing::debug!("record ignored while dragging");
            return Ok(());
        }
        if sync_only && self.send_sync_start(MachineCommand::RecordStart) {
            return Ok(());
        }

        let inputs_armed = self.backend.any_inputs_armed();
        if !(allow_if_no_inputs_armed || inputs_armed) {
            return self.reject(Rejection::NoInputsArmed);
        }

        let loop_range = self.state.loop_range();
        let looping = self.state.is_looping();
        let end = self.config.max_length;
        let mut start = self.state.position();

        if looping {
            if loop_range.length() < self.config.min_record_loop {
                return self.reject(Rejection::LoopTooShortToRecord {
                    min_seconds: self.config.min_record_loop,
                });
            }
            if self.punch_in_out {
                return self.reject(Rejection::LoopAndPunch);
            }
            start = loop_range.start;
        } else if self.punch_in_out {
            if loop_range.end + LOOP_END_MARGIN <= start {
                start = loop_range.start - PUNCH_PREROLL;
            }
        } else if start.abs() < ZERO_SNAP {
            start = 0.0;
        }

        let count_in = self.count_in_beats as f64;
        let mut preroll = start;
        if self.count_in_beats > 0 {
            let beat = self.tempo_map.load().seconds_to_beats(start);
            preroll = self.tempo_map.load().beats_to_seconds(beat - (count_in + 0.5));
        }

        if let Some(peer) = self.peer.as_ref().filter(|p| p.is_connected()) {
            let bar_length = self.tempo_map.load().time_signature().numerator as f64;
            let mut beats_until_cycle = peer.beats_until_next_cycle(bar_length);
            if self.count_in_beats > 0 {
                beats_until_cycle -= 0.5;
            }
            preroll -= self.tempo_map.load().beats_to_seconds(beats_until_cycle);
        }

        self.state.set_play_window(start, end);
        self.state.set_cursor_pos_at_start(self.state.position());
        self.playing_flag = true;

        self.ensure_context_allocated(false);

        let Some(ctx) = self.context.clone() else {
            self.clear_playing_flags();
            self.state.notify_if_mode_changed();
            return Ok(());
        };

        if self.count_in_beats > 0 {
            ctx.set_loop_times(true, TimeRange::new(start, self.config.max_length));
        }

        // Roll back a little near the origin so the first block isn't missed.
        if preroll < self.config.preroll_backoff {
            preroll -= self.config.preroll_backoff;
        }

        // Loop bounds and roll-in go in before play; the render side reads them on its next block.
        if looping {
            let mut lr = loop_range;
            lr.end = lr.end.max(lr.start + MIN_LOOP_LENGTH);
            ctx.set_loop_times(true, lr);
            ctx.set_roll_in_to_loop(preroll);
            ctx.playhead().play();
        } else {
            ctx.set_loop_times(false, TimeRange::new(preroll, end));
            ctx.play(TimeRange::new(preroll, end), false);
        }
        ctx.set_position(preroll);
        self.move_cursor(preroll);

        self.backend.prepare_for_recording(preroll, start);

        if self.count_in_beats > 0 {
            self.click.set_click_range(TimeRange::new(preroll, start));
        } else {
            self.click.clear_click_range();
        }

        self.state.set_recording(true, self.config.safe_record);
        self.state.set_playing(true);
        self.click.set_recording(true);
        self.recording_with_armed_inputs = inputs_armed;
        tracing::debug!(start, preroll, looping, punch = self.punch_in_out, "record");

        if !sync_only {
            self.sync.send(MachineCommand::RecordStart);
        }

        self.state.notify_if_mode_changed();
        Ok(())
    }

    // --- stop ---

    /// Stop with the default options: keep the take, keep the graph, send STOP.
    pub fn stop(&mut self, discard: bool, clear_devices: bool) -> Result<()> {
        self.stop_with(StopOptions {
            discard,
            clear_devices,
            ..StopOptions::default()
        })
    }

    pub fn stop_with(&mut self, options: StopOptions) -> Result<()> {
        if !(self.state.is_playing() || self.state.is_recording()) {
            return Ok(());
        }

        self.stop_in_progress = true;
        self.end_section();

        let Some(ctx) = self.context.clone() else {
            self.clear_playing_flags();
            self.stop_in_progress = false;
            self.state.notify_if_mode_changed();
            return Ok(());
        };

        if !self.nudge.any_down() {
            self.set_user_dragging(false);
        }

        if self.state.is_recording() {
            // read before the playhead stops so the end point is exact
            let rec_end_time = ctx.unlooped_position();
            let rec_end_pos = ctx.position();

            self.clear_playing_flags();
            ctx.playhead().stop();

            let range = TimeRange::new(self.state.start_time(), rec_end_time);
            let clips = self.backend.recording_finished(range, options.discard);
            tracing::debug!(
                start = range.start,
                end = range.end,
                discard = options.discard,
                clips = clips.len(),
                "recording finished"
            );
            self.state.recording_finished(&clips, range);

            let new_position = if options.discard {
                self.state.start_time()
            } else if self.state.is_looping() {
                rec_end_pos
            } else {
                rec_end_time
            };
            self.move_cursor(new_position);
        } else {
            if options.discard {
                self.state.warn(&Rejection::NothingToAbort);
            }
            self.clear_playing_flags();
            ctx.playhead().stop();
        }

        if options.clear_devices
            || !self.config.play_in_stop_enabled
            || self.state.clear_devices_on_stop()
        {
            self.release_nodes();
        } else {
            self.ensure_context_allocated(false);
        }
        self.state.set_clear_devices_on_stop(false);

        let restore = options.invert_return_to_start ^ self.config.reset_cursor_on_stop;
        let cursor_at_start = self.state.cursor_pos_at_start();
        if restore && cursor_at_start >= 0.0 {
            self.set_position(cursor_at_start);
        }

        if options.send_sync_stop {
            self.sync.send(MachineCommand::Stop);
        }

        self.stop_in_progress = false;
        tracing::debug!(position = self.state.position(), "stop");
        self.state.notify_if_mode_changed();
        Ok(())
    }

    pub fn stop_if_recording(&mut self) -> Result<()> {
        if self.state.is_recording() {
            self.stop(false, false)?;
        }
        Ok(())
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.state.is_playing() {
            self.stop(false, false)
        } else {
            self.play(false)
        }
    }

    pub fn toggle_record(&mut self) -> Result<()> {
        if self.state.is_recording() {
            self.stop(false, false)
        } else {
            self.record(false, false)
        }
    }

    pub fn play_from_start(&mut self) -> Result<()> {
        self.stop(false, false)?;
        self.set_position(0.0);
        self.play(false)
    }

    pub(crate) fn clear_playing_flags(&mut self) {
        self.state.clear_play_flags();
        self.click.set_recording(false);
        self.playing_flag = false;
        self.recording_with_armed_inputs = false;
    }

    fn reject(&mut self, rejection: Rejection) -> Result<()> {
        self.state.warn(&rejection);
        Err(Error::Rejected(rejection))
    }

    // --- position ---

    /// User seek. Stops a recording, clamps, and broadcasts the new position.
    pub fn set_position(&mut self, time: f64) {
        self.set_position_at(time, Instant::now());
    }

    pub fn set_position_at(&mut self, time: f64, now: Instant) {
        self.end_section();

        if self.state.is_recording() {
            // a stop that moves the cursor re-enters here, not recording any more
            let _ = self.stop(false, false);
        }

        let new_position = if self.state.is_playing() && self.state.is_looping() {
            self.state.loop_range().clamp(time)
        } else {
            time.clamp(0.0, self.config.max_length)
        };

        if self.state.is_playing() {
            if let Some(ctx) = &self.context {
                ctx.set_position(new_position);
            }
        }

        self.state.set_position(new_position);

        if !self.state.is_user_dragging() {
            self.state.stamp_user_drag(now);
        }

        self.state.set_video_position(new_position, true);
        self.broadcast_position(new_position);
    }

    /// Move the logical cursor without touching a running playhead.
    fn move_cursor(&mut self, time: f64) {
        let new_position = time.clamp(0.0, self.config.max_length);
        self.state.set_position(new_position);
        self.state.set_video_position(new_position, true);
        self.broadcast_position(new_position);
    }

    fn broadcast_position(&mut self, time: f64) {
        let tc = &self.config.timecode;
        let timecode = timecode_for(time, tc.offset, tc.frame_rate);
        self.sync.send(MachineCommand::Goto(timecode));
    }

    /// Position written by the reconciler from the live playhead.
    pub(crate) fn update_position_from_playhead(&mut self, time: f64) {
        self.state.set_video_position(time, false);
        self.state.set_position(time);
    }

    pub(crate) fn force_position(&mut self, time: f64) {
        self.state.set_position(time);
    }

    pub fn position(&self) -> f64 {
        self.state.position()
    }

    /// Move by `units` scrub intervals, snapping in the direction of travel.
    pub fn scrub(&mut self, units: f64) {
        let delta = units * self.state.scrub_interval();
        let mut t = self.state.position() + delta;
        if self.state.snap_to_timecode() {
            t = if delta > 0.0 {
                self.snap_grid.round_up(t, &self.tempo_map.load())
            } else {
                self.snap_grid.round_down(t, &self.tempo_map.load())
            };
        }
        self.set_position(t);
    }

    pub fn set_scrub_interval(&mut self, interval: f64) {
        self.state.set_scrub_interval(interval.max(f64::EPSILON));
    }

    pub fn set_snap_to_timecode(&mut self, snap: bool) {
        self.state.set_snap_to_timecode(snap);
        self.nudge.set_snap(snap);
    }

    pub fn set_snap_grid(&mut self, grid: SnapGrid) {
        self.snap_grid = grid;
    }

    pub fn snap_grid(&self) -> SnapGrid {
        self.snap_grid
    }

    pub fn snap_time(&self, time: f64) -> f64 {
        if self.state.snap_to_timecode() {
            self.snap_grid.round_nearest(time, &self.tempo_map.load())
        } else {
            time
        }
    }

    // --- dragging ---

    pub fn set_user_dragging(&mut self, dragging: bool) {
        self.set_user_dragging_at(dragging, Instant::now());
    }

    pub fn set_user_dragging_at(&mut self, dragging: bool, now: Instant) {
        if let Some(ctx) = &self.context {
            ctx.playhead().set_user_is_dragging(dragging);
        }

        if dragging == self.state.is_user_dragging() {
            return;
        }

        if self.state.is_user_dragging() && self.state.is_playing() {
            if let Some(ctx) = &self.context {
                ctx.set_position(self.state.position());
            }
        }

        self.state.set_user_dragging(dragging);
        if dragging {
            self.state.stamp_user_drag(now);
        }
    }

    pub fn is_user_dragging(&self) -> bool {
        self.state.is_user_dragging()
    }

    // --- loop ---

    fn loop_limit(&self) -> f64 {
        self.config.timeline_length + self.config.max_length * 0.75
    }

    pub fn set_loop_in(&mut self, time: f64) {
        let (p1, p2) = self.state.loop_points();
        let t = time.max(0.0);
        self.set_loop_points(p1.max(p2).max(t), t);
    }

    pub fn set_loop_out(&mut self, time: f64) {
        let (p1, p2) = self.state.loop_points();
        let t = time.max(0.0);
        self.set_loop_points(p1.min(p2).min(t), t);
    }

    pub fn set_loop_point1(&mut self, time: f64) {
        let (_, p2) = self.state.loop_points();
        self.set_loop_points(time, p2);
    }

    pub fn set_loop_point2(&mut self, time: f64) {
        let (p1, _) = self.state.loop_points();
        self.set_loop_points(p1, time);
    }

    pub fn set_loop_range(&mut self, range: TimeRange) {
        self.set_loop_points(range.start, range.end);
    }

    fn set_loop_points(&mut self, p1: f64, p2: f64) {
        let limit = self.loop_limit();
        self.state
            .set_loop_points(p1.clamp(0.0, limit), p2.clamp(0.0, limit));
    }

    pub fn loop_range(&self) -> TimeRange {
        self.state.loop_range()
    }

    pub fn set_looping(&mut self, looping: bool) {
        if looping == self.state.is_looping() {
            return;
        }
        let _ = self.stop_if_recording();
        self.state.set_looping(looping);
    }

    pub fn is_looping(&self) -> bool {
        self.state.is_looping()
    }

    // --- record modes ---

    pub fn set_punch_in_out(&mut self, punch: bool) {
        self.punch_in_out = punch;
    }

    pub fn is_punch_in_out(&self) -> bool {
        self.punch_in_out
    }

    pub fn set_count_in_beats(&mut self, beats: u32) {
        self.count_in_beats = beats;
    }

    pub fn count_in_beats(&self) -> u32 {
        self.count_in_beats
    }

    // --- buttons & nudge ---

    pub fn set_rewind_button_down(&mut self, down: bool) {
        self.set_button_down_at(NudgeDirection::Rewind, down, Instant::now());
    }

    pub fn set_fast_forward_button_down(&mut self, down: bool) {
        self.set_button_down_at(NudgeDirection::FastForward, down, Instant::now());
    }

    pub fn set_button_down_at(&mut self, direction: NudgeDirection, down: bool, now: Instant) {
        self.end_section();

        let was_down = match direction {
            NudgeDirection::Rewind => self.state.rewind_button_down(),
            NudgeDirection::FastForward => self.state.fast_forward_button_down(),
        };
        if was_down == down {
            return;
        }
        match direction {
            NudgeDirection::Rewind => self.state.set_rewind_button_down(down),
            NudgeDirection::FastForward => self.state.set_fast_forward_button_down(down),
        }

        if down {
            // rewind and fast forward are exclusive
            match direction {
                NudgeDirection::Rewind => self.state.set_fast_forward_button_down(false),
                NudgeDirection::FastForward => self.state.set_rewind_button_down(false),
            }
            self.nudge.release_at(direction.opposite(), now);
            if let Some(action) = self.nudge.press_at(direction, now) {
                self.apply_nudge(action);
            }
        } else {
            self.nudge.release_at(direction, now);
        }
        self.set_user_dragging_at(self.nudge.any_down(), now);

        let command = match (down, direction) {
            (true, NudgeDirection::Rewind) => MachineCommand::Rewind,
            (true, NudgeDirection::FastForward) => MachineCommand::FastForward,
            (false, _) if self.state.is_playing() => MachineCommand::Play,
            (false, _) => MachineCommand::Stop,
        };
        self.sync.send(command);
    }

    pub fn nudge_left(&mut self) {
        self.nudge_at(NudgeDirection::Rewind, Instant::now());
    }

    pub fn nudge_right(&mut self) {
        self.nudge_at(NudgeDirection::FastForward, Instant::now());
    }

    pub fn nudge_at(&mut self, direction: NudgeDirection, now: Instant) {
        self.end_section();
        self.set_user_dragging_at(true, now);
        for action in self.nudge.nudge_at(direction, now) {
            self.apply_nudge(action);
        }
        self.set_user_dragging_at(self.nudge.any_down(), now);
    }

    /// Repeat step for held buttons; call at the nudge interval.
    pub fn nudge_tick_at(&mut self, now: Instant) {
        if let Some(action) = self.nudge.tick_at(now) {
            self.apply_nudge(action);
        }
    }

    pub fn is_nudging(&self) -> bool {
        self.nudge.any_down()
    }

    fn apply_nudge(&mut self, action: NudgeAction) {
        match action {
            NudgeAction::Scrub { units } => self.scrub(units),
            NudgeAction::Snap(direction) => {
                let t = self.state.position();
                let t = match direction {
                    NudgeDirection::Rewind => {
                        self.snap_grid.round_down(t - SNAP_NUDGE, &self.tempo_map.load())
                    }
                    NudgeDirection::FastForward => {
                        self.snap_grid.round_up(t + SNAP_NUDGE, &self.tempo_map.load())
                    }
                };
                self.set_position(t);
            }
        }
    }

    // --- reallocation ---

    /// Hold off graph rebuilds until the guard drops.
    pub fn acquire_reallocation_guard(&self) -> ReallocationGuard {
        self.inhibitor.acquire()
    }

    pub fn reallocation_inhibitor(&self) -> &Arc<ReallocationInhibitor> {
        &self.inhibitor
    }

    pub fn is_allowed_to_reallocate(&self) -> bool {
        !self.inhibitor.is_inhibited()
    }

    /// The edit changed: rebuild the graph now, or once the inhibitors clear.
    pub fn edit_has_changed(&mut self) {
        if self.inhibitor.is_inhibited() {
            tracing::debug!(inhibitors = self.inhibitor.count(), "reallocation deferred");
            self.inhibitor.defer();
            return;
        }
        self.inhibitor.clear_pending();

        if self.context.is_none() {
            return;
        }
        self.ensure_context_allocated(true);
    }

    /// Apply a deferred reallocation if the inhibitors have cleared.
    ///
    /// Returns whether one was applied.
    pub fn apply_deferred_changes(&mut self) -> bool {
        if !self.inhibitor.take_ready() {
            return false;
        }
        tracing::debug!("applying deferred reallocation");
        self.edit_has_changed();
        true
    }

    pub fn ensure_context_allocated(&mut self, always_reallocate: bool) {
        if !self.backend.should_play() {
            return;
        }
        let start = self.state.position();

        match &self.context {
            Some(ctx) => {
                let playhead = Arc::clone(ctx.playhead());
                self.backend.create_nodes(&playhead, start, always_reallocate);
            }
            None => {
                let Some(sample_rate) = self.backend.sample_rate() else {
                    tracing::debug!("no output device, playback context not allocated");
                    return;
                };
                let ctx = PlaybackContext::new(sample_rate);
                ctx.set_position(start);
                self.backend.create_nodes(ctx.playhead(), start, true);
                self.context = Some(ctx);
                tracing::debug!(sample_rate, "playback context allocated");
                self.state.context_allocated();
            }
        }
    }

    pub fn release_nodes(&mut self) {
        if self.context.is_some() {
            self.backend.release_nodes();
        }
    }

    pub fn free_playback_context(&mut self) {
        if self.context.take().is_some() {
            self.backend.free_context();
        }
        self.clear_playing_flags();
        self.state.context_freed();
        self.state.notify_if_mode_changed();
    }

    /// Rebuild the devices on the next stop, or now when stopped.
    pub fn trigger_clear_devices_on_stop(&mut self) {
        self.state.set_clear_devices_on_stop(true);
        if self.state.is_playing() {
            return;
        }
        let _ = self.stop(false, true);
        self.ensure_context_allocated(false);
    }

    pub fn is_play_context_active(&self) -> bool {
        self.context.is_some()
    }

    pub(crate) fn context(&self) -> Option<&PlaybackContext> {
        self.context.as_ref()
    }

    pub(crate) fn recording_with_armed_inputs(&self) -> bool {
        self.recording_with_armed_inputs
    }

    pub(crate) fn notify_if_mode_changed(&mut self) {
        self.state.notify_if_mode_changed();
    }

    // --- queries ---

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn is_safe_recording(&self) -> bool {
        self.state.is_safe_recording()
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_in_progress
    }

    pub fn mode(&self) -> TransportMode {
        self.state.mode()
    }

    pub fn time_when_started(&self) -> f64 {
        self.state.start_time()
    }

    pub fn playhead(&self) -> Option<&Arc<Playhead>> {
        self.context.as_ref().map(|c| c.playhead())
    }

    /// Playhead position, 0 without a graph.
    pub fn playhead_position(&self) -> f64 {
        self.context.as_ref().map_or(0.0, |c| c.position())
    }

    /// Graph sample rate, or the configured fallback without one.
    pub fn sample_rate(&self) -> f64 {
        self.context
            .as_ref()
            .map_or(self.config.sample_rate_fallback, |c| c.sample_rate())
    }

    /// What is audible now: the latency-compensated playhead while playing.
    pub fn live_position(&self) -> f64 {
        match &self.context {
            Some(ctx) if self.state.is_playing() => {
                ctx.audible_position(self.backend.latency_samples())
            }
            _ => self.state.position(),
        }
    }

    fn send_sync_start(&mut self, command: MachineCommand) -> bool {
        self.sync.is_sending() && self.sync.send(command) && self.config.timecode.sync_enabled
    }
}

impl Drop for TransportStateMachine {
    fn drop(&mut self) {
        let _ = self.stop(false, true);
        if self.inhibitor.is_inhibited() {
            tracing::error!(
                inhibitors = self.inhibitor.count(),
                "transport dropped while reallocation is inhibited"
            );
            debug_assert!(
                std::thread::panicking(),
                "transport dropped while reallocation is inhibited"
            );
        }
    }
}

impl std::fmt::Debug for TransportStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportStateMachine")
            .field("state", &self.state)
            .field("context", &self.context.is_some())
            .field("inhibitors", &self.inhibitor.count())
            .field("section", &self.section)
            .field("punch_in_out", &self.punch_in_out)
            .field("count_in_beats", &self.count_in_beats)
            .finish_non_exhaustive()
    }
}
