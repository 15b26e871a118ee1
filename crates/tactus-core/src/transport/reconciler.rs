//! Periodic reconciliation of the logical transport with the real-time playhead.
//!
//! The render thread never calls back into the control side. Instead a timer
//! on the control thread calls [`PositionReconciler::tick`], which copies the
//! playhead position into the logical state, notices when playback ran off
//! the end, applies deferred graph rebuilds and periodically rewrites the
//! loop bounds.

use super::position::{TimeRange, MIN_LOOP_LENGTH};
use super::state_machine::TransportStateMachine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PositionReconciler {
    loop_update_counter: u32,
}

impl PositionReconciler {
    pub fn new() -> Self {
        Self {
            loop_update_counter: 1,
        }
    }

    /// One reconciliation step. `now` drives the drag debounce.
    pub fn tick(&mut self, tsm: &mut TransportStateMachine, now: Instant) {
        let Some(ctx) = tsm.context().cloned() else {
            return;
        };

        tracing::trace!(position = ctx.position(), "reconcile tick");
        tsm.apply_deferred_changes();

        if let Some(section) = tsm.section_playback() {
            if tsm.position() > section.range.end {
                tracing::debug!(end = section.range.end, "section playback finished");
                let _ = tsm.stop(false, false);
                return;
            }
        }

        if tsm.is_recording()
            && tsm.recording_with_armed_inputs()
            && !tsm.backend().any_inputs_armed()
        {
            tracing::debug!("all inputs disarmed, stopping recording");
            let _ = tsm.stop(false, false);
            return;
        }

        let max_length = tsm.config().max_length;
        if tsm.is_playing() && ctx.position() >= max_length {
            let _ = tsm.stop(false, false);
            tsm.set_position(max_length);
            return;
        }

        let playhead = ctx.playhead();
        let debounce_elapsed = tsm
            .state()
            .last_user_drag_time()
            .map_or(true, |t| now.saturating_duration_since(t) > tsm.config().drag_debounce());

        if !playhead.is_playing() {
            if tsm.is_recording() {
                let _ = tsm.stop(false, false);
                return;
            }
            if tsm.is_playing() {
                tracing::debug!("playhead reached the end of the play window");
                tsm.clear_playing_flags();
                tsm.notify_if_mode_changed();
            }
            if !tsm.is_user_dragging() && debounce_elapsed {
                ctx.set_position(tsm.position());
            }
            return;
        }

        if !tsm.is_user_dragging() && debounce_elapsed {
            let t = tsm.live_position();
            tsm.update_position_from_playhead(t);
        }

        self.loop_update_counter = self.loop_update_counter.saturating_sub(1);
        if self.loop_update_counter == 0 {
            self.loop_update_counter = tsm.config().loop_refresh_ticks;
            if tsm.is_looping() {
                let mut lr = tsm.loop_range();
                lr.end = lr.end.max(lr.start + MIN_LOOP_LENGTH);
                ctx.set_loop_times(true, lr);
            } else {
                ctx.set_loop_times(false, TimeRange::default());
            }
        }
    }
}

impl Default for PositionReconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Background thread that runs a closure at a fixed interval until dropped.
pub struct PeriodicTask {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F>(name: &str, interval: Duration, mut f: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while running_clone.load(Ordering::Acquire) {
                    f();
                    thread::sleep(interval);
                }
            })?;

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("running", &self.is_running())
            .finish()
    }
}

/// Run a [`PositionReconciler`] against a shared state machine.
pub fn spawn_reconciler(
    tsm: Arc<Mutex<TransportStateMachine>>,
    interval: Duration,
) -> std::io::Result<PeriodicTask> {
    let mut reconciler = PositionReconciler::new();
    PeriodicTask::spawn("tactus-reconciler", interval, move || {
        let mut tsm = tsm.lock();
        reconciler.tick(&mut tsm, Instant::now());
    })
}

/// Drive held rewind/fast-forward buttons against a shared state machine.
pub fn spawn_nudge_timer(
    tsm: Arc<Mutex<TransportStateMachine>>,
    interval: Duration,
) -> std::io::Result<PeriodicTask> {
    PeriodicTask::spawn("tactus-nudge", interval, move || {
        let mut tsm = tsm.lock();
        if tsm.is_nudging() {
            tsm.nudge_tick_at(Instant::now());
        }
    })
}
