//! TactusEngine that owns the transport and its control threads

use crate::Result;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Instant;
use tactus_core::{
    ClickState, PeriodicTask, Playhead, PositionReconciler, ReallocationGuard, SharedTempoMap,
    StopOptions, TempoMap, TimeRange, TransportMode, TransportStateMachine,
};

/// Transport engine.
///
/// All transport logic runs under one mutex, shared by the API and the
/// reconciler / nudge threads. The render thread never takes it: it only
/// touches the [`Playhead`] handed to the backend.
///
/// # Example
///
/// ```ignore
/// use tactus::prelude::*;
///
/// let engine = TactusEngine::builder()
///     .backend(Box::new(my_backend))
///     .build()?;
///
/// engine.set_position(4.0);
/// engine.play()?;
/// // ...
/// engine.stop()?;
/// ```
pub struct TactusEngine {
    transport: Arc<Mutex<TransportStateMachine>>,
    click: Arc<ClickState>,
    tempo_map: SharedTempoMap,
    /// Used when the periodic threads are not running
    manual_reconciler: Mutex<PositionReconciler>,
    tasks: Vec<PeriodicTask>,
}

impl TactusEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::TactusEngineBuilder {
        crate::TactusEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        transport: Arc<Mutex<TransportStateMachine>>,
        click: Arc<ClickState>,
        tempo_map: SharedTempoMap,
        tasks: Vec<PeriodicTask>,
    ) -> Self {
        Self {
            transport,
            click,
            tempo_map,
            manual_reconciler: Mutex::new(PositionReconciler::new()),
            tasks,
        }
    }

    /// Lock the transport for anything not covered by the shortcuts below.
    ///
    /// Don't hold the guard across blocking work; the reconciler waits on it.
    pub fn transport(&self) -> MutexGuard<'_, TransportStateMachine> {
        self.transport.lock()
    }

    pub fn transport_handle(&self) -> Arc<Mutex<TransportStateMachine>> {
        Arc::clone(&self.transport)
    }

    pub fn click(&self) -> &Arc<ClickState> {
        &self.click
    }

    pub fn shared_tempo_map(&self) -> &SharedTempoMap {
        &self.tempo_map
    }

    /// Replace the tempo map and rebuild the graph so the click follows.
    pub fn set_tempo_map(&self, tempo_map: TempoMap) {
        self.transport.lock().set_tempo_map(tempo_map);
    }

    /// Whether the reconciler / nudge threads are running.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(PeriodicTask::is_running)
    }

    /// Run one reconciler step by hand (manual mode and tests).
    pub fn reconcile_at(&self, now: Instant) {
        let mut transport = self.transport.lock();
        self.manual_reconciler.lock().tick(&mut transport, now);
    }

    // --- transport shortcuts ---

    pub fn play(&self) -> Result<()> {
        Ok(self.transport.lock().play(false)?)
    }

    pub fn record(&self) -> Result<()> {
        Ok(self.transport.lock().record(false, false)?)
    }

    pub fn stop(&self) -> Result<()> {
        Ok(self.transport.lock().stop(false, false)?)
    }

    /// Stop and throw the take away.
    pub fn abort_recording(&self) -> Result<()> {
        Ok(self.transport.lock().stop(true, false)?)
    }

    pub fn stop_with(&self, options: StopOptions) -> Result<()> {
        Ok(self.transport.lock().stop_with(options)?)
    }

    pub fn toggle_play(&self) -> Result<()> {
        Ok(self.transport.lock().toggle_play()?)
    }

    pub fn set_position(&self, time: f64) {
        self.transport.lock().set_position(time);
    }

    pub fn position(&self) -> f64 {
        self.transport.lock().position()
    }

    pub fn set_loop_range(&self, range: TimeRange) {
        self.transport.lock().set_loop_range(range);
    }

    pub fn set_looping(&self, looping: bool) {
        self.transport.lock().set_looping(looping);
    }

    pub fn mode(&self) -> TransportMode {
        self.transport.lock().mode()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.lock().is_playing()
    }

    pub fn is_recording(&self) -> bool {
        self.transport.lock().is_recording()
    }

    pub fn sample_rate(&self) -> f64 {
        self.transport.lock().sample_rate()
    }

    /// The live playhead, if a graph is allocated.
    pub fn playhead(&self) -> Option<Arc<Playhead>> {
        self.transport.lock().playhead().cloned()
    }

    /// Hold off graph rebuilds while batching edits.
    pub fn acquire_reallocation_guard(&self) -> ReallocationGuard {
        self.transport.lock().acquire_reallocation_guard()
    }

    /// Request a graph rebuild; deferred while a guard is held.
    pub fn edit_has_changed(&self) {
        self.transport.lock().edit_has_changed();
    }
}

impl Drop for TactusEngine {
    fn drop(&mut self) {
        // threads first, so nothing ticks a stopping transport
        for task in &mut self.tasks {
            task.stop();
        }
    }
}

impl std::fmt::Debug for TactusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TactusEngine")
            .field("transport", &*self.transport.lock())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
