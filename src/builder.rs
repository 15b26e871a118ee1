//! Builder for configuring and constructing a `TactusEngine`.

use crate::{Error, Result, TactusEngine};
use parking_lot::Mutex;
use std::sync::Arc;
use tactus_core::{
    shared_tempo_map, spawn_nudge_timer, spawn_reconciler, ClickConfig, ClickState,
    PlaybackBackend, SharedTempoMap, SyncOutput, TempoMap, TempoSyncPeer, TransportConfig,
    TransportListener, TransportStateMachine,
};

/// The backend is the only required part. Everything else has defaults.
///
/// The reconciler and nudge threads start on `build()` unless
/// [`manual_reconcile`](Self::manual_reconcile) is set, in which case the
/// caller drives [`TactusEngine::reconcile_at`] itself.
///
/// # Example
///
/// ```ignore
/// use tactus::prelude::*;
///
/// // the backend reads the same tempo map when it builds click nodes
/// let tempo = tactus::shared_tempo_map(TempoMap::new(96.0));
/// let backend = MyBackend::new(Arc::clone(&tempo));
///
/// let engine = TactusEngine::builder()
///     .backend(Box::new(backend))
///     .tempo_map(tempo)
///     .click(ClickConfig { enabled: true, ..Default::default() })
///     .build()?;
/// ```
pub struct TactusEngineBuilder {
    backend: Option<Box<dyn PlaybackBackend>>,
    config: TransportConfig,
    click: ClickConfig,
    click_state: Option<Arc<ClickState>>,
    tempo_map: Option<SharedTempoMap>,
    listeners: Vec<Arc<dyn TransportListener>>,
    sync_outputs: Vec<Box<dyn SyncOutput>>,
    tempo_sync_peer: Option<Box<dyn TempoSyncPeer>>,
    manual_reconcile: bool,
}

impl Default for TactusEngineBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            config: TransportConfig::default(),
            click: ClickConfig::default(),
            click_state: None,
            tempo_map: None,
            listeners: Vec::new(),
            sync_outputs: Vec::new(),
            tempo_sync_peer: None,
            manual_reconcile: false,
        }
    }
}

impl TactusEngineBuilder {
    pub fn backend(mut self, backend: Box<dyn PlaybackBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn click(mut self, click: ClickConfig) -> Self {
        self.click = click;
        self
    }

    /// Click state shared with the backend's click nodes.
    ///
    /// Takes precedence over [`click`](Self::click): the state is used as is.
    pub fn click_state(mut self, state: Arc<ClickState>) -> Self {
        self.click_state = Some(state);
        self
    }

    /// Tempo map shared with the backend. Default: 120 BPM, 4/4.
    pub fn tempo_map(mut self, tempo_map: SharedTempoMap) -> Self {
        self.tempo_map = Some(tempo_map);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn TransportListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn sync_output(mut self, output: Box<dyn SyncOutput>) -> Self {
        self.sync_outputs.push(output);
        self
    }

    pub fn tempo_sync_peer(mut self, peer: Box<dyn TempoSyncPeer>) -> Self {
        self.tempo_sync_peer = Some(peer);
        self
    }

    /// Don't spawn the periodic threads.
    pub fn manual_reconcile(mut self) -> Self {
        self.manual_reconcile = true;
        self
    }

    pub fn build(self) -> Result<TactusEngine> {
        let backend = self.backend.ok_or(Error::NoBackend)?;
        self.config.validate()?;
        self.click.validate()?;

        let click = self
            .click_state
            .unwrap_or_else(|| Arc::new(ClickState::from_config(&self.click)));
        let tempo_map = self
            .tempo_map
            .unwrap_or_else(|| shared_tempo_map(TempoMap::default()));

        let mut tsm = TransportStateMachine::with_tempo_map(
            self.config.clone(),
            backend,
            Arc::clone(&click),
            Arc::clone(&tempo_map),
        )?;
        for listener in self.listeners {
            tsm.add_listener(listener);
        }
        for output in self.sync_outputs {
            tsm.add_sync_output(output);
        }
        tsm.set_tempo_sync_peer(self.tempo_sync_peer);
        tsm.set_scrub_interval(self.config.scrub_interval);

        let tsm = Arc::new(Mutex::new(tsm));

        let tasks = if self.manual_reconcile {
            Vec::new()
        } else {
            vec![
                spawn_reconciler(Arc::clone(&tsm), self.config.reconcile_interval())?,
                spawn_nudge_timer(Arc::clone(&tsm), self.config.nudge_interval())?,
            ]
        };

        tracing::debug!(
            manual_reconcile = self.manual_reconcile,
            click_enabled = click.is_enabled(),
            "tactus engine built"
        );

        Ok(TactusEngine::from_parts(tsm, click, tempo_map, tasks))
    }
}
