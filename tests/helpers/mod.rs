//! Test helpers and fixtures for tactus integration tests
//!
//! The mock backend stands in for a graph host: it builds a real
//! [`ClickNode`] on the playhead it is handed, and tests play the render
//! thread by calling [`BackendProbe::render`] block by block.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tactus::core::{ClickGenerator, NoteSink};
use tactus::prelude::*;
use tactus::{BlockRange, ClickOutput, SharedTempoMap, TransportMode};

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: usize = 512;

/// Debug logs to the test writer; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default, Clone)]
pub struct BackendLog {
    pub allocations: u32,
    pub forced_allocations: u32,
    pub releases: u32,
    pub prepared: Vec<(f64, f64)>,
    pub finished: Vec<(TimeRange, bool)>,
}

/// State shared between the mock backend (owned by the transport) and the test.
pub struct BackendProbe {
    pub log: Mutex<BackendLog>,
    pub armed: AtomicBool,
    click_node: Mutex<Option<ClickNode>>,
    playhead: Mutex<Option<Arc<Playhead>>>,
}

/// One rendered block.
#[derive(Debug, Clone)]
pub struct RenderedBlock {
    pub range: BlockRange,
    pub audio: Vec<f32>,
    pub notes: Vec<MidiEvent>,
}

impl RenderedBlock {
    pub fn peak(&self) -> f32 {
        self.audio.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

impl BackendProbe {
    pub fn playhead(&self) -> Option<Arc<Playhead>> {
        self.playhead.lock().clone()
    }

    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
    }

    pub fn log(&self) -> BackendLog {
        self.log.lock().clone()
    }

    /// Act as the render thread for one block of `frames`.
    pub fn render(&self, frames: usize) -> RenderedBlock {
        let mut notes: Vec<MidiEvent> = Vec::with_capacity(16);
        let (range, audio) = self.render_into(frames, &mut notes);
        RenderedBlock {
            range,
            audio,
            notes,
        }
    }

    /// Render one block, sending click notes to `sink`.
    pub fn render_into(&self, frames: usize, sink: &mut dyn NoteSink) -> (BlockRange, Vec<f32>) {
        let playhead = self.playhead().expect("no playhead allocated");
        let range = playhead.process_block(frames);

        let mut audio = vec![0.0f32; frames];
        if let Some(node) = self.click_node.lock().as_mut() {
            let mut channels: [&mut [f32]; 1] = [&mut audio[..]];
            node.process(&range, Some(&mut channels[..]), Some(sink));
        }
        (range, audio)
    }

    /// Render `total` frames in blocks of `block`, returning every block.
    pub fn render_frames(&self, total: usize, block: usize) -> Vec<RenderedBlock> {
        let mut out = Vec::new();
        let mut left = total;
        while left > 0 {
            let n = left.min(block);
            out.push(self.render(n));
            left -= n;
        }
        out
    }
}

pub struct MockBackend {
    probe: Arc<BackendProbe>,
    sample_rate: Option<f64>,
    tempo_map: SharedTempoMap,
    click: Option<(Arc<ClickState>, ClickOutput)>,
    timeline_length: f64,
    latency_samples: i64,
    take_counter: u32,
}

impl MockBackend {
    pub fn new(tempo_map: SharedTempoMap) -> (Self, Arc<BackendProbe>) {
        let probe = Arc::new(BackendProbe {
            log: Mutex::new(BackendLog::default()),
            armed: AtomicBool::new(true),
            click_node: Mutex::new(None),
            playhead: Mutex::new(None),
        });
        let backend = Self {
            probe: Arc::clone(&probe),
            sample_rate: Some(TEST_SAMPLE_RATE),
            tempo_map,
            click: None,
            timeline_length: 60.0,
            latency_samples: 0,
            take_counter: 0,
        };
        (backend, probe)
    }

    /// Build a click node alongside the playhead.
    pub fn with_click(mut self, click: Arc<ClickState>, output: ClickOutput) -> Self {
        self.click = Some((click, output));
        self
    }

    pub fn without_device(mut self) -> Self {
        self.sample_rate = None;
        self
    }

    pub fn with_latency(mut self, samples: i64) -> Self {
        self.latency_samples = samples;
        self
    }
}

impl PlaybackBackend for MockBackend {
    fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    fn create_nodes(&mut self, playhead: &Arc<Playhead>, start: f64, force: bool) {
        {
            let mut log = self.probe.log.lock();
            log.allocations += 1;
            if force {
                log.forced_allocations += 1;
            }
        }
        *self.probe.playhead.lock() = Some(Arc::clone(playhead));

        let Some((click, output)) = &self.click else {
            return;
        };
        let mut node = self.probe.click_node.lock();
        if force || node.is_none() {
            let generator = ClickGenerator::new(
                &self.tempo_map.load(),
                *output,
                tactus::core::MAX_TIMELINE_LENGTH,
                self.timeline_length,
                Arc::clone(click),
            );
            *node = Some(ClickNode::new(generator, Arc::clone(playhead)));
        }
        if let Some(node) = node.as_mut() {
            node.prepare_for_playback(start);
        }
    }

    fn release_nodes(&mut self) {
        self.probe.log.lock().releases += 1;
        *self.probe.click_node.lock() = None;
    }

    fn free_context(&mut self) {
        *self.probe.playhead.lock() = None;
    }

    fn latency_samples(&self) -> i64 {
        self.latency_samples
    }

    fn any_inputs_armed(&self) -> bool {
        self.probe.armed.load(Ordering::Acquire)
    }

    fn prepare_for_recording(&mut self, preroll_start: f64, start: f64) {
        self.probe.log.lock().prepared.push((preroll_start, start));
    }

    fn recording_finished(&mut self, range: TimeRange, discard: bool) -> Vec<RecordedClip> {
        self.probe.log.lock().finished.push((range, discard));
        if discard {
            return Vec::new();
        }
        self.take_counter += 1;
        vec![RecordedClip::Audio {
            source: PathBuf::from(format!("take-{}.wav", self.take_counter)),
            range,
        }]
    }
}

/// Everything a listener was told, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Heard {
    State(TransportMode),
    Position(f64),
    ContextChanged,
    Loop(bool, TimeRange),
    RecordingFinished(Vec<RecordedClip>, TimeRange),
    Warning(Rejection),
    StartVideo,
    StopVideo,
    AutoSave,
}

#[derive(Default)]
pub struct RecordingListener {
    heard: Mutex<Vec<Heard>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn heard(&self) -> Vec<Heard> {
        self.heard.lock().clone()
    }

    pub fn states(&self) -> Vec<TransportMode> {
        self.heard
            .lock()
            .iter()
            .filter_map(|h| match h {
                Heard::State(mode) => Some(*mode),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<Rejection> {
        self.heard
            .lock()
            .iter()
            .filter_map(|h| match h {
                Heard::Warning(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.heard.lock().clear();
    }
}

impl TransportListener for RecordingListener {
    fn state_changed(&self, mode: TransportMode) {
        self.heard.lock().push(Heard::State(mode));
    }

    fn position_changed(&self, position: f64) {
        self.heard.lock().push(Heard::Position(position));
    }

    fn playback_context_changed(&self) {
        self.heard.lock().push(Heard::ContextChanged);
    }

    fn loop_changed(&self, enabled: bool, range: TimeRange) {
        self.heard.lock().push(Heard::Loop(enabled, range));
    }

    fn recording_finished(&self, clips: &[RecordedClip], range: TimeRange) {
        self.heard
            .lock()
            .push(Heard::RecordingFinished(clips.to_vec(), range));
    }

    fn warning(&self, rejection: &Rejection) {
        self.heard.lock().push(Heard::Warning(rejection.clone()));
    }

    fn start_video(&self) {
        self.heard.lock().push(Heard::StartVideo);
    }

    fn stop_video(&self) {
        self.heard.lock().push(Heard::StopVideo);
    }

    fn auto_save_now(&self) {
        self.heard.lock().push(Heard::AutoSave);
    }
}

/// Sync output that keeps every command it is sent.
pub struct SyncRecorder {
    sending: bool,
    sent: Arc<Mutex<Vec<MachineCommand>>>,
}

impl SyncRecorder {
    pub fn new(sending: bool) -> (Self, Arc<Mutex<Vec<MachineCommand>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sending,
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

impl tactus::SyncOutput for SyncRecorder {
    fn is_sending_mmc(&self) -> bool {
        self.sending
    }

    fn send(&mut self, command: MachineCommand) {
        self.sent.lock().push(command);
    }
}

/// A manual-reconcile engine over a mock backend, plus everything tests poke at.
pub struct Fixture {
    pub engine: TactusEngine,
    pub probe: Arc<BackendProbe>,
    pub listener: Arc<RecordingListener>,
    pub sent: Arc<Mutex<Vec<MachineCommand>>>,
}

pub fn fixture(config: TransportConfig, click: ClickConfig, output: ClickOutput) -> Fixture {
    init_tracing();
    let tempo = tactus::shared_tempo_map(TempoMap::default());
    click.validate().expect("valid click config");
    let click_state = Arc::new(ClickState::from_config(&click));
    let (backend, probe) = MockBackend::new(Arc::clone(&tempo));
    let backend = backend.with_click(Arc::clone(&click_state), output);
    let listener = RecordingListener::new();
    let (sync, sent) = SyncRecorder::new(true);

    let engine = TactusEngine::builder()
        .backend(Box::new(backend))
        .tempo_map(tempo)
        .config(config)
        .click_state(Arc::clone(&click_state))
        .listener(listener.clone())
        .sync_output(Box::new(sync))
        .manual_reconcile()
        .build()
        .expect("Failed to create test engine");

    Fixture {
        engine,
        probe,
        listener,
        sent,
    }
}

/// Stock fixture: 60 s timeline, click off, audio click.
pub fn test_fixture() -> Fixture {
    fixture(
        TransportConfig {
            timeline_length: 60.0,
            ..Default::default()
        },
        ClickConfig::default(),
        ClickOutput::Audio,
    )
}
