//! Metronome click generation over a precomputed beat grid.
//!
//! [`ClickGenerator`] builds its [`BeatGrid`] once from a tempo map and then
//! answers per-block [`emit`](ClickGenerator::emit) calls from the render
//! thread without allocating. Settings the render thread reads live in a
//! shared [`ClickState`] of atomics.

use super::click_assets::ClickAssets;
use super::playhead::Playhead;
use super::position::{BlockRange, TimeRange};
use super::tempo_map::TempoMap;
use crate::config::{ClickConfig, DEFAULT_ACCENT_NOTE, DEFAULT_REGULAR_NOTE};
use crate::{AtomicDouble, AtomicFlag, AtomicFloat};
use parking_lot::RwLock;
use ringbuf::traits::Producer;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tactus_midi::MidiEvent;

/// Bars of grid generated before the origin, covering count-in preroll.
pub const GRID_LEAD_IN_BARS: i32 = 8;

/// Beat time past any reachable horizon; terminates cursor scans.
pub const GRID_SENTINEL: f64 = 1_000_000.0;

/// Shortest grid horizon regardless of timeline length (one hour).
const MIN_GRID_HORIZON: f64 = 3600.0;

/// Output form of the generated click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickOutput {
    /// Mix waveforms into audio buffers.
    #[default]
    Audio,
    /// Emit note-on events on the percussion channel.
    Midi,
}

/// Click settings and the transport facts the mute policy depends on.
///
/// Written on the control thread, read by the render thread.
#[derive(Debug)]
pub struct ClickState {
    enabled: AtomicFlag,
    recording_only: AtomicFlag,
    emphasise_bars: AtomicFlag,
    gain: AtomicFloat,
    accent_note: AtomicU8,
    regular_note: AtomicU8,
    range_start: AtomicDouble,
    range_end: AtomicDouble,
    recording: AtomicFlag,
    accent_sample: RwLock<Option<PathBuf>>,
    regular_sample: RwLock<Option<PathBuf>>,
}

impl ClickState {
    pub fn new() -> Self {
        Self::from_config(&ClickConfig::default())
    }

    pub fn from_config(config: &ClickConfig) -> Self {
        Self {
            enabled: AtomicFlag::new(config.enabled),
            recording_only: AtomicFlag::new(config.recording_only),
            emphasise_bars: AtomicFlag::new(config.emphasise_bars),
            gain: AtomicFloat::new(config.gain),
            accent_note: AtomicU8::new(config.accent_note),
            regular_note: AtomicU8::new(config.regular_note),
            range_start: AtomicDouble::new(0.0),
            range_end: AtomicDouble::new(0.0),
            recording: AtomicFlag::new(false),
            accent_sample: RwLock::new(config.accent_sample.clone()),
            regular_sample: RwLock::new(config.regular_sample.clone()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_recording_only(&self, recording_only: bool) {
        self.recording_only.set(recording_only);
    }

    pub fn set_emphasise_bars(&self, emphasise: bool) {
        self.emphasise_bars.set(emphasise);
    }

    pub fn emphasise_bars(&self) -> bool {
        self.emphasise_bars.get()
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.set(gain.max(0.0));
    }

    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    pub fn set_notes(&self, accent: u8, regular: u8) {
        self.accent_note.store(accent, Ordering::Release);
        self.regular_note.store(regular, Ordering::Release);
    }

    /// Accent and regular notes; values outside the MIDI range fall back to
    /// the defaults.
    pub fn notes(&self) -> (u8, u8) {
        let valid = |n: u8, default: u8| if n <= 127 { n } else { default };
        (
            valid(self.accent_note.load(Ordering::Acquire), DEFAULT_ACCENT_NOTE),
            valid(self.regular_note.load(Ordering::Acquire), DEFAULT_REGULAR_NOTE),
        )
    }

    pub fn set_samples(&self, accent: Option<PathBuf>, regular: Option<PathBuf>) {
        *self.accent_sample.write() = accent;
        *self.regular_sample.write() = regular;
    }

    pub fn samples(&self) -> (Option<PathBuf>, Option<PathBuf>) {
        (
            self.accent_sample.read().clone(),
            self.regular_sample.read().clone(),
        )
    }

    /// Range where the click sounds even when disabled (count-in).
    pub fn set_click_range(&self, range: TimeRange) {
        self.range_start.set(range.start);
        self.range_end.set(range.end);
    }

    pub fn clear_click_range(&self) {
        self.set_click_range(TimeRange::default());
    }

    pub fn click_range(&self) -> TimeRange {
        TimeRange::new(self.range_start.get(), self.range_end.get())
    }

    pub fn set_recording(&self, recording: bool) {
        self.recording.set(recording);
    }

    pub fn is_muted_at(&self, time: f64) -> bool {
        let enabled = self.enabled.get();
        if enabled && self.recording_only.get() {
            return !self.recording.get();
        }
        if !enabled {
            return !self.click_range().contains(time);
        }
        false
    }
}

impl Default for ClickState {
    fn default() -> Self {
        Self::new()
    }
}

/// Ascending beat times with bar-start accents, ending in a sentinel.
#[derive(Debug, Clone)]
pub struct BeatGrid {
    times: Vec<f64>,
    accents: Vec<bool>,
}

impl BeatGrid {
    /// Beats from [`GRID_LEAD_IN_BARS`] before the origin up to `end_time`.
    pub fn build(tempo_map: &TempoMap, end_time: f64) -> Self {
        let mut times = Vec::new();
        let mut accents = Vec::new();

        // Nudged off zero so beat-in-bar flooring is stable.
        let mut cursor = tempo_map.cursor(1.0e-10);
        cursor.add_bars(-GRID_LEAD_IN_BARS);

        loop {
            let time = cursor.time();
            if time >= end_time {
                break;
            }
            times.push(time);
            accents.push(cursor.bars_beats().whole_beats() == 0);
            cursor.add_beats(1.0);
        }

        times.push(GRID_SENTINEL);
        accents.push(false);

        Self { times, accents }
    }

    /// Number of real beats, excluding the sentinel.
    pub fn len(&self) -> usize {
        self.times.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn time(&self, index: usize) -> f64 {
        self.times[index]
    }

    pub fn is_accent(&self, index: usize) -> bool {
        self.accents[index]
    }

    pub fn times(&self) -> &[f64] {
        &self.times[..self.len()]
    }

    /// Index of the first beat at or after `time`.
    pub fn first_at_or_after(&self, time: f64) -> usize {
        self.times.partition_point(|&t| t < time)
    }
}

/// Receives protocol-mode click notes on the render thread.
pub trait NoteSink {
    fn push_note(&mut self, event: MidiEvent);
}

/// Caller reserves capacity up front to keep the render path allocation-free.
impl NoteSink for Vec<MidiEvent> {
    fn push_note(&mut self, event: MidiEvent) {
        self.push(event);
    }
}

impl NoteSink for ringbuf::HeapProd<MidiEvent> {
    fn push_note(&mut self, event: MidiEvent) {
        // Full queue drops the click.
        let _ = self.try_push(event);
    }
}

/// Where a window lands inside the block buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub start: usize,
    pub len: usize,
}

impl FrameSpan {
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }
}

pub struct ClickGenerator {
    grid: BeatGrid,
    output: ClickOutput,
    state: Arc<ClickState>,
    sample_rate: f64,
    assets: Option<Arc<ClickAssets>>,
    notes: (u8, u8),
    cursor: usize,
}

impl ClickGenerator {
    /// Build the grid up to `min(end_time, max(2 * timeline_length, 1 hour))`.
    pub fn new(
        tempo_map: &TempoMap,
        output: ClickOutput,
        end_time: f64,
        timeline_length: f64,
        state: Arc<ClickState>,
    ) -> Self {
        let horizon = end_time.min((timeline_length * 2.0).max(MIN_GRID_HORIZON));
        Self {
            grid: BeatGrid::build(tempo_map, horizon),
            output,
            state,
            sample_rate: 0.0,
            assets: None,
            notes: (DEFAULT_ACCENT_NOTE, DEFAULT_REGULAR_NOTE),
            cursor: 0,
        }
    }

    pub fn grid(&self) -> &BeatGrid {
        &self.grid
    }

    pub fn output(&self) -> ClickOutput {
        self.output
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Load assets for `sample_rate` and park the cursor at `start_time`.
    ///
    /// Control thread only: may read files and allocate.
    pub fn prepare_for_playback(&mut self, sample_rate: f64, start_time: f64) {
        if self.sample_rate != sample_rate {
            self.assets = None;
        }
        self.sample_rate = sample_rate;
        self.notes = self.state.notes();

        if self.output == ClickOutput::Audio && self.assets.is_none() {
            let (accent, regular) = self.state.samples();
            self.assets = Some(Arc::new(ClickAssets::load(
                sample_rate,
                accent.as_deref(),
                regular.as_deref(),
            )));
        }

        self.cursor = self.grid.first_at_or_after(start_time);
    }

    /// Emit clicks for beats inside `window` into the block buffers at `span`.
    ///
    /// Render thread: never allocates. Audio is mixed in and clipped to the
    /// span and channel bounds.
    pub fn emit(
        &mut self,
        window: TimeRange,
        span: FrameSpan,
        audio: Option<&mut [&mut [f32]]>,
        notes: Option<&mut dyn NoteSink>,
    ) {
        if self.state.is_muted_at(window.start) || self.sample_rate <= 0.0 {
            return;
        }
        self.seek_cursor(window.start);

        match self.output {
            ClickOutput::Midi => {
                if let Some(sink) = notes {
                    self.emit_notes(window, span, sink);
                }
            }
            ClickOutput::Audio => {
                if let Some(channels) = audio {
                    self.emit_audio(window, span, channels);
                }
            }
        }
    }

    fn seek_cursor(&mut self, start: f64) {
        let last = self.grid.times.len() - 1;
        while self.cursor < last && self.grid.times[self.cursor] < start {
            self.cursor += 1;
        }
        while self.cursor > 0 && self.grid.times[self.cursor - 1] >= start {
            self.cursor -= 1;
        }
    }

    fn emit_notes(&mut self, window: TimeRange, span: FrameSpan, sink: &mut dyn NoteSink) {
        if span.len == 0 {
            return;
        }
        let velocity = (self.state.gain() * 127.0).round().clamp(0.0, 127.0) as u8;
        let emphasise = self.state.emphasise_bars();

        while let Some(&time) = self.grid.times.get(self.cursor) {
            if time >= window.end {
                break;
            }
            if time >= window.start && velocity > 0 {
                let offset = ((time - window.start) * self.sample_rate).round().max(0.0) as usize;
                let note = if emphasise && self.grid.accents[self.cursor] {
                    self.notes.0
                } else {
                    self.notes.1
                };
                sink.push_note(MidiEvent::rhythm_note_on(
                    span.start + offset.min(span.len - 1),
                    note,
                    velocity,
                ));
            }
            self.cursor += 1;
        }
    }

    fn emit_audio(&mut self, window: TimeRange, span: FrameSpan, channels: &mut [&mut [f32]]) {
        let Some(assets) = self.assets.as_ref() else {
            return;
        };
        let gain = self.state.gain();
        let emphasise = self.state.emphasise_bars();

        // Start one beat early so a click straddling the block boundary keeps its tail.
        self.cursor = self.cursor.saturating_sub(1);

        while let Some(&time) = self.grid.times.get(self.cursor) {
            if time >= window.end {
                break;
            }
            let accented = emphasise && self.grid.accents[self.cursor];
            let click = assets.waveform(accented);
            let offset = ((time - window.start) * self.sample_rate).round() as i64;

            let src_start = (-offset).max(0) as usize;
            let dst_start = offset.max(0) as usize;

            if src_start < click.len() && dst_start < span.len {
                let count = (click.len() - src_start).min(span.len - dst_start);
                for channel in channels.iter_mut() {
                    let from = span.start + dst_start;
                    let to = (from + count).min(channel.len());
                    if from >= to {
                        continue;
                    }
                    for (out, &s) in channel[from..to]
                        .iter_mut()
                        .zip(&click[src_start..src_start + (to - from)])
                    {
                        *out += s * gain;
                    }
                }
            }
            self.cursor += 1;
        }
    }
}

/// Drives a [`ClickGenerator`] from the shared playhead, one render block at a time.
pub struct ClickNode {
    generator: ClickGenerator,
    playhead: Arc<Playhead>,
}

impl ClickNode {
    pub fn new(generator: ClickGenerator, playhead: Arc<Playhead>) -> Self {
        Self {
            generator,
            playhead,
        }
    }

    pub fn generator(&self) -> &ClickGenerator {
        &self.generator
    }

    pub fn prepare_for_playback(&mut self, start_time: f64) {
        let sample_rate = self.playhead.sample_rate();
        self.generator.prepare_for_playback(sample_rate, start_time);
    }

    /// Emit for the timeline `block` covered; skipped while stopped or dragging.
    pub fn process(
        &mut self,
        block: &BlockRange,
        mut audio: Option<&mut [&mut [f32]]>,
        mut notes: Option<&mut dyn NoteSink>,
    ) {
        if self.playhead.is_user_dragging() || block.num_frames() == 0 {
            return;
        }
        let sample_rate = self.playhead.sample_rate();

        let first_len = block.first.length() as usize;
        self.generator.emit(
            block.first.to_time(sample_rate),
            FrameSpan::new(0, first_len),
            audio.as_deref_mut(),
            notes.as_mut().map(|n| &mut **n as &mut dyn NoteSink),
        );

        if let Some(second) = block.second {
            self.generator.emit(
                second.to_time(sample_rate),
                FrameSpan::new(first_len, second.length() as usize),
                audio.as_deref_mut(),
                notes.as_mut().map(|n| &mut **n as &mut dyn NoteSink),
            );
        }
    }
}
