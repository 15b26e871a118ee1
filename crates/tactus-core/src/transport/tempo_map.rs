//! Tempo map: tempo points in beats plus time-signature changes on bar lines.
//!
//! Timeline time is in seconds and may be negative (preroll and the click
//! grid both reach before the origin).

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TempoPoint {
    pub(crate) beat: f64,
    pub(crate) bpm: f64,
}

impl TempoPoint {
    pub(crate) fn new(beat: f64, bpm: f64) -> Self {
        Self { beat, bpm }
    }

    #[inline]
    fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    #[inline]
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator as f64
    }

    fn validate(&self) -> Result<()> {
        if self.numerator == 0 || self.denominator == 0 || !self.denominator.is_power_of_two() {
            return Err(Error::InvalidTimeSignature {
                numerator: self.numerator,
                denominator: self.denominator,
            });
        }
        Ok(())
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SignaturePoint {
    bar: i32,
    /// Beat where the bar starts, derived from the earlier signatures.
    beat: f64,
    signature: TimeSignature,
}

/// A bar index and the beat offset inside that bar. Bar 0 starts at time zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BarsBeats {
    pub bars: i32,
    pub beats: f64,
}

impl BarsBeats {
    pub const fn new(bars: i32, beats: f64) -> Self {
        Self { bars, beats }
    }

    /// Index of the beat within its bar.
    #[inline]
    pub fn whole_beats(&self) -> i32 {
        self.beats.floor() as i32
    }

    #[inline]
    pub fn fractional_beats(&self) -> f64 {
        self.beats - self.beats.floor()
    }
}

#[derive(Debug, Clone)]
pub struct TempoMap {
    points: Vec<TempoPoint>,
    signatures: Vec<SignaturePoint>,
}

impl TempoMap {
    pub fn new(initial_bpm: f64) -> Self {
        Self {
            points: vec![TempoPoint::new(0.0, initial_bpm.clamp(1.0, 999.0))],
            signatures: vec![SignaturePoint {
                bar: 0,
                beat: 0.0,
                signature: TimeSignature::default(),
            }],
        }
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        let bpm = bpm.clamp(1.0, 999.0);
        self.points.clear();
        self.points.push(TempoPoint::new(0.0, bpm));
    }

    /// Tempo at the origin.
    pub fn tempo(&self) -> f64 {
        self.points[0].bpm
    }

    pub fn add_tempo_point(&mut self, beat: f64, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::InvalidTempo(bpm));
        }
        if !beat.is_finite() || beat < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tempo point beat {beat} must be non-negative"
            )));
        }
        let bpm = bpm.clamp(1.0, 999.0);

        self.points.retain(|p| (p.beat - beat).abs() > 0.001);
        self.points.push(TempoPoint::new(beat, bpm));
        self.points.sort_by(|a, b| a.beat.total_cmp(&b.beat));

        if self.points[0].beat > 0.0 {
            self.points.insert(0, TempoPoint::new(0.0, self.points[0].bpm));
        }
        Ok(())
    }

    pub fn remove_tempo_point(&mut self, beat: f64) {
        if beat <= 0.001 {
            return;
        }
        self.points.retain(|p| (p.beat - beat).abs() > 0.001);
    }

    pub fn set_time_signature(&mut self, numerator: u32, denominator: u32) -> Result<()> {
        self.set_time_signature_at(0, numerator, denominator)
    }

    /// Change the time signature from `bar` onwards.
    pub fn set_time_signature_at(&mut self, bar: i32, numerator: u32, denominator: u32) -> Result<()> {
        let signature = TimeSignature::new(numerator, denominator);
        signature.validate()?;
        let bar = bar.max(0);

        self.signatures.retain(|p| p.bar != bar);
        self.signatures.push(SignaturePoint {
            bar,
            beat: 0.0,
            signature,
        });
        self.signatures.sort_by_key(|p| p.bar);
        self.rebuild_signature_beats();
        Ok(())
    }

    fn rebuild_signature_beats(&mut self) {
        let mut beat = 0.0;
        let mut prev: Option<SignaturePoint> = None;
        for point in self.signatures.iter_mut() {
            if let Some(prev) = prev {
                beat += (point.bar - prev.bar) as f64 * prev.signature.beats_per_bar();
            }
            point.beat = beat;
            prev = Some(*point);
        }
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.signatures[0].signature
    }

    pub fn time_signature_at_beat(&self, beats: f64) -> TimeSignature {
        self.signature_for_beat(beats).signature
    }

    pub fn time_signature_at(&self, seconds: f64) -> TimeSignature {
        self.time_signature_at_beat(self.seconds_to_beats(seconds))
    }

    fn signature_for_beat(&self, beats: f64) -> &SignaturePoint {
        self.signatures
            .iter()
            .rev()
            .find(|p| p.beat <= beats)
            .unwrap_or(&self.signatures[0])
    }

    fn signature_for_bar(&self, bar: i32) -> &SignaturePoint {
        self.signatures
            .iter()
            .rev()
            .find(|p| p.bar <= bar)
            .unwrap_or(&self.signatures[0])
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        if self.points.len() == 1 {
            return beats * self.points[0].seconds_per_beat();
        }

        let mut seconds = 0.0;
        let mut prev_beat = 0.0;

        for (i, point) in self.points.iter().enumerate() {
            if point.beat >= beats {
                let prev = if i > 0 { &self.points[i - 1] } else { point };
                return seconds + (beats - prev_beat) * prev.seconds_per_beat();
            }
            if i > 0 {
                seconds += (point.beat - prev_beat) * self.points[i - 1].seconds_per_beat();
            }
            prev_beat = point.beat;
        }

        let last = self.points[self.points.len() - 1];
        seconds + (beats - prev_beat) * last.seconds_per_beat()
    }

    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        if self.points.len() == 1 {
            return seconds / self.points[0].seconds_per_beat();
        }

        let mut current_seconds = 0.0;
        let mut current_beats = 0.0;

        for (i, point) in self.points.iter().enumerate() {
            let next_beat = self.points.get(i + 1).map_or(f64::MAX, |p| p.beat);
            let segment_seconds = (next_beat - point.beat) * point.seconds_per_beat();

            if current_seconds + segment_seconds >= seconds {
                return current_beats + (seconds - current_seconds) / point.seconds_per_beat();
            }

            current_seconds += segment_seconds;
            current_beats = next_beat;
        }

        current_beats
    }

    pub fn beats_to_bars_beats(&self, beats: f64) -> BarsBeats {
        let point = self.signature_for_beat(beats);
        let beats_per_bar = point.signature.beats_per_bar();
        let relative = beats - point.beat;
        let whole_bars = (relative / beats_per_bar).floor();

        BarsBeats {
            bars: point.bar + whole_bars as i32,
            beats: relative - whole_bars * beats_per_bar,
        }
    }

    pub fn bars_beats_to_beats(&self, position: BarsBeats) -> f64 {
        let point = self.signature_for_bar(position.bars);
        point.beat
            + (position.bars - point.bar) as f64 * point.signature.beats_per_bar()
            + position.beats
    }

    pub fn time_to_bars_beats(&self, seconds: f64) -> BarsBeats {
        self.beats_to_bars_beats(self.seconds_to_beats(seconds))
    }

    pub fn bars_beats_to_time(&self, position: BarsBeats) -> f64 {
        self.beats_to_seconds(self.bars_beats_to_beats(position))
    }

    /// A stepping cursor starting at `seconds`.
    pub fn cursor(&self, seconds: f64) -> TempoCursor<'_> {
        TempoCursor {
            map: self,
            beats: self.seconds_to_beats(seconds),
        }
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(120.0)
    }
}

/// Positional cursor over a [`TempoMap`], stepping in bars or beats.
///
/// The position is held in beats so repeated steps don't accumulate
/// time-domain rounding.
#[derive(Debug, Clone, Copy)]
pub struct TempoCursor<'a> {
    map: &'a TempoMap,
    beats: f64,
}

impl TempoCursor<'_> {
    pub fn set_time(&mut self, seconds: f64) {
        self.beats = self.map.seconds_to_beats(seconds);
    }

    pub fn time(&self) -> f64 {
        self.map.beats_to_seconds(self.beats)
    }

    pub fn beats(&self) -> f64 {
        self.beats
    }

    pub fn bars_beats(&self) -> BarsBeats {
        self.map.beats_to_bars_beats(self.beats)
    }

    pub fn add_beats(&mut self, beats: f64) {
        self.beats += beats;
    }

    /// Move by whole bars, keeping the offset inside the bar.
    pub fn add_bars(&mut self, bars: i32) {
        let mut position = self.bars_beats();
        position.bars += bars;
        self.beats = self.map.bars_beats_to_beats(position);
    }
}
