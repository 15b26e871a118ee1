//! Snapping timeline positions to timecode frames or the musical grid.

use super::sync::SmpteFrameRate;
use super::tempo_map::{BarsBeats, TempoMap};
use serde::{Deserialize, Serialize};

/// Grid that scrubbing and nudging snap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapGrid {
    /// Timecode frames at the given rate.
    Frames(SmpteFrameRate),
    #[default]
    Beats,
    Bars,
}

impl SnapGrid {
    pub fn round_down(&self, time: f64, tempo_map: &TempoMap) -> f64 {
        match self {
            SnapGrid::Frames(rate) => (time * rate.fps()).floor() / rate.fps(),
            SnapGrid::Beats => tempo_map.beats_to_seconds(tempo_map.seconds_to_beats(time).floor()),
            SnapGrid::Bars => {
                let bb = tempo_map.time_to_bars_beats(time);
                tempo_map.bars_beats_to_time(BarsBeats::new(bb.bars, 0.0))
            }
        }
    }

    pub fn round_up(&self, time: f64, tempo_map: &TempoMap) -> f64 {
        match self {
            SnapGrid::Frames(rate) => (time * rate.fps()).ceil() / rate.fps(),
            SnapGrid::Beats => tempo_map.beats_to_seconds(tempo_map.seconds_to_beats(time).ceil()),
            SnapGrid::Bars => {
                let bb = tempo_map.time_to_bars_beats(time);
                let bars = if bb.beats > 0.0 { bb.bars + 1 } else { bb.bars };
                tempo_map.bars_beats_to_time(BarsBeats::new(bars, 0.0))
            }
        }
    }

    pub fn round_nearest(&self, time: f64, tempo_map: &TempoMap) -> f64 {
        let down = self.round_down(time, tempo_map);
        let up = self.round_up(time, tempo_map);
        if time - down <= up - time {
            down
        } else {
            up
        }
    }
}
