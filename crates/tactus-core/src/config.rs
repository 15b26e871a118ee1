//! Transport and click configuration.

use crate::transport::SmpteFrameRate;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest timeline the transport will play or record into (48 hours).
pub const MAX_TIMELINE_LENGTH: f64 = 48.0 * 60.0 * 60.0;

/// Default MIDI note for accented clicks.
pub const DEFAULT_ACCENT_NOTE: u8 = 37;

/// Default MIDI note for regular clicks.
pub const DEFAULT_REGULAR_NOTE: u8 = 76;

/// Timecode used for position broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimecodeConfig {
    pub frame_rate: SmpteFrameRate,
    /// Seconds added to the timeline position before broadcasting.
    pub offset: f64,
    /// Let synced machines drive playback instead of the local graph.
    pub sync_enabled: bool,
}

impl Default for TimecodeConfig {
    fn default() -> Self {
        Self {
            frame_rate: SmpteFrameRate::Fps30,
            offset: 0.0,
            sync_enabled: false,
        }
    }
}

/// Transport policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Reported when no playback graph is allocated.
    pub sample_rate_fallback: f64,
    pub max_length: f64,
    /// Length of the edited material, used to bound loop points and the click grid.
    pub timeline_length: f64,
    /// Playhead writes from the reconciler are held off this long after a drag.
    pub drag_debounce_ms: u64,
    /// Preroll starts earlier than this are pulled back by the same amount.
    pub preroll_backoff: f64,
    pub min_play_loop: f64,
    pub min_record_loop: f64,
    pub reconcile_interval_ms: u64,
    pub loop_refresh_ticks: u32,
    pub nudge_interval_ms: u64,
    pub scrub_interval: f64,
    pub reset_cursor_on_stop: bool,
    pub play_in_stop_enabled: bool,
    pub safe_record: bool,
    pub timecode: TimecodeConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sample_rate_fallback: 44100.0,
            max_length: MAX_TIMELINE_LENGTH,
            timeline_length: 0.0,
            drag_debounce_ms: 200,
            preroll_backoff: 0.2,
            min_play_loop: 0.01,
            min_record_loop: 2.0,
            reconcile_interval_ms: 40,
            loop_refresh_ticks: 10,
            nudge_interval_ms: 20,
            scrub_interval: 0.1,
            reset_cursor_on_stop: false,
            play_in_stop_enabled: true,
            safe_record: false,
            timecode: TimecodeConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn drag_debounce(&self) -> Duration {
        Duration::from_millis(self.drag_debounce_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn nudge_interval(&self) -> Duration {
        Duration::from_millis(self.nudge_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_fallback < 8000.0 || self.sample_rate_fallback > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate_fallback {} out of range (8000-384000 Hz)",
                self.sample_rate_fallback
            )));
        }
        if self.max_length <= 0.0 || self.timeline_length < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "timeline lengths must be positive (max_length {}, timeline_length {})",
                self.max_length, self.timeline_length
            )));
        }
        if self.reconcile_interval_ms == 0 || self.nudge_interval_ms == 0 {
            return Err(Error::InvalidConfig("timer intervals must be non-zero".into()));
        }
        if self.loop_refresh_ticks == 0 {
            return Err(Error::InvalidConfig("loop_refresh_ticks must be non-zero".into()));
        }
        if self.scrub_interval <= 0.0 || self.preroll_backoff < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "scrub_interval {} / preroll_backoff {} out of range",
                self.scrub_interval, self.preroll_backoff
            )));
        }
        if self.min_play_loop < 0.0 || self.min_record_loop < self.min_play_loop {
            return Err(Error::InvalidConfig(format!(
                "loop minimums out of order (play {}, record {})",
                self.min_play_loop, self.min_record_loop
            )));
        }
        Ok(())
    }
}

/// Metronome settings, applied to [`ClickState`](crate::ClickState) at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    pub enabled: bool,
    pub recording_only: bool,
    pub emphasise_bars: bool,
    pub gain: f32,
    pub accent_note: u8,
    pub regular_note: u8,
    pub accent_sample: Option<PathBuf>,
    pub regular_sample: Option<PathBuf>,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recording_only: false,
            emphasise_bars: true,
            gain: 1.0,
            accent_note: DEFAULT_ACCENT_NOTE,
            regular_note: DEFAULT_REGULAR_NOTE,
            accent_sample: None,
            regular_sample: None,
        }
    }
}

impl ClickConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=4.0).contains(&self.gain) {
            return Err(Error::InvalidConfig(format!(
                "click gain {} out of range (0-4)",
                self.gain
            )));
        }
        Ok(())
    }
}
