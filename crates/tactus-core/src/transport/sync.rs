//! Outbound synchronization: machine-control broadcasts and tempo-sync peers.
//!
//! The transport only emits sync traffic. Receiving timecode or clock is the
//! business of whatever implements [`SyncOutput`].

use serde::{Deserialize, Serialize};
use tactus_midi::{MachineCommand, Timecode};

/// Added to every broadcast time so exact frame boundaries don't floor down a frame.
const TIMECODE_NUDGE: f64 = 0.05 / 96000.0;

/// SMPTE frame rate for position broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmpteFrameRate {
    /// 24 fps (film)
    Fps24,
    /// 25 fps (PAL video)
    Fps25,
    /// 29.97 fps drop-frame (NTSC video)
    Fps2997Df,
    /// 29.97 fps non-drop
    Fps2997Ndf,
    /// 30 fps (audio/music)
    #[default]
    Fps30,
}

impl SmpteFrameRate {
    pub fn fps(&self) -> f64 {
        match self {
            SmpteFrameRate::Fps24 => 24.0,
            SmpteFrameRate::Fps25 => 25.0,
            SmpteFrameRate::Fps2997Df | SmpteFrameRate::Fps2997Ndf => 30000.0 / 1001.0,
            SmpteFrameRate::Fps30 => 30.0,
        }
    }

    /// Frames counted per timecode second.
    pub fn frames_per_second(&self) -> u32 {
        self.fps().round() as u32
    }

    pub fn is_drop_frame(&self) -> bool {
        matches!(self, SmpteFrameRate::Fps2997Df)
    }
}

/// Timecode broadcast for `time`, shifted by `offset` and clamped at zero.
pub fn timecode_for(time: f64, offset: f64, frame_rate: SmpteFrameRate) -> Timecode {
    let t = (time + offset).max(0.0) + TIMECODE_NUDGE;
    let whole_seconds = t as i64;
    let fps = frame_rate.frames_per_second().max(1) as i64;

    Timecode {
        hours: (t / 3600.0).floor().min(u8::MAX as f64) as u8,
        minutes: ((whole_seconds / 60) % 60) as u8,
        seconds: (whole_seconds % 60) as u8,
        frames: (((t * frame_rate.fps()) as i64) % fps) as u8,
    }
}

/// Destination for transport commands (an MMC port, a network bridge).
pub trait SyncOutput: Send {
    /// Whether this output currently forwards machine-control commands.
    fn is_sending_mmc(&self) -> bool;

    fn send(&mut self, command: MachineCommand);
}

/// The registered sync outputs.
#[derive(Default)]
pub struct SyncOutputs {
    outputs: Vec<Box<dyn SyncOutput>>,
}

impl SyncOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, output: Box<dyn SyncOutput>) {
        self.outputs.push(output);
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn is_sending(&self) -> bool {
        self.outputs.iter().any(|o| o.is_sending_mmc())
    }

    /// Deliver to the first sending output. Returns whether any accepted it.
    pub fn send(&mut self, command: MachineCommand) -> bool {
        match self.outputs.iter_mut().find(|o| o.is_sending_mmc()) {
            Some(output) => {
                tracing::trace!(?command, "sync command");
                output.send(command);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for SyncOutputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOutputs")
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

/// A networked tempo-sync session (Ableton Link style) that shares bar phase.
pub trait TempoSyncPeer: Send {
    fn is_connected(&self) -> bool;

    /// Beats left until the peer's next cycle of `quantum` beats.
    fn beats_until_next_cycle(&self, quantum: f64) -> f64;
}
