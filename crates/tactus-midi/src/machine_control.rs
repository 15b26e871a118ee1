//! MIDI Machine Control (MMC) encoding for the transport command set.
//!
//! Commands are Universal Real Time SysEx messages:
//! `F0 7F <device> 06 <command> F7`, with the locate command carrying a
//! timecode payload.

use smallvec::SmallVec;

/// Encoded SysEx bytes. Fits every command without heap allocation.
pub type MmcBytes = SmallVec<[u8; 13]>;

/// Device id addressing every receiver.
pub const ALL_CALL_DEVICE: u8 = 0x7F;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const UNIVERSAL_REAL_TIME: u8 = 0x7F;
const MMC_COMMAND: u8 = 0x06;
const LOCATE: u8 = 0x44;
const LOCATE_TARGET: u8 = 0x01;

/// An SMPTE-style position broadcast with [`MachineCommand::Goto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl Timecode {
    pub const fn new(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            frames,
        }
    }
}

impl core::fmt::Display for Timecode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

/// Transport commands sent to external machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineCommand {
    Play,
    Stop,
    RecordStart,
    Rewind,
    FastForward,
    Goto(Timecode),
}

impl MachineCommand {
    fn command_byte(&self) -> u8 {
        match self {
            MachineCommand::Stop => 0x01,
            MachineCommand::Play => 0x02,
            MachineCommand::FastForward => 0x04,
            MachineCommand::Rewind => 0x05,
            MachineCommand::RecordStart => 0x06,
            MachineCommand::Goto(_) => LOCATE,
        }
    }

    /// Encode as an MMC SysEx message addressed to `device`.
    pub fn to_sysex(&self, device: u8) -> MmcBytes {
        let mut bytes = MmcBytes::new();
        bytes.extend_from_slice(&[
            SYSEX_START,
            UNIVERSAL_REAL_TIME,
            device & 0x7F,
            MMC_COMMAND,
            self.command_byte(),
        ]);

        if let MachineCommand::Goto(tc) = self {
            bytes.extend_from_slice(&[
                0x06,
                LOCATE_TARGET,
                tc.hours & 0x1F,
                tc.minutes & 0x7F,
                tc.seconds & 0x7F,
                tc.frames & 0x7F,
                0x00,
            ]);
        }

        bytes.push(SYSEX_END);
        bytes
    }
}
