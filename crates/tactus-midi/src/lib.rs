//! MIDI types shared by the tactus transport.
//!
//! - [`MidiEvent`]: RT-safe channel voice event with a frame offset, used for
//!   protocol-mode click notes.
//! - [`MachineCommand`] / [`Timecode`]: the transport command set broadcast to
//!   external devices, encoded as MIDI Machine Control SysEx.

mod event;
pub use event::{MidiEvent, RHYTHM_CHANNEL};

pub mod machine_control;
pub use machine_control::{MachineCommand, MmcBytes, Timecode, ALL_CALL_DEVICE};

pub use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
