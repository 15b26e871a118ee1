//! RT-safe MIDI event types with sample-accurate timing.

use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};

/// Zero-based index of the General MIDI percussion channel (channel 10).
pub const RHYTHM_CHANNEL: u8 = 9;

/// RT-safe MIDI event with sample-accurate frame offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset within the current buffer (0 = first sample).
    pub frame_offset: usize,
    pub channel: Channel,
    pub msg: ChannelVoiceMsg,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame_offset: usize, channel: Channel, msg: ChannelVoiceMsg) -> Self {
        Self {
            frame_offset,
            channel,
            msg,
        }
    }

    #[inline]
    pub fn note_on(frame_offset: usize, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            frame_offset,
            channel: Channel::from_u8(channel),
            msg: ChannelVoiceMsg::NoteOn {
                note: note.min(127),
                velocity: velocity.min(127),
            },
        }
    }

    #[inline]
    pub fn note_off(frame_offset: usize, channel: u8, note: u8) -> Self {
        Self {
            frame_offset,
            channel: Channel::from_u8(channel),
            msg: ChannelVoiceMsg::NoteOff {
                note: note.min(127),
                velocity: 0,
            },
        }
    }

    /// Note-on on the percussion channel.
    #[inline]
    pub fn rhythm_note_on(frame_offset: usize, note: u8, velocity: u8) -> Self {
        Self::note_on(frame_offset, RHYTHM_CHANNEL, note, velocity)
    }

    #[inline]
    pub fn channel_num(&self) -> u8 {
        self.channel as u8
    }

    #[inline]
    pub fn is_rhythm(&self) -> bool {
        self.channel_num() == RHYTHM_CHANNEL
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(self.msg, ChannelVoiceMsg::NoteOn { velocity, .. } if velocity > 0)
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.msg,
            ChannelVoiceMsg::NoteOff { .. } | ChannelVoiceMsg::NoteOn { velocity: 0, .. }
        )
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { note, .. } | ChannelVoiceMsg::NoteOff { note, .. } => {
                Some(note)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn velocity(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { velocity, .. }
            | ChannelVoiceMsg::NoteOff { velocity, .. } => Some(velocity),
            _ => None,
        }
    }

    #[inline]
    pub fn to_midi_msg(&self) -> MidiMsg {
        MidiMsg::ChannelVoice {
            channel: self.channel,
            msg: self.msg,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_midi_msg().to_midi()
    }
}
