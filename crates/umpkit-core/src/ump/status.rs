//! Message-type and channel-voice status tables.
//!
//! Shared by the word codec and the structured projection so both sides
//! dispatch over the same closed sets.

use serde::{Deserialize, Serialize};

/// UMP message types this engine decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Utility,
    System,
    Midi1ChannelVoice,
    Data64,
    Midi2ChannelVoice,
    Data128,
    FlexData,
    Stream,
}

impl MessageType {
    pub fn nibble(self) -> u8 {
        match self {
            MessageType::Utility => super::MT_UTILITY,
            MessageType::System => super::MT_SYSTEM,
            MessageType::Midi1ChannelVoice => super::MT_MIDI1_CHANNEL_VOICE,
            MessageType::Data64 => super::MT_SYSEX7,
            MessageType::Midi2ChannelVoice => super::MT_MIDI2_CHANNEL_VOICE,
            MessageType::Data128 => super::MT_SYSEX8,
            MessageType::FlexData => super::MT_FLEX_DATA,
            MessageType::Stream => super::MT_STREAM,
        }
    }

    /// `None` for reserved message types.
    pub fn from_nibble(mt: u8) -> Option<Self> {
        Some(match mt {
            super::MT_UTILITY => MessageType::Utility,
            super::MT_SYSTEM => MessageType::System,
            super::MT_MIDI1_CHANNEL_VOICE => MessageType::Midi1ChannelVoice,
            super::MT_SYSEX7 => MessageType::Data64,
            super::MT_MIDI2_CHANNEL_VOICE => MessageType::Midi2ChannelVoice,
            super::MT_SYSEX8 => MessageType::Data128,
            super::MT_FLEX_DATA => MessageType::FlexData,
            super::MT_STREAM => MessageType::Stream,
            _ => return None,
        })
    }
}

/// MIDI 2.0 channel voice status nibble (word 0 bits 20-23).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelVoiceStatus {
    RegisteredPerNoteController,
    AssignablePerNoteController,
    RegisteredController,
    AssignableController,
    RelativeRegisteredController,
    RelativeAssignableController,
    PerNotePitchBend,
    NoteOff,
    NoteOn,
    PolyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    PerNoteManagement,
}

impl ChannelVoiceStatus {
    pub fn nibble(self) -> u8 {
        match self {
            ChannelVoiceStatus::RegisteredPerNoteController => 0x0,
            ChannelVoiceStatus::AssignablePerNoteController => 0x1,
            ChannelVoiceStatus::RegisteredController => 0x2,
            ChannelVoiceStatus::AssignableController => 0x3,
            ChannelVoiceStatus::RelativeRegisteredController => 0x4,
            ChannelVoiceStatus::RelativeAssignableController => 0x5,
            ChannelVoiceStatus::PerNotePitchBend => 0x6,
            ChannelVoiceStatus::NoteOff => 0x8,
            ChannelVoiceStatus::NoteOn => 0x9,
            ChannelVoiceStatus::PolyPressure => 0xA,
            ChannelVoiceStatus::ControlChange => 0xB,
            ChannelVoiceStatus::ProgramChange => 0xC,
            ChannelVoiceStatus::ChannelPressure => 0xD,
            ChannelVoiceStatus::PitchBend => 0xE,
            ChannelVoiceStatus::PerNoteManagement => 0xF,
        }
    }

    /// `None` for the reserved opcode 0x7.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0x0 => ChannelVoiceStatus::RegisteredPerNoteController,
            0x1 => ChannelVoiceStatus::AssignablePerNoteController,
            0x2 => ChannelVoiceStatus::RegisteredController,
            0x3 => ChannelVoiceStatus::AssignableController,
            0x4 => ChannelVoiceStatus::RelativeRegisteredController,
            0x5 => ChannelVoiceStatus::RelativeAssignableController,
            0x6 => ChannelVoiceStatus::PerNotePitchBend,
            0x8 => ChannelVoiceStatus::NoteOff,
            0x9 => ChannelVoiceStatus::NoteOn,
            0xA => ChannelVoiceStatus::PolyPressure,
            0xB => ChannelVoiceStatus::ControlChange,
            0xC => ChannelVoiceStatus::ProgramChange,
            0xD => ChannelVoiceStatus::ChannelPressure,
            0xE => ChannelVoiceStatus::PitchBend,
            0xF => ChannelVoiceStatus::PerNoteManagement,
            _ => return None,
        })
    }
}
