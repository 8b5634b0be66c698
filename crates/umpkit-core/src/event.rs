//! MIDI 2.0 event model shared by the codec, bridge and scheduler.

use serde::{Deserialize, Serialize};

use crate::ci::{MidiCiMessage, ProcessInquiryMessage, ProfileMessage, PropertyExchangeMessage};
use crate::sysex::SysExMessage;

/// Decoded message with an optional absolute host timestamp (milliseconds).
#[derive(Clone, Debug, PartialEq)]
pub struct Midi2Event {
    pub timestamp: Option<f64>,
    pub message: Midi2Message,
}

impl Midi2Event {
    #[inline]
    pub fn new(message: Midi2Message) -> Self {
        Self {
            timestamp: None,
            message,
        }
    }

    /// Same event stamped with `timestamp`.
    #[inline]
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[inline]
    pub fn group(&self) -> Option<u8> {
        self.message.group()
    }

    #[inline]
    pub fn channel(&self) -> Option<u8> {
        self.message.channel()
    }
}

impl From<Midi2Message> for Midi2Event {
    fn from(message: Midi2Message) -> Self {
        Self::new(message)
    }
}

/// Bank select carried by a MIDI 2.0 program change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSelect {
    pub msb: u8,
    pub lsb: u8,
}

/// System common and real-time messages (MT 0x1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum SystemMessage {
    /// MTC quarter frame (0xF1).
    TimeCode(u8),
    /// Song position pointer in MIDI beats (0xF2), 14-bit.
    SongPosition(u16),
    SongSelect(u8),
    TuneRequest,
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}

impl SystemMessage {
    pub fn status(&self) -> u8 {
        match self {
            SystemMessage::TimeCode(_) => 0xF1,
            SystemMessage::SongPosition(_) => 0xF2,
            SystemMessage::SongSelect(_) => 0xF3,
            SystemMessage::TuneRequest => 0xF6,
            SystemMessage::TimingClock => 0xF8,
            SystemMessage::Start => 0xFA,
            SystemMessage::Continue => 0xFB,
            SystemMessage::Stop => 0xFC,
            SystemMessage::ActiveSensing => 0xFE,
            SystemMessage::Reset => 0xFF,
        }
    }

    /// Build from a status byte and its (7-bit) data bytes.
    ///
    /// Returns `None` for statuses that are not system common/real-time.
    pub fn from_status(status: u8, data1: u8, data2: u8) -> Option<Self> {
        Some(match status {
            0xF1 => SystemMessage::TimeCode(data1),
            0xF2 => SystemMessage::SongPosition(u16::from(data1) | (u16::from(data2) << 7)),
            0xF3 => SystemMessage::SongSelect(data1),
            0xF6 => SystemMessage::TuneRequest,
            0xF8 => SystemMessage::TimingClock,
            0xFA => SystemMessage::Start,
            0xFB => SystemMessage::Continue,
            0xFC => SystemMessage::Stop,
            0xFE => SystemMessage::ActiveSensing,
            0xFF => SystemMessage::Reset,
            _ => return None,
        })
    }

    /// Data bytes as they appear after the status byte on the wire.
    pub fn data_bytes(&self) -> (Option<u8>, Option<u8>) {
        match *self {
            SystemMessage::TimeCode(v) | SystemMessage::SongSelect(v) => (Some(v), None),
            SystemMessage::SongPosition(pos) => {
                (Some((pos & 0x7F) as u8), Some(((pos >> 7) & 0x7F) as u8))
            }
            _ => (None, None),
        }
    }

    pub fn is_realtime(&self) -> bool {
        self.status() >= 0xF8
    }
}

/// Utility messages (MT 0x0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum UtilityMessage {
    Noop,
    /// Sender clock in 1/31250 s ticks.
    JrClock(u16),
    /// Sender time of the following message.
    JrTimestamp(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamProtocol {
    Midi1,
    Midi2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    pub protocol: StreamProtocol,
    pub jr_timestamps_tx: bool,
    pub jr_timestamps_rx: bool,
}

/// UMP stream messages (MT 0xF).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opcode", rename_all = "camelCase")]
pub enum StreamMessage {
    #[serde(rename_all = "camelCase")]
    EndpointDiscovery {
        major_version: u8,
        minor_version: u8,
        max_groups: u8,
    },
    StreamConfigRequest(StreamConfig),
    StreamConfigNotification(StreamConfig),
    #[serde(rename_all = "camelCase")]
    FunctionBlockDiscovery { filter_bitmap: u16 },
    #[serde(rename_all = "camelCase")]
    FunctionBlockInfo {
        index: u8,
        first_group: u8,
        group_count: u8,
    },
    #[serde(rename_all = "camelCase")]
    ProcessInquiry { function_block: u8, part: u8 },
    #[serde(rename_all = "camelCase")]
    ProcessInquiryReply { function_block: u8, part: u8 },
}

/// Every message the engine understands.
#[derive(Clone, Debug, PartialEq)]
pub enum Midi2Message {
    NoteOn {
        group: u8,
        channel: u8,
        note: u8,
        velocity: u16,
        attribute_type: u8,
        attribute_data: u16,
    },
    NoteOff {
        group: u8,
        channel: u8,
        note: u8,
        velocity: u16,
        attribute_type: u8,
        attribute_data: u16,
    },
    PolyPressure {
        group: u8,
        channel: u8,
        note: u8,
        pressure: u32,
    },
    ControlChange {
        group: u8,
        channel: u8,
        controller: u8,
        value: u32,
    },
    ProgramChange {
        group: u8,
        channel: u8,
        program: u8,
        bank: Option<BankSelect>,
    },
    ChannelPressure {
        group: u8,
        channel: u8,
        pressure: u32,
    },
    PitchBend {
        group: u8,
        channel: u8,
        value: u32,
    },
    Rpn {
        group: u8,
        channel: u8,
        bank: u8,
        index: u8,
        value: u32,
    },
    Nrpn {
        group: u8,
        channel: u8,
        bank: u8,
        index: u8,
        value: u32,
    },
    RpnRelative {
        group: u8,
        channel: u8,
        bank: u8,
        index: u8,
        delta: i32,
    },
    NrpnRelative {
        group: u8,
        channel: u8,
        bank: u8,
        index: u8,
        delta: i32,
    },
    PerNoteManagement {
        group: u8,
        channel: u8,
        note: u8,
        detach: bool,
        reset: bool,
    },
    PerNoteRegisteredController {
        group: u8,
        channel: u8,
        note: u8,
        controller: u8,
        value: u32,
    },
    PerNoteAssignableController {
        group: u8,
        channel: u8,
        note: u8,
        controller: u8,
        value: u32,
    },
    PerNotePitchBend {
        group: u8,
        channel: u8,
        note: u8,
        value: u32,
    },
    /// MIDI 1.0 channel voice carried in a UMP (MT 0x2).
    Midi1ChannelVoice {
        group: u8,
        status: u8,
        data1: u8,
        data2: u8,
    },
    System {
        group: u8,
        message: SystemMessage,
    },
    Utility {
        group: u8,
        message: UtilityMessage,
    },
    FlexTempo {
        group: u8,
        channel: Option<u8>,
        bpm: f64,
    },
    FlexTimeSignature {
        group: u8,
        channel: Option<u8>,
        numerator: u8,
        denominator_pow2: u8,
    },
    FlexKeySignature {
        group: u8,
        channel: Option<u8>,
        key: String,
    },
    FlexLyric {
        group: u8,
        channel: Option<u8>,
        text: String,
    },
    SysEx7(SysExMessage),
    SysEx8(SysExMessage),
    MidiCi(MidiCiMessage),
    Profile(ProfileMessage),
    PropertyExchange(PropertyExchangeMessage),
    ProcessInquiry(ProcessInquiryMessage),
    Stream {
        group: u8,
        message: StreamMessage,
    },
    /// Structurally valid packet with an unrecognized opcode.
    Raw {
        words: Vec<u32>,
    },
}

impl Midi2Message {
    // ==================== Constructors ====================

    #[inline]
    pub fn note_on(group: u8, channel: u8, note: u8, velocity: u16) -> Self {
        Midi2Message::NoteOn {
            group,
            channel,
            note,
            velocity,
            attribute_type: 0,
            attribute_data: 0,
        }
    }

    #[inline]
    pub fn note_off(group: u8, channel: u8, note: u8, velocity: u16) -> Self {
        Midi2Message::NoteOff {
            group,
            channel,
            note,
            velocity,
            attribute_type: 0,
            attribute_data: 0,
        }
    }

    #[inline]
    pub fn control_change(group: u8, channel: u8, controller: u8, value: u32) -> Self {
        Midi2Message::ControlChange {
            group,
            channel,
            controller,
            value,
        }
    }

    #[inline]
    pub fn pitch_bend(group: u8, channel: u8, value: u32) -> Self {
        Midi2Message::PitchBend {
            group,
            channel,
            value,
        }
    }

    #[inline]
    pub fn jr_clock(group: u8, value: u16) -> Self {
        Midi2Message::Utility {
            group,
            message: UtilityMessage::JrClock(value),
        }
    }

    #[inline]
    pub fn jr_timestamp(group: u8, value: u16) -> Self {
        Midi2Message::Utility {
            group,
            message: UtilityMessage::JrTimestamp(value),
        }
    }

    // ==================== Accessors ====================

    /// UMP group, if the message is group-addressed.
    pub fn group(&self) -> Option<u8> {
        use Midi2Message::*;
        match self {
            NoteOn { group, .. }
            | NoteOff { group, .. }
            | PolyPressure { group, .. }
            | ControlChange { group, .. }
            | ProgramChange { group, .. }
            | ChannelPressure { group, .. }
            | PitchBend { group, .. }
            | Rpn { group, .. }
            | Nrpn { group, .. }
            | RpnRelative { group, .. }
            | NrpnRelative { group, .. }
            | PerNoteManagement { group, .. }
            | PerNoteRegisteredController { group, .. }
            | PerNoteAssignableController { group, .. }
            | PerNotePitchBend { group, .. }
            | Midi1ChannelVoice { group, .. }
            | System { group, .. }
            | Utility { group, .. }
            | FlexTempo { group, .. }
            | FlexTimeSignature { group, .. }
            | FlexKeySignature { group, .. }
            | FlexLyric { group, .. }
            | Stream { group, .. } => Some(*group),
            SysEx7(msg) | SysEx8(msg) => Some(msg.group),
            MidiCi(msg) => Some(msg.group),
            Profile(msg) => Some(msg.group),
            PropertyExchange(msg) => Some(msg.group),
            ProcessInquiry(msg) => Some(msg.group),
            Raw { words } => words.first().map(|w| ((w >> 24) & 0x0F) as u8),
        }
    }

    /// Channel, for channel-addressed messages.
    pub fn channel(&self) -> Option<u8> {
        use Midi2Message::*;
        match self {
            NoteOn { channel, .. }
            | NoteOff { channel, .. }
            | PolyPressure { channel, .. }
            | ControlChange { channel, .. }
            | ProgramChange { channel, .. }
            | ChannelPressure { channel, .. }
            | PitchBend { channel, .. }
            | Rpn { channel, .. }
            | Nrpn { channel, .. }
            | RpnRelative { channel, .. }
            | NrpnRelative { channel, .. }
            | PerNoteManagement { channel, .. }
            | PerNoteRegisteredController { channel, .. }
            | PerNoteAssignableController { channel, .. }
            | PerNotePitchBend { channel, .. } => Some(*channel),
            Midi1ChannelVoice { status, .. } => Some(status & 0x0F),
            FlexTempo { channel, .. }
            | FlexTimeSignature { channel, .. }
            | FlexKeySignature { channel, .. }
            | FlexLyric { channel, .. } => *channel,
            _ => None,
        }
    }

    /// JR Clock or JR Timestamp utility message.
    #[inline]
    pub fn is_jitter_reduction(&self) -> bool {
        matches!(
            self,
            Midi2Message::Utility {
                message: UtilityMessage::JrClock(_) | UtilityMessage::JrTimestamp(_),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_at_sets_timestamp() {
        let event = Midi2Event::new(Midi2Message::note_on(0, 1, 60, 0x8000)).at(12.5);
        assert_eq!(event.timestamp, Some(12.5));
        assert_eq!(event.group(), Some(0));
        assert_eq!(event.channel(), Some(1));
    }

    #[test]
    fn test_midi1_channel_from_status() {
        let msg = Midi2Message::Midi1ChannelVoice {
            group: 2,
            status: 0x93,
            data1: 60,
            data2: 100,
        };
        assert_eq!(msg.channel(), Some(3));
        assert_eq!(msg.group(), Some(2));
    }

    #[test]
    fn test_system_song_position_bytes() {
        let msg = SystemMessage::from_status(0xF2, 0x01, 0x02).unwrap();
        assert_eq!(msg, SystemMessage::SongPosition(0x101));
        assert_eq!(msg.data_bytes(), (Some(0x01), Some(0x02)));
        assert!(!msg.is_realtime());
        assert!(SystemMessage::TimingClock.is_realtime());
    }

    #[test]
    fn test_from_status_rejects_undefined() {
        assert!(SystemMessage::from_status(0xF4, 0, 0).is_none());
        assert!(SystemMessage::from_status(0xF9, 0, 0).is_none());
        assert!(SystemMessage::from_status(0xF0, 0, 0).is_none());
    }

    #[test]
    fn test_jitter_reduction_predicate() {
        assert!(Midi2Message::jr_clock(0, 1).is_jitter_reduction());
        assert!(Midi2Message::jr_timestamp(0, 1).is_jitter_reduction());
        let noop = Midi2Message::Utility {
            group: 0,
            message: UtilityMessage::Noop,
        };
        assert!(!noop.is_jitter_reduction());
    }

    #[test]
    fn test_raw_group_from_word0() {
        let msg = Midi2Message::Raw {
            words: vec![0x7A00_0000],
        };
        assert_eq!(msg.group(), Some(0x0A));
        assert_eq!(msg.channel(), None);
    }
}
