//! Structured packet projection.
//!
//! [`UmpPacket`] is a nested, serde-friendly view of a message grouped by UMP
//! message type, with a typed body per status. It is derived from the event
//! model rather than from the words: the message-type and channel-voice
//! status tags are the codec's own [`MessageType`] / [`ChannelVoiceStatus`]
//! tables, and [`from_structured`] validates every field by running the result
//! through the word encoder. The two representations cannot drift apart.

use serde::{Deserialize, Serialize};

use crate::ci::{self, CiScope, MidiCiMessage};
use crate::error::{Error, Result};
use crate::event::{BankSelect, Midi2Message, StreamMessage, SystemMessage, UtilityMessage};
use crate::stream::UmpStreamDecoder;
use crate::sysex::{SysExFormat, SysExMessage};
use crate::ump::{encode_packets, ChannelVoiceStatus, MessageType, Words};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum UmpPacket {
    Utility {
        group: u8,
        message: UtilityMessage,
    },
    System {
        group: u8,
        message: SystemMessage,
    },
    /// MIDI 1.0 channel voice; `opcode` is the status high nibble (0x8-0xE).
    Midi1ChannelVoice {
        group: u8,
        channel: u8,
        opcode: u8,
        data1: u8,
        data2: u8,
    },
    Data64 {
        group: u8,
        content: DataContent,
    },
    Midi2ChannelVoice {
        group: u8,
        channel: u8,
        body: ChannelVoiceBody,
    },
    Data128 {
        group: u8,
        content: DataContent,
    },
    FlexData {
        group: u8,
        channel: Option<u8>,
        body: FlexBody,
    },
    Stream {
        group: u8,
        message: StreamMessage,
    },
    Raw {
        words: Vec<u32>,
    },
}

/// Exclusive data carried by a Data64 (SysEx7) or Data128 (SysEx8) stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataContent {
    #[serde(rename_all = "camelCase")]
    SysEx {
        manufacturer_id: Vec<u8>,
        payload: Vec<u8>,
    },
    /// MIDI-CI envelope; `payload` excludes the 4-byte header.
    #[serde(rename_all = "camelCase")]
    MidiCi {
        scope: CiScope,
        sub_id2: u8,
        version: u8,
        payload: Vec<u8>,
    },
}

/// MIDI 2.0 channel voice body, tagged with the channel-voice status name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChannelVoiceBody {
    RegisteredPerNoteController {
        note: u8,
        controller: u8,
        value: u32,
    },
    AssignablePerNoteController {
        note: u8,
        controller: u8,
        value: u32,
    },
    RegisteredController {
        bank: u8,
        index: u8,
        value: u32,
    },
    AssignableController {
        bank: u8,
        index: u8,
        value: u32,
    },
    RelativeRegisteredController {
        bank: u8,
        index: u8,
        delta: i32,
    },
    RelativeAssignableController {
        bank: u8,
        index: u8,
        delta: i32,
    },
    PerNotePitchBend {
        note: u8,
        value: u32,
    },
    #[serde(rename_all = "camelCase")]
    NoteOff {
        note: u8,
        velocity: u16,
        attribute_type: u8,
        attribute_data: u16,
    },
    #[serde(rename_all = "camelCase")]
    NoteOn {
        note: u8,
        velocity: u16,
        attribute_type: u8,
        attribute_data: u16,
    },
    PolyPressure {
        note: u8,
        pressure: u32,
    },
    ControlChange {
        controller: u8,
        value: u32,
    },
    ProgramChange {
        program: u8,
        bank: Option<BankSelect>,
    },
    ChannelPressure {
        pressure: u32,
    },
    PitchBend {
        value: u32,
    },
    PerNoteManagement {
        note: u8,
        detach: bool,
        reset: bool,
    },
}

impl ChannelVoiceBody {
    pub fn status(&self) -> ChannelVoiceStatus {
        use ChannelVoiceBody as B;
        use ChannelVoiceStatus as S;
        match self {
            B::RegisteredPerNoteController { .. } => S::RegisteredPerNoteController,
            B::AssignablePerNoteController { .. } => S::AssignablePerNoteController,
            B::RegisteredController { .. } => S::RegisteredController,
            B::AssignableController { .. } => S::AssignableController,
            B::RelativeRegisteredController { .. } => S::RelativeRegisteredController,
            B::RelativeAssignableController { .. } => S::RelativeAssignableController,
            B::PerNotePitchBend { .. } => S::PerNotePitchBend,
            B::NoteOff { .. } => S::NoteOff,
            B::NoteOn { .. } => S::NoteOn,
            B::PolyPressure { .. } => S::PolyPressure,
            B::ControlChange { .. } => S::ControlChange,
            B::ProgramChange { .. } => S::ProgramChange,
            B::ChannelPressure { .. } => S::ChannelPressure,
            B::PitchBend { .. } => S::PitchBend,
            B::PerNoteManagement { .. } => S::PerNoteManagement,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FlexBody {
    Tempo {
        bpm: f64,
    },
    #[serde(rename_all = "camelCase")]
    TimeSignature {
        numerator: u8,
        denominator_pow2: u8,
    },
    KeySignature {
        key: String,
    },
    Lyric {
        text: String,
    },
}

impl UmpPacket {
    /// Message type of the packets this projection encodes to; `None` for raw words.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            UmpPacket::Utility { .. } => Some(MessageType::Utility),
            UmpPacket::System { .. } => Some(MessageType::System),
            UmpPacket::Midi1ChannelVoice { .. } => Some(MessageType::Midi1ChannelVoice),
            UmpPacket::Data64 { .. } => Some(MessageType::Data64),
            UmpPacket::Midi2ChannelVoice { .. } => Some(MessageType::Midi2ChannelVoice),
            UmpPacket::Data128 { .. } => Some(MessageType::Data128),
            UmpPacket::FlexData { .. } => Some(MessageType::FlexData),
            UmpPacket::Stream { .. } => Some(MessageType::Stream),
            UmpPacket::Raw { words } => words
                .first()
                .and_then(|w| MessageType::from_nibble(crate::ump::message_type(*w))),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ==================== Message -> structured ====================

fn voice(group: u8, channel: u8, body: ChannelVoiceBody) -> UmpPacket {
    UmpPacket::Midi2ChannelVoice {
        group,
        channel,
        body,
    }
}

fn flex(group: u8, channel: Option<u8>, body: FlexBody) -> UmpPacket {
    UmpPacket::FlexData {
        group,
        channel,
        body,
    }
}

fn data(format: SysExFormat, group: u8, content: DataContent) -> UmpPacket {
    match format {
        SysExFormat::SysEx7 => UmpPacket::Data64 { group, content },
        SysExFormat::SysEx8 => UmpPacket::Data128 { group, content },
    }
}

fn ci_packet(msg: MidiCiMessage) -> UmpPacket {
    data(
        msg.format,
        msg.group,
        DataContent::MidiCi {
            scope: msg.scope,
            sub_id2: msg.sub_id2,
            version: msg.version,
            payload: msg.payload,
        },
    )
}

fn sysex_packet(format: SysExFormat, msg: &SysExMessage) -> UmpPacket {
    data(
        format,
        msg.group,
        DataContent::SysEx {
            manufacturer_id: msg.manufacturer_id.clone(),
            payload: msg.payload.clone(),
        },
    )
}

/// Project a message into its structured form.
///
/// Fails only if a MIDI-CI sub-protocol body cannot be serialized.
pub fn to_structured(message: &Midi2Message) -> Result<UmpPacket> {
    use ChannelVoiceBody as B;
    use Midi2Message::*;

    Ok(match message.clone() {
        NoteOn {
            group,
            channel,
            note,
            velocity,
            attribute_type,
            attribute_data,
        } => voice(
            group,
            channel,
            B::NoteOn {
                note,
                velocity,
                attribute_type,
                attribute_data,
            },
        ),
        NoteOff {
            group,
            channel,
            note,
            velocity,
            attribute_type,
            attribute_data,
        } => voice(
            group,
            channel,
            B::NoteOff {
                note,
                velocity,
                attribute_type,
                attribute_data,
            },
        ),
        PolyPressure {
            group,
            channel,
            note,
            pressure,
        } => voice(group, channel, B::PolyPressure { note, pressure }),
        ControlChange {
            group,
            channel,
            controller,
            value,
        } => voice(group, channel, B::ControlChange { controller, value }),
        ProgramChange {
            group,
            channel,
            program,
            bank,
        } => voice(group, channel, B::ProgramChange { program, bank }),
        ChannelPressure {
            group,
            channel,
            pressure,
        } => voice(group, channel, B::ChannelPressure { pressure }),
        PitchBend {
            group,
            channel,
            value,
        } => voice(group, channel, B::PitchBend { value }),
        Rpn {
            group,
            channel,
            bank,
            index,
            value,
        } => voice(group, channel, B::RegisteredController { bank, index, value }),
        Nrpn {
            group,
            channel,
            bank,
            index,
            value,
        } => voice(group, channel, B::AssignableController { bank, index, value }),
        RpnRelative {
            group,
            channel,
            bank,
            index,
            delta,
        } => voice(
            group,
            channel,
            B::RelativeRegisteredController { bank, index, delta },
        ),
        NrpnRelative {
            group,
            channel,
            bank,
            index,
            delta,
        } => voice(
            group,
            channel,
            B::RelativeAssignableController { bank, index, delta },
        ),
        PerNoteManagement {
            group,
            channel,
            note,
            detach,
            reset,
        } => voice(group, channel, B::PerNoteManagement { note, detach, reset }),
        PerNoteRegisteredController {
            group,
            channel,
            note,
            controller,
            value,
        } => voice(
            group,
            channel,
            B::RegisteredPerNoteController {
                note,
                controller,
                value,
            },
        ),
        PerNoteAssignableController {
            group,
            channel,
            note,
            controller,
            value,
        } => voice(
            group,
            channel,
            B::AssignablePerNoteController {
                note,
                controller,
                value,
            },
        ),
        PerNotePitchBend {
            group,
            channel,
            note,
            value,
        } => voice(group, channel, B::PerNotePitchBend { note, value }),
        Midi1ChannelVoice {
            group,
            status,
            data1,
            data2,
        } => UmpPacket::Midi1ChannelVoice {
            group,
            channel: status & 0x0F,
            opcode: status >> 4,
            data1,
            data2,
        },
        System { group, message } => UmpPacket::System { group, message },
        Utility { group, message } => UmpPacket::Utility { group, message },
        FlexTempo {
            group,
            channel,
            bpm,
        } => flex(group, channel, FlexBody::Tempo { bpm }),
        FlexTimeSignature {
            group,
            channel,
            numerator,
            denominator_pow2,
        } => flex(
            group,
            channel,
            FlexBody::TimeSignature {
                numerator,
                denominator_pow2,
            },
        ),
        FlexKeySignature {
            group,
            channel,
            key,
        } => flex(group, channel, FlexBody::KeySignature { key }),
        FlexLyric {
            group,
            channel,
            text,
        } => flex(group, channel, FlexBody::Lyric { text }),
        SysEx7(msg) => sysex_packet(SysExFormat::SysEx7, &msg),
        SysEx8(msg) => sysex_packet(SysExFormat::SysEx8, &msg),
        MidiCi(msg) => ci_packet(msg),
        Profile(msg) => ci_packet(msg.to_envelope()?),
        PropertyExchange(msg) => ci_packet(msg.to_envelope()?),
        ProcessInquiry(msg) => ci_packet(msg.to_envelope()?),
        Stream { group, message } => UmpPacket::Stream { group, message },
        Raw { words } => UmpPacket::Raw { words },
    })
}

// ==================== Structured -> message ====================

fn from_voice(group: u8, channel: u8, body: ChannelVoiceBody) -> Midi2Message {
    use ChannelVoiceBody as B;
    match body {
        B::NoteOn {
            note,
            velocity,
            attribute_type,
            attribute_data,
        } => Midi2Message::NoteOn {
            group,
            channel,
            note,
            velocity,
            attribute_type,
            attribute_data,
        },
        B::NoteOff {
            note,
            velocity,
            attribute_type,
            attribute_data,
        } => Midi2Message::NoteOff {
            group,
            channel,
            note,
            velocity,
            attribute_type,
            attribute_data,
        },
        B::PolyPressure { note, pressure } => Midi2Message::PolyPressure {
            group,
            channel,
            note,
            pressure,
        },
        B::ControlChange { controller, value } => Midi2Message::ControlChange {
            group,
            channel,
            controller,
            value,
        },
        B::ProgramChange { program, bank } => Midi2Message::ProgramChange {
            group,
            channel,
            program,
            bank,
        },
        B::ChannelPressure { pressure } => Midi2Message::ChannelPressure {
            group,
            channel,
            pressure,
        },
        B::PitchBend { value } => Midi2Message::PitchBend {
            group,
            channel,
            value,
        },
        B::RegisteredController { bank, index, value } => Midi2Message::Rpn {
            group,
            channel,
            bank,
            index,
            value,
        },
        B::AssignableController { bank, index, value } => Midi2Message::Nrpn {
            group,
            channel,
            bank,
            index,
            value,
        },
        B::RelativeRegisteredController { bank, index, delta } => Midi2Message::RpnRelative {
            group,
            channel,
            bank,
            index,
            delta,
        },
        B::RelativeAssignableController { bank, index, delta } => Midi2Message::NrpnRelative {
            group,
            channel,
            bank,
            index,
            delta,
        },
        B::PerNoteManagement {
            note,
            detach,
            reset,
        } => Midi2Message::PerNoteManagement {
            group,
            channel,
            note,
            detach,
            reset,
        },
        B::RegisteredPerNoteController {
            note,
            controller,
            value,
        } => Midi2Message::PerNoteRegisteredController {
            group,
            channel,
            note,
            controller,
            value,
        },
        B::AssignablePerNoteController {
            note,
            controller,
            value,
        } => Midi2Message::PerNoteAssignableController {
            group,
            channel,
            note,
            controller,
            value,
        },
        B::PerNotePitchBend { note, value } => Midi2Message::PerNotePitchBend {
            group,
            channel,
            note,
            value,
        },
    }
}

fn from_flex(group: u8, channel: Option<u8>, body: FlexBody) -> Midi2Message {
    match body {
        FlexBody::Tempo { bpm } => Midi2Message::FlexTempo {
            group,
            channel,
            bpm,
        },
        FlexBody::TimeSignature {
            numerator,
            denominator_pow2,
        } => Midi2Message::FlexTimeSignature {
            group,
            channel,
            numerator,
            denominator_pow2,
        },
        FlexBody::KeySignature { key } => Midi2Message::FlexKeySignature {
            group,
            channel,
            key,
        },
        FlexBody::Lyric { text } => Midi2Message::FlexLyric {
            group,
            channel,
            text,
        },
    }
}

fn from_data(format: SysExFormat, group: u8, content: DataContent) -> Midi2Message {
    match content {
        DataContent::SysEx {
            manufacturer_id,
            payload,
        } => {
            let msg = SysExMessage::new(manufacturer_id, payload, group);
            match format {
                SysExFormat::SysEx7 => Midi2Message::SysEx7(msg),
                SysExFormat::SysEx8 => Midi2Message::SysEx8(msg),
            }
        }
        DataContent::MidiCi {
            scope,
            sub_id2,
            version,
            payload,
        } => ci::route_ci(MidiCiMessage {
            group,
            scope,
            sub_id2,
            version,
            payload,
            format,
        }),
    }
}

/// Rebuild the message a structured packet describes.
///
/// The result is validated against the wire encoder, so out-of-range fields
/// fail here exactly as they would in [`crate::ump::encode`].
pub fn from_structured(packet: &UmpPacket) -> Result<Midi2Message> {
    let message = match packet.clone() {
        UmpPacket::Utility { group, message } => Midi2Message::Utility { group, message },
        UmpPacket::System { group, message } => Midi2Message::System { group, message },
        UmpPacket::Midi1ChannelVoice {
            group,
            channel,
            opcode,
            data1,
            data2,
        } => {
            if !(0x8..=0xE).contains(&opcode) {
                return Err(Error::range("opcode", opcode.into(), 0x8, 0xE));
            }
            if channel > 0x0F {
                return Err(Error::range("channel", channel.into(), 0, 15));
            }
            Midi2Message::Midi1ChannelVoice {
                group,
                status: (opcode << 4) | channel,
                data1,
                data2,
            }
        }
        UmpPacket::Data64 { group, content } => from_data(SysExFormat::SysEx7, group, content),
        UmpPacket::Data128 { group, content } => from_data(SysExFormat::SysEx8, group, content),
        UmpPacket::Midi2ChannelVoice {
            group,
            channel,
            body,
        } => from_voice(group, channel, body),
        UmpPacket::FlexData {
            group,
            channel,
            body,
        } => from_flex(group, channel, body),
        UmpPacket::Stream { group, message } => Midi2Message::Stream { group, message },
        UmpPacket::Raw { words } => Midi2Message::Raw { words },
    };
    encode_packets(&message)?;
    Ok(message)
}

/// Decode a word stream and project every resulting message.
pub fn decode_words_to_structured(words: &[u32]) -> Result<Vec<UmpPacket>> {
    let mut decoder = UmpStreamDecoder::new();
    let events = decoder.push(words)?;
    if decoder.has_pending() {
        return Err(Error::Malformed(
            "word stream ends inside a packet or SysEx sequence".to_string(),
        ));
    }
    events.iter().map(|e| to_structured(&e.message)).collect()
}

/// Encode a structured packet straight to words.
pub fn structured_to_packets(packet: &UmpPacket) -> Result<Vec<Words>> {
    encode_packets(&from_structured(packet)?)
}
