//! MIDI-CI envelope over SysEx, and routing to the sub-protocol bodies.
//!
//! The envelope is a SysEx message whose manufacturer id is the scope byte
//! (0x7E non-realtime, 0x7F realtime) and whose payload starts with the
//! 4-byte header `[scope, 0x0D, sub_id2, version]`.

mod process_inquiry;
mod profile;
mod property_exchange;

pub use process_inquiry::{ProcessInquiryCommand, ProcessInquiryMessage};
pub use profile::{ProfileCommand, ProfileMessage, ProfileTarget};
pub use property_exchange::{
    reassemble_pe_chunks, PeAck, PeCommand, PeData, PeEncoding, PropertyExchangeMessage,
};

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use tracing::trace;

use crate::error::{Error, Result};
use crate::event::Midi2Message;
use crate::sysex::{self, SysExFormat, SysExMessage};
use crate::ump::Words;

pub const SUB_ID1: u8 = 0x0D;
pub const SUB_ID2_PROFILE: u8 = 0x20;
pub const SUB_ID2_PROPERTY_EXCHANGE: u8 = 0x21;
pub const SUB_ID2_PROCESS_INQUIRY: u8 = 0x22;
pub const CI_VERSION: u8 = 0x01;
pub const HEADER_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CiScope {
    NonRealtime,
    Realtime,
}

impl CiScope {
    pub fn byte(self) -> u8 {
        match self {
            CiScope::NonRealtime => 0x7E,
            CiScope::Realtime => 0x7F,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x7E => Some(CiScope::NonRealtime),
            0x7F => Some(CiScope::Realtime),
            _ => None,
        }
    }
}

/// Generic MIDI-CI message; `payload` excludes the 4-byte header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiCiMessage {
    pub group: u8,
    pub scope: CiScope,
    pub sub_id2: u8,
    pub version: u8,
    pub payload: Vec<u8>,
    pub format: SysExFormat,
}

impl MidiCiMessage {
    /// The SysEx message that carries this envelope.
    pub fn to_sysex(&self) -> SysExMessage {
        let scope = self.scope.byte();
        let mut payload = Vec::with_capacity(HEADER_LEN + self.payload.len());
        payload.extend_from_slice(&[scope, SUB_ID1, self.sub_id2, self.version]);
        payload.extend_from_slice(&self.payload);
        SysExMessage::new([scope], payload, self.group)
    }
}

/// Wrap and fragment a MIDI-CI message.
pub fn encode_ci(message: &MidiCiMessage) -> Result<Vec<Words>> {
    let sysex = message.to_sysex();
    if sysex.payload.len() > sysex::MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLong(sysex.payload.len()));
    }
    sysex::fragment(
        message.format,
        &sysex.manufacturer_id,
        &sysex.payload,
        message.group,
    )
}

/// Strip and validate the envelope header of a reassembled SysEx message.
pub fn decode_ci(message: &SysExMessage, format: SysExFormat) -> Option<MidiCiMessage> {
    let [id] = message.manufacturer_id.as_slice() else {
        return None;
    };
    let scope = CiScope::from_byte(*id)?;
    let header = message.payload.get(..HEADER_LEN)?;
    if header[0] != *id || header[1] != SUB_ID1 {
        return None;
    }
    Some(MidiCiMessage {
        group: message.group,
        scope,
        sub_id2: header[2],
        version: header[3],
        payload: message.payload[HEADER_LEN..].to_vec(),
        format,
    })
}

/// Route an envelope to its sub-protocol decoder keyed by sub-ID2.
///
/// Unknown sub-IDs stay generic. Malformed bodies decode to the
/// sub-protocol's fallback message instead of failing.
pub fn route_ci(message: MidiCiMessage) -> Midi2Message {
    match message.sub_id2 {
        SUB_ID2_PROFILE => {
            Midi2Message::Profile(ProfileMessage::from_body(message.group, &message.payload))
        }
        SUB_ID2_PROPERTY_EXCHANGE => Midi2Message::PropertyExchange(
            PropertyExchangeMessage::from_body(message.group, &message.payload),
        ),
        SUB_ID2_PROCESS_INQUIRY => Midi2Message::ProcessInquiry(
            ProcessInquiryMessage::from_body(message.group, &message.payload),
        ),
        _ => Midi2Message::MidiCi(message),
    }
}

/// Turn a reassembled SysEx message into the most specific message it carries.
pub fn classify(message: SysExMessage, format: SysExFormat) -> Midi2Message {
    match decode_ci(&message, format) {
        Some(ci) => {
            trace!("MIDI-CI sub-ID2 {:#04x} on group {}", ci.sub_id2, ci.group);
            route_ci(ci)
        }
        None => match format {
            SysExFormat::SysEx7 => Midi2Message::SysEx7(message),
            SysExFormat::SysEx8 => Midi2Message::SysEx8(message),
        },
    }
}

/// JSON formatter that escapes every non-ASCII character as `\uXXXX`.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serialize a sub-protocol body as 7-bit clean JSON.
pub(crate) fn to_ascii_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Sub-protocol bodies are JSON documents wrapped in a non-realtime SysEx7 envelope.
pub(crate) fn envelope(group: u8, sub_id2: u8, body: Vec<u8>) -> MidiCiMessage {
    MidiCiMessage {
        group,
        scope: CiScope::NonRealtime,
        sub_id2,
        version: CI_VERSION,
        payload: body,
        format: SysExFormat::SysEx7,
    }
}
