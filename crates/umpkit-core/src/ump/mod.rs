//! Word codec: `Midi2Message` <-> UMP packet words.
//!
//! Single-packet messages go through [`encode`] / [`decode`]. Exclusive data
//! (SysEx7, SysEx8, MIDI-CI) spans several packets and goes through
//! [`encode_packets`] on the way out and [`crate::UmpStreamDecoder`]
//! or the [`crate::sysex`] reassembly functions on the way in.

mod channel_voice;
mod flex;
mod status;
mod stream;
mod system;

pub use status::{ChannelVoiceStatus, MessageType};

use smallvec::SmallVec;
use tracing::trace;

use crate::ci;
use crate::error::{Error, Result};
use crate::event::{Midi2Event, Midi2Message};
use crate::sysex::{self, SysExFormat, STATUS_COMPLETE};

/// Words of one packet (1, 2, 3 or 4).
pub type Words = SmallVec<[u32; 4]>;

pub const MT_UTILITY: u8 = 0x0;
pub const MT_SYSTEM: u8 = 0x1;
pub const MT_MIDI1_CHANNEL_VOICE: u8 = 0x2;
pub const MT_SYSEX7: u8 = 0x3;
pub const MT_MIDI2_CHANNEL_VOICE: u8 = 0x4;
pub const MT_SYSEX8: u8 = 0x5;
pub const MT_FLEX_DATA: u8 = 0xD;
pub const MT_STREAM: u8 = 0xF;

/// Message type nibble (bits 28-31).
#[inline]
pub fn message_type(word0: u32) -> u8 {
    (word0 >> 28) as u8
}

/// Group nibble (bits 24-27).
#[inline]
pub fn group_of(word0: u32) -> u8 {
    ((word0 >> 24) & 0x0F) as u8
}

/// Number of words in the packet that starts with `word0`.
#[inline]
pub fn packet_len(word0: u32) -> usize {
    match message_type(word0) {
        0x0 | 0x1 | 0x2 | 0x6 | 0x7 => 1,
        0x3 | 0x4 | 0x8 | 0x9 | 0xA => 2,
        0xB | 0xC => 3,
        _ => 4,
    }
}

/// Encode a single-packet message.
pub fn encode(message: &Midi2Message) -> Result<Words> {
    use Midi2Message::*;
    match message {
        NoteOn { .. }
        | NoteOff { .. }
        | PolyPressure { .. }
        | ControlChange { .. }
        | ProgramChange { .. }
        | ChannelPressure { .. }
        | PitchBend { .. }
        | Rpn { .. }
        | Nrpn { .. }
        | RpnRelative { .. }
        | NrpnRelative { .. }
        | PerNoteManagement { .. }
        | PerNoteRegisteredController { .. }
        | PerNoteAssignableController { .. }
        | PerNotePitchBend { .. } => channel_voice::encode(message),
        Midi1ChannelVoice {
            group,
            status,
            data1,
            data2,
        } => system::encode_midi1_voice(*group, *status, *data1, *data2),
        System { group, message } => system::encode_system(*group, message),
        Utility { group, message } => system::encode_utility(*group, message),
        FlexTempo { .. } | FlexTimeSignature { .. } | FlexKeySignature { .. } | FlexLyric { .. } => {
            flex::encode(message)
        }
        Stream { group, message } => stream::encode(*group, message),
        Raw { words } => encode_raw(words),
        SysEx7(_) | SysEx8(_) | MidiCi(_) | Profile(_) | PropertyExchange(_)
        | ProcessInquiry(_) => Err(Error::Unsupported(
            "exclusive data spans several packets; use encode_packets",
        )),
    }
}

/// Encode any message into one or more packets.
pub fn encode_packets(message: &Midi2Message) -> Result<Vec<Words>> {
    match message {
        Midi2Message::SysEx7(msg) => {
            sysex::fragment_sysex7(&msg.manufacturer_id, &msg.payload, msg.group)
        }
        Midi2Message::SysEx8(msg) => {
            sysex::fragment_sysex8(&msg.manufacturer_id, &msg.payload, msg.group)
        }
        Midi2Message::MidiCi(msg) => ci::encode_ci(msg),
        Midi2Message::Profile(msg) => ci::encode_ci(&msg.to_envelope()?),
        Midi2Message::PropertyExchange(msg) => ci::encode_ci(&msg.to_envelope()?),
        Midi2Message::ProcessInquiry(msg) => ci::encode_ci(&msg.to_envelope()?),
        other => Ok(vec![encode(other)?]),
    }
}

fn encode_raw(words: &[u32]) -> Result<Words> {
    let Some(&word0) = words.first() else {
        return Err(Error::Malformed("raw packet has no words".to_string()));
    };
    if words.len() != packet_len(word0) {
        return Err(Error::Malformed(format!(
            "raw packet of MT {:#x} has {} words, expected {}",
            message_type(word0),
            words.len(),
            packet_len(word0)
        )));
    }
    Ok(Words::from_slice(words))
}

/// Decode exactly one packet.
///
/// Returns `None` for structurally invalid input. Unknown-but-valid packets
/// come back as [`Midi2Message::Raw`].
pub fn decode(words: &[u32], timestamp: Option<f64>) -> Option<Midi2Event> {
    let message = decode_message(words)?;
    Some(Midi2Event { timestamp, message })
}

pub fn decode_message(words: &[u32]) -> Option<Midi2Message> {
    let word0 = *words.first()?;
    if words.len() != packet_len(word0) {
        return None;
    }
    let mt = message_type(word0);
    let decoded = match mt {
        MT_UTILITY => system::decode_utility(word0),
        MT_SYSTEM => system::decode_system(word0),
        MT_MIDI1_CHANNEL_VOICE => system::decode_midi1_voice(word0),
        MT_MIDI2_CHANNEL_VOICE => channel_voice::decode(words[0], words[1]),
        MT_SYSEX7 | MT_SYSEX8 => decode_single_sysex(words),
        MT_FLEX_DATA => flex::decode(words),
        MT_STREAM => stream::decode(words),
        _ => Some(Decoded::Unknown),
    };
    match decoded? {
        Decoded::Message(message) => Some(message),
        Decoded::Unknown => {
            trace!("raw fallback for MT {:#x} packet {:08X?}", mt, words);
            Some(Midi2Message::Raw {
                words: words.to_vec(),
            })
        }
    }
}

/// Outcome of a per-family decoder for a structurally valid packet.
pub(crate) enum Decoded {
    Message(Midi2Message),
    Unknown,
}

impl From<Midi2Message> for Decoded {
    fn from(message: Midi2Message) -> Self {
        Decoded::Message(message)
    }
}

fn decode_single_sysex(words: &[u32]) -> Option<Decoded> {
    let format = SysExFormat::from_message_type(message_type(words[0]))?;
    if sysex::packet_status(words[0]) != STATUS_COMPLETE {
        return Some(Decoded::Unknown);
    }
    let msg = sysex::reassemble(format, &[words]).ok()?;
    Some(ci::classify(msg, format).into())
}

#[inline]
pub(crate) fn fits(value: u8, bits: u32) -> bool {
    u32::from(value) >> bits == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{SystemMessage, UtilityMessage};
    use crate::sysex::SysExMessage;

    #[test]
    fn test_packet_len_table() {
        let cases = [
            (0x0, 1),
            (0x1, 1),
            (0x2, 1),
            (0x3, 2),
            (0x4, 2),
            (0x5, 4),
            (0x6, 1),
            (0x7, 1),
            (0x8, 2),
            (0x9, 2),
            (0xA, 2),
            (0xB, 3),
            (0xC, 3),
            (0xD, 4),
            (0xE, 4),
            (0xF, 4),
        ];
        for (mt, len) in cases {
            assert_eq!(packet_len((mt as u32) << 28), len, "MT {mt:#x}");
        }
    }

    #[test]
    fn test_note_on_example() {
        let msg = Midi2Message::note_on(0, 1, 60, 0x8000);
        let words = encode(&msg).unwrap();
        assert_eq!(words.as_slice(), &[0x4091_3C00, 0x8000_0000]);
        let event = decode(&words, Some(5.0)).unwrap();
        assert_eq!(event.message, msg);
        assert_eq!(event.timestamp, Some(5.0));
    }

    #[test]
    fn test_decode_rejects_wrong_word_count() {
        assert!(decode(&[], None).is_none());
        assert!(decode(&[0x4091_3C00], None).is_none());
        assert!(decode(&[0x1000_F800, 0], None).is_none());
    }

    #[test]
    fn test_reserved_mt_is_raw() {
        let words = [0x6000_0001];
        let event = decode(&words, None).unwrap();
        assert_eq!(
            event.message,
            Midi2Message::Raw {
                words: words.to_vec()
            }
        );
        let three = [0xB000_0000, 1, 2];
        assert!(matches!(
            decode(&three, None).unwrap().message,
            Midi2Message::Raw { .. }
        ));
    }

    #[test]
    fn test_raw_encode_round_trip() {
        let msg = Midi2Message::Raw {
            words: vec![0x8000_0000, 0x1234],
        };
        assert_eq!(encode(&msg).unwrap().as_slice(), &[0x8000_0000, 0x1234]);
        let bad = Midi2Message::Raw {
            words: vec![0x8000_0000],
        };
        assert!(matches!(encode(&bad), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_encode_rejects_sysex() {
        let msg = Midi2Message::SysEx7(SysExMessage::new([0x43], [1, 2], 0));
        assert!(matches!(encode(&msg), Err(Error::Unsupported(_))));
        let packets = encode_packets(&msg).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(decode(&packets[0], None).unwrap().message, msg);
    }

    #[test]
    fn test_partial_sysex_packet_is_raw() {
        let packets = sysex::fragment_sysex7(&[0x43], &[0; 20], 0).unwrap();
        let event = decode(&packets[0], None).unwrap();
        assert!(matches!(event.message, Midi2Message::Raw { .. }));
    }

    #[test]
    fn test_encode_packets_single() {
        let msg = Midi2Message::System {
            group: 2,
            message: SystemMessage::Start,
        };
        let packets = encode_packets(&msg).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_slice(), &[0x12FA_0000]);

        let utility = Midi2Message::Utility {
            group: 0,
            message: UtilityMessage::Noop,
        };
        assert_eq!(encode_packets(&utility).unwrap()[0].as_slice(), &[0]);
    }
}
