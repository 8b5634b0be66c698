//! One-word packets: utility (MT 0x0), system (MT 0x1) and MIDI 1.0 channel voice (MT 0x2).

use smallvec::smallvec;

use super::{fits, Decoded, Words, MT_MIDI1_CHANNEL_VOICE, MT_SYSTEM, MT_UTILITY};
use crate::error::{check, Result};
use crate::event::{Midi2Message, SystemMessage, UtilityMessage};

const UTILITY_NOOP: u8 = 0x0;
const UTILITY_JR_CLOCK: u8 = 0x1;
const UTILITY_JR_TIMESTAMP: u8 = 0x2;

#[inline]
fn byte_word(mt: u8, group: u8, b1: u8, b2: u8, b3: u8) -> u32 {
    (u32::from(mt) << 28)
        | (u32::from(group) << 24)
        | (u32::from(b1) << 16)
        | (u32::from(b2) << 8)
        | u32::from(b3)
}

pub(super) fn encode_utility(group: u8, message: &UtilityMessage) -> Result<Words> {
    check("group", group.into(), 0, 15)?;
    let (status, value) = match *message {
        UtilityMessage::Noop => (UTILITY_NOOP, 0),
        UtilityMessage::JrClock(v) => (UTILITY_JR_CLOCK, v),
        UtilityMessage::JrTimestamp(v) => (UTILITY_JR_TIMESTAMP, v),
    };
    let word = (u32::from(MT_UTILITY) << 28)
        | (u32::from(group) << 24)
        | (u32::from(status) << 20)
        | u32::from(value);
    Ok(smallvec![word])
}

pub(super) fn decode_utility(word0: u32) -> Option<Decoded> {
    // bits 16-19 are reserved
    if (word0 >> 16) & 0x0F != 0 {
        return None;
    }
    let group = ((word0 >> 24) & 0x0F) as u8;
    let value = (word0 & 0xFFFF) as u16;
    let message = match ((word0 >> 20) & 0x0F) as u8 {
        UTILITY_NOOP => UtilityMessage::Noop,
        UTILITY_JR_CLOCK => UtilityMessage::JrClock(value),
        UTILITY_JR_TIMESTAMP => UtilityMessage::JrTimestamp(value),
        _ => return Some(Decoded::Unknown),
    };
    Some(Midi2Message::Utility { group, message }.into())
}

pub(super) fn encode_system(group: u8, message: &SystemMessage) -> Result<Words> {
    check("group", group.into(), 0, 15)?;
    match *message {
        SystemMessage::TimeCode(v) => check("time_code", v.into(), 0, 127)?,
        SystemMessage::SongSelect(v) => check("song", v.into(), 0, 127)?,
        SystemMessage::SongPosition(v) => check("song_position", v.into(), 0, 0x3FFF)?,
        _ => {}
    }
    let (d1, d2) = message.data_bytes();
    Ok(smallvec![byte_word(
        MT_SYSTEM,
        group,
        message.status(),
        d1.unwrap_or(0),
        d2.unwrap_or(0),
    )])
}

pub(super) fn decode_system(word0: u32) -> Option<Decoded> {
    let group = ((word0 >> 24) & 0x0F) as u8;
    let status = ((word0 >> 16) & 0xFF) as u8;
    let d1 = ((word0 >> 8) & 0xFF) as u8;
    let d2 = (word0 & 0xFF) as u8;
    let Some(message) = SystemMessage::from_status(status, d1 & 0x7F, d2 & 0x7F) else {
        return Some(Decoded::Unknown);
    };
    let (uses_d1, uses_d2) = message.data_bytes();
    if (uses_d1.is_some() && !fits(d1, 7)) || (uses_d2.is_some() && !fits(d2, 7)) {
        return None;
    }
    Some(Midi2Message::System { group, message }.into())
}

/// Data bytes used by a MIDI 1.0 channel voice status (program change and channel pressure take one).
#[inline]
pub(crate) fn midi1_data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

pub(super) fn encode_midi1_voice(group: u8, status: u8, data1: u8, data2: u8) -> Result<Words> {
    check("group", group.into(), 0, 15)?;
    check("status", status.into(), 0x80, 0xEF)?;
    check("data1", data1.into(), 0, 127)?;
    let data2 = if midi1_data_len(status) == 2 {
        check("data2", data2.into(), 0, 127)?;
        data2
    } else {
        0
    };
    Ok(smallvec![byte_word(
        MT_MIDI1_CHANNEL_VOICE,
        group,
        status,
        data1,
        data2
    )])
}

pub(super) fn decode_midi1_voice(word0: u32) -> Option<Decoded> {
    let group = ((word0 >> 24) & 0x0F) as u8;
    let status = ((word0 >> 16) & 0xFF) as u8;
    let data1 = ((word0 >> 8) & 0xFF) as u8;
    let data2 = (word0 & 0xFF) as u8;
    if !(0x80..=0xEF).contains(&status) || !fits(data1, 7) || !fits(data2, 7) {
        return None;
    }
    Some(
        Midi2Message::Midi1ChannelVoice {
            group,
            status,
            data1,
            data2,
        }
        .into(),
    )
}
