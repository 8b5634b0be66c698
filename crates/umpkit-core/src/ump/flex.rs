//! Flex data (MT 0xD, 4 words): tempo, time signature, key signature, lyric.

use super::{Decoded, Words, MT_FLEX_DATA};
use crate::error::{check, Error, Result};
use crate::event::Midi2Message;

const CLASS_SETUP: u8 = 0x10;
const CLASS_TEXT: u8 = 0x11;
const STATUS_TEMPO: u8 = 0x01;
const STATUS_TIME_SIGNATURE: u8 = 0x02;
const STATUS_KEY_SIGNATURE: u8 = 0x04;
const STATUS_LYRIC: u8 = 0x02;

const ADDRESS_CHANNEL: u8 = 0x10;
const TEMPO_SCALE: f64 = 65536.0;
const TEXT_LEN: usize = 12;

fn address_byte(channel: Option<u8>) -> Result<u8> {
    match channel {
        Some(ch) => {
            check("channel", ch.into(), 0, 15)?;
            Ok(ADDRESS_CHANNEL | ch)
        }
        None => Ok(0),
    }
}

fn header(group: u8, class: u8, status: u8, channel: Option<u8>) -> Result<u32> {
    check("group", group.into(), 0, 15)?;
    Ok((u32::from(MT_FLEX_DATA) << 28)
        | (u32::from(group) << 24)
        | (u32::from(class) << 16)
        | (u32::from(status) << 8)
        | u32::from(address_byte(channel)?))
}

fn pack_text(field: &'static str, text: &str) -> Result<[u32; 3]> {
    let bytes = text.as_bytes();
    if bytes.len() > TEXT_LEN {
        return Err(Error::range(field, bytes.len() as i64, 0, TEXT_LEN as i64));
    }
    if bytes.contains(&0) {
        return Err(Error::InvalidText {
            field,
            reason: "contains NUL",
        });
    }
    let mut padded = [0u8; TEXT_LEN];
    padded[..bytes.len()].copy_from_slice(bytes);
    let word = |i: usize| u32::from_be_bytes([padded[i], padded[i + 1], padded[i + 2], padded[i + 3]]);
    Ok([word(0), word(4), word(8)])
}

fn unpack_text(words: &[u32]) -> Option<String> {
    let bytes: Vec<u8> = words[1..4]
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .take_while(|&b| b != 0)
        .collect();
    String::from_utf8(bytes).ok()
}

pub(super) fn encode(message: &Midi2Message) -> Result<Words> {
    let words: [u32; 4] = match message {
        Midi2Message::FlexTempo {
            group,
            channel,
            bpm,
        } => {
            if !bpm.is_finite() || *bpm < 1.0 || *bpm >= TEMPO_SCALE {
                return Err(Error::range("bpm", *bpm as i64, 1, 65535));
            }
            let fixed = (bpm * TEMPO_SCALE).round().min(f64::from(u32::MAX)) as u32;
            [
                header(*group, CLASS_SETUP, STATUS_TEMPO, *channel)?,
                fixed,
                0,
                0,
            ]
        }
        Midi2Message::FlexTimeSignature {
            group,
            channel,
            numerator,
            denominator_pow2,
        } => {
            check("numerator", (*numerator).into(), 1, 255)?;
            check("denominator_pow2", (*denominator_pow2).into(), 0, 31)?;
            [
                header(*group, CLASS_SETUP, STATUS_TIME_SIGNATURE, *channel)?,
                (u32::from(*numerator) << 24) | (u32::from(*denominator_pow2) << 16),
                0,
                0,
            ]
        }
        Midi2Message::FlexKeySignature {
            group,
            channel,
            key,
        } => {
            let [w1, w2, w3] = pack_text("key", key)?;
            [
                header(*group, CLASS_SETUP, STATUS_KEY_SIGNATURE, *channel)?,
                w1,
                w2,
                w3,
            ]
        }
        Midi2Message::FlexLyric {
            group,
            channel,
            text,
        } => {
            let [w1, w2, w3] = pack_text("text", text)?;
            [
                header(*group, CLASS_TEXT, STATUS_LYRIC, *channel)?,
                w1,
                w2,
                w3,
            ]
        }
        _ => return Err(Error::Unsupported("not a flex data message")),
    };
    Ok(Words::from_slice(&words))
}

pub(super) fn decode(words: &[u32]) -> Option<Decoded> {
    let w0 = words[0];
    let group = ((w0 >> 24) & 0x0F) as u8;
    let class = ((w0 >> 16) & 0xFF) as u8;
    let status = ((w0 >> 8) & 0xFF) as u8;
    let address = (w0 & 0xFF) as u8;

    if address & !(ADDRESS_CHANNEL | 0x0F) != 0 {
        return None;
    }
    let channel = (address & ADDRESS_CHANNEL != 0).then_some(address & 0x0F);
    if channel.is_none() && address != 0 {
        return None;
    }

    let message = match (class, status) {
        (CLASS_SETUP, STATUS_TEMPO) => {
            if words[1] < TEMPO_SCALE as u32 {
                return None;
            }
            Midi2Message::FlexTempo {
                group,
                channel,
                bpm: f64::from(words[1]) / TEMPO_SCALE,
            }
        }
        (CLASS_SETUP, STATUS_TIME_SIGNATURE) => {
            let numerator = (words[1] >> 24) as u8;
            let denominator_pow2 = ((words[1] >> 16) & 0xFF) as u8;
            if numerator == 0 || denominator_pow2 > 31 {
                return None;
            }
            Midi2Message::FlexTimeSignature {
                group,
                channel,
                numerator,
                denominator_pow2,
            }
        }
        (CLASS_SETUP, STATUS_KEY_SIGNATURE) => Midi2Message::FlexKeySignature {
            group,
            channel,
            key: unpack_text(words)?,
        },
        (CLASS_TEXT, STATUS_LYRIC) => Midi2Message::FlexLyric {
            group,
            channel,
            text: unpack_text(words)?,
        },
        _ => return Some(Decoded::Unknown),
    };
    Some(message.into())
}
