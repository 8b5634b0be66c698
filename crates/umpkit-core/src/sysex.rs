//! SysEx7 / SysEx8 fragmentation into UMP data packets and reassembly back.
//!
//! A message is `manufacturer_id ++ payload`, split into chunks of at most
//! 6 bytes (SysEx7, 2-word packets, MT 0x3) or 14 bytes (SysEx8, 4-word
//! packets, MT 0x5). Byte 0 of each packet is `(mt << 4) | group`, byte 1 is
//! `(status << 4) | chunk_len`, the chunk follows and the rest is zero.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, Result, SequenceError};
use crate::ump::{message_type, Words, MT_SYSEX7, MT_SYSEX8};

/// Longest payload a single message may carry.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;
/// Longest packet sequence reassembly accepts.
pub const MAX_PACKETS: usize = 0xFFFF;

pub const STATUS_COMPLETE: u8 = 0x0;
pub const STATUS_START: u8 = 0x1;
pub const STATUS_CONTINUE: u8 = 0x2;
pub const STATUS_END: u8 = 0x3;

/// Exclusive message as callers see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysExMessage {
    pub manufacturer_id: Vec<u8>,
    pub payload: Vec<u8>,
    pub group: u8,
}

impl SysExMessage {
    pub fn new(manufacturer_id: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>, group: u8) -> Self {
        Self {
            manufacturer_id: manufacturer_id.into(),
            payload: payload.into(),
            group,
        }
    }

    /// `manufacturer_id ++ payload`, as framed between 0xF0 and 0xF7.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.manufacturer_id.len() + self.payload.len());
        body.extend_from_slice(&self.manufacturer_id);
        body.extend_from_slice(&self.payload);
        body
    }

    /// Split a framed body back into id and payload (0x00 prefix means a 3-byte id).
    pub fn from_body(body: &[u8], group: u8) -> Result<Self> {
        let id_len = match body.first() {
            None => return Err(Error::ManufacturerId(Vec::new())),
            Some(0x00) => 3,
            Some(_) => 1,
        };
        if body.len() < id_len {
            return Err(Error::ManufacturerId(body.to_vec()));
        }
        let (id, payload) = body.split_at(id_len);
        Ok(Self::new(id, payload, group))
    }
}

/// Which of the two data-packet families carries the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SysExFormat {
    SysEx7,
    SysEx8,
}

impl SysExFormat {
    pub fn message_type(self) -> u8 {
        match self {
            SysExFormat::SysEx7 => MT_SYSEX7,
            SysExFormat::SysEx8 => MT_SYSEX8,
        }
    }

    pub fn max_chunk(self) -> usize {
        match self {
            SysExFormat::SysEx7 => 6,
            SysExFormat::SysEx8 => 14,
        }
    }

    pub fn words_per_packet(self) -> usize {
        match self {
            SysExFormat::SysEx7 => 2,
            SysExFormat::SysEx8 => 4,
        }
    }

    pub fn from_message_type(mt: u8) -> Option<Self> {
        match mt {
            MT_SYSEX7 => Some(SysExFormat::SysEx7),
            MT_SYSEX8 => Some(SysExFormat::SysEx8),
            _ => None,
        }
    }
}

pub(crate) fn validate_manufacturer_id(id: &[u8]) -> Result<()> {
    let ok = match id {
        [b] => *b != 0x00,
        [0x00, _, _] => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::ManufacturerId(id.to_vec()))
    }
}

pub fn fragment_sysex7(manufacturer_id: &[u8], payload: &[u8], group: u8) -> Result<Vec<Words>> {
    fragment(SysExFormat::SysEx7, manufacturer_id, payload, group)
}

pub fn fragment_sysex8(manufacturer_id: &[u8], payload: &[u8], group: u8) -> Result<Vec<Words>> {
    fragment(SysExFormat::SysEx8, manufacturer_id, payload, group)
}

pub fn reassemble_sysex7<W: AsRef<[u32]>>(packets: &[W]) -> Result<SysExMessage> {
    reassemble(SysExFormat::SysEx7, packets)
}

pub fn reassemble_sysex8<W: AsRef<[u32]>>(packets: &[W]) -> Result<SysExMessage> {
    reassemble(SysExFormat::SysEx8, packets)
}

/// Fragment a message into packets of the given family.
pub fn fragment(
    format: SysExFormat,
    manufacturer_id: &[u8],
    payload: &[u8],
    group: u8,
) -> Result<Vec<Words>> {
    validate_manufacturer_id(manufacturer_id)?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLong(payload.len()));
    }
    crate::error::check("group", group.into(), 0, 15)?;
    if format == SysExFormat::SysEx7 {
        if let Some(&b) = manufacturer_id.iter().chain(payload).find(|&&b| b > 0x7F) {
            return Err(Error::range("sysex7 data byte", b.into(), 0, 0x7F));
        }
    }

    let mut message = Vec::with_capacity(manufacturer_id.len() + payload.len());
    message.extend_from_slice(manufacturer_id);
    message.extend_from_slice(payload);

    let max_chunk = format.max_chunk();
    let total = message.len().div_ceil(max_chunk);
    let mt = format.message_type();

    let packets = message
        .chunks(max_chunk)
        .enumerate()
        .map(|(idx, chunk)| {
            let status = if total == 1 {
                STATUS_COMPLETE
            } else if idx == 0 {
                STATUS_START
            } else if idx == total - 1 {
                STATUS_END
            } else {
                STATUS_CONTINUE
            };
            let mut bytes = [0u8; 16];
            bytes[0] = (mt << 4) | group;
            bytes[1] = (status << 4) | chunk.len() as u8;
            bytes[2..2 + chunk.len()].copy_from_slice(chunk);
            bytes_to_words(&bytes[..format.words_per_packet() * 4])
        })
        .collect();
    Ok(packets)
}

/// Reassemble a full packet sequence of one family.
pub fn reassemble<W: AsRef<[u32]>>(format: SysExFormat, packets: &[W]) -> Result<SysExMessage> {
    if packets.is_empty() {
        return Err(SequenceError::Empty.into());
    }
    if packets.len() > MAX_PACKETS {
        return Err(SequenceError::TooManyPackets(packets.len()).into());
    }

    let len = packets.len();
    let expected_mt = format.message_type();
    let max_chunk = format.max_chunk() as u8;
    let mut group = None;
    let mut collected = Vec::with_capacity(len * format.max_chunk());

    for (index, packet) in packets.iter().enumerate() {
        let words = packet.as_ref();
        if words.len() != format.words_per_packet() {
            return Err(SequenceError::PacketSize {
                index,
                len: words.len(),
                expected: format.words_per_packet(),
            }
            .into());
        }
        let bytes = words_to_bytes(words);

        let mt = message_type(words[0]);
        if mt != expected_mt {
            return Err(SequenceError::MessageType {
                index,
                found: mt,
                expected: expected_mt,
            }
            .into());
        }

        let packet_group = bytes[0] & 0x0F;
        let expected_group = *group.get_or_insert(packet_group);
        if packet_group != expected_group {
            return Err(SequenceError::MixedGroups {
                index,
                found: packet_group,
                expected: expected_group,
            }
            .into());
        }

        let status = bytes[1] >> 4;
        let count = bytes[1] & 0x0F;
        if count > max_chunk {
            return Err(SequenceError::ChunkTooLong {
                index,
                count,
                max: max_chunk,
            }
            .into());
        }

        match status {
            STATUS_COMPLETE if len != 1 => {
                return Err(SequenceError::CompleteNotAlone { index, len }.into())
            }
            STATUS_START if index != 0 => return Err(SequenceError::StartNotFirst(index).into()),
            STATUS_CONTINUE if index == 0 || index == len - 1 => {
                return Err(SequenceError::ContinueAtBoundary(index).into())
            }
            STATUS_END if index != len - 1 => {
                return Err(SequenceError::EndNotLast { index, len }.into())
            }
            STATUS_COMPLETE | STATUS_START | STATUS_CONTINUE | STATUS_END => {}
            _ => return Err(SequenceError::InvalidStatus { index, status }.into()),
        }

        collected.extend_from_slice(&bytes[2..2 + count as usize]);
    }

    if collected.is_empty() {
        return Err(SequenceError::NoData.into());
    }

    let message = SysExMessage::from_body(&collected, group.unwrap_or(0))?;
    validate_manufacturer_id(&message.manufacturer_id)?;
    Ok(message)
}

/// Status nibble of a data packet.
#[inline]
pub fn packet_status(word0: u32) -> u8 {
    ((word0 >> 20) & 0x0F) as u8
}

/// Big-endian byte view of packet words.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Pack big-endian bytes into words; the length must be a multiple of 4.
pub fn bytes_to_words(bytes: &[u8]) -> Words {
    let mut words: Words = SmallVec::new();
    for chunk in bytes.chunks_exact(4) {
        words.push(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    words
}

/// Checked variant of [`bytes_to_words`] for caller-supplied buffers.
pub fn try_bytes_to_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Malformed(format!(
            "UMP byte buffer of {} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes_to_words(bytes).into_vec())
}
