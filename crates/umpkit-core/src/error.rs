//! Error types for the UMP codec.

use thiserror::Error;

/// Why a SysEx packet sequence could not be reassembled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("packet sequence is empty")]
    Empty,

    #[error("sequence has {0} packets (max 65535)")]
    TooManyPackets(usize),

    #[error("packet {index} has {len} words, expected {expected}")]
    PacketSize {
        index: usize,
        len: usize,
        expected: usize,
    },

    #[error("packet {index} has message type {found:#x}, expected {expected:#x}")]
    MessageType { index: usize, found: u8, expected: u8 },

    #[error("packet {index} is on group {found}, sequence started on group {expected}")]
    MixedGroups { index: usize, found: u8, expected: u8 },

    #[error("packet {index} declares {count} bytes (max {max})")]
    ChunkTooLong { index: usize, count: u8, max: u8 },

    #[error("complete packet at index {index} in a sequence of {len}")]
    CompleteNotAlone { index: usize, len: usize },

    #[error("start packet at index {0}")]
    StartNotFirst(usize),

    #[error("continue packet at boundary index {0}")]
    ContinueAtBoundary(usize),

    #[error("end packet at index {index} in a sequence of {len}")]
    EndNotLast { index: usize, len: usize },

    #[error("packet {index} has invalid status {status:#x}")]
    InvalidStatus { index: usize, status: u8 },

    #[error("sequence carries no bytes")]
    NoData,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{field} = {value} out of range ({min}..={max})")]
    FieldRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid text for {field}: {reason}")]
    InvalidText {
        field: &'static str,
        reason: &'static str,
    },

    #[error("manufacturer id must be 1 byte (non-zero) or 3 bytes starting with 0x00, got {0:02X?}")]
    ManufacturerId(Vec<u8>),

    #[error("SysEx payload is {0} bytes (max 65535)")]
    PayloadTooLong(usize),

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("SysEx sequencing: {0}")]
    Sequencing(#[from] SequenceError),

    #[error("MIDI 1.0 byte stream: {0}")]
    Midi1(String),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn range(field: &'static str, value: i64, min: i64, max: i64) -> Self {
        Error::FieldRange {
            field,
            value,
            min,
            max,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Range-check an integer field, naming it in the error.
pub(crate) fn check(field: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(Error::range(field, value, min, max));
    }
    Ok(())
}
