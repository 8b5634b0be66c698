//! Universal MIDI Packet codec.
//!
//! Encodes and decodes MIDI 2.0 UMP words, fragments and reassembles SysEx7 /
//! SysEx8, wraps MIDI-CI (profiles, property exchange, process inquiry),
//! bridges to MIDI 1.0 byte streams, and projects messages into a structured
//! serde form.
//!
//! Everything here is pure: no clocks, threads or I/O.

pub mod error;
pub use error::{Error, Result, SequenceError};

pub mod event;
pub use event::{
    BankSelect, Midi2Event, Midi2Message, StreamConfig, StreamMessage, StreamProtocol,
    SystemMessage, UtilityMessage,
};

pub mod ump;
pub use ump::{
    decode, decode_message, encode, encode_packets, ChannelVoiceStatus, MessageType, Words,
};

pub mod sysex;
pub use sysex::{SysExFormat, SysExMessage};

pub mod ci;
pub use ci::{
    MidiCiMessage, ProcessInquiryMessage, ProfileMessage, PropertyExchangeMessage,
};

pub mod midi1;
pub use midi1::{events_to_midi1_bytes, midi1_to_ump, parse_midi1, to_midi1_bytes, Midi1Writer};

pub mod structured;
pub use structured::{from_structured, to_structured, UmpPacket};

mod stream;
pub use stream::UmpStreamDecoder;
