//! # umpkit
//!
//! Universal MIDI Packet engine.
//!
//! - [`core`]: UMP encode/decode, SysEx7/SysEx8 fragmentation, MIDI-CI,
//!   MIDI 1.0 byte-stream bridging and a structured serde projection.
//! - [`sched`] (feature `scheduler`, on by default): time-ordered delivery
//!   with jitter-reduction correction.
//!
//! ```no_run
//! use umpkit::prelude::*;
//!
//! # fn main() -> umpkit::Result<()> {
//! let words = encode(&Midi2Message::note_on(0, 0, 60, 0xC000))?;
//! let event = decode(&words, None);
//! assert!(event.is_some());
//!
//! let bytes = to_midi1_bytes(&Midi2Message::note_on(0, 0, 60, 0xFFFF))?;
//! assert_eq!(bytes, vec![0x90, 60, 127]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub use umpkit_core as core;

pub use umpkit_core::{
    decode, decode_message, encode, encode_packets, events_to_midi1_bytes, from_structured,
    midi1_to_ump, parse_midi1, to_midi1_bytes, to_structured, BankSelect, ChannelVoiceStatus,
    MessageType, Midi1Writer, Midi2Event, Midi2Message, MidiCiMessage, ProcessInquiryMessage,
    ProfileMessage, PropertyExchangeMessage, SequenceError, StreamMessage, SysExFormat,
    SysExMessage, SystemMessage, UmpPacket, UmpStreamDecoder, UtilityMessage, Words,
};

#[cfg(feature = "scheduler")]
pub use umpkit_sched as sched;

#[cfg(feature = "scheduler")]
pub use umpkit_sched::{
    apply_jitter_reduction, Clock, EventId, HandlerResult, JitterConfig,
    JitterReductionSynchronizer, ManualClock, Scheduler, SchedulerConfig, SubscriptionId,
    ThreadClock, TimerId,
};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    pub use crate::{
        decode, encode, encode_packets, from_structured, midi1_to_ump, parse_midi1,
        to_midi1_bytes, to_structured, Midi1Writer, Midi2Event, Midi2Message, SysExFormat,
        SysExMessage, UmpPacket, UmpStreamDecoder,
    };

    #[cfg(feature = "scheduler")]
    pub use crate::{
        Clock, JitterReductionSynchronizer, ManualClock, Scheduler, SchedulerConfig, ThreadClock,
    };
}
