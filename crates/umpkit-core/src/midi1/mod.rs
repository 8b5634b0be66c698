//! MIDI 1.0 byte-stream bridge.
//!
//! - [`parse_midi1`] / [`midi1_to_ump`]: bytes with running status, real-time
//!   interleaving and SysEx framing -> events or UMP packets
//! - [`to_midi1_bytes`] / [`Midi1Writer`]: events -> bytes, scaling MIDI 2.0
//!   resolutions down to 7 and 14 bits
//! - value scaling helpers for both directions

mod convert;
mod encode;
mod parse;

pub use convert::{
    midi1_cc_to_midi2, midi1_pitch_bend_to_midi2, midi1_velocity_to_midi2, midi1_voice_to_midi2,
    midi2_cc_to_midi1, midi2_pitch_bend_to_midi1, midi2_velocity_to_midi1,
};
pub use encode::{events_to_midi1_bytes, to_midi1_bytes, Midi1Writer};
pub use parse::{midi1_to_ump, parse_midi1};
