//! MIDI 1.0 <-> MIDI 2.0 value scaling and channel voice translation.

use crate::event::Midi2Message;

/// Convert 7-bit MIDI 1.0 velocity to 16-bit MIDI 2.0.
///
/// 0 stays 0; 1-127 scale linearly so that down-conversion restores the input.
#[inline]
pub fn midi1_velocity_to_midi2(v: u8) -> u16 {
    if v == 0 {
        0
    } else {
        ((u32::from(v) * 65535 + 63) / 127) as u16
    }
}

/// Convert 16-bit MIDI 2.0 velocity to 7-bit MIDI 1.0, `round(v / 65535 * 127)`.
#[inline]
pub fn midi2_velocity_to_midi1(v: u16) -> u8 {
    ((u32::from(v) * 127 + 32767) / 65535).min(127) as u8
}

/// Convert 7-bit MIDI 1.0 CC / pressure to 32-bit MIDI 2.0.
#[inline]
pub fn midi1_cc_to_midi2(v: u8) -> u32 {
    match v {
        0 => 0,
        127.. => 0xFFFF_FFFF,
        _ => ((u64::from(v) * 0xFFFF_FFFF + 63) / 127) as u32,
    }
}

/// Convert 32-bit MIDI 2.0 CC / pressure to 7-bit MIDI 1.0, `round(v / 0xFFFFFFFF * 127)`.
#[inline]
pub fn midi2_cc_to_midi1(v: u32) -> u8 {
    ((u64::from(v) * 127 + 0x7FFF_FFFF) / 0xFFFF_FFFF).min(127) as u8
}

/// Convert 14-bit MIDI 1.0 pitch bend to 32-bit MIDI 2.0.
///
/// MIDI 1.0: 0-16383, center at 8192
/// MIDI 2.0: 0-0xFFFFFFFF, center at 0x80000000
#[inline]
pub fn midi1_pitch_bend_to_midi2(v: u16) -> u32 {
    match v {
        0 => 0,
        16383.. => 0xFFFF_FFFF,
        _ => ((u64::from(v) * 0xFFFF_FFFF + 8191) / 16383) as u32,
    }
}

/// Convert 32-bit MIDI 2.0 pitch bend to 14-bit MIDI 1.0, `round(v / 0xFFFFFFFF * 16383)`.
#[inline]
pub fn midi2_pitch_bend_to_midi1(v: u32) -> u16 {
    ((u64::from(v) * 16383 + 0x7FFF_FFFF) / 0xFFFF_FFFF).min(16383) as u16
}

/// Translate a MIDI 1.0 channel voice message into its MIDI 2.0 equivalent.
///
/// Note-on with velocity 0 becomes note-off. Returns `None` for a status outside 0x80-0xEF.
pub fn midi1_voice_to_midi2(group: u8, status: u8, data1: u8, data2: u8) -> Option<Midi2Message> {
    let channel = status & 0x0F;
    let (note, value) = (data1 & 0x7F, data2 & 0x7F);
    Some(match status & 0xF0 {
        0x80 => Midi2Message::note_off(group, channel, note, midi1_velocity_to_midi2(value)),
        0x90 if value == 0 => Midi2Message::note_off(group, channel, note, 0),
        0x90 => Midi2Message::note_on(group, channel, note, midi1_velocity_to_midi2(value)),
        0xA0 => Midi2Message::PolyPressure {
            group,
            channel,
            note,
            pressure: midi1_cc_to_midi2(value),
        },
        0xB0 => Midi2Message::control_change(group, channel, note, midi1_cc_to_midi2(value)),
        0xC0 => Midi2Message::ProgramChange {
            group,
            channel,
            program: note,
            bank: None,
        },
        0xD0 => Midi2Message::ChannelPressure {
            group,
            channel,
            pressure: midi1_cc_to_midi2(note),
        },
        0xE0 => Midi2Message::pitch_bend(
            group,
            channel,
            midi1_pitch_bend_to_midi2(u16::from(note) | (u16::from(value) << 7)),
        ),
        _ => return None,
    })
}
