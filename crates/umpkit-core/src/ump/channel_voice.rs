//! MIDI 2.0 channel voice (MT 0x4, 2 words).

use super::{fits, ChannelVoiceStatus, Decoded, Words, MT_MIDI2_CHANNEL_VOICE};
use crate::error::{check, Error, Result};
use crate::event::{BankSelect, Midi2Message};

const PC_BANK_VALID: u8 = 0x01;
const PNM_DETACH: u8 = 0x02;
const PNM_RESET: u8 = 0x01;

#[inline]
fn word0(group: u8, status: ChannelVoiceStatus, channel: u8, msb: u8, lsb: u8) -> u32 {
    (u32::from(MT_MIDI2_CHANNEL_VOICE) << 28)
        | (u32::from(group) << 24)
        | (u32::from(status.nibble()) << 20)
        | (u32::from(channel) << 16)
        | (u32::from(msb) << 8)
        | u32::from(lsb)
}

fn address(group: u8, channel: u8) -> Result<()> {
    check("group", group.into(), 0, 15)?;
    check("channel", channel.into(), 0, 15)
}

fn seven(field: &'static str, value: u8) -> Result<()> {
    check(field, value.into(), 0, 127)
}

fn packet(w0: u32, w1: u32) -> Words {
    let mut words = Words::new();
    words.push(w0);
    words.push(w1);
    words
}

pub(super) fn encode(message: &Midi2Message) -> Result<Words> {
    use ChannelVoiceStatus as S;
    use Midi2Message::*;

    let (w0, w1) = match *message {
        NoteOn {
            group,
            channel,
            note,
            velocity,
            attribute_type,
            attribute_data,
        }
        | NoteOff {
            group,
            channel,
            note,
            velocity,
            attribute_type,
            attribute_data,
        } => {
            address(group, channel)?;
            seven("note", note)?;
            let status = if matches!(message, NoteOn { .. }) {
                S::NoteOn
            } else {
                S::NoteOff
            };
            (
                word0(group, status, channel, note, attribute_type),
                (u32::from(velocity) << 16) | u32::from(attribute_data),
            )
        }
        PolyPressure {
            group,
            channel,
            note,
            pressure,
        } => {
            address(group, channel)?;
            seven("note", note)?;
            (word0(group, S::PolyPressure, channel, note, 0), pressure)
        }
        ControlChange {
            group,
            channel,
            controller,
            value,
        } => {
            address(group, channel)?;
            seven("controller", controller)?;
            (word0(group, S::ControlChange, channel, controller, 0), value)
        }
        ProgramChange {
            group,
            channel,
            program,
            bank,
        } => {
            address(group, channel)?;
            seven("program", program)?;
            let (flags, bank_word) = match bank {
                Some(BankSelect { msb, lsb }) => {
                    seven("bank_msb", msb)?;
                    seven("bank_lsb", lsb)?;
                    (PC_BANK_VALID, (u32::from(msb) << 8) | u32::from(lsb))
                }
                None => (0, 0),
            };
            (
                word0(group, S::ProgramChange, channel, 0, flags),
                (u32::from(program) << 24) | bank_word,
            )
        }
        ChannelPressure {
            group,
            channel,
            pressure,
        } => {
            address(group, channel)?;
            (word0(group, S::ChannelPressure, channel, 0, 0), pressure)
        }
        PitchBend {
            group,
            channel,
            value,
        } => {
            address(group, channel)?;
            (word0(group, S::PitchBend, channel, 0, 0), value)
        }
        Rpn {
            group,
            channel,
            bank,
            index,
            value,
        }
        | Nrpn {
            group,
            channel,
            bank,
            index,
            value,
        } => {
            address(group, channel)?;
            seven("bank", bank)?;
            seven("index", index)?;
            let status = if matches!(message, Rpn { .. }) {
                S::RegisteredController
            } else {
                S::AssignableController
            };
            (word0(group, status, channel, bank, index), value)
        }
        RpnRelative {
            group,
            channel,
            bank,
            index,
            delta,
        }
        | NrpnRelative {
            group,
            channel,
            bank,
            index,
            delta,
        } => {
            address(group, channel)?;
            seven("bank", bank)?;
            seven("index", index)?;
            let status = if matches!(message, RpnRelative { .. }) {
                S::RelativeRegisteredController
            } else {
                S::RelativeAssignableController
            };
            (word0(group, status, channel, bank, index), delta as u32)
        }
        PerNoteManagement {
            group,
            channel,
            note,
            detach,
            reset,
        } => {
            address(group, channel)?;
            seven("note", note)?;
            let mut flags = 0;
            if detach {
                flags |= PNM_DETACH;
            }
            if reset {
                flags |= PNM_RESET;
            }
            (word0(group, S::PerNoteManagement, channel, note, flags), 0)
        }
        PerNoteRegisteredController {
            group,
            channel,
            note,
            controller,
            value,
        }
        | PerNoteAssignableController {
            group,
            channel,
            note,
            controller,
            value,
        } => {
            address(group, channel)?;
            seven("note", note)?;
            let status = if matches!(message, PerNoteRegisteredController { .. }) {
                S::RegisteredPerNoteController
            } else {
                S::AssignablePerNoteController
            };
            (word0(group, status, channel, note, controller), value)
        }
        PerNotePitchBend {
            group,
            channel,
            note,
            value,
        } => {
            address(group, channel)?;
            seven("note", note)?;
            (word0(group, S::PerNotePitchBend, channel, note, 0), value)
        }
        _ => return Err(Error::Unsupported("not a MIDI 2.0 channel voice message")),
    };
    Ok(packet(w0, w1))
}

pub(super) fn decode(w0: u32, w1: u32) -> Option<Decoded> {
    use ChannelVoiceStatus as S;

    let group = ((w0 >> 24) & 0x0F) as u8;
    let channel = ((w0 >> 16) & 0x0F) as u8;
    let msb = ((w0 >> 8) & 0xFF) as u8;
    let lsb = (w0 & 0xFF) as u8;

    let Some(status) = S::from_nibble(((w0 >> 20) & 0x0F) as u8) else {
        return Some(Decoded::Unknown);
    };

    let message = match status {
        S::NoteOn | S::NoteOff => {
            if !fits(msb, 7) {
                return None;
            }
            let velocity = (w1 >> 16) as u16;
            let attribute_data = (w1 & 0xFFFF) as u16;
            if status == S::NoteOn {
                Midi2Message::NoteOn {
                    group,
                    channel,
                    note: msb,
                    velocity,
                    attribute_type: lsb,
                    attribute_data,
                }
            } else {
                Midi2Message::NoteOff {
                    group,
                    channel,
                    note: msb,
                    velocity,
                    attribute_type: lsb,
                    attribute_data,
                }
            }
        }
        S::PolyPressure => {
            if !fits(msb, 7) {
                return None;
            }
            Midi2Message::PolyPressure {
                group,
                channel,
                note: msb,
                pressure: w1,
            }
        }
        S::ControlChange => {
            if !fits(msb, 7) {
                return None;
            }
            Midi2Message::ControlChange {
                group,
                channel,
                controller: msb,
                value: w1,
            }
        }
        S::ProgramChange => {
            if lsb & !PC_BANK_VALID != 0 {
                return None;
            }
            let program = (w1 >> 24) as u8;
            let bank_msb = ((w1 >> 8) & 0xFF) as u8;
            let bank_lsb = (w1 & 0xFF) as u8;
            if !fits(program, 7) || !fits(bank_msb, 7) || !fits(bank_lsb, 7) {
                return None;
            }
            let bank = (lsb & PC_BANK_VALID != 0).then_some(BankSelect {
                msb: bank_msb,
                lsb: bank_lsb,
            });
            Midi2Message::ProgramChange {
                group,
                channel,
                program,
                bank,
            }
        }
        S::ChannelPressure => Midi2Message::ChannelPressure {
            group,
            channel,
            pressure: w1,
        },
        S::PitchBend => Midi2Message::PitchBend {
            group,
            channel,
            value: w1,
        },
        S::RegisteredController
        | S::AssignableController
        | S::RelativeRegisteredController
        | S::RelativeAssignableController => {
            if !fits(msb, 7) || !fits(lsb, 7) {
                return None;
            }
            let (bank, index) = (msb, lsb);
            match status {
                S::RegisteredController => Midi2Message::Rpn {
                    group,
                    channel,
                    bank,
                    index,
                    value: w1,
                },
                S::AssignableController => Midi2Message::Nrpn {
                    group,
                    channel,
                    bank,
                    index,
                    value: w1,
                },
                S::RelativeRegisteredController => Midi2Message::RpnRelative {
                    group,
                    channel,
                    bank,
                    index,
                    delta: w1 as i32,
                },
                _ => Midi2Message::NrpnRelative {
                    group,
                    channel,
                    bank,
                    index,
                    delta: w1 as i32,
                },
            }
        }
        S::PerNoteManagement => {
            if !fits(msb, 7) || lsb & !(PNM_DETACH | PNM_RESET) != 0 {
                return None;
            }
            Midi2Message::PerNoteManagement {
                group,
                channel,
                note: msb,
                detach: lsb & PNM_DETACH != 0,
                reset: lsb & PNM_RESET != 0,
            }
        }
        S::RegisteredPerNoteController | S::AssignablePerNoteController => {
            if !fits(msb, 7) {
                return None;
            }
            if status == S::RegisteredPerNoteController {
                Midi2Message::PerNoteRegisteredController {
                    group,
                    channel,
                    note: msb,
                    controller: lsb,
                    value: w1,
                }
            } else {
                Midi2Message::PerNoteAssignableController {
                    group,
                    channel,
                    note: msb,
                    controller: lsb,
                    value: w1,
                }
            }
        }
        S::PerNotePitchBend => {
            if !fits(msb, 7) {
                return None;
            }
            Midi2Message::PerNotePitchBend {
                group,
                channel,
                note: msb,
                value: w1,
            }
        }
    };
    Some(message.into())
}

#[cfg(test)]
mod tests {
    use super::super::{decode_message, encode};
    use crate::error::Error;
    use crate::event::{BankSelect, Midi2Message};

    fn round_trip(msg: Midi2Message) {
        let words = encode(&msg).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(decode_message(&words), Some(msg));
    }

    #[test]
    fn test_all_statuses_round_trip() {
        round_trip(Midi2Message::NoteOn {
            group: 15,
            channel: 15,
            note: 127,
            velocity: 0xFFFF,
            attribute_type: 3,
            attribute_data: 0x1234,
        });
        round_trip(Midi2Message::note_off(1, 2, 0, 0));
        round_trip(Midi2Message::PolyPressure {
            group: 0,
            channel: 9,
            note: 42,
            pressure: 0xDEAD_BEEF,
        });
        round_trip(Midi2Message::control_change(3, 4, 74, u32::MAX));
        round_trip(Midi2Message::ProgramChange {
            group: 0,
            channel: 0,
            program: 5,
            bank: Some(BankSelect { msb: 1, lsb: 2 }),
        });
        round_trip(Midi2Message::ProgramChange {
            group: 0,
            channel: 0,
            program: 127,
            bank: None,
        });
        round_trip(Midi2Message::ChannelPressure {
            group: 2,
            channel: 2,
            pressure: 7,
        });
        round_trip(Midi2Message::pitch_bend(0, 0, 0x8000_0000));
        round_trip(Midi2Message::Rpn {
            group: 0,
            channel: 1,
            bank: 0,
            index: 6,
            value: 99,
        });
        round_trip(Midi2Message::Nrpn {
            group: 0,
            channel: 1,
            bank: 127,
            index: 127,
            value: 1,
        });
        round_trip(Midi2Message::RpnRelative {
            group: 0,
            channel: 1,
            bank: 0,
            index: 1,
            delta: i32::MIN,
        });
        round_trip(Midi2Message::NrpnRelative {
            group: 0,
            channel: 1,
            bank: 3,
            index: 4,
            delta: -1,
        });
        round_trip(Midi2Message::PerNoteManagement {
            group: 0,
            channel: 0,
            note: 60,
            detach: true,
            reset: false,
        });
        round_trip(Midi2Message::PerNoteRegisteredController {
            group: 0,
            channel: 0,
            note: 60,
            controller: 7,
            value: 1000,
        });
        round_trip(Midi2Message::PerNoteAssignableController {
            group: 0,
            channel: 0,
            note: 60,
            controller: 200,
            value: 1000,
        });
        round_trip(Midi2Message::PerNotePitchBend {
            group: 0,
            channel: 0,
            note: 61,
            value: 0x4000_0000,
        });
    }

    #[test]
    fn test_program_change_layout() {
        let msg = Midi2Message::ProgramChange {
            group: 0,
            channel: 2,
            program: 5,
            bank: Some(BankSelect { msb: 1, lsb: 2 }),
        };
        let words = encode(&msg).unwrap();
        assert_eq!(words.as_slice(), &[0x40C2_0001, 0x0500_0102]);
    }

    #[test]
    fn test_relative_delta_is_twos_complement() {
        let msg = Midi2Message::RpnRelative {
            group: 0,
            channel: 0,
            bank: 0,
            index: 0,
            delta: -2,
        };
        assert_eq!(encode(&msg).unwrap()[1], 0xFFFF_FFFE);
    }

    #[test]
    fn test_encode_range_errors_name_field() {
        let err = encode(&Midi2Message::note_on(16, 0, 60, 1)).unwrap_err();
        assert!(matches!(err, Error::FieldRange { field: "group", value: 16, min: 0, max: 15 }));
        let err = encode(&Midi2Message::note_on(0, 0, 128, 1)).unwrap_err();
        assert!(matches!(err, Error::FieldRange { field: "note", value: 128, .. }));
        let err = encode(&Midi2Message::control_change(0, 16, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::FieldRange { field: "channel", .. }));
        let err = encode(&Midi2Message::ProgramChange {
            group: 0,
            channel: 0,
            program: 0,
            bank: Some(BankSelect { msb: 0x80, lsb: 0 }),
        })
        .unwrap_err();
        assert!(matches!(err, Error::FieldRange { field: "bank_msb", .. }));
    }

    #[test]
    fn test_decode_seven_bit_violation_is_none() {
        // note-on with note byte 0x80
        assert_eq!(decode_message(&[0x4090_8000, 0]), None);
        // RPN with index 0x80
        assert_eq!(decode_message(&[0x4020_0080, 0]), None);
        // program change with reserved option flag
        assert_eq!(decode_message(&[0x40C0_0002, 0]), None);
    }

    #[test]
    fn test_reserved_status_is_raw() {
        let words = [0x4070_0000, 0x1];
        assert_eq!(
            decode_message(&words),
            Some(Midi2Message::Raw {
                words: words.to_vec()
            })
        );
    }
}
