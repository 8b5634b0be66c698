//! MIDI 2.0 events -> MIDI 1.0 bytes.

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use super::convert::{midi2_cc_to_midi1, midi2_pitch_bend_to_midi1, midi2_velocity_to_midi1};
use crate::error::{check, Error, Result};
use crate::event::{Midi2Event, Midi2Message};
use crate::ump::fits;

/// One MIDI 1.0 channel voice message before running status is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChannelBytes {
    status: u8,
    data1: u8,
    data2: Option<u8>,
}

impl ChannelBytes {
    fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2: Some(data2),
        }
    }

    fn short(status: u8, data1: u8) -> Self {
        Self {
            status,
            data1,
            data2: None,
        }
    }

    /// Program change and channel pressure always carry their status byte.
    fn may_run(&self) -> bool {
        !matches!(self.status & 0xF0, 0xC0 | 0xD0)
    }
}

enum Lowered {
    Channel(SmallVec<[ChannelBytes; 3]>),
    /// System and SysEx bytes, written as-is.
    Framed(Vec<u8>),
}

fn channel_status(kind: u8, channel: u8) -> Result<u8> {
    check("channel", channel.into(), 0, 15)?;
    Ok(kind | channel)
}

fn data7(field: &'static str, value: u8) -> Result<u8> {
    if fits(value, 7) {
        Ok(value)
    } else {
        Err(Error::range(field, value.into(), 0, 127))
    }
}

fn sysex_frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(0xF0);
    out.extend(body.iter().map(|b| b & 0x7F));
    out.push(0xF7);
    out
}

/// Map a message onto MIDI 1.0, or `None` if it has no MIDI 1.0 form.
fn lower(message: &Midi2Message) -> Result<Option<Lowered>> {
    use Midi2Message::*;
    let lowered = match message {
        NoteOn {
            channel,
            note,
            velocity,
            ..
        } => Lowered::Channel(smallvec![ChannelBytes::new(
            channel_status(0x90, *channel)?,
            data7("note", *note)?,
            midi2_velocity_to_midi1(*velocity),
        )]),
        NoteOff {
            channel,
            note,
            velocity,
            ..
        } => Lowered::Channel(smallvec![ChannelBytes::new(
            channel_status(0x80, *channel)?,
            data7("note", *note)?,
            midi2_velocity_to_midi1(*velocity),
        )]),
        PolyPressure {
            channel,
            note,
            pressure,
            ..
        } => Lowered::Channel(smallvec![ChannelBytes::new(
            channel_status(0xA0, *channel)?,
            data7("note", *note)?,
            midi2_cc_to_midi1(*pressure),
        )]),
        ControlChange {
            channel,
            controller,
            value,
            ..
        } => Lowered::Channel(smallvec![ChannelBytes::new(
            channel_status(0xB0, *channel)?,
            data7("controller", *controller)?,
            midi2_cc_to_midi1(*value),
        )]),
        ProgramChange {
            channel,
            program,
            bank,
            ..
        } => {
            let cc = channel_status(0xB0, *channel)?;
            let mut out = SmallVec::new();
            if let Some(bank) = bank {
                out.push(ChannelBytes::new(cc, 0x00, data7("bank_msb", bank.msb)?));
                out.push(ChannelBytes::new(cc, 0x20, data7("bank_lsb", bank.lsb)?));
            }
            out.push(ChannelBytes::short(
                channel_status(0xC0, *channel)?,
                data7("program", *program)?,
            ));
            Lowered::Channel(out)
        }
        ChannelPressure {
            channel, pressure, ..
        } => Lowered::Channel(smallvec![ChannelBytes::short(
            channel_status(0xD0, *channel)?,
            midi2_cc_to_midi1(*pressure),
        )]),
        PitchBend { channel, value, .. } => {
            let bend = midi2_pitch_bend_to_midi1(*value);
            Lowered::Channel(smallvec![ChannelBytes::new(
                channel_status(0xE0, *channel)?,
                (bend & 0x7F) as u8,
                ((bend >> 7) & 0x7F) as u8,
            )])
        }
        Midi1ChannelVoice {
            status,
            data1,
            data2,
            ..
        } => {
            check("status", (*status).into(), 0x80, 0xEF)?;
            let bytes = if matches!(status & 0xF0, 0xC0 | 0xD0) {
                ChannelBytes::short(*status, data1 & 0x7F)
            } else {
                ChannelBytes::new(*status, data1 & 0x7F, data2 & 0x7F)
            };
            Lowered::Channel(smallvec![bytes])
        }
        System { message, .. } => {
            let mut out = vec![message.status()];
            let (d1, d2) = message.data_bytes();
            out.extend(d1.into_iter().chain(d2).map(|b| b & 0x7F));
            Lowered::Framed(out)
        }
        SysEx7(msg) | SysEx8(msg) => Lowered::Framed(sysex_frame(&msg.body())),
        MidiCi(msg) => Lowered::Framed(sysex_frame(&msg.to_sysex().body())),
        Profile(msg) => Lowered::Framed(sysex_frame(&msg.to_envelope()?.to_sysex().body())),
        PropertyExchange(msg) => {
            Lowered::Framed(sysex_frame(&msg.to_envelope()?.to_sysex().body()))
        }
        ProcessInquiry(msg) => {
            Lowered::Framed(sysex_frame(&msg.to_envelope()?.to_sysex().body()))
        }
        Rpn { .. }
        | Nrpn { .. }
        | RpnRelative { .. }
        | NrpnRelative { .. }
        | PerNoteManagement { .. }
        | PerNoteRegisteredController { .. }
        | PerNoteAssignableController { .. }
        | PerNotePitchBend { .. }
        | Utility { .. }
        | FlexTempo { .. }
        | FlexTimeSignature { .. }
        | FlexKeySignature { .. }
        | FlexLyric { .. }
        | Stream { .. }
        | Raw { .. } => return Ok(None),
    };
    Ok(Some(lowered))
}

/// Convert one message to MIDI 1.0 bytes without running status.
///
/// Messages with no MIDI 1.0 form are an [`Error::Unsupported`].
pub fn to_midi1_bytes(message: &Midi2Message) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    Midi1Writer::new(false).write_lowered(message, &mut out)?.ok_or(Error::Unsupported(
        "message has no MIDI 1.0 equivalent",
    ))?;
    Ok(out)
}

/// Streaming MIDI 1.0 writer that tracks running status across messages.
#[derive(Clone, Debug)]
pub struct Midi1Writer {
    running_status: bool,
    last_status: Option<u8>,
}

impl Default for Midi1Writer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Midi1Writer {
    pub fn new(running_status: bool) -> Self {
        Self {
            running_status,
            last_status: None,
        }
    }

    /// Append `message` to `out`.
    ///
    /// Messages without a MIDI 1.0 form are skipped and break running status.
    pub fn write(&mut self, message: &Midi2Message, out: &mut Vec<u8>) -> Result<()> {
        if self.write_lowered(message, out)?.is_none() {
            trace!("skipping {:?} in MIDI 1.0 output", message);
        }
        Ok(())
    }

    /// Forget the last status byte so the next channel message carries its status.
    #[inline]
    pub fn reset(&mut self) {
        self.last_status = None;
    }

    fn write_lowered(&mut self, message: &Midi2Message, out: &mut Vec<u8>) -> Result<Option<()>> {
        match lower(message)? {
            Some(Lowered::Channel(messages)) => {
                for msg in messages {
                    let omit = self.running_status
                        && msg.may_run()
                        && self.last_status == Some(msg.status);
                    if !omit {
                        out.push(msg.status);
                    }
                    self.last_status = Some(msg.status);
                    out.push(msg.data1);
                    out.extend(msg.data2);
                }
                Ok(Some(()))
            }
            Some(Lowered::Framed(bytes)) => {
                out.extend_from_slice(&bytes);
                self.reset();
                Ok(Some(()))
            }
            None => {
                self.reset();
                Ok(None)
            }
        }
    }
}

/// Convert an event sequence to a MIDI 1.0 byte stream; timestamps are ignored.
pub fn events_to_midi1_bytes(events: &[Midi2Event], running_status: bool) -> Result<Vec<u8>> {
    let mut writer = Midi1Writer::new(running_status);
    let mut out = Vec::new();
    for event in events {
        writer.write(&event.message, &mut out)?;
    }
    Ok(out)
}
