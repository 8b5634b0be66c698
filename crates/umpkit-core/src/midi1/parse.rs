//! MIDI 1.0 byte stream -> events.

use tracing::trace;

use crate::ci;
use crate::error::{check, Error, Result};
use crate::event::{Midi2Event, Midi2Message, SystemMessage};
use crate::sysex::{self, SysExFormat, SysExMessage};
use crate::ump::{encode_packets, Words};

/// Data bytes that follow a MIDI 1.0 status byte, or `None` for bytes that are not
/// channel voice or system common statuses.
#[inline]
fn data_len(status: u8) -> Option<usize> {
    match status {
        0x80..=0xBF | 0xE0..=0xEF => Some(2),
        0xC0..=0xDF => Some(1),
        0xF1 | 0xF3 => Some(1),
        0xF2 => Some(2),
        0xF6 => Some(0),
        _ => None,
    }
}

/// Real-time bytes may appear anywhere, including inside other messages.
#[inline]
fn is_realtime(byte: u8) -> bool {
    matches!(byte, 0xF8 | 0xFA | 0xFB | 0xFC | 0xFE | 0xFF)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    group: u8,
    running_status: Option<u8>,
    out: Vec<Midi2Event>,
}

impl<'a> Parser<'a> {
    fn emit(&mut self, message: Midi2Message) {
        self.out.push(Midi2Event::new(message));
    }

    fn emit_realtime(&mut self, byte: u8) {
        if let Some(message) = SystemMessage::from_status(byte, 0, 0) {
            self.emit(Midi2Message::System {
                group: self.group,
                message,
            });
        }
    }

    /// Collect `len` data bytes starting at `self.pos`, passing real-time bytes through.
    fn data(&mut self, status: u8, len: usize) -> Result<[u8; 2]> {
        let mut data = [0u8; 2];
        let mut got = 0;
        while got < len {
            let Some(&byte) = self.bytes.get(self.pos) else {
                return Err(Error::Midi1(format!(
                    "incomplete message for status {status:#04x}: expected {len} data bytes, got {got}"
                )));
            };
            self.pos += 1;
            if is_realtime(byte) {
                self.emit_realtime(byte);
                continue;
            }
            if byte & 0x80 != 0 {
                return Err(Error::Midi1(format!(
                    "incomplete message for status {status:#04x}: status {byte:#04x} at offset {}",
                    self.pos - 1
                )));
            }
            data[got] = byte;
            got += 1;
        }
        Ok(data)
    }

    fn channel_voice(&mut self, status: u8) -> Result<()> {
        let len = data_len(status).unwrap_or(2);
        let [data1, data2] = self.data(status, len)?;
        self.emit(Midi2Message::Midi1ChannelVoice {
            group: self.group,
            status,
            data1,
            data2,
        });
        Ok(())
    }

    fn sysex(&mut self) -> Result<()> {
        let start = self.pos - 1;
        let mut body = Vec::new();
        loop {
            let Some(&byte) = self.bytes.get(self.pos) else {
                return Err(Error::Midi1(format!(
                    "unterminated SysEx starting at offset {start}"
                )));
            };
            self.pos += 1;
            match byte {
                0xF7 => break,
                b if is_realtime(b) => self.emit_realtime(b),
                b if b & 0x80 != 0 => {
                    return Err(Error::Midi1(format!(
                        "status {b:#04x} inside SysEx at offset {}",
                        self.pos - 1
                    )))
                }
                b => body.push(b),
            }
        }
        if body.is_empty() {
            return Err(Error::Midi1(format!("empty SysEx at offset {start}")));
        }
        let message = SysExMessage::from_body(&body, self.group)?;
        sysex::validate_manufacturer_id(&message.manufacturer_id)?;
        if message.payload.len() > sysex::MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLong(message.payload.len()));
        }
        self.emit(ci::classify(message, SysExFormat::SysEx7));
        Ok(())
    }

    fn run(mut self) -> Result<Vec<Midi2Event>> {
        while let Some(&byte) = self.bytes.get(self.pos) {
            self.pos += 1;
            match byte {
                0x00..=0x7F => {
                    let Some(status) = self.running_status else {
                        return Err(Error::Midi1(format!(
                            "data byte {byte:#04x} at offset {} without running status",
                            self.pos - 1
                        )));
                    };
                    // the byte just read is the first data byte
                    self.pos -= 1;
                    self.channel_voice(status)?;
                }
                0x80..=0xEF => {
                    self.channel_voice(byte)?;
                    self.running_status = Some(byte);
                }
                0xF0 => {
                    self.running_status = None;
                    self.sysex()?;
                }
                0xF7 => {
                    return Err(Error::Midi1(format!(
                        "SysEx end at offset {} without start",
                        self.pos - 1
                    )))
                }
                0xF1 | 0xF2 | 0xF3 | 0xF6 => {
                    self.running_status = None;
                    let len = data_len(byte).unwrap_or(0);
                    let [d1, d2] = self.data(byte, len)?;
                    if let Some(message) = SystemMessage::from_status(byte, d1, d2) {
                        self.emit(Midi2Message::System {
                            group: self.group,
                            message,
                        });
                    }
                }
                b if is_realtime(b) => self.emit_realtime(b),
                _ => {
                    return Err(Error::Midi1(format!(
                        "undefined status {byte:#04x} at offset {}",
                        self.pos - 1
                    )))
                }
            }
        }
        trace!("parsed {} MIDI 1.0 events", self.out.len());
        Ok(self.out)
    }
}

/// Parse a MIDI 1.0 byte stream (running status, real-time interleaving, SysEx) into events.
pub fn parse_midi1(bytes: &[u8], group: u8) -> Result<Vec<Midi2Event>> {
    check("group", group.into(), 0, 15)?;
    Parser {
        bytes,
        pos: 0,
        group,
        running_status: None,
        out: Vec::new(),
    }
    .run()
}

/// Parse a MIDI 1.0 byte stream straight into UMP packets.
pub fn midi1_to_ump(bytes: &[u8], group: u8) -> Result<Vec<Words>> {
    let mut packets = Vec::new();
    for event in parse_midi1(bytes, group)? {
        packets.extend(encode_packets(&event.message)?);
    }
    Ok(packets)
}
