//! Continuous UMP word stream -> events.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ci;
use crate::error::{Result, SequenceError};
use crate::event::Midi2Event;
use crate::sysex::{
    self, SysExFormat, MAX_PACKETS, STATUS_COMPLETE, STATUS_CONTINUE, STATUS_START,
};
use crate::ump::{decode, group_of, message_type, packet_len, Words};

/// Splits a word stream into packets and decodes them, reassembling SysEx7 /
/// SysEx8 sequences per group.
///
/// Words of an incomplete trailing packet are kept for the next [`push`](Self::push).
#[derive(Debug, Default)]
pub struct UmpStreamDecoder {
    partial: Vec<u32>,
    /// Events decoded ahead of a failed push, handed out by the next one.
    ready: Vec<Midi2Event>,
    sysex: HashMap<(u8, SysExFormat), Vec<Words>>,
}

impl UmpStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed words; returns every event completed by them.
    ///
    /// A SysEx sequencing error drops that group's buffer and is returned.
    /// Events decoded before it in the same push are held back and returned
    /// first by the next push; words after it stay buffered as well.
    pub fn push(&mut self, words: &[u32]) -> Result<Vec<Midi2Event>> {
        let mut pending = std::mem::take(&mut self.partial);
        pending.extend_from_slice(words);

        let mut events = std::mem::take(&mut self.ready);
        let mut pos = 0;
        while let Some(&word0) = pending.get(pos) {
            let len = packet_len(word0);
            if pos + len > pending.len() {
                break;
            }
            let packet = &pending[pos..pos + len];
            pos += len;

            match SysExFormat::from_message_type(message_type(word0)) {
                Some(format) if sysex::packet_status(word0) != STATUS_COMPLETE => {
                    match self.push_sysex(format, packet) {
                        Ok(Some(event)) => events.push(event),
                        Ok(None) => {}
                        Err(err) => {
                            self.partial = pending.split_off(pos);
                            self.ready = events;
                            return Err(err);
                        }
                    }
                }
                _ => {
                    if let Some(event) = decode(packet, None) {
                        events.push(event);
                    } else {
                        debug!("dropping undecodable packet {:08X?}", packet);
                    }
                }
            }
        }
        self.partial = pending.split_off(pos);
        Ok(events)
    }

    fn push_sysex(&mut self, format: SysExFormat, packet: &[u32]) -> Result<Option<Midi2Event>> {
        let key = (group_of(packet[0]), format);
        let buffer = self.sysex.entry(key).or_default();
        buffer.push(Words::from_slice(packet));
        if buffer.len() > MAX_PACKETS {
            let len = buffer.len();
            self.sysex.remove(&key);
            warn!("dropping {:?} sequence on group {}: {} packets", format, key.0, len);
            return Err(SequenceError::TooManyPackets(len).into());
        }
        if matches!(sysex::packet_status(packet[0]), STATUS_START | STATUS_CONTINUE) {
            return Ok(None);
        }

        let packets = self.sysex.remove(&key).unwrap_or_default();
        match sysex::reassemble(format, &packets) {
            Ok(msg) => Ok(Some(Midi2Event::new(ci::classify(msg, format)))),
            Err(err) => {
                warn!("dropping {:?} sequence on group {}: {}", format, key.0, err);
                Err(err)
            }
        }
    }

    /// Words, SysEx packets or held-back events are buffered.
    pub fn has_pending(&self) -> bool {
        !self.partial.is_empty() || !self.sysex.is_empty() || !self.ready.is_empty()
    }

    /// Drop all buffered state.
    pub fn reset(&mut self) {
        self.partial.clear();
        self.ready.clear();
        self.sysex.clear();
    }
}
