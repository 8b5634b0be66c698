//! UMP stream messages (MT 0xF, 4 words).
//!
//! word0 = `(0xF << 28) | (group << 24) | (opcode << 16) | (byte2 << 8) | byte3`.
//! Words 1-3 are zero except for endpoint discovery, which carries the group
//! count in the top byte of word 1.

use super::{fits, Decoded, Words, MT_STREAM};
use crate::error::{check, Result};
use crate::event::{Midi2Message, StreamConfig, StreamMessage, StreamProtocol};

const OP_ENDPOINT_DISCOVERY: u8 = 0x00;
const OP_CONFIG_REQUEST: u8 = 0x01;
const OP_CONFIG_NOTIFICATION: u8 = 0x02;
const OP_FUNCTION_BLOCK_DISCOVERY: u8 = 0x10;
const OP_FUNCTION_BLOCK_INFO: u8 = 0x11;
const OP_PROCESS_INQUIRY: u8 = 0x20;
const OP_PROCESS_INQUIRY_REPLY: u8 = 0x21;

const FLAG_MIDI2: u8 = 0x01;
const FLAG_JR_TX: u8 = 0x02;
const FLAG_JR_RX: u8 = 0x04;
const FLAGS_RESERVED: u8 = 0xF8;

fn config_flags(cfg: &StreamConfig) -> u8 {
    let mut flags = 0;
    if cfg.protocol == StreamProtocol::Midi2 {
        flags |= FLAG_MIDI2;
    }
    if cfg.jr_timestamps_tx {
        flags |= FLAG_JR_TX;
    }
    if cfg.jr_timestamps_rx {
        flags |= FLAG_JR_RX;
    }
    flags
}

fn config_from_flags(flags: u8) -> Option<StreamConfig> {
    if flags & FLAGS_RESERVED != 0 {
        return None;
    }
    Some(StreamConfig {
        protocol: if flags & FLAG_MIDI2 != 0 {
            StreamProtocol::Midi2
        } else {
            StreamProtocol::Midi1
        },
        jr_timestamps_tx: flags & FLAG_JR_TX != 0,
        jr_timestamps_rx: flags & FLAG_JR_RX != 0,
    })
}

pub(super) fn encode(group: u8, message: &StreamMessage) -> Result<Words> {
    check("group", group.into(), 0, 15)?;
    let mut word1 = 0u32;
    let (opcode, b2, b3) = match *message {
        StreamMessage::EndpointDiscovery {
            major_version,
            minor_version,
            max_groups,
        } => {
            check("max_groups", max_groups.into(), 0, 16)?;
            word1 = u32::from(max_groups) << 24;
            (OP_ENDPOINT_DISCOVERY, major_version, minor_version)
        }
        StreamMessage::StreamConfigRequest(ref cfg) => (OP_CONFIG_REQUEST, config_flags(cfg), 0),
        StreamMessage::StreamConfigNotification(ref cfg) => {
            (OP_CONFIG_NOTIFICATION, config_flags(cfg), 0)
        }
        StreamMessage::FunctionBlockDiscovery { filter_bitmap } => (
            OP_FUNCTION_BLOCK_DISCOVERY,
            (filter_bitmap >> 8) as u8,
            (filter_bitmap & 0xFF) as u8,
        ),
        StreamMessage::FunctionBlockInfo {
            index,
            first_group,
            group_count,
        } => {
            check("first_group", first_group.into(), 0, 15)?;
            check("group_count", group_count.into(), 0, 15)?;
            (
                OP_FUNCTION_BLOCK_INFO,
                index,
                (first_group << 4) | group_count,
            )
        }
        StreamMessage::ProcessInquiry {
            function_block,
            part,
        }
        | StreamMessage::ProcessInquiryReply {
            function_block,
            part,
        } => {
            check("function_block", function_block.into(), 0, 127)?;
            check("part", part.into(), 0, 15)?;
            let opcode = if matches!(message, StreamMessage::ProcessInquiry { .. }) {
                OP_PROCESS_INQUIRY
            } else {
                OP_PROCESS_INQUIRY_REPLY
            };
            (opcode, function_block, part)
        }
    };
    let word0 = (u32::from(MT_STREAM) << 28)
        | (u32::from(group) << 24)
        | (u32::from(opcode) << 16)
        | (u32::from(b2) << 8)
        | u32::from(b3);
    Ok(Words::from_slice(&[word0, word1, 0, 0]))
}

pub(super) fn decode(words: &[u32]) -> Option<Decoded> {
    let w0 = words[0];
    let group = ((w0 >> 24) & 0x0F) as u8;
    let opcode = ((w0 >> 16) & 0xFF) as u8;
    let b2 = ((w0 >> 8) & 0xFF) as u8;
    let b3 = (w0 & 0xFF) as u8;

    let known = matches!(
        opcode,
        OP_ENDPOINT_DISCOVERY
            | OP_CONFIG_REQUEST
            | OP_CONFIG_NOTIFICATION
            | OP_FUNCTION_BLOCK_DISCOVERY
            | OP_FUNCTION_BLOCK_INFO
            | OP_PROCESS_INQUIRY
            | OP_PROCESS_INQUIRY_REPLY
    );
    if !known {
        return Some(Decoded::Unknown);
    }
    if words[2] != 0 || words[3] != 0 {
        return None;
    }
    if opcode == OP_ENDPOINT_DISCOVERY {
        if words[1] & 0x00FF_FFFF != 0 {
            return None;
        }
    } else if words[1] != 0 {
        return None;
    }

    let message = match opcode {
        OP_ENDPOINT_DISCOVERY => {
            let max_groups = (words[1] >> 24) as u8;
            if max_groups > 16 {
                return None;
            }
            StreamMessage::EndpointDiscovery {
                major_version: b2,
                minor_version: b3,
                max_groups,
            }
        }
        OP_CONFIG_REQUEST | OP_CONFIG_NOTIFICATION => {
            if b3 != 0 {
                return None;
            }
            let cfg = config_from_flags(b2)?;
            if opcode == OP_CONFIG_REQUEST {
                StreamMessage::StreamConfigRequest(cfg)
            } else {
                StreamMessage::StreamConfigNotification(cfg)
            }
        }
        OP_FUNCTION_BLOCK_DISCOVERY => StreamMessage::FunctionBlockDiscovery {
            filter_bitmap: (u16::from(b2) << 8) | u16::from(b3),
        },
        OP_FUNCTION_BLOCK_INFO => StreamMessage::FunctionBlockInfo {
            index: b2,
            first_group: b3 >> 4,
            group_count: b3 & 0x0F,
        },
        _ => {
            if !fits(b2, 7) || !fits(b3, 4) {
                return None;
            }
            if opcode == OP_PROCESS_INQUIRY {
                StreamMessage::ProcessInquiry {
                    function_block: b2,
                    part: b3,
                }
            } else {
                StreamMessage::ProcessInquiryReply {
                    function_block: b2,
                    part: b3,
                }
            }
        }
    };
    Some(Midi2Message::Stream { group, message }.into())
}

#[cfg(test)]
mod tests {
    use super::super::{decode_message, encode};
    use crate::error::Error;
    use crate::event::{Midi2Message, StreamConfig, StreamMessage, StreamProtocol};

    fn round_trip(group: u8, message: StreamMessage) {
        let msg = Midi2Message::Stream { group, message };
        let words = encode(&msg).unwrap();
        assert_eq!(words.len(), 4);
        assert_eq!(decode_message(&words), Some(msg));
    }

    #[test]
    fn test_stream_round_trip() {
        let cfg = StreamConfig {
            protocol: StreamProtocol::Midi2,
            jr_timestamps_tx: true,
            jr_timestamps_rx: false,
        };
        round_trip(
            0,
            StreamMessage::EndpointDiscovery {
                major_version: 1,
                minor_version: 1,
                max_groups: 16,
            },
        );
        round_trip(1, StreamMessage::StreamConfigRequest(cfg));
        round_trip(1, StreamMessage::StreamConfigNotification(cfg));
        round_trip(
            2,
            StreamMessage::FunctionBlockDiscovery {
                filter_bitmap: 0x8003,
            },
        );
        round_trip(
            3,
            StreamMessage::FunctionBlockInfo {
                index: 4,
                first_group: 2,
                group_count: 3,
            },
        );
        round_trip(
            0,
            StreamMessage::ProcessInquiry {
                function_block: 5,
                part: 1,
            },
        );
        round_trip(
            0,
            StreamMessage::ProcessInquiryReply {
                function_block: 127,
                part: 15,
            },
        );
    }

    #[test]
    fn test_config_flags_layout() {
        let msg = Midi2Message::Stream {
            group: 0,
            message: StreamMessage::StreamConfigRequest(StreamConfig {
                protocol: StreamProtocol::Midi2,
                jr_timestamps_tx: true,
                jr_timestamps_rx: true,
            }),
        };
        assert_eq!(encode(&msg).unwrap()[0], 0xF001_0700);
    }

    #[test]
    fn test_reserved_bits_rejected() {
        assert_eq!(decode_message(&[0xF001_0800, 0, 0, 0]), None);
        assert_eq!(decode_message(&[0xF000_0101, 0x1000_0001, 0, 0]), None);
        assert_eq!(decode_message(&[0xF011_0000, 0, 0, 1]), None);
    }

    #[test]
    fn test_unknown_opcode_is_raw() {
        let words = [0xF0FF_0000, 1, 2, 3];
        assert_eq!(
            decode_message(&words),
            Some(Midi2Message::Raw {
                words: words.to_vec()
            })
        );
    }

    #[test]
    fn test_encode_validation() {
        let msg = Midi2Message::Stream {
            group: 0,
            message: StreamMessage::ProcessInquiry {
                function_block: 128,
                part: 0,
            },
        };
        assert!(matches!(
            encode(&msg),
            Err(Error::FieldRange { field: "function_block", .. })
        ));
    }
}
