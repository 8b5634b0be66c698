//! Property exchange messages (sub-ID2 0x21).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use super::{envelope, MidiCiMessage, SUB_ID2_PROPERTY_EXCHANGE};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeCommand {
    CapInquiry,
    CapReply,
    Get,
    GetReply,
    Set,
    SetReply,
    Subscribe,
    SubscribeReply,
    Notify,
    Terminate,
}

impl PeCommand {
    fn requires_request_id(self) -> bool {
        !matches!(self, PeCommand::CapInquiry | PeCommand::CapReply)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeEncoding {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "json+zlib")]
    JsonZlib,
    #[serde(rename = "binary+zlib")]
    BinaryZlib,
    #[serde(rename = "mcoded7")]
    Mcoded7,
}

/// Property data: a JSON document or raw bytes.
///
/// JSON goes in the body's `data` field as is. Bytes go in a separate
/// `binaryData` field as a lowercase hex string, so a JSON string that
/// happens to look like hex stays JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum PeData {
    Json(Value),
    Binary(Vec<u8>),
}

fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    hex
}

fn parse_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeAck {
    pub ack: bool,
    pub status_code: Option<u16>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyExchangeMessage {
    pub group: u8,
    pub command: PeCommand,
    pub request_id: Option<u32>,
    pub encoding: Option<PeEncoding>,
    pub header: Option<Map<String, Value>>,
    pub data: Option<PeData>,
    pub ack: Option<PeAck>,
}

/// JSON shape of the body; the acknowledgement is flattened into it.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeBody {
    command: PeCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoding: Option<PeEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binary_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ack: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl PropertyExchangeMessage {
    pub fn new(group: u8, command: PeCommand) -> Self {
        Self {
            group,
            command,
            request_id: None,
            encoding: None,
            header: None,
            data: None,
            ack: None,
        }
    }

    fn notify(group: u8, header: Option<Map<String, Value>>, data: Option<PeData>) -> Self {
        Self {
            header,
            data,
            ..Self::new(group, PeCommand::Notify)
        }
    }

    /// Decode a JSON body; anything malformed becomes a notify carrying the raw bytes.
    pub fn from_body(group: u8, body: &[u8]) -> Self {
        match serde_json::from_slice::<PeBody>(body) {
            Ok(parsed) => Self::from_parsed(group, parsed, body),
            Err(err) => {
                trace!("property exchange body not decodable: {}", err);
                Self::notify(group, None, Some(PeData::Binary(body.to_vec())))
            }
        }
    }

    fn from_parsed(group: u8, body: PeBody, raw: &[u8]) -> Self {
        let data = match (body.binary_data, body.data) {
            (Some(hex), _) => match parse_hex(&hex) {
                Some(bytes) => Some(PeData::Binary(bytes)),
                None => {
                    trace!("property exchange binaryData is not hex");
                    return Self::notify(group, None, Some(PeData::Binary(raw.to_vec())));
                }
            },
            (None, value) => value.map(PeData::Json),
        };
        let header = match body.header {
            None => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                trace!("property exchange header is not an object");
                return Self::notify(group, None, data);
            }
        };

        if body.command.requires_request_id() && body.request_id.is_none() {
            return Self::notify(group, header, data);
        }
        if let Some(map) = &header {
            if !chunk_fields_valid(map) {
                return Self::notify(group, None, None);
            }
        }

        Self {
            group,
            command: body.command,
            request_id: body.request_id,
            encoding: body.encoding,
            header,
            data,
            ack: body.ack.map(|ack| PeAck {
                ack,
                status_code: body.status_code,
                message: body.message,
            }),
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>> {
        let body = PeBody {
            command: self.command,
            request_id: self.request_id,
            encoding: self.encoding,
            header: self.header.clone().map(Value::Object),
            data: match &self.data {
                Some(PeData::Json(value)) => Some(value.clone()),
                _ => None,
            },
            binary_data: match &self.data {
                Some(PeData::Binary(bytes)) => Some(to_hex(bytes)),
                _ => None,
            },
            ack: self.ack.as_ref().map(|a| a.ack),
            status_code: self.ack.as_ref().and_then(|a| a.status_code),
            message: self.ack.as_ref().and_then(|a| a.message.clone()),
        };
        super::to_ascii_json(&body)
    }

    pub fn to_envelope(&self) -> Result<MidiCiMessage> {
        Ok(envelope(self.group, SUB_ID2_PROPERTY_EXCHANGE, self.to_body()?))
    }

    fn header_offset(&self) -> u64 {
        self.header
            .as_ref()
            .and_then(|h| h.get("offset"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// `offset` / `length`, when both present, must be non-negative numbers.
fn chunk_fields_valid(header: &Map<String, Value>) -> bool {
    match (header.get("offset"), header.get("length")) {
        (Some(offset), Some(length)) => {
            let ok = |v: &Value| v.as_f64().is_some_and(|n| n.is_finite() && n >= 0.0);
            ok(offset) && ok(length)
        }
        _ => true,
    }
}

/// Join binary chunks ordered by header `offset`.
///
/// Returns `None` if any chunk is not binary or the offsets leave a gap or overlap.
pub fn reassemble_pe_chunks(chunks: &[PropertyExchangeMessage]) -> Option<PropertyExchangeMessage> {
    if chunks.is_empty() {
        return None;
    }
    let mut sorted: Vec<&PropertyExchangeMessage> = chunks.iter().collect();
    sorted.sort_by_key(|c| c.header_offset());

    let mut joined = Vec::new();
    for chunk in &sorted {
        let Some(PeData::Binary(bytes)) = &chunk.data else {
            return None;
        };
        if chunk.header_offset() != joined.len() as u64 {
            return None;
        }
        joined.extend_from_slice(bytes);
    }

    let base = sorted[0];
    let mut header = base.header.clone().unwrap_or_default();
    header.insert("length".to_string(), Value::from(joined.len()));
    Some(PropertyExchangeMessage {
        header: Some(header),
        data: Some(PeData::Binary(joined)),
        ..base.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(offset: u64, bytes: &[u8]) -> PropertyExchangeMessage {
        let mut header = Map::new();
        header.insert("offset".to_string(), json!(offset));
        header.insert("length".to_string(), json!(bytes.len()));
        PropertyExchangeMessage {
            request_id: Some(7),
            encoding: Some(PeEncoding::Binary),
            header: Some(header),
            data: Some(PeData::Binary(bytes.to_vec())),
            ..PropertyExchangeMessage::new(0, PeCommand::GetReply)
        }
    }

    #[test]
    fn test_body_round_trip() {
        let mut header = Map::new();
        header.insert("resource".to_string(), json!("DeviceInfo"));
        let msg = PropertyExchangeMessage {
            request_id: Some(1),
            encoding: Some(PeEncoding::JsonZlib),
            header: Some(header),
            data: Some(PeData::Json(json!({"name": "synth"}))),
            ack: Some(PeAck {
                ack: true,
                status_code: Some(200),
                message: None,
            }),
            ..PropertyExchangeMessage::new(4, PeCommand::GetReply)
        };
        let body = msg.to_body().unwrap();
        assert!(String::from_utf8_lossy(&body).contains("\"json+zlib\""));
        assert_eq!(PropertyExchangeMessage::from_body(4, &body), msg);
    }

    #[test]
    fn test_binary_data_as_hex() {
        let msg = chunk(0, &[0xDE, 0xAD, 0x01]);
        let body = msg.to_body().unwrap();
        assert!(String::from_utf8_lossy(&body).contains("\"binaryData\":\"dead01\""));
        assert_eq!(PropertyExchangeMessage::from_body(0, &body), msg);
    }

    #[test]
    fn test_hex_looking_json_string_stays_json() {
        let msg = PropertyExchangeMessage {
            request_id: Some(3),
            data: Some(PeData::Json(json!("0x1234"))),
            ..PropertyExchangeMessage::new(0, PeCommand::SetReply)
        };
        let body = msg.to_body().unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("binaryData"));
        assert_eq!(PropertyExchangeMessage::from_body(0, &body), msg);

        let bad_hex = br#"{"command":"getReply","requestId":1,"binaryData":"zz"}"#;
        let msg = PropertyExchangeMessage::from_body(0, bad_hex);
        assert_eq!(msg.command, PeCommand::Notify);
        assert_eq!(msg.data, Some(PeData::Binary(bad_hex.to_vec())));
    }

    #[test]
    fn test_non_ascii_body_is_seven_bit() {
        let mut header = Map::new();
        header.insert("resource".to_string(), json!("Café 🎹"));
        let msg = PropertyExchangeMessage {
            request_id: Some(9),
            header: Some(header),
            data: Some(PeData::Json(json!({"name": "Ünïcödé"}))),
            ..PropertyExchangeMessage::new(1, PeCommand::GetReply)
        };
        let body = msg.to_body().unwrap();
        assert!(body.iter().all(|b| *b < 0x80));
        assert!(String::from_utf8_lossy(&body).contains("\\ud83c\\udfb9"));
        assert_eq!(PropertyExchangeMessage::from_body(1, &body), msg);
    }

    #[test]
    fn test_garbage_becomes_notify() {
        let msg = PropertyExchangeMessage::from_body(2, b"\xFF\x00");
        assert_eq!(msg.command, PeCommand::Notify);
        assert_eq!(msg.group, 2);
        assert_eq!(msg.data, Some(PeData::Binary(vec![0xFF, 0x00])));

        let unknown_encoding = br#"{"command":"get","requestId":1,"encoding":"gzip"}"#;
        assert_eq!(
            PropertyExchangeMessage::from_body(0, unknown_encoding).command,
            PeCommand::Notify
        );
    }

    #[test]
    fn test_missing_request_id_becomes_notify() {
        let body = br#"{"command":"set","data":{"v":1}}"#;
        let msg = PropertyExchangeMessage::from_body(0, body);
        assert_eq!(msg.command, PeCommand::Notify);
        assert_eq!(msg.data, Some(PeData::Json(json!({"v": 1}))));

        let cap = br#"{"command":"capInquiry"}"#;
        assert_eq!(
            PropertyExchangeMessage::from_body(0, cap).command,
            PeCommand::CapInquiry
        );
    }

    #[test]
    fn test_negative_offset_drops_payload() {
        let body = br#"{"command":"getReply","requestId":1,"header":{"offset":-1,"length":4},"binaryData":"00"}"#;
        let msg = PropertyExchangeMessage::from_body(0, body);
        assert_eq!(msg, PropertyExchangeMessage::notify(0, None, None));
    }

    #[test]
    fn test_reassemble_chunks_out_of_order() {
        let joined = reassemble_pe_chunks(&[chunk(3, &[4, 5]), chunk(0, &[1, 2, 3])]).unwrap();
        assert_eq!(joined.data, Some(PeData::Binary(vec![1, 2, 3, 4, 5])));
        assert_eq!(joined.header.unwrap()["length"], json!(5));
        assert_eq!(joined.request_id, Some(7));
    }

    #[test]
    fn test_reassemble_rejects_gap_and_json() {
        assert!(reassemble_pe_chunks(&[chunk(0, &[1]), chunk(2, &[3])]).is_none());
        let mut json_chunk = chunk(1, &[]);
        json_chunk.data = Some(PeData::Json(json!(1)));
        assert!(reassemble_pe_chunks(&[chunk(0, &[1]), json_chunk]).is_none());
        assert!(reassemble_pe_chunks(&[]).is_none());
    }
}
