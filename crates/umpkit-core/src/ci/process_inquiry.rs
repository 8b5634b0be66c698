//! Process inquiry messages (sub-ID2 0x22).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::{envelope, MidiCiMessage, SUB_ID2_PROCESS_INQUIRY};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessInquiryCommand {
    CapInquiry,
    CapReply,
    MessageReport,
    MessageReportReply,
    EndReport,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInquiryMessage {
    pub group: u8,
    pub command: ProcessInquiryCommand,
    pub filters: Option<BTreeMap<String, i64>>,
}

#[derive(Serialize, Deserialize)]
struct PiBody {
    command: ProcessInquiryCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filters: Option<Value>,
}

impl ProcessInquiryMessage {
    pub fn new(group: u8, command: ProcessInquiryCommand) -> Self {
        Self {
            group,
            command,
            filters: None,
        }
    }

    /// Decode a JSON body; unreadable bodies end the report.
    pub fn from_body(group: u8, body: &[u8]) -> Self {
        match serde_json::from_slice::<PiBody>(body) {
            Ok(parsed) => Self {
                group,
                command: parsed.command,
                filters: parsed.filters.and_then(integer_map),
            },
            Err(err) => {
                trace!("process inquiry body not decodable: {}", err);
                Self::new(group, ProcessInquiryCommand::EndReport)
            }
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>> {
        let body = PiBody {
            command: self.command,
            filters: self
                .filters
                .as_ref()
                .map(|f| Value::Object(f.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect())),
        };
        super::to_ascii_json(&body)
    }

    pub fn to_envelope(&self) -> Result<MidiCiMessage> {
        Ok(envelope(self.group, SUB_ID2_PROCESS_INQUIRY, self.to_body()?))
    }
}

fn integer_map(value: Value) -> Option<BTreeMap<String, i64>> {
    let Value::Object(map) = value else {
        return None;
    };
    map.into_iter()
        .map(|(k, v)| v.as_i64().map(|n| (k, n)))
        .collect()
}
