//! Profile configuration messages (sub-ID2 0x20).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::trace;

use super::{envelope, MidiCiMessage, SUB_ID2_PROFILE};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileCommand {
    Inquiry,
    Reply,
    AddedReport,
    RemovedReport,
    SetOn,
    SetOff,
    EnabledReport,
    DisabledReport,
    DetailsInquiry,
    DetailsReply,
    ProfileSpecificData,
}

impl ProfileCommand {
    fn requires_profile_id(self) -> bool {
        !matches!(self, ProfileCommand::Inquiry | ProfileCommand::Reply)
    }

    fn requires_target(self) -> bool {
        matches!(
            self,
            ProfileCommand::SetOn | ProfileCommand::SetOff | ProfileCommand::DetailsInquiry
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileTarget {
    Channel,
    Group,
    FunctionBlock,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMessage {
    #[serde(skip)]
    pub group: u8,
    pub command: ProfileCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ProfileTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ProfileMessage {
    pub fn new(group: u8, command: ProfileCommand) -> Self {
        Self {
            group,
            command,
            profile_id: None,
            target: None,
            channels: None,
            details: None,
        }
    }

    /// Reply carrying the undecodable body bytes in `details.payload`.
    pub fn fallback(group: u8, raw: &[u8]) -> Self {
        let mut details = Map::new();
        details.insert("payload".to_string(), json!(raw));
        Self {
            details: Some(details),
            ..Self::new(group, ProfileCommand::Reply)
        }
    }

    /// Decode a JSON body, falling back to a reply on anything malformed.
    pub fn from_body(group: u8, body: &[u8]) -> Self {
        match serde_json::from_slice::<ProfileMessage>(body) {
            Ok(mut msg) => {
                msg.group = group;
                msg.sanitize()
            }
            Err(err) => {
                trace!("profile body not decodable: {}", err);
                Self::fallback(group, body)
            }
        }
    }

    pub fn to_body(&self) -> Result<Vec<u8>> {
        super::to_ascii_json(self)
    }

    pub fn to_envelope(&self) -> Result<MidiCiMessage> {
        Ok(envelope(self.group, SUB_ID2_PROFILE, self.to_body()?))
    }

    fn sanitize(self) -> Self {
        let missing_id = self.command.requires_profile_id()
            && self.profile_id.as_deref().map_or(true, str::is_empty);
        let missing_target = self.command.requires_target() && self.target.is_none();
        let bad_channels = match (&self.target, &self.channels) {
            (Some(ProfileTarget::Channel), None) => true,
            (Some(ProfileTarget::Channel), Some(chs)) => chs.is_empty(),
            _ => false,
        } || self
            .channels
            .as_ref()
            .is_some_and(|chs| chs.iter().any(|&ch| ch > 15));

        if missing_id || missing_target || bad_channels {
            trace!("profile {:?} failed validation", self.command);
            return Self::fallback(self.group, &[]);
        }
        self
    }
}
