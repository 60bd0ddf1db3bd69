use serde::{Deserialize, Serialize};

use crate::ids::PlatformId;

/// One message handed to the core by a transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub sender_id: PlatformId,
    pub username: Option<String>,
    pub given_name: String,
    pub family_name: Option<String>,
    pub chat_id: i64,
    pub raw_text: String,
    pub is_command: bool,
    /// Command name without the leading `/` or any `@botname` suffix.
    pub command_token: Option<String>,
}

impl Inbound {
    /// Build an inbound message from plain text, tokenizing a leading `/command`.
    pub fn from_text(
        sender_id: PlatformId,
        given_name: impl Into<String>,
        chat_id: i64,
        raw_text: impl Into<String>,
    ) -> Self {
        let raw_text = raw_text.into();
        let command_token = command_token(&raw_text);
        Self {
            sender_id,
            username: None,
            given_name: given_name.into(),
            family_name: None,
            chat_id,
            is_command: command_token.is_some(),
            command_token,
            raw_text,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// A reply for the transport to deliver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub chat_id: i64,
    pub text: String,
}

impl Outbound {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}

/// Extract the command name from text such as `/events@planner_bot extra`.
///
/// Returns `None` unless the first word starts with `/` and has a name.
pub fn command_token(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split_once('@').map_or(name, |(cmd, _bot)| cmd);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
