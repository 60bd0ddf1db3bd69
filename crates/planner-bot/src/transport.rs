//! Chat transport: the seam between the dispatch loop and the network.
//!
//! [`TelegramTransport`] long-polls the Bot API with `getUpdates` and replies
//! with `sendMessage`. Tests and other front ends implement [`Transport`]
//! directly.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use planner_core::messages::command_token;
use planner_core::{Inbound, Outbound, PlatformId};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Slack on top of the long-poll timeout before the HTTP client gives up.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Longest `sendMessage` text the Bot API accepts, in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Wait for the next batch of inbound messages. May return an empty batch.
    async fn poll(&self) -> Result<Vec<Inbound>, TransportError>;

    async fn send(&self, msg: Outbound) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("API error (status {status}): {description}")]
    Api { status: u16, description: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the bot token.
        let e = e.without_url();
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    pub poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
    /// Next `update_id` to request; everything below it is acknowledged.
    offset: AtomicI64,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + HTTP_TIMEOUT_SLACK)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        info!(
            api_url = %config.api_url,
            poll_timeout_secs = config.poll_timeout_secs,
            "telegram transport initialized"
        );

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.token),
            poll_timeout_secs: config.poll_timeout_secs,
            offset: AtomicI64::new(0),
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let reply: ApiResponse<T> = match response.json().await {
            Ok(reply) => reply,
            Err(e) if !status.is_success() => {
                return Err(TransportError::Api {
                    status: status.as_u16(),
                    description: e.without_url().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        match reply {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } if status.is_success() => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Api {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "no description".into()),
            }),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn poll(&self) -> Result<Vec<Inbound>, TransportError> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": self.offset(),
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.fetch_max(last + 1, Ordering::AcqRel);
        }

        let batch: Vec<Inbound> = updates.into_iter().filter_map(Update::into_inbound).collect();
        if !batch.is_empty() {
            debug!(count = batch.len(), offset = self.offset(), "received updates");
        }
        Ok(batch)
    }

    async fn send(&self, msg: Outbound) -> Result<(), TransportError> {
        let chunks = split_message(&msg.text, MAX_MESSAGE_LEN);
        if chunks.len() > 1 {
            debug!(chat_id = msg.chat_id, parts = chunks.len(), "splitting long reply");
        }
        for chunk in chunks {
            let _: serde_json::Value = self
                .call(
                    "sendMessage",
                    json!({
                        "chat_id": msg.chat_id,
                        "text": chunk,
                        "parse_mode": "Markdown",
                    }),
                )
                .await?;
        }
        Ok(())
    }
}

// ── Message splitting ───────────────────────────────────────────────────────

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split `text` into parts of at most `limit` UTF-16 code units.
///
/// Breaks prefer blank lines (between list entries), then line ends. A
/// single line longer than `limit` is cut at a character boundary.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if utf16_len(text) <= limit {
        return vec![text.to_string()];
    }
    let blocks = text.split("\n\n").flat_map(|block| {
        if utf16_len(block) <= limit {
            vec![block.to_string()]
        } else {
            pack(block.split('\n').flat_map(|line| hard_split(line, limit)), "\n", limit)
        }
    });
    pack(blocks, "\n\n", limit)
}

/// Greedily join parts (each at most `limit` long) with `sep`.
fn pack(parts: impl IntoIterator<Item = String>, sep: &str, limit: usize) -> Vec<String> {
    let sep_len = utf16_len(sep);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for part in parts {
        let part_len = utf16_len(&part);
        if !current.is_empty() && current_len + sep_len + part_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str(sep);
            current_len += sep_len;
        }
        current.push_str(&part);
        current_len += part_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(line: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for c in line.chars() {
        let n = c.len_utf16();
        if current_len + n > limit {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(c);
        current_len += n;
    }
    parts.push(current);
    parts
}

// ── Bot API wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    chat: Chat,
    from: Option<Sender>,
    text: Option<String>,
    #[serde(default)]
    entities: Vec<Entity>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Deserialize)]
struct Sender {
    id: i64,
    username: Option<String>,
    first_name: String,
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct Entity {
    #[serde(rename = "type")]
    kind: String,
    offset: i64,
}

impl Update {
    /// Text messages with a known sender only; everything else is skipped.
    fn into_inbound(self) -> Option<Inbound> {
        let message = self.message?;
        let text = message.text?;
        let from = message.from?;

        let leading_entity = message
            .entities
            .iter()
            .any(|e| e.kind == "bot_command" && e.offset == 0);
        let token = command_token(&text);

        Some(Inbound {
            sender_id: PlatformId::new(from.id),
            username: from.username,
            given_name: from.first_name,
            family_name: from.last_name,
            chat_id: message.chat.id,
            is_command: leading_entity || token.is_some(),
            command_token: token,
            raw_text: text,
        })
    }
}
