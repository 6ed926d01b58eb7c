//! Narrow chat transport interface used by the pipeline and the run loop.

mod telegram;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use telegram::TelegramTransport;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} rejected (code {code:?}): {description}")]
    Api {
        method: &'static str,
        code: Option<i64>,
        description: String,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Chat addressed either by numeric id or by public `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl ChatRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => ChatRef::Id(id),
            Err(_) => ChatRef::Username(format!("@{}", raw.trim_start_matches('@'))),
        }
    }

    /// True when `chat` is the chat this reference points at.
    pub fn matches(&self, chat: &Chat) -> bool {
        match self {
            ChatRef::Id(id) => *id == chat.id,
            ChatRef::Username(name) => chat.username.as_deref().is_some_and(|username| {
                username
                    .trim_start_matches('@')
                    .eq_ignore_ascii_case(name.trim_start_matches('@'))
            }),
        }
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{id}"),
            ChatRef::Username(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl IncomingMessage {
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }

    /// Message text, or the caption of a media post.
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub channel_post: Option<IncomingMessage>,
}

impl Update {
    pub fn payload(&self) -> Option<&IncomingMessage> {
        self.message.as_ref().or(self.channel_post.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Labelled button pointing at an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionLink {
    pub label: String,
    pub url: String,
}

impl ActionLink {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub actions: Vec<ActionLink>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.actions.push(ActionLink::new(label, url));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    #[serde(other)]
    Other,
}

impl MemberStatus {
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            MemberStatus::Member | MemberStatus::Administrator | MemberStatus::Creator
        )
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Drops any push (webhook) registration so polling can take over.
    async fn clear_webhook(&self) -> TransportResult<()>;
    /// Blocks for at most `timeout` waiting for updates at or after `offset`.
    async fn receive(&self, offset: i64, timeout: Duration) -> TransportResult<Vec<Update>>;
    async fn send(&self, chat: &ChatRef, message: &OutgoingMessage) -> TransportResult<MessageRef>;
    async fn reply(&self, to: &MessageRef, message: &OutgoingMessage)
        -> TransportResult<MessageRef>;
    async fn edit(&self, target: &MessageRef, message: &OutgoingMessage) -> TransportResult<()>;
    async fn member_status(&self, chat: &ChatRef, user_id: i64) -> TransportResult<MemberStatus>;
}
