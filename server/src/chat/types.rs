use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a chat channel. Names are compared case-insensitively, so the
/// inner value is always trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a message owned by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessageHandle {
    pub channel: ChannelId,
    pub message_id: Uuid,
}

impl MessageHandle {
    pub fn new(channel: ChannelId, message_id: Uuid) -> Self {
        Self {
            channel,
            message_id,
        }
    }
}

/// One incoming chat message, as delivered to the game front-end.
#[derive(Debug, Clone, Serialize)]
pub struct ChatEvent {
    pub channel: ChannelId,
    pub author: String,
    pub text: String,
    pub message: MessageHandle,
    pub timestamp: DateTime<Utc>,
}

impl ChatEvent {
    pub fn new(channel: ChannelId, author: impl Into<String>, text: impl Into<String>) -> Self {
        let message = MessageHandle::new(channel.clone(), Uuid::new_v4());
        Self {
            channel,
            author: author.into(),
            text: text.into(),
            message,
            timestamp: Utc::now(),
        }
    }
}
