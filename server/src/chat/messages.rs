use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::ChannelId;

/// Messages sent from a chat client (WebSocket) to the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "messageType", content = "payload")]
pub enum ClientToServerMessage {
    /// Must be the first message on a new connection.
    JoinChannel { channel: String, username: String },
    /// Post a chat line into the joined channel.
    SendMessage { text: String },
}

/// A stored chat line as clients see it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessageView {
    pub message_id: Uuid,
    pub author: String,
    pub text: String,
    pub reactions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Messages sent from the server to chat clients.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "messageType", content = "payload")]
pub enum ServerToClientMessage {
    Joined {
        channel: ChannelId,
        history: Vec<ChatMessageView>,
    },
    MessagePosted {
        channel: ChannelId,
        message: ChatMessageView,
    },
    MessageEdited {
        channel: ChannelId,
        message_id: Uuid,
        text: String,
    },
    MessageDeleted {
        channel: ChannelId,
        message_id: Uuid,
    },
    ReactionAdded {
        channel: ChannelId,
        message_id: Uuid,
        emoji: String,
    },
    SystemError {
        message: String,
    },
}

impl ServerToClientMessage {
    pub fn to_ws_text(&self) -> Result<axum::extract::ws::Message, serde_json::Error> {
        serde_json::to_string(self)
            .map(|json_string| axum::extract::ws::Message::Text(json_string.into()))
    }
}

pub fn client_message_from_ws_text(text: &str) -> Result<ClientToServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}
