use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use super::error::{Result as TransportResult, TransportError};
use super::sink::MessageSink;
use super::types::{ChannelId, MessageHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    Sent { message: MessageHandle, text: String },
    Edited { message: MessageHandle, text: String },
    Deleted { message: MessageHandle },
    Reacted { message: MessageHandle, emoji: String },
}

/// In-memory sink that records every call.
#[derive(Debug)]
pub struct RecordingSink {
    ops: Mutex<Vec<SinkOp>>,
    max_message_len: usize,
    fail_edits_containing: Option<String>,
    fail_sends_containing: Option<String>,
    fail_deletes: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            max_message_len: 2000,
            fail_edits_containing: None,
            fail_sends_containing: None,
            fail_deletes: false,
        }
    }

    pub fn with_max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = max;
        self
    }

    pub fn fail_edits_containing(mut self, needle: impl Into<String>) -> Self {
        self.fail_edits_containing = Some(needle.into());
        self
    }

    pub fn fail_sends_containing(mut self, needle: impl Into<String>) -> Self {
        self.fail_sends_containing = Some(needle.into());
        self
    }

    pub fn fail_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn ops(&self) -> Vec<SinkOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SinkOp::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Current text of a message: its last edit, or what was sent.
    pub fn latest_text(&self, message: &MessageHandle) -> Option<String> {
        self.ops().into_iter().rev().find_map(|op| match op {
            SinkOp::Edited { message: m, text } | SinkOp::Sent { message: m, text }
                if &m == message =>
            {
                Some(text)
            }
            _ => None,
        })
    }

    pub fn sent_handles(&self) -> Vec<MessageHandle> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SinkOp::Sent { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: SinkOp) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageHandle> {
        if self
            .fail_sends_containing
            .as_deref()
            .is_some_and(|needle| text.contains(needle))
        {
            return Err(TransportError::ActorComm("injected send failure".to_string()));
        }
        let message = MessageHandle::new(channel.clone(), Uuid::new_v4());
        self.record(SinkOp::Sent {
            message: message.clone(),
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn edit(&self, message: &MessageHandle, text: &str) -> TransportResult<()> {
        if self
            .fail_edits_containing
            .as_deref()
            .is_some_and(|needle| text.contains(needle))
        {
            return Err(TransportError::ActorComm("injected edit failure".to_string()));
        }
        self.record(SinkOp::Edited {
            message: message.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, message: &MessageHandle) -> TransportResult<()> {
        if self.fail_deletes {
            return Err(TransportError::ActorComm("injected delete failure".to_string()));
        }
        self.record(SinkOp::Deleted {
            message: message.clone(),
        });
        Ok(())
    }

    async fn react(&self, message: &MessageHandle, emoji: &str) -> TransportResult<()> {
        self.record(SinkOp::Reacted {
            message: message.clone(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    fn max_message_len(&self) -> usize {
        self.max_message_len
    }
}
