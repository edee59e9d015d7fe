use async_trait::async_trait;
use std::fmt::Debug;

use super::error::Result as TransportResult;
use super::types::{ChannelId, MessageHandle};

/// Outgoing side of a chat transport.
///
/// Every call reports failure as a value; callers decide whether a failed
/// display update is worth more than a log line.
#[async_trait]
pub trait MessageSink: Send + Sync + Debug {
    async fn send(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageHandle>;

    async fn edit(&self, message: &MessageHandle, text: &str) -> TransportResult<()>;

    async fn delete(&self, message: &MessageHandle) -> TransportResult<()>;

    async fn react(&self, message: &MessageHandle, emoji: &str) -> TransportResult<()>;

    /// Largest message body, in characters, the transport accepts.
    fn max_message_len(&self) -> usize;
}
