pub mod error;
pub mod hub;
pub mod messages;
pub mod sink;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use error::TransportError;
pub use hub::ChatHubHandle;
pub use sink::MessageSink;
pub use types::{ChannelId, ChatEvent, MessageHandle};
