use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Message {0} not found")]
    MessageNotFound(Uuid),
    #[error("Message is {len} characters, over the {max} character limit")]
    MessageTooLong { len: usize, max: usize },
    #[error("The name '{0}' is reserved")]
    ReservedName(String),
    #[error("Actor communication error: {0}")]
    ActorComm(String),
}

pub type Result<T, E = TransportError> = std::result::Result<T, E>;
