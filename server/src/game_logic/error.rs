use thiserror::Error;

use crate::chat::{ChannelId, TransportError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    #[error("A game is already in progress in {0}")]
    AlreadyActive(ChannelId),
    #[error("No game is running in {0}")]
    NoActiveSession(ChannelId),
    #[error("Chat transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("Grid section {section} renders to {len} characters, over the {max} limit")]
    RenderOverflow {
        section: usize,
        len: usize,
        max: usize,
    },
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
