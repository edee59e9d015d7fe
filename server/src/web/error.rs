use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::game_logic::GameError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl From<GameError> for WebError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::AlreadyActive(_) => WebError::Conflict(err.to_string()),
            GameError::NoActiveSession(_) => WebError::NotFound(err.to_string()),
            other => WebError::InternalServerError(other.to_string()),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            WebError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            WebError::JsonSerialization(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("JSON error: {}", err),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T, E = WebError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChannelId, TransportError};

    #[test]
    fn game_errors_map_to_status_codes() {
        let channel = ChannelId::new("kanto");
        let cases = [
            (GameError::AlreadyActive(channel.clone()), StatusCode::CONFLICT),
            (GameError::NoActiveSession(channel), StatusCode::NOT_FOUND),
            (
                GameError::Transport(TransportError::ActorComm("gone".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let response = WebError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
