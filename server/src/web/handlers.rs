use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use super::error::{Result as WebResult, WebError};
use crate::chat::ChannelId;
use crate::game_logic::GameError;
use crate::sessions::SessionSnapshot;
use crate::state::AppState;

#[derive(Serialize, Debug)]
pub struct ActiveSessions {
    pub channels: Vec<ChannelId>,
}

fn parse_channel(raw: &str) -> WebResult<ChannelId> {
    let channel = ChannelId::new(raw);
    if channel.is_empty() {
        return Err(WebError::BadRequest("Channel name must not be empty".to_string()));
    }
    Ok(channel)
}

pub async fn start_session_handler(
    State(app_state): State<AppState>,
    Path(channel): Path<String>,
) -> WebResult<(StatusCode, Json<SessionSnapshot>)> {
    let channel = parse_channel(&channel)?;
    tracing::info!(session.channel = %channel, "HTTP: Received start_session request");

    let handle = app_state
        .session_manager
        .start_session(channel.clone())
        .await
        .map_err(|e| {
            tracing::warn!(session.channel = %channel, error = %e, "Failed to start session");
            WebError::from(e)
        })?;
    let snapshot = handle.snapshot().await.map_err(|e| match e {
        // The session released the channel during setup.
        GameError::NoActiveSession(_) => {
            tracing::error!(session.channel = %channel, "Session ended while starting");
            WebError::InternalServerError(format!("Failed to start a game in {}", channel))
        }
        other => WebError::from(other),
    })?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_session_handler(
    State(app_state): State<AppState>,
    Path(channel): Path<String>,
) -> WebResult<Json<SessionSnapshot>> {
    let channel = parse_channel(&channel)?;
    let handle = app_state
        .session_manager
        .get_session(channel.clone())
        .await
        .ok_or_else(|| WebError::NotFound(format!("No game is running in {}", channel)))?;
    Ok(Json(handle.snapshot().await?))
}

pub async fn list_sessions_handler(State(app_state): State<AppState>) -> Json<ActiveSessions> {
    Json(ActiveSessions {
        channels: app_state.session_manager.active_channels().await,
    })
}
