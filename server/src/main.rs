use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod catalog;
mod chat;
mod config;
mod error;
mod game_logic;
mod sessions;
mod state;
mod web;

use crate::bot::GameBot;
use crate::catalog::Catalog;
use crate::chat::{ChatEvent, ChatHubHandle, MessageSink};
use crate::config::load_settings;
use crate::error::Result as AppResult;
use crate::sessions::SessionManagerHandle;
use crate::state::AppState;
use crate::web::run_server;

const CHAT_EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_settings = load_settings()?;
    tracing::info!("Configuration loaded: {:?}", app_settings);

    let catalog = Arc::new(Catalog::original_151()?);
    tracing::info!(catalog.size = catalog.len(), "Catalog ready");

    let (events_tx, events_rx) = mpsc::channel::<ChatEvent>(CHAT_EVENT_BUFFER);
    let chat_hub = ChatHubHandle::spawn(64, &app_settings.chat, events_tx);
    let sink: Arc<dyn MessageSink> = Arc::new(chat_hub.clone());

    let session_manager = SessionManagerHandle::spawn(
        32,
        Arc::clone(&catalog),
        Arc::clone(&sink),
        app_settings.game.clone(),
    );

    let bot = GameBot::new(
        session_manager.clone(),
        sink,
        &app_settings.chat,
        &app_settings.game,
    );
    tokio::spawn(bot.run(events_rx));

    let app_state = AppState {
        session_manager,
        chat_hub,
    };

    run_server(app_state, app_settings.server).await
}
