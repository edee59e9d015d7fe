use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::chat::{ChannelId, ChatEvent, MessageSink};
use crate::config::{ChatConfig, GameConfig};
use crate::game_logic::GameError;
use crate::game_logic::grid::format_time;
use crate::sessions::SessionManagerHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Play,
    Status,
    Help,
}

/// Chat front-end: reads events in arrival order, answers commands and
/// hands everything else to the channel's running session.
#[derive(Debug)]
pub struct GameBot {
    sessions: SessionManagerHandle,
    sink: Arc<dyn MessageSink>,
    bot_name: String,
    command_prefix: String,
    banned_words: Vec<String>,
}

impl GameBot {
    pub fn new(
        sessions: SessionManagerHandle,
        sink: Arc<dyn MessageSink>,
        chat_config: &ChatConfig,
        game_config: &GameConfig,
    ) -> Self {
        Self {
            sessions,
            sink,
            bot_name: chat_config.bot_name.clone(),
            command_prefix: game_config.command_prefix.clone(),
            banned_words: chat_config
                .banned_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    #[tracing::instrument(skip(self, events), fields(bot.name = %self.bot_name))]
    pub async fn run(self, mut events: mpsc::Receiver<ChatEvent>) {
        tracing::info!("GameBot started");
        while let Some(event) = events.recv().await {
            let channel = event.channel.clone();
            if let Err(e) = self.handle_event(event).await {
                tracing::error!(
                    session.channel = %channel,
                    error = %e,
                    "Failed to handle chat event"
                );
                self.say(&channel, &format!("An error occurred: {}", e)).await;
            }
        }
        tracing::info!("GameBot stopped, event queue closed");
    }

    fn parse_command(&self, text: &str) -> Option<Option<Command>> {
        let rest = text.trim().strip_prefix(self.command_prefix.as_str())?;
        let name = rest.split_whitespace().next().unwrap_or("").to_lowercase();
        Some(match name.as_str() {
            "play" => Some(Command::Play),
            "status" => Some(Command::Status),
            "help" => Some(Command::Help),
            _ => None,
        })
    }

    fn contains_banned_word(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.banned_words.iter().any(|w| lowered.contains(w.as_str()))
    }

    async fn say(&self, channel: &ChannelId, text: &str) {
        if let Err(e) = self.sink.send(channel, text).await {
            tracing::warn!(session.channel = %channel, error = %e, "Failed to send bot reply");
        }
    }

    async fn handle_event(&self, event: ChatEvent) -> Result<(), GameError> {
        if event.author == self.bot_name {
            return Ok(());
        }

        if self.contains_banned_word(&event.text) {
            tracing::info!(
                session.channel = %event.channel,
                chat.author = %event.author,
                "Removing message with banned word"
            );
            if let Err(e) = self.sink.delete(&event.message).await {
                tracing::warn!(
                    session.channel = %event.channel,
                    error = %e,
                    "Failed to delete message with banned word"
                );
            }
            self.say(
                &event.channel,
                &format!("{} - dont use that word!", event.author),
            )
            .await;
            return Ok(());
        }

        match self.parse_command(&event.text) {
            Some(Some(command)) => self.run_command(command, &event.channel).await,
            Some(None) => {
                tracing::debug!(chat.text = %event.text, "Ignoring unknown command");
                Ok(())
            }
            None => self.forward_guess(event).await,
        }
    }

    async fn run_command(&self, command: Command, channel: &ChannelId) -> Result<(), GameError> {
        tracing::debug!(session.channel = %channel, command = ?command, "Running command");
        match command {
            Command::Play => match self.sessions.start_session(channel.clone()).await {
                Ok(handle) => {
                    tracing::info!(
                        session.channel = %channel,
                        session.id = %handle.session_id,
                        "Game started from chat"
                    );
                    Ok(())
                }
                Err(GameError::AlreadyActive(_)) => {
                    self.say(channel, "A game is already in progress in this channel!")
                        .await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Command::Status => {
                let reply = match self.sessions.get_session(channel.clone()).await {
                    Some(handle) => match handle.snapshot().await {
                        Ok(snapshot) => format!(
                            "{}/{} guessed, {} left",
                            snapshot.guessed,
                            snapshot.total,
                            format_time(Duration::from_secs(snapshot.time_left_secs))
                        ),
                        Err(GameError::NoActiveSession(_)) => {
                            "No game is running in this channel.".to_string()
                        }
                        Err(e) => return Err(e),
                    },
                    None => "No game is running in this channel.".to_string(),
                };
                self.say(channel, &reply).await;
                Ok(())
            }
            Command::Help => {
                let p = &self.command_prefix;
                self.say(
                    channel,
                    &format!(
                        "Commands: {p}play starts a game, {p}status shows progress, {p}help shows this list. \
                         While a game runs, just type Pokémon names."
                    ),
                )
                .await;
                Ok(())
            }
        }
    }

    async fn forward_guess(&self, event: ChatEvent) -> Result<(), GameError> {
        let Some(handle) = self.sessions.get_session(event.channel.clone()).await else {
            return Ok(());
        };
        match handle.submit_guess(event).await {
            // The session finished between lookup and delivery.
            Err(GameError::NoActiveSession(_)) => Ok(()),
            other => other,
        }
    }
}
