use async_trait::async_trait;
use axum::extract::ws;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::error::{Result as TransportResult, TransportError};
use super::messages::{ChatMessageView, ServerToClientMessage};
use super::sink::MessageSink;
use super::types::{ChannelId, ChatEvent, MessageHandle};
use crate::config::ChatConfig;

#[derive(Debug)]
pub enum ChatHubMessage {
    Join {
        channel: ChannelId,
        client_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
        respond_to: oneshot::Sender<Vec<ChatMessageView>>,
    },
    Leave {
        channel: ChannelId,
        client_id: Uuid,
    },
    Post {
        channel: ChannelId,
        author: String,
        text: String,
        respond_to: oneshot::Sender<TransportResult<MessageHandle>>,
    },
    Send {
        channel: ChannelId,
        text: String,
        respond_to: oneshot::Sender<TransportResult<MessageHandle>>,
    },
    Edit {
        message: MessageHandle,
        text: String,
        respond_to: oneshot::Sender<TransportResult<()>>,
    },
    Delete {
        message: MessageHandle,
        respond_to: oneshot::Sender<TransportResult<()>>,
    },
    React {
        message: MessageHandle,
        emoji: String,
        respond_to: oneshot::Sender<TransportResult<()>>,
    },
}

#[derive(Debug)]
struct StoredMessage {
    view: ChatMessageView,
    from_bot: bool,
}

#[derive(Debug, Default)]
struct ChannelRoom {
    members: HashMap<Uuid, mpsc::Sender<ws::Message>>,
    messages: HashMap<Uuid, StoredMessage>,
    order: VecDeque<Uuid>,
}

impl ChannelRoom {
    fn history(&self) -> Vec<ChatMessageView> {
        self.order
            .iter()
            .filter_map(|id| self.messages.get(id))
            .map(|stored| stored.view.clone())
            .collect()
    }

    fn push(&mut self, stored: StoredMessage, history_limit: usize) {
        let id = stored.view.message_id;
        self.messages.insert(id, stored);
        self.order.push_back(id);

        while self.order.len() > history_limit {
            // Bot messages back the live scoreboard, so user chatter goes first.
            let evict_idx = self
                .order
                .iter()
                .position(|id| self.messages.get(id).is_some_and(|m| !m.from_bot))
                .unwrap_or(0);
            if let Some(evicted) = self.order.remove(evict_idx) {
                self.messages.remove(&evicted);
            }
        }
    }

    fn remove(&mut self, message_id: Uuid) -> bool {
        if self.messages.remove(&message_id).is_some() {
            self.order.retain(|id| *id != message_id);
            true
        } else {
            false
        }
    }

    async fn broadcast(&self, channel: &ChannelId, message: ServerToClientMessage) {
        if self.members.is_empty() {
            return;
        }
        match message.to_ws_text() {
            Ok(ws_msg) => {
                for (client_id, tx) in &self.members {
                    if tx.send(ws_msg.clone()).await.is_err() {
                        tracing::warn!(
                            chat.channel = %channel,
                            client.id = %client_id,
                            "Failed to broadcast to chat client"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    chat.channel = %channel,
                    error = %e,
                    "Failed to serialize chat broadcast"
                );
            }
        }
    }
}

struct ChatHubActor {
    receiver: mpsc::Receiver<ChatHubMessage>,
    rooms: HashMap<ChannelId, ChannelRoom>,
    events_tx: mpsc::Sender<ChatEvent>,
    bot_name: String,
    max_message_len: usize,
    history_limit: usize,
}

impl ChatHubActor {
    fn check_len(&self, text: &str) -> TransportResult<()> {
        let len = text.chars().count();
        if len > self.max_message_len {
            return Err(TransportError::MessageTooLong {
                len,
                max: self.max_message_len,
            });
        }
        Ok(())
    }

    async fn store_and_broadcast(
        &mut self,
        channel: ChannelId,
        author: String,
        text: String,
        from_bot: bool,
    ) -> MessageHandle {
        let view = ChatMessageView {
            message_id: Uuid::new_v4(),
            author,
            text,
            reactions: Vec::new(),
            timestamp: Utc::now(),
        };
        let handle = MessageHandle::new(channel.clone(), view.message_id);
        let room = self.rooms.entry(channel.clone()).or_default();
        room.push(
            StoredMessage {
                view: view.clone(),
                from_bot,
            },
            self.history_limit,
        );
        room.broadcast(
            &channel,
            ServerToClientMessage::MessagePosted {
                channel: channel.clone(),
                message: view,
            },
        )
        .await;
        handle
    }

    fn stored_mut(&mut self, message: &MessageHandle) -> TransportResult<&mut StoredMessage> {
        self.rooms
            .get_mut(&message.channel)
            .and_then(|room| room.messages.get_mut(&message.message_id))
            .ok_or(TransportError::MessageNotFound(message.message_id))
    }

    async fn handle_message(&mut self, msg: ChatHubMessage) {
        match msg {
            ChatHubMessage::Join {
                channel,
                client_id,
                client_tx,
                respond_to,
            } => {
                tracing::debug!(chat.channel = %channel, client.id = %client_id, "Client joined channel");
                let room = self.rooms.entry(channel).or_default();
                room.members.insert(client_id, client_tx);
                let _ = respond_to.send(room.history());
            }
            ChatHubMessage::Leave { channel, client_id } => {
                tracing::debug!(chat.channel = %channel, client.id = %client_id, "Client left channel");
                if let Some(room) = self.rooms.get_mut(&channel) {
                    room.members.remove(&client_id);
                    if room.members.is_empty() && room.messages.is_empty() {
                        self.rooms.remove(&channel);
                    }
                }
            }
            ChatHubMessage::Post {
                channel,
                author,
                text,
                respond_to,
            } => {
                if author.trim().eq_ignore_ascii_case(&self.bot_name) {
                    let _ = respond_to.send(Err(TransportError::ReservedName(author)));
                    return;
                }
                if let Err(e) = self.check_len(&text) {
                    let _ = respond_to.send(Err(e));
                    return;
                }
                let handle = self
                    .store_and_broadcast(channel.clone(), author.clone(), text.clone(), false)
                    .await;
                let event = ChatEvent {
                    channel,
                    author,
                    text,
                    message: handle.clone(),
                    timestamp: Utc::now(),
                };
                // Never block the hub on the consumer: it calls back into us.
                if let Err(e) = self.events_tx.try_send(event) {
                    tracing::warn!(
                        chat.channel = %handle.channel,
                        error = %e,
                        "Incoming chat queue unavailable, dropping event"
                    );
                }
                let _ = respond_to.send(Ok(handle));
            }
            ChatHubMessage::Send {
                channel,
                text,
                respond_to,
            } => {
                if let Err(e) = self.check_len(&text) {
                    let _ = respond_to.send(Err(e));
                    return;
                }
                let author = self.bot_name.clone();
                let handle = self.store_and_broadcast(channel, author, text, true).await;
                let _ = respond_to.send(Ok(handle));
            }
            ChatHubMessage::Edit {
                message,
                text,
                respond_to,
            } => {
                if let Err(e) = self.check_len(&text) {
                    let _ = respond_to.send(Err(e));
                    return;
                }
                let result = self.stored_mut(&message).map(|stored| {
                    stored.view.text = text.clone();
                });
                if result.is_ok()
                    && let Some(room) = self.rooms.get(&message.channel)
                {
                    room.broadcast(
                        &message.channel,
                        ServerToClientMessage::MessageEdited {
                            channel: message.channel.clone(),
                            message_id: message.message_id,
                            text,
                        },
                    )
                    .await;
                }
                let _ = respond_to.send(result);
            }
            ChatHubMessage::Delete {
                message,
                respond_to,
            } => {
                let removed = self
                    .rooms
                    .get_mut(&message.channel)
                    .is_some_and(|room| room.remove(message.message_id));
                if !removed {
                    let _ = respond_to.send(Err(TransportError::MessageNotFound(message.message_id)));
                    return;
                }
                if let Some(room) = self.rooms.get(&message.channel) {
                    room.broadcast(
                        &message.channel,
                        ServerToClientMessage::MessageDeleted {
                            channel: message.channel.clone(),
                            message_id: message.message_id,
                        },
                    )
                    .await;
                }
                let _ = respond_to.send(Ok(()));
            }
            ChatHubMessage::React {
                message,
                emoji,
                respond_to,
            } => {
                let result = self.stored_mut(&message).map(|stored| {
                    stored.view.reactions.push(emoji.clone());
                });
                if result.is_ok()
                    && let Some(room) = self.rooms.get(&message.channel)
                {
                    room.broadcast(
                        &message.channel,
                        ServerToClientMessage::ReactionAdded {
                            channel: message.channel.clone(),
                            message_id: message.message_id,
                            emoji,
                        },
                    )
                    .await;
                }
                let _ = respond_to.send(result);
            }
        }
    }
}

#[tracing::instrument(skip(actor))]
async fn run_chat_hub_actor(mut actor: ChatHubActor) {
    tracing::info!("ChatHub actor started");
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }
    tracing::info!("ChatHub actor stopped");
}

/// Handle to the in-process chat hub. Cheap to clone; also the production
/// [`MessageSink`] for game sessions.
#[derive(Clone, Debug)]
pub struct ChatHubHandle {
    sender: mpsc::Sender<ChatHubMessage>,
    max_message_len: usize,
    bot_name: String,
}

impl ChatHubHandle {
    pub fn spawn(
        buffer_size: usize,
        chat_config: &ChatConfig,
        events_tx: mpsc::Sender<ChatEvent>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = ChatHubActor {
            receiver,
            rooms: HashMap::new(),
            events_tx,
            bot_name: chat_config.bot_name.clone(),
            max_message_len: chat_config.max_message_len,
            history_limit: chat_config.history_limit.max(1),
        };
        tokio::spawn(run_chat_hub_actor(actor));
        Self {
            sender,
            max_message_len: chat_config.max_message_len,
            bot_name: chat_config.bot_name.clone(),
        }
    }

    /// Users may not chat under the bot's name.
    pub fn is_reserved_name(&self, username: &str) -> bool {
        username.trim().eq_ignore_ascii_case(&self.bot_name)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ChatHubMessage,
    ) -> TransportResult<T> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|e| TransportError::ActorComm(format!("Failed to reach ChatHub: {}", e)))?;
        rx.await
            .map_err(|e| TransportError::ActorComm(format!("ChatHub no response: {}", e)))
    }

    pub async fn join(
        &self,
        channel: ChannelId,
        client_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
    ) -> TransportResult<Vec<ChatMessageView>> {
        self.request(|respond_to| ChatHubMessage::Join {
            channel,
            client_id,
            client_tx,
            respond_to,
        })
        .await
    }

    pub async fn leave(&self, channel: ChannelId, client_id: Uuid) {
        if self
            .sender
            .send(ChatHubMessage::Leave { channel, client_id })
            .await
            .is_err()
        {
            tracing::error!("Failed to send Leave to ChatHub");
        }
    }

    /// Posts a message on behalf of a chat user.
    pub async fn post(
        &self,
        channel: ChannelId,
        author: String,
        text: String,
    ) -> TransportResult<MessageHandle> {
        self.request(|respond_to| ChatHubMessage::Post {
            channel,
            author,
            text,
            respond_to,
        })
        .await?
    }
}

#[async_trait]
impl MessageSink for ChatHubHandle {
    async fn send(&self, channel: &ChannelId, text: &str) -> TransportResult<MessageHandle> {
        let channel = channel.clone();
        let text = text.to_string();
        self.request(|respond_to| ChatHubMessage::Send {
            channel,
            text,
            respond_to,
        })
        .await?
    }

    async fn edit(&self, message: &MessageHandle, text: &str) -> TransportResult<()> {
        let message = message.clone();
        let text = text.to_string();
        self.request(|respond_to| ChatHubMessage::Edit {
            message,
            text,
            respond_to,
        })
        .await?
    }

    async fn delete(&self, message: &MessageHandle) -> TransportResult<()> {
        let message = message.clone();
        self.request(|respond_to| ChatHubMessage::Delete {
            message,
            respond_to,
        })
        .await?
    }

    async fn react(&self, message: &MessageHandle, emoji: &str) -> TransportResult<()> {
        let message = message.clone();
        let emoji = emoji.to_string();
        self.request(|respond_to| ChatHubMessage::React {
            message,
            emoji,
            respond_to,
        })
        .await?
    }

    fn max_message_len(&self) -> usize {
        self.max_message_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_config(max_message_len: usize, history_limit: usize) -> ChatConfig {
        ChatConfig {
            bot_name: "QuizBot".to_string(),
            max_message_len,
            history_limit,
            banned_words: Vec::new(),
        }
    }

    #[tokio::test]
    async fn user_posts_are_forwarded_as_chat_events() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let hub = ChatHubHandle::spawn(8, &chat_config(2000, 50), events_tx);

        let handle = hub
            .post(ChannelId::new("Kanto"), "ash".to_string(), "pikachu".to_string())
            .await
            .unwrap();

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.channel, ChannelId::new("kanto"));
        assert_eq!(event.author, "ash");
        assert_eq!(event.text, "pikachu");
        assert_eq!(event.message, handle);
    }

    #[tokio::test]
    async fn bot_messages_are_not_forwarded_and_can_be_edited() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let hub = ChatHubHandle::spawn(8, &chat_config(2000, 50), events_tx);
        let channel = ChannelId::new("kanto");

        let (client_tx, mut client_rx) = mpsc::channel(8);
        hub.join(channel.clone(), Uuid::new_v4(), client_tx)
            .await
            .unwrap();

        let handle = hub.send(&channel, "0/151").await.unwrap();
        hub.edit(&handle, "1/151").await.unwrap();
        hub.react(&handle, "❌").await.unwrap();

        assert!(events_rx.try_recv().is_err());

        let mut kinds = Vec::new();
        for _ in 0..3 {
            if let Some(ws::Message::Text(text)) = client_rx.recv().await {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                kinds.push(value["messageType"].as_str().unwrap().to_string());
            }
        }
        assert_eq!(kinds, ["MessagePosted", "MessageEdited", "ReactionAdded"]);

        let (late_tx, _late_rx) = mpsc::channel(8);
        let history = hub.join(channel, Uuid::new_v4(), late_tx).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "1/151");
        assert_eq!(history[0].author, "QuizBot");
        assert_eq!(history[0].reactions, vec!["❌".to_string()]);
    }

    #[tokio::test]
    async fn oversized_messages_are_rejected() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let hub = ChatHubHandle::spawn(8, &chat_config(10, 50), events_tx);
        let channel = ChannelId::new("kanto");

        let err = hub.send(&channel, "this is far too long").await.unwrap_err();
        assert_eq!(err, TransportError::MessageTooLong { len: 20, max: 10 });

        let handle = hub.send(&channel, "short").await.unwrap();
        assert!(hub.edit(&handle, "also far too long").await.is_err());
    }

    #[tokio::test]
    async fn deleted_messages_cannot_be_touched_again() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let hub = ChatHubHandle::spawn(8, &chat_config(2000, 50), events_tx);
        let handle = hub
            .post(ChannelId::new("kanto"), "gary".to_string(), "missingno".to_string())
            .await
            .unwrap();

        hub.delete(&handle).await.unwrap();
        assert_eq!(
            hub.delete(&handle).await,
            Err(TransportError::MessageNotFound(handle.message_id))
        );
        assert!(hub.edit(&handle, "x").await.is_err());
    }

    #[tokio::test]
    async fn history_limit_evicts_user_messages_before_bot_messages() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let hub = ChatHubHandle::spawn(8, &chat_config(2000, 2), events_tx);
        let channel = ChannelId::new("kanto");

        let board = hub.send(&channel, "scoreboard").await.unwrap();
        hub.post(channel.clone(), "ash".to_string(), "one".to_string())
            .await
            .unwrap();
        hub.post(channel.clone(), "ash".to_string(), "two".to_string())
            .await
            .unwrap();

        hub.edit(&board, "still here").await.unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let history = hub.join(channel, Uuid::new_v4(), tx).await.unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["still here", "two"]);
    }

    #[tokio::test]
    async fn bot_name_is_reserved_for_the_bot() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let hub = ChatHubHandle::spawn(8, &chat_config(2000, 50), events_tx);

        assert!(hub.is_reserved_name(" quizbot "));
        assert!(!hub.is_reserved_name("ash"));

        let err = hub
            .post(ChannelId::new("kanto"), "QuizBot".to_string(), "!play".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::ReservedName("QuizBot".to_string()));
        assert!(events_rx.try_recv().is_err());
    }
}
