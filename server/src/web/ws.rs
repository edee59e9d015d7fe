use axum::extract::{
    State,
    ws::{self, WebSocket, WebSocketUpgrade},
};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::ChannelId;
use crate::chat::messages::{
    ClientToServerMessage, ServerToClientMessage, client_message_from_ws_text,
};
use crate::state::AppState;

pub async fn ws_handler(
    ws_upgrade: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    tracing::info!("WebSocket: Connection attempt to /ws endpoint");
    ws_upgrade.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn reject(ws_sender: &mut SplitSink<WebSocket, ws::Message>, message: String) {
    let error_response = ServerToClientMessage::SystemError { message };
    if let Ok(ws_msg) = error_response.to_ws_text() {
        let _ = ws_sender.send(ws_msg).await;
    }
    let _ = ws_sender.close().await;
}

pub async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (channel, username) = match ws_receiver.next().await {
        Some(Ok(ws::Message::Text(text_msg))) => {
            match client_message_from_ws_text(text_msg.as_str()) {
                Ok(ClientToServerMessage::JoinChannel { channel, username }) => {
                    let channel = ChannelId::new(channel);
                    let username = username.trim().to_string();
                    if channel.is_empty() || username.is_empty() {
                        reject(
                            &mut ws_sender,
                            "Channel and username must not be empty.".to_string(),
                        )
                        .await;
                        return;
                    }
                    if app_state.chat_hub.is_reserved_name(&username) {
                        tracing::info!(
                            chat.username = %username,
                            "WebSocket: Rejected join with reserved name"
                        );
                        reject(
                            &mut ws_sender,
                            format!("The name '{}' is reserved.", username),
                        )
                        .await;
                        return;
                    }
                    (channel, username)
                }
                Ok(other_msg) => {
                    tracing::warn!(
                        ws.message = ?other_msg,
                        "WebSocket: Initial message was not JoinChannel. Closing"
                    );
                    reject(
                        &mut ws_sender,
                        "Invalid initial message type. Expected JoinChannel.".to_string(),
                    )
                    .await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "WebSocket: Failed to deserialize initial message. Closing"
                    );
                    reject(
                        &mut ws_sender,
                        format!("Invalid initial connection message format: {}", e),
                    )
                    .await;
                    return;
                }
            }
        }
        Some(Ok(_)) => {
            reject(
                &mut ws_sender,
                "Initial message must be a text JSON message (JoinChannel).".to_string(),
            )
            .await;
            return;
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "WebSocket: Error receiving initial message. Closing");
            let _ = ws_sender.close().await;
            return;
        }
        None => {
            tracing::info!("WebSocket: Client disconnected before joining");
            return;
        }
    };

    let client_id = Uuid::new_v4();
    let (hub_to_client_tx, mut hub_to_client_rx) = mpsc::channel::<ws::Message>(32);

    let history = match app_state
        .chat_hub
        .join(channel.clone(), client_id, hub_to_client_tx)
        .await
    {
        Ok(history) => history,
        Err(e) => {
            tracing::error!(error = %e, "WebSocket: Failed to join chat hub");
            reject(&mut ws_sender, "Chat is unavailable.".to_string()).await;
            return;
        }
    };

    let joined = ServerToClientMessage::Joined {
        channel: channel.clone(),
        history,
    };
    match joined.to_ws_text() {
        Ok(ws_msg) => {
            if ws_sender.send(ws_msg).await.is_err() {
                app_state.chat_hub.leave(channel, client_id).await;
                return;
            }
        }
        Err(e) => tracing::error!(error = %e, "WebSocket: Failed to serialize Joined"),
    }

    tracing::info!(
        client.id = %client_id,
        chat.channel = %channel,
        chat.username = %username,
        "WebSocket: Client joined channel"
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(message_to_send) = hub_to_client_rx.recv().await {
            if ws_sender.send(message_to_send).await.is_err() {
                tracing::info!(client.id = %client_id, "WebSocket: Send failed, client likely gone");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let hub = app_state.chat_hub.clone();
    let recv_channel = channel.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(ws::Message::Text(text_msg)) => {
                    match client_message_from_ws_text(text_msg.as_str()) {
                        Ok(ClientToServerMessage::SendMessage { text }) => {
                            if let Err(e) = hub
                                .post(recv_channel.clone(), username.clone(), text)
                                .await
                            {
                                tracing::debug!(
                                    client.id = %client_id,
                                    error = %e,
                                    "WebSocket: Message rejected by chat hub"
                                );
                            }
                        }
                        Ok(ClientToServerMessage::JoinChannel { .. }) => {
                            tracing::debug!(client.id = %client_id, "WebSocket: Ignoring repeated JoinChannel");
                        }
                        Err(e) => {
                            tracing::debug!(client.id = %client_id, error = %e, "WebSocket: Unparseable message");
                        }
                    }
                }
                Ok(ws::Message::Close(_)) => {
                    tracing::info!(client.id = %client_id, "WebSocket: Closed by client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(client.id = %client_id, error = %e, "WebSocket: Receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    app_state.chat_hub.leave(channel.clone(), client_id).await;
    tracing::info!(
        client.id = %client_id,
        chat.channel = %channel,
        "WebSocket: Client disconnected"
    );
}
