pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection. The connection id doubles as the
/// player id for any room this connection creates or joins.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ulid::Ulid::new().to_string();
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.transport.register(connection_id.clone(), tx);
    tracing::info!(conn = %connection_id, "websocket connected");

    loop {
        tokio::select! {
            // Outbound: whatever the gateway queued for this connection
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }

            // Inbound client actions
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if let Some(reply) =
                                    handlers::handle_message(&connection_id, msg, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&reply) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(conn = %connection_id, "failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(conn = %connection_id, "websocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.transport.unregister(&connection_id);

    // Membership is deliberately left alone on disconnect: the player's
    // votes just stop arriving and the host's force_reveal is the escape
    // valve. Reconnect/resume is out of scope.
    if let Some(room) = state.rooms.find_by_connection(&connection_id).await {
        let name = {
            let inner = room.inner.lock().await;
            inner
                .player(&connection_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "?".to_string())
        };
        tracing::info!(code = %room.code, "{} disconnected", name);
    } else {
        tracing::info!(conn = %connection_id, "websocket closed");
    }
}
