use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{Command, SessionHandle};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(session): State<SessionHandle>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

/// Pump one connection: engine output to the socket, socket input to the
/// engine. The connection ends when either side goes away.
async fn handle_socket(socket: WebSocket, session: SessionHandle) {
    let id = ulid::Ulid::new().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (sink, mut outbound) = mpsc::unbounded_channel::<ServerMessage>();

    if session
        .send(Command::Connect {
            id: id.clone(),
            sink,
        })
        .is_err()
    {
        tracing::error!("Session engine unavailable, dropping connection {}", id);
        return;
    }
    tracing::info!("WebSocket connected: {}", id);

    loop {
        tokio::select! {
            msg = outbound.recv() => {
                match msg {
                    Some(msg) => {
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("Failed to serialize {}: {}", msg.event_name(), e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // The engine dropped our sink (kick)
                    None => {
                        tracing::info!("Connection {} closed by server", id);
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received from {}: {}", id, text.as_str());

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if session.send(Command::Client { from: id.clone(), msg }).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse message from {}: {}", id, e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    message: format!("Invalid message format: {}", e),
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
                        tracing::error!("WebSocket error on {}: {}", id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = session.send(Command::Disconnect { id: id.clone() });
    tracing::info!("WebSocket connection closed: {}", id);
}
