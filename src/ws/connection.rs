// Per-connection send/recv loop, grounded on
// `nisarsyed-openconv/apps/server/src/ws/connection.rs`'s split-socket +
// `tokio::select!` shape, adapted from guild/channel fan-out to this
// module's request/reply correlation.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::registry::{ClientMessage, ConnectionEvent};
use super::WsRegistry;

const CONNECTION_CHANNEL_CAPACITY: usize = 64;

pub async fn handle_connection(socket: WebSocket, registry: Arc<WsRegistry>, client_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ConnectionEvent>(CONNECTION_CHANNEL_CAPACITY);

    registry.register(&client_id, tx);
    tracing::info!(client_id, "websocket connected");

    let send_client_id = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        let mut close_frame = CloseFrame { code: 1000, reason: "going away".into() };
        while let Some(event) = rx.recv().await {
            match event {
                ConnectionEvent::Send(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    },
                    Err(e) => {
                        tracing::error!(client_id = %send_client_id, error = %e, "failed to serialize ws frame");
                    },
                },
                ConnectionEvent::Close { code, reason } => {
                    close_frame = CloseFrame { code, reason: reason.into() };
                    break;
                },
            }
        }
        let _ = ws_sender.send(Message::Close(Some(close_frame))).await;
    });

    let recv_registry = registry.clone();
    let recv_client_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => recv_registry.touch_ping(&recv_client_id),
                Ok(ClientMessage::FileContentResponse { request_id, content, error }) => {
                    let result = match error {
                        Some(e) => Err(e),
                        None => Ok(serde_json::Value::String(content.unwrap_or_default())),
                    };
                    recv_registry.resolve(&request_id, result);
                },
                Ok(ClientMessage::SearchResultsResponse { request_id, results, error }) => {
                    let result = match error {
                        Some(e) => Err(e),
                        None => Ok(results.unwrap_or(serde_json::Value::Array(vec![]))),
                    };
                    recv_registry.resolve(&request_id, result);
                },
                Err(e) => {
                    tracing::debug!(client_id = %recv_client_id, error = %e, "ignoring unparseable ws frame");
                },
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.disconnect(&client_id);
    tracing::info!(client_id, "websocket disconnected");
}
