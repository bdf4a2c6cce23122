//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each client receives the shared generation feed and may ask for a new plan.

use crate::web::{
    plan_task::plan_process,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    // The sender is shared between the feed forwarder and error replies.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // --- 1. Forward the shared event feed ---
    let mut events = app_state.events.subscribe();
    let forwarder = {
        let ws_sender = ws_sender.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(message) => {
                        if send_message(&ws_sender, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("WebSocket client lagged; skipped {} events.", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::RequestPlan) => {
                    info!("RequestPlan message received.");
                    tokio::spawn(plan_process(app_state.clone()));
                }
                Err(e) => {
                    warn!("Failed to deserialize client message: {}", e);
                    let reply = ServerMessage::Error {
                        message: format!("Unrecognized message: {}", e),
                    };
                    if send_message(&ws_sender, &reply).await.is_err() {
                        break;
                    }
                }
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    forwarder.abort();
    info!("WebSocket connection closed.");
}

async fn send_message(
    ws_sender: &Mutex<SplitSink<WebSocket, Message>>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    ws_sender.lock().await.send(Message::Text(json.into())).await
}
