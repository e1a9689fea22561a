//! WebSocket transport for remote observers.
//!
//! Every socket is one hub connection. Text frames carry one JSON value each,
//! in both directions.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;

use crate::{
    hub::RelayHub,
    port::{ChannelPort, Port},
};

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<RelayHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<RelayHub>) {
    let (mut sender, mut receiver) = socket.split();

    let (channel_port, mut rx) = ChannelPort::new();
    let port: Arc<dyn Port> = channel_port;
    tracing::debug!(port = %port.id(), "observer connected");

    // Forward hub traffic to the socket
    let send_task = tokio::spawn(async move {
        while let Some(value) = rx.recv().await {
            let json = match serde_json::to_string(&value) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let value: Value = match serde_json::from_str(&msg) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                continue;
            }
        };

        hub.on_port_message(&port, &value);
    }

    hub.on_disconnect(port.id());
    tracing::debug!(port = %port.id(), "observer disconnected");
    send_task.abort();
}

/// Create the relay router, serving observers at `/relay`.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_relay_router(hub));
/// ```
#[must_use]
pub fn create_relay_router(hub: Arc<RelayHub>) -> axum::Router {
    axum::Router::new()
        .route("/relay", axum::routing::get(ws_handler))
        .with_state(hub)
}
