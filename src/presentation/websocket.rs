// WebSocket hub endpoint - GET /hubs/dashboard
use crate::domain::events::ClientCommand;
use crate::infrastructure::hub::{ConnectionId, GroupHub};
use crate::presentation::app_state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

async fn handle_socket(socket: WebSocket, hub: Arc<GroupHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut frames) = hub.connect();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => apply_command(&hub, connection_id, &text),
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            },
        }
    }

    hub.disconnect(connection_id);
}

fn apply_command(hub: &GroupHub, connection_id: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Join { dashboard_id }) => {
            hub.join(connection_id, dashboard_id);
        }
        Ok(ClientCommand::Leave { dashboard_id }) => hub.leave(connection_id, dashboard_id),
        Err(e) => tracing::warn!("Ignoring malformed frame from {}: {}", connection_id, e),
    }
}
