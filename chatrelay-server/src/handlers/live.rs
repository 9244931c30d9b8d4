use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::middleware::CurrentSession;
use crate::services::fanout::LiveFanout;

/// `GET /{room_id}/live` upgraded to a WebSocket streaming the room's
/// messages as they flow through the log.
pub async fn live_socket(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(room_id, identity = %session.identity_id, "viewer connecting");
    ws.on_upgrade(move |socket| stream_live(socket, state.fanout, room_id))
}

/// Forwards broadcast payloads to one viewer until either side goes away.
/// The registration drops with this function, deregistering the viewer.
async fn stream_live(mut socket: WebSocket, fanout: Arc<LiveFanout>, room_id: String) {
    let mut viewer = fanout.register(&room_id);
    loop {
        tokio::select! {
            payload = viewer.recv() => {
                // None means the fan-out dropped this viewer as stalled.
                let Some(payload) = payload else { break };
                let Ok(text) = String::from_utf8(payload) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!(room_id, "viewer disconnected");
}
