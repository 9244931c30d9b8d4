use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
};
use tracing::info;

use crate::app_state::AppState;
use crate::middleware::CurrentSession;
use crate::services::ingest::MessageIngest;

/// `GET /{room_id}/send` upgraded to a WebSocket carrying inbound frames.
pub async fn send_socket(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    CurrentSession(session): CurrentSession,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(room_id, identity = %session.identity_id, "sender connecting");
    ws.on_upgrade(move |socket| MessageIngest::new(state.log, room_id, session).run(socket))
}
