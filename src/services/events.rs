//! Fan-out helpers for room broadcasts and the public SSE stream.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::dto::game::GameSummary;
use crate::dto::public::SessionSnapshot;
use crate::dto::sse::{GameListChangedEvent, ServerEvent, SystemStatus};
use crate::dto::ws::ServerMessage;
use crate::state::{SharedState, session::SessionInstance};

/// Serialize a payload and push it onto one connection's writer channel.
///
/// Send failures mean the socket is going away; the disconnect path cleans
/// the room up, so they are only logged here.
pub fn send_to_connection<T>(tx: &mpsc::UnboundedSender<Message>, value: &T)
where
    T: ?Sized + serde::Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound message");
            return;
        }
    };
    let _ = tx.send(Message::Text(payload.into()));
}

/// Push an event to every connection in a session's room.
pub fn broadcast_room(state: &SharedState, session_id: Uuid, message: &ServerMessage) {
    for connection in state.room_connections(session_id) {
        send_to_connection(&connection.tx, message);
    }
}

/// Push a refreshed full snapshot to a session's room.
pub async fn broadcast_snapshot(state: &SharedState, session: &Arc<SessionInstance>) {
    let snapshot = {
        let guard = session.lock().await;
        SessionSnapshot::capture(&guard)
    };
    broadcast_room(
        state,
        session.id(),
        &ServerMessage::GameState { snapshot },
    );
}

/// Announce a change to the set of browsable games on the SSE stream.
pub async fn broadcast_game_list_changed(state: &SharedState) {
    let games = collect_game_list(state).await;
    if let Ok(event) = ServerEvent::json(
        Some("game_list_changed".to_string()),
        &GameListChangedEvent { games },
    ) {
        state.sse().broadcast(event);
    }
}

/// Announce a degraded-mode flip on the SSE stream.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    if let Ok(event) = ServerEvent::json(
        Some("system_status".to_string()),
        &SystemStatus { degraded },
    ) {
        state.sse().broadcast(event);
    }
}

/// Current lobby browser rows: sessions that can still be joined.
///
/// Full, in-game, and finished sessions stay resident for their players but
/// have no business in the browser.
pub async fn collect_game_list(state: &SharedState) -> Vec<GameSummary> {
    let mut games = Vec::new();
    for session in state.registry().all() {
        let guard = session.lock().await;
        let summary = GameSummary::capture(&guard);
        if summary.joinable {
            games.push(summary);
        }
    }
    games.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    games
}
