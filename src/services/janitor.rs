//! Idle sweep: reclaims sessions nobody has touched for a long time.

use std::time::SystemTime;

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::dao::models::BatchOp;
use crate::dto::ws::ServerMessage;
use crate::services::events;
use crate::services::write_behind::WritePriority;
use crate::state::SharedState;

/// Periodically abandon idle sessions and evict idle terminal ones.
pub async fn run_idle_sweep(state: SharedState) {
    let mut ticker = tokio::time::interval(state.config().sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let report = state
            .registry()
            .sweep_once(SystemTime::now(), state.config().idle_threshold)
            .await;

        for session_id in &report.abandoned {
            events::broadcast_room(&state, *session_id, &ServerMessage::GameAbandoned);
            if let Some(session) = state.registry().get(*session_id) {
                let guard = session.lock().await;
                state.write_queue().enqueue(
                    WritePriority::Completion,
                    [
                        BatchOp::SaveSession(guard.entity()),
                        BatchOp::SaveLobby(guard.lobby_entity()),
                    ],
                );
            }
            state.drop_room(*session_id);
        }
        for session_id in &report.evicted {
            state.drop_room(*session_id);
        }

        if !report.abandoned.is_empty() {
            info!(
                abandoned = report.abandoned.len(),
                evicted = report.evicted.len(),
                "idle sweep reclaimed sessions"
            );
            events::broadcast_game_list_changed(&state).await;
        }
    }
}
