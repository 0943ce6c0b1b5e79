use serde::Serialize;
use uuid::Uuid;

use crate::dao::models::{GameType, LobbyStatus};
use crate::dto::format_system_time;
use crate::state::session::SessionState;

/// One row of the lobby browser.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub game_type: GameType,
    pub status: LobbyStatus,
    pub players: usize,
    pub max_players: usize,
    pub joinable: bool,
    pub created_at: String,
}

impl GameSummary {
    /// Capture a browser row from live state.
    pub fn capture(state: &SessionState) -> Self {
        Self {
            id: state.id,
            lobby_id: state.lobby_id,
            title: state.title.clone(),
            host: state
                .players
                .values()
                .find(|player| player.is_host)
                .map(|player| player.display_name.clone()),
            game_type: state.game_type,
            status: state.lobby_entity().status,
            players: state.players.len(),
            max_players: state.max_players,
            joinable: state.phase().is_joinable() && state.players.len() < state.max_players,
            created_at: format_system_time(state.created_at),
        }
    }
}

/// Response body of `GET /games`.
#[derive(Debug, Serialize)]
pub struct GameListResponse {
    pub games: Vec<GameSummary>,
}
