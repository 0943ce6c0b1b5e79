use serde::Serialize;
use uuid::Uuid;

use crate::dao::models::GameType;
use crate::dto::format_system_time;
use crate::state::game::{Outcome, OutcomeReason};
use crate::state::phase::SessionPhase;
use crate::state::session::SessionState;

/// A roster entry as shown to every participant. Secrets never appear here.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerPublic {
    pub id: Uuid,
    pub display_name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub connected: bool,
    pub eliminated: bool,
}

/// One move as shown to participants.
#[derive(Debug, Clone, Serialize)]
pub struct MoveSummary {
    pub player_id: Uuid,
    pub word: String,
    pub created_at: String,
}

/// Terminal result as shown to participants.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub winner_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_value: Option<String>,
    pub reason: OutcomeReason,
}

impl From<&Outcome> for OutcomeSummary {
    fn from(value: &Outcome) -> Self {
        Self {
            winner_ids: value.winner_ids.clone(),
            winning_value: value.winning_value.clone(),
            reason: value.reason,
        }
    }
}

/// Full session view broadcast to the room.
///
/// Built from live state under the session lock; everything here is safe for
/// every participant to see.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub lobby_id: Uuid,
    pub title: String,
    pub game_type: GameType,
    pub phase: &'static str,
    pub max_players: usize,
    pub players: Vec<PlayerPublic>,
    pub moves: Vec<MoveSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_letter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeSummary>,
    pub created_at: String,
}

impl SessionSnapshot {
    /// Capture the shareable view of a session.
    pub fn capture(state: &SessionState) -> Self {
        Self {
            id: state.id,
            lobby_id: state.lobby_id,
            title: state.title.clone(),
            game_type: state.game_type,
            phase: phase_label(state.phase()),
            max_players: state.max_players,
            players: state
                .players
                .values()
                .map(|player| PlayerPublic {
                    id: player.id,
                    display_name: player.display_name.clone(),
                    is_host: player.is_host,
                    is_ready: player.is_ready,
                    connected: player.is_connected(),
                    eliminated: player.eliminated,
                })
                .collect(),
            moves: state
                .moves
                .iter()
                .map(|mv| MoveSummary {
                    player_id: mv.player_id,
                    word: mv.value.clone(),
                    created_at: format_system_time(mv.created_at),
                })
                .collect(),
            current_turn: state.current_turn(),
            required_letter: state.required_letter,
            outcome: state.outcome.as_ref().map(OutcomeSummary::from),
            created_at: format_system_time(state.created_at),
        }
    }
}

/// Per-player view: the shared snapshot plus this player's own hidden data.
///
/// `secret_word` is filled only for variants that reveal a player's own
/// secret back to them; other players' secrets are never serialized at all.
#[derive(Debug, Clone, Serialize)]
pub struct PrivateSnapshot {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub player_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_word: Option<String>,
}

impl PrivateSnapshot {
    /// Capture the view handed to one particular player.
    pub fn capture(state: &SessionState, player_id: Uuid) -> Self {
        let secret_word = state
            .rules()
            .reveal_own_secret()
            .then(|| {
                state
                    .players
                    .get(&player_id)
                    .and_then(|player| player.secret_word.clone())
            })
            .flatten();

        Self {
            session: SessionSnapshot::capture(state),
            player_id,
            secret_word,
        }
    }
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::WaitingForPlayers => "waiting_for_players",
        SessionPhase::SettingUp => "setting_up",
        SessionPhase::Active => "active",
        SessionPhase::Completed => "completed",
        SessionPhase::Abandoned => "abandoned",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_match() -> (SessionState, Uuid, Uuid) {
        let mut state = SessionState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "snapshot test".into(),
            Uuid::new_v4(),
            GameType::WordMatch,
            None,
        );
        let p1 = state.join(state.host_id, "Host").unwrap().player_id;
        let p2 = state.join(Uuid::new_v4(), "Guest").unwrap().player_id;
        state.set_ready(p1, Some("apple")).unwrap();
        state.set_ready(p2, Some("banana")).unwrap();
        (state, p1, p2)
    }

    #[test]
    fn public_snapshot_never_contains_secrets() {
        let (state, _, _) = two_player_match();
        let snapshot = SessionSnapshot::capture(&state);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("apple"));
        assert!(!json.contains("banana"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn private_snapshot_reveals_only_your_own_secret() {
        let (state, p1, _) = two_player_match();
        let snapshot = PrivateSnapshot::capture(&state, p1);
        assert_eq!(snapshot.secret_word.as_deref(), Some("apple"));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("apple"));
        assert!(!json.contains("banana"));
    }

    #[test]
    fn word_bomb_hides_even_your_own_setup_data() {
        let mut state = SessionState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "chain".into(),
            Uuid::new_v4(),
            GameType::WordBomb,
            Some(2),
        );
        let p1 = state.join(Uuid::new_v4(), "P1").unwrap().player_id;
        let snapshot = PrivateSnapshot::capture(&state, p1);
        assert!(snapshot.secret_word.is_none());
    }
}
