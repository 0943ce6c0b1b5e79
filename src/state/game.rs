use std::time::SystemTime;

use uuid::Uuid;

use crate::dao::models::{MoveEntity, PlayerEntity};

/// A player's membership in a live session.
///
/// Distinct from the user identity: a user keeps the same [`PlayerRef`] across
/// reconnects, and `connection_id` is a weak lookup key, never ownership — a
/// player can exist with no live connection.
#[derive(Debug, Clone)]
pub struct PlayerRef {
    /// Stable membership id, handed to the client for reconnection.
    pub id: Uuid,
    /// Underlying user identity.
    pub user_id: Uuid,
    /// Display name at the time of joining.
    pub display_name: String,
    /// Whether this player created the lobby.
    pub is_host: bool,
    /// Whether the player completed the setup step.
    pub is_ready: bool,
    /// Hidden per-player setup value. Redacted from public snapshots.
    pub secret_word: Option<String>,
    /// Live connection currently bound to this player, if any.
    pub connection_id: Option<Uuid>,
    /// Whether the player was knocked out of the turn rotation.
    pub eliminated: bool,
}

impl PlayerRef {
    /// Whether a live connection is currently bound to this player.
    pub fn is_connected(&self) -> bool {
        self.connection_id.is_some()
    }
}

impl From<PlayerEntity> for PlayerRef {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            display_name: value.display_name,
            is_host: value.is_host,
            is_ready: value.is_ready,
            secret_word: value.secret_word,
            // Connections never survive a restart.
            connection_id: None,
            eliminated: value.eliminated,
        }
    }
}

impl From<PlayerRef> for PlayerEntity {
    fn from(value: PlayerRef) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            display_name: value.display_name,
            is_host: value.is_host,
            is_ready: value.is_ready,
            secret_word: value.secret_word,
            eliminated: value.eliminated,
        }
    }
}

/// Immutable entry of the append-only move log.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    /// Primary key of the move.
    pub id: Uuid,
    /// Player that submitted the move.
    pub player_id: Uuid,
    /// Submitted word, normalized lowercase.
    pub value: String,
    /// Submission timestamp; log order breaks ties.
    pub created_at: SystemTime,
}

impl MoveRecord {
    /// Build a fresh record for a just-accepted word.
    pub fn new(player_id: Uuid, value: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            value,
            created_at: SystemTime::now(),
        }
    }

    /// Convert into the persisted form, attaching the owning session.
    pub fn into_entity(self, session_id: Uuid) -> MoveEntity {
        MoveEntity {
            id: self.id,
            session_id,
            player_id: self.player_id,
            value: self.value,
            created_at: self.created_at,
        }
    }
}

impl From<MoveEntity> for MoveRecord {
    fn from(value: MoveEntity) -> Self {
        Self {
            id: value.id,
            player_id: value.player_id,
            value: value.value,
            created_at: value.created_at,
        }
    }
}

/// Why a completed session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    /// Every player's latest word converged on the same value.
    WordsMatched,
    /// All other players were eliminated from the turn rotation.
    LastStanding,
    /// Opponents left mid-game.
    Forfeit,
}

/// Terminal result of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Players credited with the win (all of them for cooperative variants).
    pub winner_ids: Vec<Uuid>,
    /// The winning value, when the variant has one.
    pub winning_value: Option<String>,
    /// How the session ended.
    pub reason: OutcomeReason,
}
