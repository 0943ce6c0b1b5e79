use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Game variants supported by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Cooperative convergence game: players win when their latest words match.
    WordMatch,
    /// Turn-based chain game: each word must continue the previous one.
    WordBomb,
}

impl Default for GameType {
    fn default() -> Self {
        GameType::WordMatch
    }
}

/// Lifecycle status of a persisted lobby.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyStatus {
    /// Waiting for players to fill the roster.
    Waiting,
    /// Roster complete, players are readying up.
    Ready,
    /// The attached session is being played.
    InGame,
    /// The attached session completed normally.
    Finished,
    /// The lobby was abandoned before or during play.
    Abandoned,
}

/// Persisted phase of a game session, mirroring the runtime state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEntity {
    /// Roster is still filling up.
    WaitingForPlayers,
    /// Players are submitting their hidden setup data.
    SettingUp,
    /// Moves are being exchanged.
    Active,
    /// A win condition was reached.
    Completed,
    /// The session was abandoned.
    Abandoned,
}

impl PhaseEntity {
    /// Whether this phase accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, PhaseEntity::Completed | PhaseEntity::Abandoned)
    }
}

/// Identity record created idempotently on first use of a nickname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: Uuid,
    /// Unique normalized (lowercase, trimmed) nickname.
    pub username: String,
    /// Display name as originally typed.
    pub display_name: String,
}

/// Pre-game grouping of players; owns at most one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LobbyEntity {
    /// Primary key of the lobby.
    pub id: Uuid,
    /// Title shown in the lobby browser.
    pub title: String,
    /// Game variant the lobby was created for.
    pub game_type: GameType,
    /// Current lifecycle status.
    pub status: LobbyStatus,
    /// Maximum roster size.
    pub max_players: usize,
    /// User that created the lobby.
    pub host_id: Uuid,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time this lobby was updated.
    pub updated_at: SystemTime,
}

/// A player's membership within a lobby/session, distinct from the user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the membership record.
    pub id: Uuid,
    /// Underlying user identity.
    pub user_id: Uuid,
    /// Display name at the time of joining.
    pub display_name: String,
    /// Whether this player created the lobby.
    pub is_host: bool,
    /// Whether the player completed the setup step.
    pub is_ready: bool,
    /// Hidden per-player setup value (e.g. the secret word). Never broadcast.
    pub secret_word: Option<String>,
    /// Whether the player was eliminated from the turn rotation.
    pub eliminated: bool,
}

/// Immutable append-only move record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveEntity {
    /// Primary key of the move.
    pub id: Uuid,
    /// Session this move belongs to.
    pub session_id: Uuid,
    /// Player that submitted the move.
    pub player_id: Uuid,
    /// Submitted word, normalized lowercase.
    pub value: String,
    /// Submission timestamp; log order breaks ties.
    pub created_at: SystemTime,
}

/// Aggregate session entity persisted by the storage layer.
///
/// Players are embedded in the session document; moves are stored separately
/// (append-only) and assembled in `created_at` order on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Owning lobby (one-to-one).
    pub lobby_id: Uuid,
    /// Lobby title, denormalized so hydration is a single read.
    pub title: String,
    /// Roster capacity, denormalized from the lobby.
    pub max_players: usize,
    /// User that created the lobby.
    pub host_id: Uuid,
    /// Game variant.
    pub game_type: GameType,
    /// Persisted phase.
    pub phase: PhaseEntity,
    /// Roster in join order.
    pub players: Vec<PlayerEntity>,
    /// Move log in chronological order.
    pub moves: Vec<MoveEntity>,
    /// Winning value once the session completed, if the variant has one.
    pub winning_value: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time this session was updated.
    pub updated_at: SystemTime,
}

/// Write operation drained from the write-behind queue.
///
/// A batch of these is applied atomically by [`GameStore::apply_batch`].
///
/// [`GameStore::apply_batch`]: crate::dao::game_store::GameStore::apply_batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Idempotent user upsert keyed by normalized username.
    UpsertUser(UserEntity),
    /// Create or replace a lobby record.
    SaveLobby(LobbyEntity),
    /// Create or replace a session aggregate (players embedded, moves excluded).
    SaveSession(SessionEntity),
    /// Update a single player membership inside a session.
    SavePlayer {
        /// Session owning the membership.
        session_id: Uuid,
        /// The membership record.
        player: PlayerEntity,
    },
    /// Append a move record. Moves are never updated or deleted.
    AppendMove(MoveEntity),
}
