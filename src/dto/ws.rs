use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::GameType;
use crate::dto::game::GameSummary;
use crate::dto::public::{OutcomeSummary, PrivateSnapshot, SessionSnapshot};
use crate::dto::validation::{validate_game_title, validate_player_name};

/// Failure to turn an inbound frame into a usable request.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The frame was not valid JSON for the envelope shape.
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The frame parsed but carried invalid field values.
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// Envelope around every client request.
///
/// `request_id` is chosen by the client and echoed verbatim in the matching
/// [`Ack`], so clients can pair responses with requests over the single
/// socket.
#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub request: ClientRequest,
}

/// Requests accepted over the game WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Create a lobby plus its session and join it as host.
    CreateGame {
        player_name: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        game_type: GameType,
        #[serde(default)]
        max_players: Option<usize>,
    },
    /// Join an existing game by session or lobby id.
    JoinGame { game_id: Uuid, player_name: String },
    /// Re-bind this socket to an existing membership after a drop.
    Reconnect { game_id: Uuid, player_id: Uuid },
    /// Mark ready, with the secret word where the variant needs one.
    Ready {
        #[serde(default)]
        secret_word: Option<String>,
    },
    /// Submit a word.
    SubmitWord { word: String },
    /// Leave the current game for good.
    LeaveGame,
    /// List browsable games.
    ListGames,
    /// Anything unrecognised; rejected with an error ack.
    #[serde(other)]
    Unknown,
}

impl ClientEnvelope {
    /// Parse and validate one inbound text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ParseError> {
        let envelope: Self = serde_json::from_str(text)?;
        envelope.validate()?;
        Ok(envelope)
    }

    fn validate(&self) -> Result<(), ParseError> {
        match &self.request {
            ClientRequest::CreateGame {
                player_name, title, ..
            } => {
                validate_player_name(player_name)
                    .map_err(|err| ParseError::Invalid(err.to_string()))?;
                if let Some(title) = title {
                    validate_game_title(title)
                        .map_err(|err| ParseError::Invalid(err.to_string()))?;
                }
                Ok(())
            }
            ClientRequest::JoinGame { player_name, .. } => validate_player_name(player_name)
                .map_err(|err| ParseError::Invalid(err.to_string())),
            _ => Ok(()),
        }
    }
}

/// Direct response to one client request, echoing its `request_id`.
#[derive(Debug, Serialize)]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Private view of the session after create/join/reconnect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<PrivateSnapshot>,
    /// Browser rows answering a `list_games` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<GameSummary>>,
}

impl Ack {
    /// Positive ack without a payload.
    pub fn ok(request_id: Option<String>) -> Self {
        Self {
            request_id,
            ok: true,
            error: None,
            game: None,
            games: None,
        }
    }

    /// Positive ack carrying the requester's private session view.
    pub fn with_game(request_id: Option<String>, game: PrivateSnapshot) -> Self {
        Self {
            game: Some(game),
            ..Self::ok(request_id)
        }
    }

    /// Positive ack carrying the lobby browser rows.
    pub fn with_games(request_id: Option<String>, games: Vec<GameSummary>) -> Self {
        Self {
            games: Some(games),
            ..Self::ok(request_id)
        }
    }

    /// Negative ack with a user-facing message.
    pub fn error(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            request_id,
            ok: false,
            error: Some(message.into()),
            game: None,
            games: None,
        }
    }
}

/// Events pushed to every connection in a session's room.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full refreshed view of the session.
    GameState { snapshot: SessionSnapshot },
    /// A player joined the roster.
    PlayerJoined { player_id: Uuid, display_name: String },
    /// A player left for good.
    PlayerLeft { player_id: Uuid },
    /// A rostered player's connection came up.
    PlayerConnected { player_id: Uuid },
    /// A rostered player's connection dropped; they may reconnect.
    PlayerDisconnected { player_id: Uuid },
    /// A move was accepted.
    MoveAccepted {
        player_id: Uuid,
        word: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_turn: Option<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required_letter: Option<char>,
    },
    /// A player ran out of time and left the rotation.
    PlayerEliminated {
        player_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_turn: Option<Uuid>,
    },
    /// The session reached a terminal outcome.
    GameOver { outcome: OutcomeSummary },
    /// The session was abandoned.
    GameAbandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_create_request_with_defaults() {
        let envelope = ClientEnvelope::from_json_str(
            r#"{"type":"create_game","player_name":"Ada","request_id":"r1"}"#,
        )
        .unwrap();
        assert_eq!(envelope.request_id.as_deref(), Some("r1"));
        match envelope.request {
            ClientRequest::CreateGame {
                player_name,
                game_type,
                max_players,
                ..
            } => {
                assert_eq!(player_name, "Ada");
                assert_eq!(game_type, GameType::WordMatch);
                assert!(max_players.is_none());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn rejects_a_blank_player_name() {
        let err = ClientEnvelope::from_json_str(
            r#"{"type":"join_game","game_id":"3fa85f64-5717-4562-b3fc-2c963f66afa6","player_name":"  "}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));
    }

    #[test]
    fn unknown_request_types_parse_as_unknown() {
        let envelope =
            ClientEnvelope::from_json_str(r#"{"type":"dance","request_id":"r9"}"#).unwrap();
        assert!(matches!(envelope.request, ClientRequest::Unknown));
        assert_eq!(envelope.request_id.as_deref(), Some("r9"));
    }

    #[test]
    fn acks_echo_the_request_id() {
        let ack = Ack::error(Some("r2".into()), "game is full");
        let json = serde_json::to_string(&ack).unwrap();
        assert!(json.contains(r#""request_id":"r2""#));
        assert!(json.contains(r#""ok":false"#));
    }
}
