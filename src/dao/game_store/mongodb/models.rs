use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    GameType, LobbyEntity, LobbyStatus, MoveEntity, PhaseEntity, PlayerEntity, SessionEntity,
    UserEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    username: String,
    display_name: String,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            display_name: value.display_name,
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            username: value.username,
            display_name: value.display_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLobbyDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    title: String,
    game_type: GameType,
    status: LobbyStatus,
    max_players: usize,
    host_id: Uuid,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<LobbyEntity> for MongoLobbyDocument {
    fn from(value: LobbyEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            game_type: value.game_type,
            status: value.status,
            max_players: value.max_players,
            host_id: value.host_id,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    lobby_id: Uuid,
    title: String,
    max_players: usize,
    host_id: Uuid,
    game_type: GameType,
    phase: PhaseEntity,
    players: Vec<PlayerEntity>,
    winning_value: Option<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            lobby_id: value.lobby_id,
            title: value.title,
            max_players: value.max_players,
            host_id: value.host_id,
            game_type: value.game_type,
            phase: value.phase,
            players: value.players,
            winning_value: value.winning_value,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            id: value.id,
            lobby_id: value.lobby_id,
            title: value.title,
            max_players: value.max_players,
            host_id: value.host_id,
            game_type: value.game_type,
            phase: value.phase,
            players: value.players,
            // Assembled separately from the moves collection.
            moves: Vec::new(),
            winning_value: value.winning_value,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMoveDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    session_id: Uuid,
    player_id: Uuid,
    value: String,
    created_at: DateTime,
}

impl From<MoveEntity> for MongoMoveDocument {
    fn from(value: MoveEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            player_id: value.player_id,
            value: value.value,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoMoveDocument> for MoveEntity {
    fn from(value: MongoMoveDocument) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            player_id: value.player_id,
            value: value.value,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
