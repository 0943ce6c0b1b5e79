use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoLobbyDocument, MongoMoveDocument, MongoSessionDocument, MongoUserDocument, doc_id,
        uuid_as_binary,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{BatchOp, MoveEntity, SessionEntity, UserEntity},
    storage::StorageResult,
};

const USER_COLLECTION_NAME: &str = "users";
const LOBBY_COLLECTION_NAME: &str = "lobbies";
const SESSION_COLLECTION_NAME: &str = "games";
const MOVE_COLLECTION_NAME: &str = "moves";

/// MongoDB-backed [`GameStore`] implementation.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let users = database.collection::<MongoUserDocument>(USER_COLLECTION_NAME);
        let username_index = mongodb::IndexModel::builder()
            .keys(doc! {"username": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_username_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        users
            .create_index(username_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_COLLECTION_NAME,
                index: "username",
                source,
            })?;

        let sessions = database.collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME);
        let lobby_index = mongodb::IndexModel::builder()
            .keys(doc! {"lobby_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_lobby_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        sessions
            .create_index(lobby_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "lobby_id",
                source,
            })?;

        // Moves are queried per session in chronological order.
        let moves = database.collection::<MongoMoveDocument>(MOVE_COLLECTION_NAME);
        let move_index = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "created_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("move_session_idx".to_owned()))
                    .build(),
            )
            .build();
        moves
            .create_index(move_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MOVE_COLLECTION_NAME,
                index: "session_id,created_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn user_collection(&self) -> Collection<MongoUserDocument> {
        self.database()
            .await
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
    }

    async fn lobby_collection(&self) -> Collection<MongoLobbyDocument> {
        self.database()
            .await
            .collection::<MongoLobbyDocument>(LOBBY_COLLECTION_NAME)
    }

    async fn session_collection(&self) -> Collection<MongoSessionDocument> {
        self.database()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn move_collection(&self) -> Collection<MongoMoveDocument> {
        self.database()
            .await
            .collection::<MongoMoveDocument>(MOVE_COLLECTION_NAME)
    }

    async fn upsert_user(&self, user: UserEntity) -> MongoResult<UserEntity> {
        let collection = self.user_collection().await;
        let username = user.username.clone();

        // The unique username index makes this race-safe: the first writer
        // wins the id, later upserts only refresh the display name.
        let document = collection
            .find_one_and_update(
                doc! {"username": &username},
                doc! {
                    "$set": {"display_name": &user.display_name},
                    "$setOnInsert": {"_id": uuid_as_binary(user.id), "username": &username},
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpsertUser {
                username: username.clone(),
                source,
            })?;

        Ok(document.map(Into::into).unwrap_or(user))
    }

    async fn save_session_document(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let document: MongoSessionDocument = session.into();
        self.session_collection()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;
        Ok(())
    }

    async fn append_move(&self, mv: MoveEntity) -> MongoResult<()> {
        let id = mv.id;
        let document: MongoMoveDocument = mv.into();
        // replace_one + upsert keeps retried appends idempotent by move id.
        self.move_collection()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::AppendMove { id, source })?;
        Ok(())
    }

    async fn apply_batch(&self, ops: Vec<BatchOp>) -> MongoResult<()> {
        // Applied sequentially; the first failure aborts the remainder and the
        // queue retries the whole batch. Every op is idempotent, so replayed
        // prefixes are harmless.
        for op in ops {
            match op {
                BatchOp::UpsertUser(user) => {
                    self.upsert_user(user).await?;
                }
                BatchOp::SaveLobby(lobby) => {
                    let id = lobby.id;
                    let document: MongoLobbyDocument = lobby.into();
                    self.lobby_collection()
                        .await
                        .replace_one(doc_id(id), &document)
                        .upsert(true)
                        .await
                        .map_err(|source| MongoDaoError::SaveLobby { id, source })?;
                }
                BatchOp::SaveSession(session) => {
                    self.save_session_document(session).await?;
                }
                BatchOp::SavePlayer { session_id, player } => {
                    let filter = doc! {
                        "_id": uuid_as_binary(session_id),
                        "players.id": uuid_as_binary(player.id),
                    };
                    let update = doc! {
                        "$set": {
                            "players.$.is_ready": player.is_ready,
                            "players.$.eliminated": player.eliminated,
                            "players.$.secret_word": player.secret_word.clone(),
                            "players.$.display_name": player.display_name.clone(),
                        }
                    };
                    self.session_collection()
                        .await
                        .update_one(filter, update)
                        .await
                        .map_err(|source| MongoDaoError::SaveSession {
                            id: session_id,
                            source,
                        })?;
                }
                BatchOp::AppendMove(mv) => {
                    self.append_move(mv).await?;
                }
            }
        }
        Ok(())
    }

    async fn assemble_moves(&self, session: &mut SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let documents: Vec<MongoMoveDocument> = self
            .move_collection()
            .await
            .find(doc! {"session_id": uuid_as_binary(id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;

        session.moves = documents.into_iter().map(Into::into).collect();
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .session_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;

        let Some(document) = document else {
            return Ok(None);
        };

        let mut session: SessionEntity = document.into();
        self.assemble_moves(&mut session).await?;
        Ok(Some(session))
    }

    async fn find_session_by_lobby(&self, lobby_id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .session_collection()
            .await
            .find_one(doc! {"lobby_id": uuid_as_binary(lobby_id)})
            .await
            .map_err(|source| MongoDaoError::LoadSessionByLobby { lobby_id, source })?;

        let Some(document) = document else {
            return Ok(None);
        };

        let mut session: SessionEntity = document.into();
        self.assemble_moves(&mut session).await?;
        Ok(Some(session))
    }
}

impl GameStore for MongoGameStore {
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<UserEntity>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_user(user).await.map_err(Into::into) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn find_session_by_lobby(
        &self,
        lobby_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_session_by_lobby(lobby_id)
                .await
                .map_err(Into::into)
        })
    }

    fn apply_batch(&self, ops: Vec<BatchOp>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.apply_batch(ops).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
