use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{BatchOp, LobbyEntity, MoveEntity, SessionEntity, UserEntity},
    storage::{StorageError, StorageResult},
};

/// In-process storage backend.
///
/// Used by unit tests and by builds without the `mongo-store` feature. Data
/// does not survive a restart, which is acceptable: the registry is the
/// authority and persistence is best-effort by design.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<Mutex<MemoryState>>,
    fail_writes: Arc<AtomicBool>,
}

#[derive(Default, Clone)]
struct MemoryState {
    users: HashMap<String, UserEntity>,
    lobbies: HashMap<Uuid, LobbyEntity>,
    sessions: HashMap<Uuid, SessionEntity>,
    moves: HashMap<Uuid, Vec<MoveEntity>>,
}

/// Stand-in io error used when simulating write failures.
#[derive(Debug, thiserror::Error)]
#[error("simulated write failure")]
struct SimulatedFailure;

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for exercising retry paths in tests.
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Number of moves recorded for a session.
    pub fn move_count(&self, session_id: Uuid) -> usize {
        let state = self.inner.lock().expect("memory store poisoned");
        state.moves.get(&session_id).map_or(0, Vec::len)
    }

    /// Number of distinct users stored.
    pub fn user_count(&self) -> usize {
        let state = self.inner.lock().expect("memory store poisoned");
        state.users.len()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store write rejected".into(),
                SimulatedFailure,
            ));
        }
        Ok(())
    }

    fn assemble_session(state: &MemoryState, session: &SessionEntity) -> SessionEntity {
        let mut aggregate = session.clone();
        let mut moves = state
            .moves
            .get(&session.id)
            .cloned()
            .unwrap_or_default();
        // Sort is stable, so equal timestamps keep insertion order.
        moves.sort_by_key(|mv| mv.created_at);
        aggregate.moves = moves;
        aggregate
    }

    fn apply_op(state: &mut MemoryState, op: BatchOp) {
        match op {
            BatchOp::UpsertUser(user) => {
                state
                    .users
                    .entry(user.username.clone())
                    .and_modify(|existing| existing.display_name = user.display_name.clone())
                    .or_insert(user);
            }
            BatchOp::SaveLobby(lobby) => {
                state.lobbies.insert(lobby.id, lobby);
            }
            BatchOp::SaveSession(session) => {
                state.sessions.insert(session.id, session);
            }
            BatchOp::SavePlayer { session_id, player } => {
                if let Some(session) = state.sessions.get_mut(&session_id) {
                    match session.players.iter_mut().find(|p| p.id == player.id) {
                        Some(slot) => *slot = player,
                        None => session.players.push(player),
                    }
                }
            }
            BatchOp::AppendMove(mv) => {
                let log = state.moves.entry(mv.session_id).or_default();
                // Append-only: a retried op with a known id is a no-op.
                if !log.iter().any(|existing| existing.id == mv.id) {
                    log.push(mv);
                }
            }
        }
    }
}

impl GameStore for MemoryGameStore {
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<UserEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            let mut state = store.inner.lock().expect("memory store poisoned");
            let entry = state
                .users
                .entry(user.username.clone())
                .and_modify(|existing| existing.display_name = user.display_name.clone())
                .or_insert(user);
            Ok(entry.clone())
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.lock().expect("memory store poisoned");
            Ok(state
                .sessions
                .get(&id)
                .map(|session| Self::assemble_session(&state, session)))
        })
    }

    fn find_session_by_lobby(
        &self,
        lobby_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let state = store.inner.lock().expect("memory store poisoned");
            Ok(state
                .sessions
                .values()
                .find(|session| session.lobby_id == lobby_id)
                .map(|session| Self::assemble_session(&state, session)))
        })
    }

    fn apply_batch(&self, ops: Vec<BatchOp>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_writable()?;
            let mut state = store.inner.lock().expect("memory store poisoned");
            // Stage on a copy so a panic mid-batch cannot leave a partial write.
            let mut staged = state.clone();
            for op in ops {
                Self::apply_op(&mut staged, op);
            }
            *state = staged;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
