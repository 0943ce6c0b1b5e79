pub mod game;
pub mod phase;
pub mod registry;
pub mod rules;
pub mod session;
mod sse;
pub mod word_bomb;
pub mod word_match;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig, dao::game_store::GameStore, services::write_behind::WriteBehindQueue,
    state::registry::SessionRegistry,
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// Handle used to push messages to one connected client socket.
#[derive(Clone)]
pub struct PlayerConnection {
    /// Connection id, minted per socket. A reconnecting player gets a new one.
    pub id: Uuid,
    /// Player membership this socket is bound to.
    pub player_id: Uuid,
    /// Channel into the socket's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing live sessions, connections, and database
/// handles.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    registry: SessionRegistry,
    write_queue: WriteBehindQueue,
    rooms: DashMap<Uuid, DashMap<Uuid, PlayerConnection>>,
    sse: SseHub,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            registry: SessionRegistry::new(),
            write_queue: WriteBehindQueue::new(config.max_write_retries),
            rooms: DashMap::new(),
            sse: SseHub::new(16),
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    ///
    /// Gameplay continues from memory; pending writes stay queued until a
    /// store is installed again.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.game_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Authoritative map of live sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Queue of pending storage writes.
    pub fn write_queue(&self) -> &WriteBehindQueue {
        &self.write_queue
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Register a connection in its session's room.
    pub fn join_room(&self, session_id: Uuid, connection: PlayerConnection) {
        self.rooms
            .entry(session_id)
            .or_default()
            .insert(connection.id, connection);
    }

    /// Remove a connection from its session's room, dropping empty rooms.
    pub fn leave_room(&self, session_id: Uuid, connection_id: Uuid) {
        let emptied = match self.rooms.get(&session_id) {
            Some(room) => {
                room.remove(&connection_id);
                room.is_empty()
            }
            None => return,
        };
        if emptied {
            self.rooms
                .remove_if(&session_id, |_, room| room.is_empty());
        }
    }

    /// Snapshot the connections currently in a session's room.
    pub fn room_connections(&self, session_id: Uuid) -> Vec<PlayerConnection> {
        self.rooms
            .get(&session_id)
            .map(|room| room.iter().map(|entry| entry.value().clone()).collect())
            .unwrap_or_default()
    }

    /// Drop a whole room, e.g. when its session was abandoned.
    pub fn drop_room(&self, session_id: Uuid) {
        self.rooms.remove(&session_id);
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}
