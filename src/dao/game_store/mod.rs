pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{BatchOp, SessionEntity, UserEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for users, lobbies, sessions, and moves.
///
/// Every mutation is idempotent (create-or-replace semantics), so crash-retry
/// from the write-behind queue never duplicates records.
pub trait GameStore: Send + Sync {
    /// Create or update a user keyed by its normalized username, returning the
    /// stored record (with the pre-existing id when the username was taken).
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<UserEntity>>;
    /// Load a session aggregate by id, with moves assembled in log order.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Load a session aggregate by its owning lobby id.
    fn find_session_by_lobby(
        &self,
        lobby_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Apply a drained write-behind batch as a single all-or-nothing unit.
    fn apply_batch(&self, ops: Vec<BatchOp>) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
