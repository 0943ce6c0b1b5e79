use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::storage::StorageResult;
use crate::state::session::{SessionInstance, SessionState};

/// What one idle sweep did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Idle non-terminal sessions that were abandoned (and kept for pickup).
    pub abandoned: Vec<Uuid>,
    /// Idle terminal sessions evicted from memory.
    pub evicted: Vec<Uuid>,
}

/// Authoritative map of live sessions.
///
/// Every session a client can reach is in here; storage is only consulted to
/// hydrate a session that fell out of memory (restart, eviction). Lookups by
/// lobby id fall back to storage the same way.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<SessionInstance>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created session.
    pub fn insert(&self, state: SessionState) -> Arc<SessionInstance> {
        let instance = SessionInstance::new(state);
        self.sessions.insert(instance.id(), Arc::clone(&instance));
        instance
    }

    /// Look up a live session without touching storage.
    pub fn get(&self, id: Uuid) -> Option<Arc<SessionInstance>> {
        self.sessions.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Handles to every live session, for the lobby browser.
    pub fn all(&self) -> Vec<Arc<SessionInstance>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Resolve a session by id, hydrating from storage on a memory miss.
    ///
    /// The id is tried as a session id first and as a lobby id second, so
    /// clients can present either.
    pub async fn resolve(
        &self,
        id: Uuid,
        store: Option<&Arc<dyn GameStore>>,
    ) -> StorageResult<Option<Arc<SessionInstance>>> {
        if let Some(instance) = self.get(id) {
            return Ok(Some(instance));
        }
        if let Some(instance) = self.find_by_lobby(id) {
            return Ok(Some(instance));
        }

        let Some(store) = store else {
            return Ok(None);
        };

        let entity = match store.find_session(id).await? {
            Some(entity) => Some(entity),
            None => store.find_session_by_lobby(id).await?,
        };
        let Some(entity) = entity else {
            return Ok(None);
        };

        // Another task may have hydrated the same session concurrently; the
        // first insert wins and the duplicate state is dropped.
        let session_id = entity.id;
        let instance = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| SessionInstance::new(SessionState::from_entity(entity)));
        info!(session_id = %session_id, "session hydrated from storage");
        Ok(Some(Arc::clone(&instance)))
    }

    /// Drop a session from memory. Storage records are untouched.
    pub fn remove(&self, id: Uuid) -> Option<Arc<SessionInstance>> {
        self.sessions.remove(&id).map(|(_, instance)| instance)
    }

    fn find_by_lobby(&self, lobby_id: Uuid) -> Option<Arc<SessionInstance>> {
        self.sessions.iter().find_map(|entry| {
            let instance = entry.value();
            (instance.lobby_id() == lobby_id).then(|| Arc::clone(instance))
        })
    }

    /// One pass of the idle sweep, with an injectable clock for tests.
    ///
    /// Sessions idle past `idle_threshold` are abandoned if still running,
    /// and evicted from memory once terminal. An abandoned session survives
    /// one more sweep interval so its final state can still be read.
    pub async fn sweep_once(&self, now: SystemTime, idle_threshold: Duration) -> SweepReport {
        let mut report = SweepReport::default();

        for instance in self.all() {
            let mut state = instance.lock().await;
            if state.idle_for(now) < idle_threshold {
                continue;
            }

            if state.phase().is_terminal() {
                drop(state);
                self.sessions.remove(&instance.id());
                report.evicted.push(instance.id());
            } else if state.abandon() {
                warn!(session_id = %state.id, "idle session abandoned by sweep");
                report.abandoned.push(state.id);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;
    use crate::dao::models::{BatchOp, GameType};
    use crate::state::phase::SessionPhase;

    fn sample_state() -> SessionState {
        SessionState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "registry test".into(),
            Uuid::new_v4(),
            GameType::WordMatch,
            None,
        )
    }

    #[tokio::test]
    async fn resolve_prefers_memory_over_storage() {
        let registry = SessionRegistry::new();
        let instance = registry.insert(sample_state());

        let found = registry
            .resolve(instance.id(), None)
            .await
            .unwrap()
            .expect("live session");
        assert!(Arc::ptr_eq(&found, &instance));
    }

    #[tokio::test]
    async fn resolve_accepts_the_lobby_id() {
        let registry = SessionRegistry::new();
        let state = sample_state();
        let lobby_id = state.lobby_id;
        let instance = registry.insert(state);

        let found = registry
            .resolve(lobby_id, None)
            .await
            .unwrap()
            .expect("resolved via lobby id");
        assert_eq!(found.id(), instance.id());
    }

    #[tokio::test]
    async fn resolve_hydrates_from_storage_on_miss() {
        let registry = SessionRegistry::new();
        let store = MemoryGameStore::new();
        let state = sample_state();
        let session_id = state.id;
        store
            .apply_batch(vec![BatchOp::SaveSession(state.entity())])
            .await
            .unwrap();

        let store: Arc<dyn GameStore> = Arc::new(store);
        let found = registry
            .resolve(session_id, Some(&store))
            .await
            .unwrap()
            .expect("hydrated");
        assert_eq!(found.id(), session_id);
        assert_eq!(registry.len(), 1);

        // A second resolve hits memory, not storage.
        let again = registry
            .resolve(session_id, Some(&store))
            .await
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&again, &found));
    }

    #[tokio::test]
    async fn resolve_without_store_misses_quietly() {
        let registry = SessionRegistry::new();
        let missing = registry.resolve(Uuid::new_v4(), None).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn sweep_abandons_idle_sessions_then_evicts_them() {
        let registry = SessionRegistry::new();
        let instance = registry.insert(sample_state());
        let threshold = Duration::from_secs(24 * 60 * 60);

        // Fresh sessions survive the sweep.
        let report = registry.sweep_once(SystemTime::now(), threshold).await;
        assert_eq!(report, SweepReport::default());

        let long_idle = SystemTime::now() + threshold + Duration::from_secs(1);
        let report = registry.sweep_once(long_idle, threshold).await;
        assert_eq!(report.abandoned, vec![instance.id()]);
        assert!(report.evicted.is_empty());
        assert_eq!(instance.lock().await.phase(), SessionPhase::Abandoned);
        assert_eq!(registry.len(), 1);

        // Now terminal and still idle: the next sweep evicts it.
        let report = registry.sweep_once(long_idle, threshold).await;
        assert_eq!(report.evicted, vec![instance.id()]);
        assert!(registry.is_empty());
    }
}
