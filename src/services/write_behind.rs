//! Write-behind persistence queue.
//!
//! Gameplay never waits on storage: mutations are applied in memory first and
//! the resulting writes are buffered here, to be flushed in the background.
//! During an outage the queue keeps buffering and the flush resumes once a
//! store is installed again.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::dao::{game_store::GameStore, models::BatchOp};
use crate::state::SharedState;

/// Flush priority of a pending write.
///
/// Completions flush before moves, moves before bookkeeping, so the most
/// valuable records hit storage first after an outage. Within a priority,
/// order of submission is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePriority {
    /// Terminal session state: outcome, final phase.
    Completion,
    /// Accepted move records.
    Move,
    /// Lobby and roster bookkeeping, user upserts.
    Bookkeeping,
}

#[derive(Debug)]
struct PendingWrite {
    op: BatchOp,
    priority: WritePriority,
    attempts: u32,
}

#[derive(Debug, Default)]
struct Lanes {
    completion: VecDeque<PendingWrite>,
    moves: VecDeque<PendingWrite>,
    bookkeeping: VecDeque<PendingWrite>,
}

impl Lanes {
    fn lane_mut(&mut self, priority: WritePriority) -> &mut VecDeque<PendingWrite> {
        match priority {
            WritePriority::Completion => &mut self.completion,
            WritePriority::Move => &mut self.moves,
            WritePriority::Bookkeeping => &mut self.bookkeeping,
        }
    }

    fn len(&self) -> usize {
        self.completion.len() + self.moves.len() + self.bookkeeping.len()
    }

    fn pop_batch(&mut self, batch_size: usize) -> Vec<PendingWrite> {
        let mut batch = Vec::with_capacity(batch_size.min(self.len()));
        for lane in [&mut self.completion, &mut self.moves, &mut self.bookkeeping] {
            while batch.len() < batch_size {
                match lane.pop_front() {
                    Some(write) => batch.push(write),
                    None => break,
                }
            }
        }
        batch
    }

    fn requeue_front(&mut self, batch: Vec<PendingWrite>) {
        // Reverse so that pushing to the front restores submission order.
        for write in batch.into_iter().rev() {
            self.lane_mut(write.priority).push_front(write);
        }
    }
}

/// What one drain pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Writes flushed to storage.
    pub flushed: usize,
    /// Writes requeued after a storage failure.
    pub requeued: usize,
    /// Writes dropped after exhausting their retries.
    pub dropped: usize,
}

/// Bounded-retry, priority-ordered buffer of storage writes.
///
/// Enqueueing never blocks and never fails; a write that keeps failing is
/// dropped after its retry budget with a warning, because the in-memory state
/// remains authoritative either way.
pub struct WriteBehindQueue {
    lanes: Mutex<Lanes>,
    max_retries: u32,
}

impl WriteBehindQueue {
    /// Create an empty queue with the given per-write retry budget.
    pub fn new(max_retries: u32) -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
            max_retries,
        }
    }

    /// Buffer writes for the background flush.
    pub fn enqueue(&self, priority: WritePriority, ops: impl IntoIterator<Item = BatchOp>) {
        let mut lanes = self.lanes.lock().expect("write queue poisoned");
        let lane = lanes.lane_mut(priority);
        for op in ops {
            lane.push_back(PendingWrite {
                op,
                priority,
                attempts: 0,
            });
        }
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.lanes.lock().expect("write queue poisoned").len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush up to `batch_size` writes to the store, in priority order.
    ///
    /// The batch is applied as a unit. On failure every write in it is
    /// requeued at the front of its lane, except writes that exhausted their
    /// retry budget, which are dropped.
    pub async fn drain_once(&self, store: &dyn GameStore, batch_size: usize) -> DrainOutcome {
        let batch = {
            let mut lanes = self.lanes.lock().expect("write queue poisoned");
            lanes.pop_batch(batch_size)
        };
        if batch.is_empty() {
            return DrainOutcome::default();
        }

        let ops: Vec<BatchOp> = batch.iter().map(|write| write.op.clone()).collect();
        match store.apply_batch(ops).await {
            Ok(()) => {
                debug!(count = batch.len(), "flushed pending writes");
                DrainOutcome {
                    flushed: batch.len(),
                    ..DrainOutcome::default()
                }
            }
            Err(err) => {
                let mut outcome = DrainOutcome::default();
                let mut survivors = Vec::with_capacity(batch.len());
                for mut write in batch {
                    write.attempts += 1;
                    if write.attempts > self.max_retries {
                        warn!(
                            op = ?write.op,
                            attempts = write.attempts,
                            "dropping write after exhausting retries"
                        );
                        outcome.dropped += 1;
                    } else {
                        survivors.push(write);
                    }
                }
                outcome.requeued = survivors.len();
                warn!(
                    error = %err,
                    requeued = outcome.requeued,
                    dropped = outcome.dropped,
                    "storage batch failed"
                );
                let mut lanes = self.lanes.lock().expect("write queue poisoned");
                lanes.requeue_front(survivors);
                outcome
            }
        }
    }
}

/// Background drain loop, flushing the queue on a fixed interval.
///
/// While no store is installed (degraded mode) the queue keeps buffering and
/// the loop just waits for the next tick.
pub async fn run_drain_loop(state: SharedState) {
    let interval_period = state.config().drain_interval;
    let batch_size = state.config().drain_batch_size;
    let mut ticker = tokio::time::interval(interval_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.write_queue().is_empty() {
            continue;
        }
        let Some(store) = state.game_store().await else {
            continue;
        };
        state.write_queue().drain_once(store.as_ref(), batch_size).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;
    use crate::dao::models::{GameType, PhaseEntity, SessionEntity, UserEntity};

    fn session_op(phase: PhaseEntity) -> BatchOp {
        BatchOp::SaveSession(SessionEntity {
            id: Uuid::new_v4(),
            lobby_id: Uuid::new_v4(),
            title: "queued game".into(),
            max_players: 2,
            host_id: Uuid::new_v4(),
            game_type: GameType::WordMatch,
            phase,
            players: vec![],
            moves: vec![],
            winning_value: None,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        })
    }

    fn user_op(name: &str) -> BatchOp {
        BatchOp::UpsertUser(UserEntity {
            id: Uuid::new_v4(),
            username: name.to_lowercase(),
            display_name: name.into(),
        })
    }

    #[tokio::test]
    async fn completions_flush_before_bookkeeping() {
        let queue = WriteBehindQueue::new(3);
        let store = MemoryGameStore::new();

        queue.enqueue(WritePriority::Bookkeeping, [user_op("Ada")]);
        queue.enqueue(WritePriority::Completion, [session_op(PhaseEntity::Completed)]);

        // A one-op batch must pick the completion, not the older upsert.
        let outcome = queue.drain_once(&store, 1).await;
        assert_eq!(outcome.flushed, 1);
        assert_eq!(store.user_count(), 0);
        assert_eq!(queue.len(), 1);

        let outcome = queue.drain_once(&store, 1).await;
        assert_eq!(outcome.flushed, 1);
        assert_eq!(store.user_count(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn failed_batches_are_requeued_in_order() {
        let queue = WriteBehindQueue::new(3);
        let store = MemoryGameStore::new();
        store.set_failing(true);

        queue.enqueue(WritePriority::Bookkeeping, [user_op("Ada"), user_op("Grace")]);
        let outcome = queue.drain_once(&store, 10).await;
        assert_eq!(outcome.requeued, 2);
        assert_eq!(queue.len(), 2);

        store.set_failing(false);
        let outcome = queue.drain_once(&store, 10).await;
        assert_eq!(outcome.flushed, 2);
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn writes_are_dropped_after_exhausting_retries() {
        let queue = WriteBehindQueue::new(2);
        let store = MemoryGameStore::new();
        store.set_failing(true);

        queue.enqueue(WritePriority::Move, [user_op("Ada")]);
        for _ in 0..2 {
            let outcome = queue.drain_once(&store, 10).await;
            assert_eq!(outcome.requeued, 1);
        }

        let outcome = queue.drain_once(&store, 10).await;
        assert_eq!(outcome.dropped, 1);
        assert!(queue.is_empty());

        // Nothing left to flush even after recovery.
        store.set_failing(false);
        let outcome = queue.drain_once(&store, 10).await;
        assert_eq!(outcome, DrainOutcome::default());
    }

    #[tokio::test]
    async fn enqueue_is_accepted_while_degraded() {
        let queue = WriteBehindQueue::new(3);
        queue.enqueue(WritePriority::Bookkeeping, [user_op("Ada")]);
        assert_eq!(queue.len(), 1);
    }
}
