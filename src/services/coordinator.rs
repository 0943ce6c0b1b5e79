//! Connection-facing game operations.
//!
//! Everything a socket can ask for funnels through here: resolving the user,
//! locking the right session, applying the mutation, queueing the resulting
//! writes, and fanning the news out to the room and the SSE stream. Storage
//! is never on the request path except for the idempotent user read-through
//! and session hydration after a restart.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::models::{BatchOp, GameType, UserEntity};
use crate::dto::game::GameSummary;
use crate::dto::public::{PrivateSnapshot, SessionSnapshot};
use crate::dto::ws::ServerMessage;
use crate::error::ServiceError;
use crate::services::events;
use crate::services::write_behind::WritePriority;
use crate::state::phase::SessionPhase;
use crate::state::rules::rules_for;
use crate::state::session::{SessionInstance, SessionState};
use crate::state::{PlayerConnection, SharedState};

/// Hard cap on roster capacity, independent of variant.
const MAX_ROSTER: usize = 16;

/// A socket's binding to a session, held by the connection handler.
#[derive(Clone)]
pub struct Seat {
    /// Session this socket is playing in.
    pub session: Arc<SessionInstance>,
    /// The membership bound to the socket.
    pub player_id: Uuid,
}

/// Create a lobby with its session, join it as host, and bind the socket.
pub async fn create_game(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    player_name: &str,
    title: Option<&str>,
    game_type: GameType,
    max_players: Option<usize>,
) -> Result<(Seat, PrivateSnapshot), ServiceError> {
    if let Some(requested) = max_players {
        let min = rules_for(game_type).min_players();
        if requested < min || requested > MAX_ROSTER {
            return Err(ServiceError::InvalidInput(format!(
                "max_players must be between {min} and {MAX_ROSTER}"
            )));
        }
    }

    let user = resolve_user(state, player_name).await;
    let title = title
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| format!("{}'s game", user.display_name));

    let session_state = SessionState::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        title,
        user.id,
        game_type,
        max_players,
    );
    let session = state.registry().insert(session_state);

    let (seat, snapshot) = {
        let mut guard = session.lock().await;
        let effect = guard.join(user.id, &user.display_name)?;
        guard.bind_connection(effect.player_id, connection_id)?;
        persist_session(state, &guard, WritePriority::Bookkeeping);
        (
            Seat {
                session: Arc::clone(&session),
                player_id: effect.player_id,
            },
            PrivateSnapshot::capture(&guard, effect.player_id),
        )
    };

    state.join_room(
        session.id(),
        PlayerConnection {
            id: connection_id,
            player_id: seat.player_id,
            tx: tx.clone(),
        },
    );
    info!(session_id = %session.id(), host = %user.display_name, "game created");
    events::broadcast_game_list_changed(state).await;

    Ok((seat, snapshot))
}

/// Join an existing game by session or lobby id and bind the socket.
///
/// Joining is idempotent per user: presenting a name already on the roster
/// re-binds the socket to that membership instead of failing.
pub async fn join_game(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    game_id: Uuid,
    player_name: &str,
) -> Result<(Seat, PrivateSnapshot), ServiceError> {
    let user = resolve_user(state, player_name).await;
    let session = resolve_session(state, game_id).await?;

    let (seat, snapshot, effect) = {
        let mut guard = session.lock().await;
        let effect = guard.join(user.id, &user.display_name)?;
        guard.bind_connection(effect.player_id, connection_id)?;
        if effect.newly_joined {
            persist_session(state, &guard, WritePriority::Bookkeeping);
        }
        (
            Seat {
                session: Arc::clone(&session),
                player_id: effect.player_id,
            },
            PrivateSnapshot::capture(&guard, effect.player_id),
            effect,
        )
    };

    state.join_room(
        session.id(),
        PlayerConnection {
            id: connection_id,
            player_id: seat.player_id,
            tx: tx.clone(),
        },
    );

    if effect.newly_joined {
        events::broadcast_room(
            state,
            session.id(),
            &ServerMessage::PlayerJoined {
                player_id: seat.player_id,
                display_name: user.display_name.clone(),
            },
        );
        events::broadcast_game_list_changed(state).await;
    } else {
        events::broadcast_room(
            state,
            session.id(),
            &ServerMessage::PlayerConnected {
                player_id: seat.player_id,
            },
        );
    }
    events::broadcast_snapshot(state, &session).await;

    Ok((seat, snapshot))
}

/// Re-bind a fresh socket to an existing membership after a drop.
pub async fn reconnect(
    state: &SharedState,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<(Seat, PrivateSnapshot), ServiceError> {
    let session = resolve_session(state, game_id).await?;

    let snapshot = {
        let mut guard = session.lock().await;
        guard.bind_connection(player_id, connection_id)?;
        PrivateSnapshot::capture(&guard, player_id)
    };

    state.join_room(
        session.id(),
        PlayerConnection {
            id: connection_id,
            player_id,
            tx: tx.clone(),
        },
    );
    events::broadcast_room(state, session.id(), &ServerMessage::PlayerConnected { player_id });
    events::broadcast_snapshot(state, &session).await;

    Ok((
        Seat {
            session,
            player_id,
        },
        snapshot,
    ))
}

/// Mark the seated player ready, with their secret word where required.
pub async fn ready(
    state: &SharedState,
    seat: &Seat,
    secret_word: Option<&str>,
) -> Result<(), ServiceError> {
    let effect = {
        let mut guard = seat.session.lock().await;
        let effect = guard.set_ready(seat.player_id, secret_word)?;
        if let Some(player) = guard.players.get(&seat.player_id).cloned() {
            state.write_queue().enqueue(
                WritePriority::Bookkeeping,
                [BatchOp::SavePlayer {
                    session_id: guard.id,
                    player: player.into(),
                }],
            );
        }
        if effect.started {
            persist_session(state, &guard, WritePriority::Bookkeeping);
            if guard.rules().turn_based() {
                arm_turn_timer(state, &seat.session, &mut guard);
            }
        }
        effect
    };

    events::broadcast_snapshot(state, &seat.session).await;
    if effect.started {
        events::broadcast_game_list_changed(state).await;
    }
    Ok(())
}

/// Submit a word for the seated player.
pub async fn submit_word(
    state: &SharedState,
    seat: &Seat,
    word: &str,
) -> Result<(), ServiceError> {
    let (effect, required_letter) = {
        let mut guard = seat.session.lock().await;
        let effect = guard.submit_move(seat.player_id, word)?;
        state.write_queue().enqueue(
            WritePriority::Move,
            [BatchOp::AppendMove(
                effect.record.clone().into_entity(guard.id),
            )],
        );
        if effect.outcome.is_some() {
            persist_session(state, &guard, WritePriority::Completion);
        } else if effect.next_turn.is_some() && guard.rules().turn_based() {
            arm_turn_timer(state, &seat.session, &mut guard);
        }
        (effect, guard.required_letter)
    };

    events::broadcast_room(
        state,
        seat.session.id(),
        &ServerMessage::MoveAccepted {
            player_id: seat.player_id,
            word: effect.record.value.clone(),
            next_turn: effect.next_turn,
            required_letter,
        },
    );
    if let Some(outcome) = &effect.outcome {
        events::broadcast_room(
            state,
            seat.session.id(),
            &ServerMessage::GameOver {
                outcome: outcome.into(),
            },
        );
        events::broadcast_game_list_changed(state).await;
    }
    events::broadcast_snapshot(state, &seat.session).await;
    Ok(())
}

/// Remove the seated player from the game for good.
pub async fn leave_game(
    state: &SharedState,
    seat: &Seat,
    connection_id: Uuid,
) -> Result<(), ServiceError> {
    let effect = {
        let mut guard = seat.session.lock().await;
        let effect = guard.leave(seat.player_id)?;
        let priority = if effect.phase.is_terminal() {
            WritePriority::Completion
        } else {
            WritePriority::Bookkeeping
        };
        persist_session(state, &guard, priority);
        if effect.phase == SessionPhase::Active
            && guard.rules().turn_based()
            && effect.next_turn.is_some()
        {
            arm_turn_timer(state, &seat.session, &mut guard);
        }
        effect
    };

    state.leave_room(seat.session.id(), connection_id);
    events::broadcast_room(
        state,
        seat.session.id(),
        &ServerMessage::PlayerLeft {
            player_id: seat.player_id,
        },
    );
    if let Some(outcome) = &effect.outcome {
        events::broadcast_room(
            state,
            seat.session.id(),
            &ServerMessage::GameOver {
                outcome: outcome.into(),
            },
        );
    } else if effect.phase == SessionPhase::Abandoned {
        events::broadcast_room(state, seat.session.id(), &ServerMessage::GameAbandoned);
    }
    events::broadcast_snapshot(state, &seat.session).await;

    if effect.roster_empty {
        state.drop_room(seat.session.id());
    }
    events::broadcast_game_list_changed(state).await;
    Ok(())
}

/// Handle a dropped socket: unbind the connection, keep the player rostered.
pub async fn disconnect(state: &SharedState, seat: &Seat, connection_id: Uuid) {
    let released = {
        let mut guard = seat.session.lock().await;
        guard.release_connection(connection_id)
    };
    state.leave_room(seat.session.id(), connection_id);

    if let Some(player_id) = released {
        info!(session_id = %seat.session.id(), player_id = %player_id, "player disconnected");
        events::broadcast_room(
            state,
            seat.session.id(),
            &ServerMessage::PlayerDisconnected { player_id },
        );
    }
}

/// Current lobby browser rows.
pub async fn list_games(state: &SharedState) -> Vec<GameSummary> {
    events::collect_game_list(state).await
}

/// Public snapshot of one game, for the lobby browser detail view.
pub async fn find_game(
    state: &SharedState,
    game_id: Uuid,
) -> Result<SessionSnapshot, ServiceError> {
    let session = resolve_session(state, game_id).await?;
    let guard = session.lock().await;
    Ok(SessionSnapshot::capture(&guard))
}

/// Resolve the user identity behind a display name.
///
/// When storage is reachable this is a synchronous read-through so a returning
/// player keeps their id. Otherwise an id is minted locally and the upsert is
/// queued; the upsert is idempotent by normalized username either way.
async fn resolve_user(state: &SharedState, display_name: &str) -> UserEntity {
    let display_name = display_name.trim().to_string();
    let minted = UserEntity {
        id: Uuid::new_v4(),
        username: display_name.to_lowercase(),
        display_name,
    };

    match state.game_store().await {
        Some(store) => match store.upsert_user(minted.clone()).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "user upsert failed; queueing and continuing");
                state
                    .write_queue()
                    .enqueue(WritePriority::Bookkeeping, [BatchOp::UpsertUser(minted.clone())]);
                minted
            }
        },
        None => {
            state
                .write_queue()
                .enqueue(WritePriority::Bookkeeping, [BatchOp::UpsertUser(minted.clone())]);
            minted
        }
    }
}

async fn resolve_session(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Arc<SessionInstance>, ServiceError> {
    let store = state.game_store().await;
    state
        .registry()
        .resolve(game_id, store.as_ref())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))
}

fn persist_session(state: &SharedState, guard: &SessionState, priority: WritePriority) {
    state.write_queue().enqueue(
        priority,
        [
            BatchOp::SaveSession(guard.entity()),
            BatchOp::SaveLobby(guard.lobby_entity()),
        ],
    );
}

/// Arm the turn timer for the player currently on turn.
///
/// Called with the session lock held; the spawned task re-locks when it
/// fires and checks the epoch, so a timer outlived by its turn is a no-op.
fn arm_turn_timer(
    state: &SharedState,
    session: &Arc<SessionInstance>,
    guard: &mut SessionState,
) {
    if guard.current_turn().is_none() {
        return;
    }
    let epoch = guard.turn_epoch();
    let timeout = state.config().turn_timeout;
    let state = Arc::clone(state);
    let session = Arc::clone(session);

    let task = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        expire_turn(state, session, epoch).await;
    });
    guard.set_turn_timer(task.abort_handle());
}

// Boxed so the timer task can re-arm the next timer without the future types
// recursing into each other.
fn expire_turn(
    state: SharedState,
    session: Arc<SessionInstance>,
    epoch: u64,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let effect = {
            let mut guard = session.lock().await;
            let Some(effect) = guard.forfeit_turn(epoch) else {
                return;
            };
            let priority = if effect.phase.is_terminal() {
                WritePriority::Completion
            } else {
                WritePriority::Bookkeeping
            };
            persist_session(&state, &guard, priority);
            if effect.outcome.is_none() && effect.next_turn.is_some() {
                arm_turn_timer(&state, &session, &mut guard);
            }
            effect
        };

        info!(session_id = %session.id(), player_id = %effect.eliminated, "turn expired");
        events::broadcast_room(
            &state,
            session.id(),
            &ServerMessage::PlayerEliminated {
                player_id: effect.eliminated,
                next_turn: effect.next_turn,
            },
        );
        if let Some(outcome) = &effect.outcome {
            events::broadcast_room(
                &state,
                session.id(),
                &ServerMessage::GameOver {
                    outcome: outcome.into(),
                },
            );
            events::broadcast_game_list_changed(&state).await;
        }
        events::broadcast_snapshot(&state, &session).await;
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::AppConfig;
    use crate::dao::game_store::GameStore;
    use crate::dao::game_store::memory::MemoryGameStore;
    use crate::dao::models::PhaseEntity;
    use crate::state::AppState;

    fn test_config() -> AppConfig {
        AppConfig {
            turn_timeout: Duration::from_millis(50),
            drain_interval: Duration::from_millis(10),
            drain_batch_size: 32,
            max_write_retries: 3,
            sweep_interval: Duration::from_secs(3600),
            idle_threshold: Duration::from_secs(86_400),
        }
    }

    fn fake_socket() -> (Uuid, mpsc::UnboundedSender<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Keep the receiver alive for the duration of the test.
        std::mem::forget(rx);
        (Uuid::new_v4(), tx)
    }

    fn observed_socket() -> (
        Uuid,
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Uuid::new_v4(), tx, rx)
    }

    fn drain_messages(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                out.push(serde_json::from_str(&text).expect("valid json frame"));
            }
        }
        out
    }

    async fn state_with_store() -> (SharedState, MemoryGameStore) {
        let state = AppState::new(test_config());
        let store = MemoryGameStore::new();
        state
            .install_game_store(Arc::new(store.clone()) as Arc<dyn GameStore>)
            .await;
        (state, store)
    }

    async fn drain(state: &SharedState, store: &MemoryGameStore) {
        while !state.write_queue().is_empty() {
            state.write_queue().drain_once(store, 64).await;
        }
    }

    #[tokio::test]
    async fn create_then_join_reaches_setup_and_persists() {
        let (state, store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat_a, snapshot) = create_game(
            &state,
            conn_a,
            &tx_a,
            "Ada",
            Some("Friday round"),
            GameType::WordMatch,
            None,
        )
        .await
        .unwrap();
        assert_eq!(snapshot.session.phase, "waiting_for_players");

        let session_id = seat_a.session.id();
        let (seat_b, snapshot) = join_game(&state, conn_b, &tx_b, session_id, "Grace")
            .await
            .unwrap();
        assert_ne!(seat_a.player_id, seat_b.player_id);
        assert_eq!(snapshot.session.players.len(), 2);
        assert_eq!(snapshot.session.phase, "setting_up");

        drain(&state, &store).await;
        let stored = store.find_session(session_id).await.unwrap().unwrap();
        assert_eq!(stored.players.len(), 2);
        assert_eq!(stored.phase, PhaseEntity::SettingUp);
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn join_accepts_the_lobby_id() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat, snapshot) =
            create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
                .await
                .unwrap();
        let lobby_id = snapshot.session.lobby_id;
        assert_ne!(lobby_id, seat.session.id());

        let (seat_b, _) = join_game(&state, conn_b, &tx_b, lobby_id, "Grace")
            .await
            .unwrap();
        assert_eq!(seat_b.session.id(), seat.session.id());
    }

    #[tokio::test]
    async fn returning_player_name_rebinds_instead_of_duplicating() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat, _) = create_game(
            &state,
            conn_a,
            &tx_a,
            "Ada",
            None,
            GameType::WordBomb,
            Some(4),
        )
        .await
        .unwrap();

        // Same display name joins again from another socket.
        let (seat_again, _) = join_game(&state, conn_b, &tx_b, seat.session.id(), "Ada")
            .await
            .unwrap();
        assert_eq!(seat_again.player_id, seat.player_id);
        assert_eq!(seat.session.lock().await.players.len(), 1);
    }

    #[tokio::test]
    async fn degraded_mode_still_creates_and_queues_writes() {
        let state = AppState::new(test_config());
        assert!(state.is_degraded().await);
        let (conn, tx) = fake_socket();

        let (seat, _) = create_game(&state, conn, &tx, "Ada", None, GameType::WordMatch, None)
            .await
            .unwrap();
        assert_eq!(seat.session.lock().await.phase(), SessionPhase::WaitingForPlayers);
        // The user upsert, session, and lobby are all waiting for storage.
        assert!(state.write_queue().len() >= 3);
    }

    #[tokio::test]
    async fn full_match_reaches_completion_in_storage() {
        let (state, store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat_a, _) =
            create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
                .await
                .unwrap();
        let (seat_b, _) = join_game(&state, conn_b, &tx_b, seat_a.session.id(), "Grace")
            .await
            .unwrap();

        ready(&state, &seat_a, Some("apple")).await.unwrap();
        ready(&state, &seat_b, Some("banana")).await.unwrap();
        submit_word(&state, &seat_a, "cat").await.unwrap();
        submit_word(&state, &seat_b, "dog").await.unwrap();
        submit_word(&state, &seat_a, "dog").await.unwrap();
        submit_word(&state, &seat_b, "dog").await.unwrap();

        assert_eq!(seat_a.session.lock().await.phase(), SessionPhase::Completed);

        drain(&state, &store).await;
        let stored = store.find_session(seat_a.session.id()).await.unwrap().unwrap();
        assert_eq!(stored.phase, PhaseEntity::Completed);
        assert_eq!(stored.winning_value.as_deref(), Some("dog"));
        assert_eq!(stored.moves.len(), 4);
    }

    #[tokio::test]
    async fn invalid_moves_do_not_touch_the_queue() {
        let (state, store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat_a, _) =
            create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
                .await
                .unwrap();
        let (seat_b, _) = join_game(&state, conn_b, &tx_b, seat_a.session.id(), "Grace")
            .await
            .unwrap();
        ready(&state, &seat_a, Some("apple")).await.unwrap();
        ready(&state, &seat_b, Some("banana")).await.unwrap();
        drain(&state, &store).await;

        let err = submit_word(&state, &seat_a, "not a word!").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(state.write_queue().is_empty());
        assert_eq!(store.move_count(seat_a.session.id()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timer_eliminates_the_idle_player() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b, mut rx_b) = observed_socket();

        let (seat_a, _) = create_game(
            &state,
            conn_a,
            &tx_a,
            "Ada",
            None,
            GameType::WordBomb,
            Some(2),
        )
        .await
        .unwrap();
        let (seat_b, _) = join_game(&state, conn_b, &tx_b, seat_a.session.id(), "Grace")
            .await
            .unwrap();
        ready(&state, &seat_a, None).await.unwrap();
        ready(&state, &seat_b, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        {
            let guard = seat_a.session.lock().await;
            assert_eq!(guard.phase(), SessionPhase::Completed);
            let outcome = guard.outcome.as_ref().expect("timer outcome");
            assert_eq!(outcome.winner_ids, vec![seat_b.player_id]);
        }

        // The room hears about the elimination and gets a refreshed snapshot.
        let messages = drain_messages(&mut rx_b);
        assert!(
            messages
                .iter()
                .any(|message| message["type"] == "player_eliminated")
        );
        let refreshed = messages
            .iter()
            .rev()
            .find(|message| message["type"] == "game_state")
            .expect("room snapshot after the elimination");
        assert_eq!(refreshed["snapshot"]["phase"], "completed");
    }

    #[tokio::test]
    async fn game_list_shows_joinable_games_with_their_host() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat_a, _) =
            create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
                .await
                .unwrap();
        let rows = list_games(&state).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].host.as_deref(), Some("Ada"));
        assert!(rows[0].joinable);

        // A full roster is no longer joinable and leaves the browser.
        join_game(&state, conn_b, &tx_b, seat_a.session.id(), "Grace")
            .await
            .unwrap();
        assert!(list_games(&state).await.is_empty());
    }

    #[tokio::test]
    async fn accepted_moves_push_a_room_snapshot() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a, mut rx_a) = observed_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat_a, _) =
            create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
                .await
                .unwrap();
        let (seat_b, _) = join_game(&state, conn_b, &tx_b, seat_a.session.id(), "Grace")
            .await
            .unwrap();
        ready(&state, &seat_a, Some("apple")).await.unwrap();
        ready(&state, &seat_b, Some("banana")).await.unwrap();
        drain_messages(&mut rx_a);

        submit_word(&state, &seat_b, "dog").await.unwrap();

        let messages = drain_messages(&mut rx_a);
        let refreshed = messages
            .iter()
            .find(|message| message["type"] == "game_state")
            .expect("room snapshot after the move");
        assert_eq!(refreshed["snapshot"]["moves"][0]["word"], "dog");
    }

    #[tokio::test]
    async fn leaving_returns_the_game_to_the_browser_or_ends_it() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();

        let (seat, _) = create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
            .await
            .unwrap();
        assert_eq!(list_games(&state).await.len(), 1);

        leave_game(&state, &seat, conn_a).await.unwrap();
        // The abandoned session no longer shows up.
        assert!(list_games(&state).await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_is_not_leave() {
        let (state, _store) = state_with_store().await;
        let (conn_a, tx_a) = fake_socket();
        let (conn_b, tx_b) = fake_socket();

        let (seat_a, _) =
            create_game(&state, conn_a, &tx_a, "Ada", None, GameType::WordMatch, None)
                .await
                .unwrap();
        let (seat_b, _) = join_game(&state, conn_b, &tx_b, seat_a.session.id(), "Grace")
            .await
            .unwrap();

        disconnect(&state, &seat_b, conn_b).await;

        let guard = seat_a.session.lock().await;
        assert_eq!(guard.players.len(), 2);
        assert!(!guard.players[&seat_b.player_id].is_connected());
        assert_eq!(guard.phase(), SessionPhase::SettingUp);
    }
}
