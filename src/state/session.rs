use std::sync::Arc;
use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use rand::Rng;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::dao::models::{GameType, LobbyEntity, LobbyStatus, SessionEntity};
use crate::error::ServiceError;
use crate::state::game::{MoveRecord, Outcome, OutcomeReason, PlayerRef};
use crate::state::phase::{PhaseEvent, PhaseMachine, SessionPhase};
use crate::state::rules::{GameRules, GameView, check_word_shape, normalize_word, rules_for};

/// Result of a join request.
#[derive(Debug, Clone)]
pub struct JoinEffect {
    /// Membership id of the (possibly pre-existing) player.
    pub player_id: Uuid,
    /// False when the user was already on the roster.
    pub newly_joined: bool,
    /// Phase after the join, which may have advanced to setup.
    pub phase: SessionPhase,
}

/// Result of a ready/setup submission.
#[derive(Debug, Clone)]
pub struct ReadyEffect {
    /// Whether this submission started active play.
    pub started: bool,
    /// Phase after the submission.
    pub phase: SessionPhase,
    /// Player on turn once play started, for turn-based variants.
    pub next_turn: Option<Uuid>,
    /// Turn epoch to arm the first turn timer against.
    pub turn_epoch: u64,
}

/// Result of an accepted move.
#[derive(Debug, Clone)]
pub struct MoveEffect {
    /// The appended move record.
    pub record: MoveRecord,
    /// Phase after the move.
    pub phase: SessionPhase,
    /// Outcome when this move ended the game.
    pub outcome: Option<Outcome>,
    /// Next player on turn, for turn-based variants still running.
    pub next_turn: Option<Uuid>,
    /// Turn epoch to arm the next turn timer against.
    pub turn_epoch: u64,
}

/// Result of an expired turn timer.
#[derive(Debug, Clone)]
pub struct ForfeitEffect {
    /// Player eliminated from the rotation.
    pub eliminated: Uuid,
    /// Phase after the elimination.
    pub phase: SessionPhase,
    /// Outcome when the elimination left a single player standing.
    pub outcome: Option<Outcome>,
    /// Next player on turn when the game continues.
    pub next_turn: Option<Uuid>,
    /// Turn epoch to arm the next turn timer against.
    pub turn_epoch: u64,
}

/// Result of a player leaving for good.
#[derive(Debug, Clone)]
pub struct LeaveEffect {
    /// Phase after the departure.
    pub phase: SessionPhase,
    /// Outcome when the departure ended the game by forfeit.
    pub outcome: Option<Outcome>,
    /// True when the roster is now empty (the session was abandoned).
    pub roster_empty: bool,
    /// Next player on turn when a turn-based game continues.
    pub next_turn: Option<Uuid>,
    /// Turn epoch to arm the next turn timer against.
    pub turn_epoch: u64,
}

/// Live, authoritative state of one game session.
///
/// All mutation happens while holding the owning [`SessionInstance`] lock, so
/// every operation observes and produces a consistent state. Persistence is
/// exported afterwards via [`SessionState::entity`]; the in-memory state never
/// waits on storage.
pub struct SessionState {
    /// Primary key of the session.
    pub id: Uuid,
    /// Owning lobby.
    pub lobby_id: Uuid,
    /// Lobby title shown in the browser.
    pub title: String,
    /// User that created the lobby.
    pub host_id: Uuid,
    /// Game variant.
    pub game_type: GameType,
    /// Roster capacity.
    pub max_players: usize,
    /// Phase machine guarding lifecycle transitions.
    pub machine: PhaseMachine,
    /// Roster in join order. Players are never removed on disconnect.
    pub players: IndexMap<Uuid, PlayerRef>,
    /// Append-only move log.
    pub moves: Vec<MoveRecord>,
    /// Winning value once completed, when the variant has one.
    pub winning_value: Option<String>,
    /// Terminal outcome, kept for broadcast. Not restored across restarts.
    pub outcome: Option<Outcome>,
    /// Letter the next word must start with, for chain variants.
    pub required_letter: Option<char>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last join/ready/move/leave; drives the idle sweep.
    pub last_activity: SystemTime,
    turn_cursor: usize,
    turn_epoch: u64,
    turn_timer: Option<AbortHandle>,
    rules: Box<dyn GameRules>,
}

impl SessionState {
    /// Create a fresh session in the waiting phase with an empty roster.
    pub fn new(
        id: Uuid,
        lobby_id: Uuid,
        title: String,
        host_id: Uuid,
        game_type: GameType,
        max_players: Option<usize>,
    ) -> Self {
        let rules = rules_for(game_type);
        let now = SystemTime::now();
        Self {
            id,
            lobby_id,
            title,
            host_id,
            game_type,
            max_players: max_players.unwrap_or_else(|| rules.default_max_players()),
            machine: PhaseMachine::new(),
            players: IndexMap::new(),
            moves: Vec::new(),
            winning_value: None,
            outcome: None,
            required_letter: None,
            created_at: now,
            last_activity: now,
            turn_cursor: 0,
            turn_epoch: 0,
            turn_timer: None,
            rules,
        }
    }

    /// Rebuild a session from its persisted form.
    ///
    /// Connections never survive a restart; turn bookkeeping for an active
    /// turn-based game is derived from the move log.
    pub fn from_entity(entity: SessionEntity) -> Self {
        let rules = rules_for(entity.game_type);
        let machine = PhaseMachine::restore(entity.phase.into());
        let players: IndexMap<Uuid, PlayerRef> = entity
            .players
            .into_iter()
            .map(|player| (player.id, PlayerRef::from(player)))
            .collect();
        let moves: Vec<MoveRecord> = entity.moves.into_iter().map(MoveRecord::from).collect();

        let mut state = Self {
            id: entity.id,
            lobby_id: entity.lobby_id,
            title: entity.title,
            host_id: entity.host_id,
            game_type: entity.game_type,
            max_players: entity.max_players,
            machine,
            players,
            moves,
            winning_value: entity.winning_value,
            outcome: None,
            required_letter: None,
            created_at: entity.created_at,
            last_activity: SystemTime::now(),
            turn_cursor: 0,
            turn_epoch: 0,
            turn_timer: None,
            rules,
        };

        if state.rules.turn_based() && state.machine.phase() == SessionPhase::Active {
            state.restore_turn_state();
        }
        state
    }

    /// The rules implementation serving this session's variant.
    pub fn rules(&self) -> &dyn GameRules {
        self.rules.as_ref()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Player currently on turn, for turn-based variants in active play.
    pub fn current_turn(&self) -> Option<Uuid> {
        if !self.rules.turn_based() || self.machine.phase() != SessionPhase::Active {
            return None;
        }
        let actives = self.active_ids();
        if actives.is_empty() {
            return None;
        }
        Some(actives[self.turn_cursor % actives.len()])
    }

    /// Monotonic counter bumped whenever the turn passes. Timer callbacks
    /// carry the epoch they were armed with so stale expiries are dropped.
    pub fn turn_epoch(&self) -> u64 {
        self.turn_epoch
    }

    /// How long the session has been without activity.
    pub fn idle_for(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_activity).unwrap_or_default()
    }

    /// Add a user to the roster, or return their existing membership.
    ///
    /// Joining is idempotent per user: a second join with the same user id is
    /// answered with the original membership and mutates nothing.
    pub fn join(
        &mut self,
        user_id: Uuid,
        display_name: &str,
    ) -> Result<JoinEffect, ServiceError> {
        if let Some(existing) = self.players.values().find(|p| p.user_id == user_id) {
            return Ok(JoinEffect {
                player_id: existing.id,
                newly_joined: false,
                phase: self.machine.phase(),
            });
        }

        if !self.machine.phase().is_joinable() {
            return Err(ServiceError::InvalidState(
                "game is no longer accepting players".into(),
            ));
        }
        if self.players.len() >= self.max_players {
            return Err(ServiceError::InvalidState("game is full".into()));
        }

        let player = PlayerRef {
            id: Uuid::new_v4(),
            user_id,
            display_name: display_name.to_string(),
            is_host: user_id == self.host_id,
            is_ready: false,
            secret_word: None,
            connection_id: None,
            eliminated: false,
        };
        let player_id = player.id;
        self.players.insert(player_id, player);
        self.touch();

        // A full roster moves setup variants on; no-setup variants start once
        // everyone has readied up instead.
        if self.players.len() == self.max_players && self.rules.needs_setup() {
            self.machine.apply(PhaseEvent::BeginSetup)?;
        }

        Ok(JoinEffect {
            player_id,
            newly_joined: true,
            phase: self.machine.phase(),
        })
    }

    /// Record a player's readiness, with their secret word for setup variants.
    ///
    /// Play begins once every rostered player is ready and the roster meets
    /// the variant's minimum.
    pub fn set_ready(
        &mut self,
        player_id: Uuid,
        secret_word: Option<&str>,
    ) -> Result<ReadyEffect, ServiceError> {
        if !self.players.contains_key(&player_id) {
            return Err(ServiceError::NotFound("player is not in this game".into()));
        }

        let phase = self.machine.phase();
        let secret = if self.rules.needs_setup() {
            if phase != SessionPhase::SettingUp {
                return Err(ServiceError::InvalidState(
                    "game is not collecting secret words".into(),
                ));
            }
            let raw = secret_word.ok_or_else(|| {
                ServiceError::InvalidInput("a secret word is required".into())
            })?;
            let word = normalize_word(raw);
            check_word_shape(&word, 1).map_err(ServiceError::from)?;
            Some(word)
        } else {
            if phase != SessionPhase::WaitingForPlayers {
                return Err(ServiceError::InvalidState(
                    "game is not accepting ready signals".into(),
                ));
            }
            None
        };

        let player = self
            .players
            .get_mut(&player_id)
            .ok_or_else(|| ServiceError::NotFound("player is not in this game".into()))?;
        player.is_ready = true;
        if secret.is_some() {
            player.secret_word = secret;
        }
        self.touch();

        let everyone_ready = self.players.values().all(|p| p.is_ready);
        let quorum = self.players.len() >= self.rules.min_players();
        let mut started = false;
        if everyone_ready && quorum {
            self.machine.apply(PhaseEvent::Begin)?;
            self.start_play();
            started = true;
        }

        Ok(ReadyEffect {
            started,
            phase: self.machine.phase(),
            next_turn: self.current_turn(),
            turn_epoch: self.turn_epoch,
        })
    }

    /// Validate and append a move, advancing turn state and checking the win
    /// condition. Rejected moves mutate nothing.
    pub fn submit_move(
        &mut self,
        player_id: Uuid,
        raw_word: &str,
    ) -> Result<MoveEffect, ServiceError> {
        let player = self
            .players
            .get(&player_id)
            .ok_or_else(|| ServiceError::NotFound("player is not in this game".into()))?;
        if player.eliminated {
            return Err(ServiceError::InvalidState(
                "player was eliminated from the game".into(),
            ));
        }
        if self.machine.phase() != SessionPhase::Active {
            return Err(ServiceError::InvalidState("game is not active".into()));
        }

        let word = normalize_word(raw_word);
        let view = GameView {
            players: &self.players,
            moves: &self.moves,
            current_turn: self.current_turn(),
            required_letter: self.required_letter,
        };
        self.rules.validate_move(&view, player_id, &word)?;

        let record = MoveRecord::new(player_id, word);
        self.moves.push(record.clone());
        self.touch();

        if self.rules.turn_based() {
            self.required_letter = record.value.chars().last();
            self.pass_turn_from(player_id);
        }

        let view = GameView {
            players: &self.players,
            moves: &self.moves,
            current_turn: self.current_turn(),
            required_letter: self.required_letter,
        };
        if let Some(outcome) = self.rules.evaluate(&view) {
            self.finish(outcome)?;
        }

        Ok(MoveEffect {
            record,
            phase: self.machine.phase(),
            outcome: self.outcome.clone(),
            next_turn: self.current_turn(),
            turn_epoch: self.turn_epoch,
        })
    }

    /// Eliminate the player on turn after their timer expired.
    ///
    /// `epoch` is the turn epoch the timer was armed with; a stale callback
    /// (the turn already passed) is ignored and returns `None`.
    pub fn forfeit_turn(&mut self, epoch: u64) -> Option<ForfeitEffect> {
        if self.machine.phase() != SessionPhase::Active
            || !self.rules.turn_based()
            || epoch != self.turn_epoch
        {
            return None;
        }
        let eliminated = self.current_turn()?;

        if let Some(player) = self.players.get_mut(&eliminated) {
            player.eliminated = true;
        }
        // The eliminated slot collapses; the cursor now points at the next
        // player in rotation.
        let actives = self.active_ids();
        if !actives.is_empty() {
            self.turn_cursor %= actives.len();
        }
        self.turn_epoch += 1;
        self.clear_turn_timer();
        self.touch();

        let view = GameView {
            players: &self.players,
            moves: &self.moves,
            current_turn: self.current_turn(),
            required_letter: self.required_letter,
        };
        if let Some(outcome) = self.rules.evaluate(&view)
            && self.finish(outcome).is_err()
        {
            return None;
        }

        Some(ForfeitEffect {
            eliminated,
            phase: self.machine.phase(),
            outcome: self.outcome.clone(),
            next_turn: self.current_turn(),
            turn_epoch: self.turn_epoch,
        })
    }

    /// Remove a player from the roster permanently.
    ///
    /// Distinct from a disconnect: a disconnected player stays rostered and
    /// can reconnect, a departed one is gone. Departures can end the game by
    /// forfeit or abandon it outright.
    pub fn leave(&mut self, player_id: Uuid) -> Result<LeaveEffect, ServiceError> {
        let prev_turn = self.current_turn();
        let removed = self
            .players
            .shift_remove(&player_id)
            .ok_or_else(|| ServiceError::NotFound("player is not in this game".into()))?;
        self.touch();

        let phase = self.machine.phase();
        if phase.is_terminal() {
            return Ok(self.leave_effect());
        }

        if self.players.is_empty() {
            self.abandon();
            return Ok(self.leave_effect());
        }

        match phase {
            SessionPhase::Active => {
                let actives = self.active_ids();
                match actives.len() {
                    0 => {
                        self.abandon();
                    }
                    1 => {
                        let outcome = Outcome {
                            winner_ids: actives,
                            winning_value: None,
                            reason: OutcomeReason::Forfeit,
                        };
                        self.finish(outcome)?;
                    }
                    _ => {
                        if self.rules.turn_based() {
                            self.realign_cursor(prev_turn, removed.id);
                        }
                        // The departure may have completed a round the leaver
                        // was holding up.
                        let view = GameView {
                            players: &self.players,
                            moves: &self.moves,
                            current_turn: self.current_turn(),
                            required_letter: self.required_letter,
                        };
                        if let Some(outcome) = self.rules.evaluate(&view) {
                            self.finish(outcome)?;
                        }
                    }
                }
            }
            SessionPhase::SettingUp => {
                if self.players.len() < self.rules.min_players() {
                    self.abandon();
                } else if self.players.values().all(|p| p.is_ready) {
                    // The departure unblocked the remaining setup quorum.
                    self.machine.apply(PhaseEvent::Begin)?;
                    self.start_play();
                }
            }
            _ => {}
        }

        Ok(self.leave_effect())
    }

    /// Bind a live connection to a player, replacing any previous binding.
    pub fn bind_connection(
        &mut self,
        player_id: Uuid,
        connection_id: Uuid,
    ) -> Result<(), ServiceError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or_else(|| ServiceError::NotFound("player is not in this game".into()))?;
        player.connection_id = Some(connection_id);
        self.touch();
        Ok(())
    }

    /// Clear the binding for a dropped connection, returning the player it
    /// belonged to. The player stays on the roster.
    pub fn release_connection(&mut self, connection_id: Uuid) -> Option<Uuid> {
        let player = self
            .players
            .values_mut()
            .find(|p| p.connection_id == Some(connection_id))?;
        player.connection_id = None;
        Some(player.id)
    }

    /// Abandon the session if it is not already terminal.
    pub fn abandon(&mut self) -> bool {
        if self.machine.apply(PhaseEvent::Abandon).is_err() {
            return false;
        }
        self.clear_turn_timer();
        true
    }

    /// Arm the turn timer, aborting any previous one.
    pub fn set_turn_timer(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.turn_timer.replace(handle) {
            previous.abort();
        }
    }

    /// Export the aggregate for a `SaveSession` write. Moves are persisted
    /// separately as append-only records and excluded here.
    pub fn entity(&self) -> SessionEntity {
        SessionEntity {
            id: self.id,
            lobby_id: self.lobby_id,
            title: self.title.clone(),
            max_players: self.max_players,
            host_id: self.host_id,
            game_type: self.game_type,
            phase: self.machine.phase().into(),
            players: self.players.values().cloned().map(Into::into).collect(),
            moves: Vec::new(),
            winning_value: self.winning_value.clone(),
            created_at: self.created_at,
            updated_at: self.last_activity,
        }
    }

    /// Export the lobby record, deriving its status from the session phase.
    pub fn lobby_entity(&self) -> LobbyEntity {
        let status = match self.machine.phase() {
            SessionPhase::WaitingForPlayers if self.players.len() < self.max_players => {
                LobbyStatus::Waiting
            }
            SessionPhase::WaitingForPlayers | SessionPhase::SettingUp => LobbyStatus::Ready,
            SessionPhase::Active => LobbyStatus::InGame,
            SessionPhase::Completed => LobbyStatus::Finished,
            SessionPhase::Abandoned => LobbyStatus::Abandoned,
        };
        LobbyEntity {
            id: self.lobby_id,
            title: self.title.clone(),
            game_type: self.game_type,
            status,
            max_players: self.max_players,
            host_id: self.host_id,
            created_at: self.created_at,
            updated_at: self.last_activity,
        }
    }

    fn touch(&mut self) {
        self.last_activity = SystemTime::now();
    }

    fn active_ids(&self) -> Vec<Uuid> {
        self.players
            .values()
            .filter(|p| !p.eliminated)
            .map(|p| p.id)
            .collect()
    }

    fn start_play(&mut self) {
        if !self.rules.turn_based() {
            return;
        }
        self.turn_cursor = 0;
        self.turn_epoch = 1;
        // Seed the chain with a random starting letter.
        let offset = rand::rng().random_range(0..26u8);
        self.required_letter = Some((b'a' + offset) as char);
    }

    fn pass_turn_from(&mut self, mover: Uuid) {
        let actives = self.active_ids();
        if actives.is_empty() {
            return;
        }
        let position = actives.iter().position(|id| *id == mover).unwrap_or(0);
        self.turn_cursor = (position + 1) % actives.len();
        self.turn_epoch += 1;
        self.clear_turn_timer();
    }

    fn realign_cursor(&mut self, prev_turn: Option<Uuid>, departed: Uuid) {
        let actives = self.active_ids();
        if actives.is_empty() {
            return;
        }
        match prev_turn {
            // The on-turn player is still here; keep pointing at them.
            Some(id) if id != departed => {
                if let Some(position) = actives.iter().position(|p| *p == id) {
                    self.turn_cursor = position;
                }
            }
            // The on-turn player left; the cursor slides onto their follower
            // and the turn passes.
            _ => {
                self.turn_cursor %= actives.len();
                self.turn_epoch += 1;
                self.clear_turn_timer();
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> Result<(), ServiceError> {
        self.machine.apply(PhaseEvent::Complete)?;
        self.winning_value = outcome.winning_value.clone();
        self.outcome = Some(outcome);
        self.clear_turn_timer();
        Ok(())
    }

    fn clear_turn_timer(&mut self) {
        if let Some(handle) = self.turn_timer.take() {
            handle.abort();
        }
    }

    fn leave_effect(&self) -> LeaveEffect {
        LeaveEffect {
            phase: self.machine.phase(),
            outcome: self.outcome.clone(),
            roster_empty: self.players.is_empty(),
            next_turn: self.current_turn(),
            turn_epoch: self.turn_epoch,
        }
    }

    fn restore_turn_state(&mut self) {
        self.turn_epoch = self.moves.len() as u64 + 1;
        match self.moves.last() {
            Some(last) => {
                self.required_letter = last.value.chars().last();
                let mover = last.player_id;
                self.pass_turn_from(mover);
                // pass_turn_from bumped the epoch; keep it where we set it.
                self.turn_epoch = self.moves.len() as u64 + 1;
            }
            None => self.start_play(),
        }
    }
}

/// Handle to one live session: the state behind its serialization lock.
///
/// Cloned handles share the same state; the registry hands these out and all
/// request handling locks through here, so operations on one session are
/// totally ordered while distinct sessions proceed in parallel.
pub struct SessionInstance {
    id: Uuid,
    lobby_id: Uuid,
    state: Mutex<SessionState>,
}

impl SessionInstance {
    /// Wrap a state in its lock.
    pub fn new(state: SessionState) -> Arc<Self> {
        Arc::new(Self {
            id: state.id,
            lobby_id: state.lobby_id,
            state: Mutex::new(state),
        })
    }

    /// Primary key of the session, readable without locking.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Owning lobby id, readable without locking.
    pub fn lobby_id(&self) -> Uuid {
        self.lobby_id
    }

    /// Acquire the session lock.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PhaseEntity;

    fn word_match_session() -> SessionState {
        SessionState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "test game".into(),
            Uuid::new_v4(),
            GameType::WordMatch,
            None,
        )
    }

    fn word_bomb_session(capacity: usize) -> SessionState {
        SessionState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "chain game".into(),
            Uuid::new_v4(),
            GameType::WordBomb,
            Some(capacity),
        )
    }

    fn fill_word_match(state: &mut SessionState) -> (Uuid, Uuid) {
        let host = state.host_id;
        let p1 = state.join(host, "Host").unwrap().player_id;
        let p2 = state.join(Uuid::new_v4(), "Guest").unwrap().player_id;
        (p1, p2)
    }

    #[test]
    fn join_is_idempotent_per_user() {
        let mut state = word_match_session();
        let user = Uuid::new_v4();

        let first = state.join(user, "Ada").unwrap();
        let second = state.join(user, "Ada").unwrap();

        assert!(first.newly_joined);
        assert!(!second.newly_joined);
        assert_eq!(first.player_id, second.player_id);
        assert_eq!(state.players.len(), 1);
    }

    #[test]
    fn full_roster_rejects_new_players_and_enters_setup() {
        let mut state = word_match_session();
        let (_, _) = fill_word_match(&mut state);

        assert_eq!(state.phase(), SessionPhase::SettingUp);
        let err = state.join(Uuid::new_v4(), "Late").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn host_flag_follows_creator() {
        let mut state = word_match_session();
        let (p1, p2) = fill_word_match(&mut state);

        assert!(state.players[&p1].is_host);
        assert!(!state.players[&p2].is_host);
    }

    #[test]
    fn play_starts_once_everyone_submitted_a_secret() {
        let mut state = word_match_session();
        let (p1, p2) = fill_word_match(&mut state);

        let effect = state.set_ready(p1, Some("Apple")).unwrap();
        assert!(!effect.started);
        assert_eq!(state.phase(), SessionPhase::SettingUp);

        let effect = state.set_ready(p2, Some("banana")).unwrap();
        assert!(effect.started);
        assert_eq!(state.phase(), SessionPhase::Active);
        // Secrets are normalized on the way in.
        assert_eq!(state.players[&p1].secret_word.as_deref(), Some("apple"));
    }

    #[test]
    fn setup_requires_a_secret_word() {
        let mut state = word_match_session();
        let (p1, _) = fill_word_match(&mut state);

        let err = state.set_ready(p1, None).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(!state.players[&p1].is_ready);
    }

    #[test]
    fn matching_words_complete_the_session() {
        let mut state = word_match_session();
        let (p1, p2) = fill_word_match(&mut state);
        state.set_ready(p1, Some("apple")).unwrap();
        state.set_ready(p2, Some("banana")).unwrap();

        state.submit_move(p1, "cat").unwrap();
        let effect = state.submit_move(p2, "dog").unwrap();
        assert!(effect.outcome.is_none());

        state.submit_move(p1, "dog").unwrap();
        let effect = state.submit_move(p2, "dog").unwrap();
        let outcome = effect.outcome.expect("round converged");
        assert_eq!(outcome.reason, OutcomeReason::WordsMatched);
        assert_eq!(state.phase(), SessionPhase::Completed);
        assert_eq!(state.winning_value.as_deref(), Some("dog"));

        // Completed sessions accept no more moves.
        let err = state.submit_move(p1, "extra").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(state.moves.len(), 4);
    }

    #[test]
    fn rejected_moves_leave_the_log_untouched() {
        let mut state = word_match_session();
        let (p1, p2) = fill_word_match(&mut state);
        state.set_ready(p1, Some("apple")).unwrap();
        state.set_ready(p2, Some("banana")).unwrap();

        let err = state.submit_move(p1, "c4t").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(state.moves.is_empty());
        assert_eq!(state.phase(), SessionPhase::Active);
    }

    #[test]
    fn word_bomb_starts_when_all_ready_and_rotates_turns() {
        let mut state = word_bomb_session(3);
        let ids: Vec<Uuid> = (0..3)
            .map(|i| {
                state
                    .join(Uuid::new_v4(), &format!("P{i}"))
                    .unwrap()
                    .player_id
            })
            .collect();

        for (index, id) in ids.iter().enumerate() {
            let effect = state.set_ready(*id, None).unwrap();
            assert_eq!(effect.started, index == ids.len() - 1);
        }
        assert_eq!(state.phase(), SessionPhase::Active);
        assert_eq!(state.current_turn(), Some(ids[0]));
        let seed = state.required_letter.expect("chain seeded");

        let word = format!("{seed}pple");
        let effect = state.submit_move(ids[0], &word).unwrap();
        assert_eq!(effect.next_turn, Some(ids[1]));
        // The chain continues from the last letter of the accepted word.
        assert_eq!(state.required_letter, Some('e'));
    }

    #[test]
    fn expired_turn_eliminates_and_last_standing_wins() {
        let mut state = word_bomb_session(2);
        let p1 = state.join(Uuid::new_v4(), "P1").unwrap().player_id;
        let p2 = state.join(Uuid::new_v4(), "P2").unwrap().player_id;
        state.set_ready(p1, None).unwrap();
        state.set_ready(p2, None).unwrap();

        let epoch = state.turn_epoch();
        let effect = state.forfeit_turn(epoch).expect("live epoch");
        assert_eq!(effect.eliminated, p1);
        let outcome = effect.outcome.expect("one player left");
        assert_eq!(outcome.reason, OutcomeReason::LastStanding);
        assert_eq!(outcome.winner_ids, vec![p2]);
        assert_eq!(state.phase(), SessionPhase::Completed);
    }

    #[test]
    fn stale_timer_epochs_are_ignored() {
        let mut state = word_bomb_session(3);
        let ids: Vec<Uuid> = (0..3)
            .map(|i| {
                state
                    .join(Uuid::new_v4(), &format!("P{i}"))
                    .unwrap()
                    .player_id
            })
            .collect();
        for id in &ids {
            state.set_ready(*id, None).unwrap();
        }

        let armed_epoch = state.turn_epoch();
        let seed = state.required_letter.unwrap();
        state.submit_move(ids[0], &format!("{seed}pple")).unwrap();

        // The timer armed before the move fires late: nothing happens.
        assert!(state.forfeit_turn(armed_epoch).is_none());
        assert!(state.players.values().all(|p| !p.eliminated));
    }

    #[test]
    fn elimination_skips_to_the_next_standing_player() {
        let mut state = word_bomb_session(3);
        let ids: Vec<Uuid> = (0..3)
            .map(|i| {
                state
                    .join(Uuid::new_v4(), &format!("P{i}"))
                    .unwrap()
                    .player_id
            })
            .collect();
        for id in &ids {
            state.set_ready(*id, None).unwrap();
        }

        let effect = state.forfeit_turn(state.turn_epoch()).unwrap();
        assert_eq!(effect.eliminated, ids[0]);
        assert!(effect.outcome.is_none());
        assert_eq!(state.current_turn(), Some(ids[1]));

        // An eliminated player can no longer move.
        let err = state.submit_move(ids[0], "apple").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn disconnect_keeps_the_player_rostered() {
        let mut state = word_match_session();
        let (p1, _) = fill_word_match(&mut state);
        let conn = Uuid::new_v4();

        state.bind_connection(p1, conn).unwrap();
        assert!(state.players[&p1].is_connected());

        let released = state.release_connection(conn).unwrap();
        assert_eq!(released, p1);
        assert!(!state.players[&p1].is_connected());
        assert_eq!(state.players.len(), 2);
    }

    #[test]
    fn leaving_mid_game_forfeits_to_the_remaining_player() {
        let mut state = word_match_session();
        let (p1, p2) = fill_word_match(&mut state);
        state.set_ready(p1, Some("apple")).unwrap();
        state.set_ready(p2, Some("banana")).unwrap();

        let effect = state.leave(p1).unwrap();
        assert_eq!(effect.phase, SessionPhase::Completed);
        let outcome = effect.outcome.expect("forfeit win");
        assert_eq!(outcome.reason, OutcomeReason::Forfeit);
        assert_eq!(outcome.winner_ids, vec![p2]);
    }

    #[test]
    fn departure_of_the_pending_player_completes_a_converged_round() {
        let mut state = SessionState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "trio".into(),
            Uuid::new_v4(),
            GameType::WordMatch,
            Some(3),
        );
        let p1 = state.join(state.host_id, "P1").unwrap().player_id;
        let p2 = state.join(Uuid::new_v4(), "P2").unwrap().player_id;
        let p3 = state.join(Uuid::new_v4(), "P3").unwrap().player_id;
        state.set_ready(p1, Some("apple")).unwrap();
        state.set_ready(p2, Some("banana")).unwrap();
        state.set_ready(p3, Some("cherry")).unwrap();

        state.submit_move(p1, "sun").unwrap();
        let effect = state.submit_move(p2, "sun").unwrap();
        assert!(effect.outcome.is_none());

        // The only player yet to answer walks out; the remaining round agrees.
        let effect = state.leave(p3).unwrap();
        assert_eq!(effect.phase, SessionPhase::Completed);
        let outcome = effect.outcome.expect("round converged on departure");
        assert_eq!(outcome.reason, OutcomeReason::WordsMatched);
        assert_eq!(outcome.winner_ids.len(), 2);
        assert_eq!(state.winning_value.as_deref(), Some("sun"));
    }

    #[test]
    fn last_player_leaving_abandons_the_session() {
        let mut state = word_match_session();
        let user = Uuid::new_v4();
        let player = state.join(user, "Solo").unwrap().player_id;

        let effect = state.leave(player).unwrap();
        assert!(effect.roster_empty);
        assert_eq!(effect.phase, SessionPhase::Abandoned);
    }

    #[test]
    fn on_turn_departure_passes_the_turn() {
        let mut state = word_bomb_session(3);
        let ids: Vec<Uuid> = (0..3)
            .map(|i| {
                state
                    .join(Uuid::new_v4(), &format!("P{i}"))
                    .unwrap()
                    .player_id
            })
            .collect();
        for id in &ids {
            state.set_ready(*id, None).unwrap();
        }
        let before = state.turn_epoch();

        let effect = state.leave(ids[0]).unwrap();
        assert!(effect.outcome.is_none());
        assert_eq!(effect.next_turn, Some(ids[1]));
        assert!(state.turn_epoch() > before);
    }

    #[test]
    fn entity_round_trip_restores_roster_and_turn_state() {
        let mut state = word_bomb_session(2);
        let p1 = state.join(Uuid::new_v4(), "P1").unwrap().player_id;
        let p2 = state.join(Uuid::new_v4(), "P2").unwrap().player_id;
        state.set_ready(p1, None).unwrap();
        state.set_ready(p2, None).unwrap();
        let seed = state.required_letter.unwrap();
        state.submit_move(p1, &format!("{seed}pple")).unwrap();

        let mut entity = state.entity();
        assert_eq!(entity.phase, PhaseEntity::Active);
        assert!(entity.moves.is_empty());
        // Moves are stored separately; re-attach them the way hydration does.
        entity.moves = state
            .moves
            .iter()
            .cloned()
            .map(|mv| mv.into_entity(state.id))
            .collect();

        let restored = SessionState::from_entity(entity);
        assert_eq!(restored.players.len(), 2);
        assert_eq!(restored.phase(), SessionPhase::Active);
        assert_eq!(restored.required_letter, Some('e'));
        assert_eq!(restored.current_turn(), Some(p2));
        assert!(restored.players.values().all(|p| !p.is_connected()));
    }

    #[test]
    fn lobby_status_tracks_the_phase() {
        let mut state = word_match_session();
        assert_eq!(state.lobby_entity().status, LobbyStatus::Waiting);

        let (p1, p2) = fill_word_match(&mut state);
        assert_eq!(state.lobby_entity().status, LobbyStatus::Ready);

        state.set_ready(p1, Some("apple")).unwrap();
        state.set_ready(p2, Some("banana")).unwrap();
        assert_eq!(state.lobby_entity().status, LobbyStatus::InGame);

        state.abandon();
        assert_eq!(state.lobby_entity().status, LobbyStatus::Abandoned);
    }
}
