use thiserror::Error;

use crate::dao::models::PhaseEntity;

/// Lifecycle phase of a game session.
///
/// Transitions are monotonic: a session never regresses to an earlier phase,
/// the only escape hatch being an explicit abandon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Roster is still filling up; the session is joinable.
    WaitingForPlayers,
    /// Roster complete, players are submitting hidden setup data.
    SettingUp,
    /// Moves are being exchanged.
    Active,
    /// A win condition was reached. Terminal.
    Completed,
    /// Explicitly abandoned or reclaimed by the idle sweep. Terminal.
    Abandoned,
}

impl SessionPhase {
    /// Whether this phase accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Abandoned)
    }

    /// Whether new players may still join in this phase.
    pub fn is_joinable(self) -> bool {
        matches!(self, SessionPhase::WaitingForPlayers)
    }
}

/// Events that can be applied to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Roster satisfied the variant's requirements; collect setup data.
    BeginSetup,
    /// Start active play, either directly or once setup finished.
    Begin,
    /// A win condition (or forfeit) ended the session.
    Complete,
    /// The session is abandoned; valid from any non-terminal phase.
    Abandon,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in when the invalid event arrived.
    pub from: SessionPhase,
    /// The rejected event.
    pub event: PhaseEvent,
}

/// Per-session phase machine with a version counter.
///
/// The version increments on every applied transition so snapshots can be
/// ordered and stale timer callbacks detected.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: SessionPhase,
    version: usize,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::WaitingForPlayers,
            version: 0,
        }
    }
}

impl PhaseMachine {
    /// Create a machine in the waiting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a machine from a persisted phase (crash recovery).
    pub fn restore(phase: SessionPhase) -> Self {
        Self { phase, version: 0 }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, returning the new phase or the rejected transition.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(&self, event: PhaseEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::WaitingForPlayers, PhaseEvent::BeginSetup) => SessionPhase::SettingUp,
            // Variants without a setup step start straight from the lobby.
            (SessionPhase::WaitingForPlayers, PhaseEvent::Begin) => SessionPhase::Active,
            (SessionPhase::SettingUp, PhaseEvent::Begin) => SessionPhase::Active,
            (SessionPhase::Active, PhaseEvent::Complete) => SessionPhase::Completed,
            (from, PhaseEvent::Abandon) if !from.is_terminal() => SessionPhase::Abandoned,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

impl From<SessionPhase> for PhaseEntity {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::WaitingForPlayers => PhaseEntity::WaitingForPlayers,
            SessionPhase::SettingUp => PhaseEntity::SettingUp,
            SessionPhase::Active => PhaseEntity::Active,
            SessionPhase::Completed => PhaseEntity::Completed,
            SessionPhase::Abandoned => PhaseEntity::Abandoned,
        }
    }
}

impl From<PhaseEntity> for SessionPhase {
    fn from(value: PhaseEntity) -> Self {
        match value {
            PhaseEntity::WaitingForPlayers => SessionPhase::WaitingForPlayers,
            PhaseEntity::SettingUp => SessionPhase::SettingUp,
            PhaseEntity::Active => SessionPhase::Active,
            PhaseEntity::Completed => SessionPhase::Completed,
            PhaseEntity::Abandoned => SessionPhase::Abandoned,
        }
    }
}
