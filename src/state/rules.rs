use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::GameType;
use crate::state::game::{MoveRecord, Outcome, PlayerRef};
use crate::state::word_bomb::WordBombRules;
use crate::state::word_match::WordMatchRules;

/// Read-only view of a session handed to the rules for validation and
/// win-condition evaluation.
pub struct GameView<'a> {
    /// Current roster in join order.
    pub players: &'a IndexMap<Uuid, PlayerRef>,
    /// Append-only move log in chronological order.
    pub moves: &'a [MoveRecord],
    /// Player whose turn it is, for turn-based variants.
    pub current_turn: Option<Uuid>,
    /// Letter the next word must start with, for chain variants.
    pub required_letter: Option<char>,
}

/// Rejection of a move that violates the variant's rules.
///
/// Rule violations never mutate session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("word must contain at least {min} letters")]
    TooShort { min: usize },
    #[error("word must contain letters only")]
    NotAlphabetic,
    #[error("word `{0}` was already played")]
    DuplicateWord(String),
    #[error("word must start with `{0}`")]
    WrongStartingLetter(char),
}

/// Capability contract implemented by each game variant.
///
/// The coordinator and [`SessionInstance`] dispatch through this trait and
/// never special-case a game type.
///
/// [`SessionInstance`]: crate::state::session::SessionInstance
pub trait GameRules: Send + Sync {
    /// The variant tag this implementation serves.
    fn game_type(&self) -> GameType;
    /// Minimum roster size before the session can start.
    fn min_players(&self) -> usize;
    /// Default roster capacity when the creator does not specify one.
    fn default_max_players(&self) -> usize;
    /// Whether the variant collects hidden per-player setup data before play.
    fn needs_setup(&self) -> bool;
    /// Whether moves are restricted to the current-turn player.
    fn turn_based(&self) -> bool;
    /// Whether a player's own secret appears in their private snapshot.
    fn reveal_own_secret(&self) -> bool;
    /// Validate a normalized word against the variant's rules.
    fn validate_move(
        &self,
        view: &GameView<'_>,
        player_id: Uuid,
        word: &str,
    ) -> Result<(), RuleViolation>;
    /// Evaluate the win condition, returning the outcome once satisfied.
    fn evaluate(&self, view: &GameView<'_>) -> Option<Outcome>;
}

/// Factory dispatching on the game-type tag.
pub fn rules_for(game_type: GameType) -> Box<dyn GameRules> {
    match game_type {
        GameType::WordMatch => Box::new(WordMatchRules),
        GameType::WordBomb => Box::new(WordBombRules),
    }
}

/// Normalize a raw word: trimmed and lowercased. All comparisons in the move
/// log and the win checks run on normalized values.
pub fn normalize_word(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Shared shape check: at least `min` characters, letters only.
pub fn check_word_shape(word: &str, min: usize) -> Result<(), RuleViolation> {
    if word.chars().count() < min {
        return Err(RuleViolation::TooShort { min });
    }
    if !word.chars().all(char::is_alphabetic) {
        return Err(RuleViolation::NotAlphabetic);
    }
    Ok(())
}
