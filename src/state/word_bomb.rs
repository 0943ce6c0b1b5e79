use uuid::Uuid;

use crate::dao::models::GameType;
use crate::state::game::{Outcome, OutcomeReason};
use crate::state::rules::{GameRules, GameView, RuleViolation, check_word_shape};

/// Minimum word length for the chain variant.
const MIN_WORD_LEN: usize = 2;

/// Turn-based chain variant: each word must start with the last letter of the
/// previous word and must not have been played before. Letting the turn timer
/// expire eliminates the mover; the last player standing wins.
pub struct WordBombRules;

impl GameRules for WordBombRules {
    fn game_type(&self) -> GameType {
        GameType::WordBomb
    }

    fn min_players(&self) -> usize {
        2
    }

    fn default_max_players(&self) -> usize {
        8
    }

    fn needs_setup(&self) -> bool {
        false
    }

    fn turn_based(&self) -> bool {
        true
    }

    fn reveal_own_secret(&self) -> bool {
        false
    }

    fn validate_move(
        &self,
        view: &GameView<'_>,
        player_id: Uuid,
        word: &str,
    ) -> Result<(), RuleViolation> {
        if view.current_turn != Some(player_id) {
            return Err(RuleViolation::NotYourTurn);
        }

        check_word_shape(word, MIN_WORD_LEN)?;

        if let Some(required) = view.required_letter
            && !word.starts_with(required)
        {
            return Err(RuleViolation::WrongStartingLetter(required));
        }

        if view.moves.iter().any(|mv| mv.value == word) {
            return Err(RuleViolation::DuplicateWord(word.to_string()));
        }

        Ok(())
    }

    fn evaluate(&self, view: &GameView<'_>) -> Option<Outcome> {
        // Moves never end the chain; only eliminations do.
        let mut standing = view.players.values().filter(|player| !player.eliminated);
        let winner = standing.next()?;
        if standing.next().is_some() {
            return None;
        }

        Some(Outcome {
            winner_ids: vec![winner.id],
            winning_value: None,
            reason: OutcomeReason::LastStanding,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use indexmap::IndexMap;

    use super::*;
    use crate::state::game::{MoveRecord, PlayerRef};

    fn player(name: &str) -> PlayerRef {
        PlayerRef {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: name.to_string(),
            is_host: false,
            is_ready: true,
            secret_word: None,
            connection_id: None,
            eliminated: false,
        }
    }

    fn roster(names: &[&str]) -> IndexMap<Uuid, PlayerRef> {
        names
            .iter()
            .map(|name| {
                let p = player(name);
                (p.id, p)
            })
            .collect()
    }

    fn mv(player_id: Uuid, value: &str) -> MoveRecord {
        MoveRecord {
            id: Uuid::new_v4(),
            player_id,
            value: value.to_string(),
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn enforces_turn_order() {
        let rules = WordBombRules;
        let players = roster(&["P1", "P2"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let moves = [];
        let view = GameView {
            players: &players,
            moves: &moves,
            current_turn: Some(ids[0]),
            required_letter: Some('a'),
        };

        assert_eq!(
            rules.validate_move(&view, ids[1], "apple"),
            Err(RuleViolation::NotYourTurn)
        );
        assert!(rules.validate_move(&view, ids[0], "apple").is_ok());
    }

    #[test]
    fn enforces_starting_letter_and_uniqueness() {
        let rules = WordBombRules;
        let players = roster(&["P1", "P2"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let moves = [mv(ids[1], "banana")];
        let view = GameView {
            players: &players,
            moves: &moves,
            current_turn: Some(ids[0]),
            required_letter: Some('a'),
        };

        assert_eq!(
            rules.validate_move(&view, ids[0], "pear"),
            Err(RuleViolation::WrongStartingLetter('a'))
        );
        assert!(rules.validate_move(&view, ids[0], "anchor").is_ok());

        let replayed = [mv(ids[1], "anchor")];
        let view = GameView {
            players: &players,
            moves: &replayed,
            current_turn: Some(ids[0]),
            required_letter: Some('a'),
        };
        assert_eq!(
            rules.validate_move(&view, ids[0], "anchor"),
            Err(RuleViolation::DuplicateWord("anchor".into()))
        );
    }

    #[test]
    fn rejects_short_or_non_alphabetic_words() {
        let rules = WordBombRules;
        let players = roster(&["P1", "P2"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let moves = [];
        let view = GameView {
            players: &players,
            moves: &moves,
            current_turn: Some(ids[0]),
            required_letter: None,
        };

        assert_eq!(
            rules.validate_move(&view, ids[0], "a"),
            Err(RuleViolation::TooShort { min: MIN_WORD_LEN })
        );
        assert_eq!(
            rules.validate_move(&view, ids[0], "ab1"),
            Err(RuleViolation::NotAlphabetic)
        );
    }

    #[test]
    fn last_standing_player_wins() {
        let rules = WordBombRules;
        let mut players = roster(&["P1", "P2", "P3"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let moves = [];
        assert!(
            rules
                .evaluate(&GameView {
                    players: &players,
                    moves: &moves,
                    current_turn: Some(ids[0]),
                    required_letter: None,
                })
                .is_none()
        );

        players[&ids[0]].eliminated = true;
        players[&ids[2]].eliminated = true;
        let outcome = rules
            .evaluate(&GameView {
                players: &players,
                moves: &moves,
                current_turn: Some(ids[1]),
                required_letter: None,
            })
            .unwrap();
        assert_eq!(outcome.winner_ids, vec![ids[1]]);
        assert_eq!(outcome.reason, OutcomeReason::LastStanding);
        assert!(outcome.winning_value.is_none());
    }
}
