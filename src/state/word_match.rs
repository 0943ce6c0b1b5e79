use std::collections::HashMap;

use uuid::Uuid;

use crate::dao::models::GameType;
use crate::state::game::{Outcome, OutcomeReason};
use crate::state::rules::{GameRules, GameView, RuleViolation, check_word_shape};

/// Cooperative convergence variant: each round every player submits a word,
/// and the game ends when a completed round converges on a single value.
///
/// A round completes once every current player has submitted at least one
/// word since the previous round ended; within a round, a player's latest
/// word counts. Checking completed rounds (rather than a bare
/// latest-word-per-player map) means a stale match from an earlier round can
/// never end the game before the other players have answered it.
pub struct WordMatchRules;

impl GameRules for WordMatchRules {
    fn game_type(&self) -> GameType {
        GameType::WordMatch
    }

    fn min_players(&self) -> usize {
        2
    }

    fn default_max_players(&self) -> usize {
        2
    }

    fn needs_setup(&self) -> bool {
        // Players seed the game with a secret starting word.
        true
    }

    fn turn_based(&self) -> bool {
        false
    }

    fn reveal_own_secret(&self) -> bool {
        true
    }

    fn validate_move(
        &self,
        _view: &GameView<'_>,
        _player_id: Uuid,
        word: &str,
    ) -> Result<(), RuleViolation> {
        // Repeats are legal here: sticking with your word is a strategy.
        check_word_shape(word, 1)
    }

    fn evaluate(&self, view: &GameView<'_>) -> Option<Outcome> {
        // Forward scan in log order; equal timestamps resolve by arrival
        // order. Moves from players no longer in the roster are skipped.
        let mut round: HashMap<Uuid, &str> = HashMap::new();
        for mv in view.moves {
            if !view.players.contains_key(&mv.player_id) {
                continue;
            }
            round.insert(mv.player_id, mv.value.as_str());

            if round.len() == view.players.len() {
                let mut values = round.values();
                let first = *values.next()?;
                if values.all(|value| *value == first) {
                    return Some(Outcome {
                        winner_ids: view.players.keys().copied().collect(),
                        winning_value: Some(first.to_string()),
                        reason: OutcomeReason::WordsMatched,
                    });
                }
                // Mismatched round: start collecting the next one.
                round.clear();
            }
        }

        None
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

    fn view<'a>(
        players: &'a IndexMap<Uuid, PlayerRef>,
        moves: &'a [MoveRecord],
    ) -> GameView<'a> {
        GameView {
            players,
            moves,
            current_turn: None,
            required_letter: None,
        }
    }

    #[test]
    fn win_triggers_at_move_four_not_three() {
        let rules = WordMatchRules;
        let players = roster(&["P1", "P2"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let (p1, p2) = (ids[0], ids[1]);

        // The canonical sequence: (P1 cat) (P2 dog) (P1 dog) (P2 dog).
        let mut moves = vec![mv(p1, "cat")];
        assert!(rules.evaluate(&view(&players, &moves)).is_none());

        moves.push(mv(p2, "dog"));
        assert!(rules.evaluate(&view(&players, &moves)).is_none());

        // After move 3 both latest values read "dog", but P2 has not answered
        // the new round yet, so the game must not end here.
        moves.push(mv(p1, "dog"));
        assert!(rules.evaluate(&view(&players, &moves)).is_none());

        moves.push(mv(p2, "dog"));
        let outcome = rules.evaluate(&view(&players, &moves)).unwrap();
        assert_eq!(outcome.winning_value.as_deref(), Some("dog"));
        assert_eq!(outcome.reason, OutcomeReason::WordsMatched);
        assert_eq!(outcome.winner_ids.len(), 2);
    }

    #[test]
    fn no_win_while_a_player_has_no_move() {
        let rules = WordMatchRules;
        let players = roster(&["P1", "P2"]);
        let p1 = *players.keys().next().unwrap();

        let moves = vec![mv(p1, "dog"), mv(p1, "dog")];
        assert!(rules.evaluate(&view(&players, &moves)).is_none());
    }

    #[test]
    fn resubmission_within_a_round_counts_the_latest_word() {
        let rules = WordMatchRules;
        let players = roster(&["P1", "P2"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let (p1, p2) = (ids[0], ids[1]);

        // P1 changes their mind before P2 answers; the round is (tree, tree).
        let moves = vec![mv(p1, "cat"), mv(p1, "tree"), mv(p2, "tree")];
        let outcome = rules.evaluate(&view(&players, &moves)).unwrap();
        assert_eq!(outcome.winning_value.as_deref(), Some("tree"));
    }

    #[test]
    fn three_players_must_all_converge() {
        let rules = WordMatchRules;
        let players = roster(&["P1", "P2", "P3"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();

        let mut moves = vec![mv(ids[0], "sun"), mv(ids[1], "sun")];
        assert!(rules.evaluate(&view(&players, &moves)).is_none());

        moves.push(mv(ids[2], "moon"));
        // Completed round mismatched: no win, next round starts clean.
        assert!(rules.evaluate(&view(&players, &moves)).is_none());

        moves.extend([mv(ids[0], "sun"), mv(ids[1], "sun"), mv(ids[2], "sun")]);
        let outcome = rules.evaluate(&view(&players, &moves)).unwrap();
        assert_eq!(outcome.winning_value.as_deref(), Some("sun"));
        assert_eq!(outcome.winner_ids.len(), 3);
    }

    #[test]
    fn moves_from_departed_players_are_ignored() {
        let rules = WordMatchRules;
        let mut players = roster(&["P1", "P2", "P3"]);
        let ids: Vec<Uuid> = players.keys().copied().collect();
        let departed = ids[2];
        players.shift_remove(&departed);

        let moves = vec![mv(ids[0], "sun"), mv(departed, "moon"), mv(ids[1], "sun")];
        let outcome = rules.evaluate(&view(&players, &moves)).unwrap();
        assert_eq!(outcome.winning_value.as_deref(), Some("sun"));
    }

    #[test]
    fn rejects_non_alphabetic_words() {
        let rules = WordMatchRules;
        let players = roster(&["P1", "P2"]);
        let p1 = *players.keys().next().unwrap();
        let moves = [];

        assert_eq!(
            rules.validate_move(&view(&players, &moves), p1, "c4t"),
            Err(RuleViolation::NotAlphabetic)
        );
        assert_eq!(
            rules.validate_move(&view(&players, &moves), p1, ""),
            Err(RuleViolation::TooShort { min: 1 })
        );
        assert!(
            rules
                .validate_move(&view(&players, &moves), p1, "cat")
                .is_ok()
        );
    }
}
