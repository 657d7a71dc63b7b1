//! Game definition loaded from a params file.
//!
//! A game fixes the deck geometry (ranks, suits), the street structure
//! (cards dealt per street), the blinds, and the stack depth. Everything
//! downstream — board enumeration, hand indexing, betting trees — derives
//! from these parameters. Chip amounts are in small-blind units.

use std::path::Path;

use serde::Deserialize;

use crate::cards::{self, Card};
use crate::error::{EvalError, EvalResult};

fn default_small_blind() -> u32 {
    1
}

fn default_big_blind() -> u32 {
    2
}

/// Game parameters as they appear in the YAML params file.
#[derive(Debug, Clone, Deserialize)]
pub struct GameParams {
    /// Name used in strategy directory paths.
    pub game_name: String,
    /// Number of players; only heads-up (2) is supported.
    pub num_players: u8,
    /// Number of card ranks in the deck (4..=13).
    pub num_ranks: u8,
    /// Number of suits in the deck (1..=4).
    pub num_suits: u8,
    /// Index of the final street (0 = no community cards dealt after the
    /// hole cards).
    pub max_street: u8,
    /// Cards dealt per street; index 0 is the hole cards (always 2),
    /// indices 1..=max_street are board cards.
    pub num_cards_for_street: Vec<u8>,
    #[serde(default = "default_small_blind")]
    pub small_blind: u32,
    #[serde(default = "default_big_blind")]
    pub big_blind: u32,
    /// Stack per player in small blinds.
    pub stack_size: u32,
}

impl GameParams {
    /// Load game parameters from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// parameters are out of range.
    pub fn load<P: AsRef<Path>>(path: P) -> EvalResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EvalError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse game parameters from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Config` on invalid YAML or out-of-range values.
    pub fn from_yaml(yaml: &str) -> EvalResult<Self> {
        let params: Self =
            serde_yaml::from_str(yaml).map_err(|e| EvalError::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> EvalResult<()> {
        if self.num_players != 2 {
            return Err(EvalError::Config(format!(
                "only heads-up is supported, got {} players",
                self.num_players
            )));
        }
        if self.num_ranks < 2 || self.num_ranks > 13 {
            return Err(EvalError::Config(format!(
                "num_ranks must be in 2..=13, got {}",
                self.num_ranks
            )));
        }
        if self.num_suits < 1 || self.num_suits > 4 {
            return Err(EvalError::Config(format!(
                "num_suits must be in 1..=4, got {}",
                self.num_suits
            )));
        }
        if self.num_cards_for_street.len() != self.max_street as usize + 1 {
            return Err(EvalError::Config(format!(
                "num_cards_for_street needs {} entries, got {}",
                self.max_street + 1,
                self.num_cards_for_street.len()
            )));
        }
        if self.num_cards_for_street[0] != 2 {
            return Err(EvalError::Config(
                "exactly two hole cards are required".to_string(),
            ));
        }
        let deck = u32::from(self.num_ranks) * u32::from(self.num_suits);
        let dealt = u32::from(self.num_cards_for_street[0]) * u32::from(self.num_players)
            + self.num_cards_for_street[1..]
                .iter()
                .map(|&n| u32::from(n))
                .sum::<u32>();
        if dealt > deck {
            return Err(EvalError::Config(format!(
                "game deals {dealt} cards but the deck has only {deck}"
            )));
        }
        if self.small_blind == 0 || self.big_blind < self.small_blind {
            return Err(EvalError::Config(
                "blinds must satisfy 0 < small_blind <= big_blind".to_string(),
            ));
        }
        if self.stack_size < self.big_blind {
            return Err(EvalError::Config(
                "stack_size must cover the big blind".to_string(),
            ));
        }
        Ok(())
    }
}

/// A fully validated game with derived deck geometry.
#[derive(Debug, Clone)]
pub struct Game {
    params: GameParams,
    /// Cumulative board-card counts per street.
    board_cards: Vec<u8>,
}

impl Game {
    /// Build a game from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Config` if the parameters fail validation.
    pub fn new(params: GameParams) -> EvalResult<Self> {
        params.validate()?;
        let mut board_cards = Vec::with_capacity(params.num_cards_for_street.len());
        let mut total = 0u8;
        for (st, &n) in params.num_cards_for_street.iter().enumerate() {
            if st > 0 {
                total += n;
            }
            board_cards.push(total);
        }
        Ok(Self {
            params,
            board_cards,
        })
    }

    #[must_use]
    pub fn params(&self) -> &GameParams {
        &self.params
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.params.game_name
    }

    #[must_use]
    pub fn num_players(&self) -> u8 {
        self.params.num_players
    }

    #[must_use]
    pub fn num_ranks(&self) -> u8 {
        self.params.num_ranks
    }

    #[must_use]
    pub fn num_suits(&self) -> u8 {
        self.params.num_suits
    }

    #[must_use]
    pub fn max_street(&self) -> u8 {
        self.params.max_street
    }

    #[must_use]
    pub fn small_blind(&self) -> u32 {
        self.params.small_blind
    }

    #[must_use]
    pub fn big_blind(&self) -> u32 {
        self.params.big_blind
    }

    #[must_use]
    pub fn stack_size(&self) -> u32 {
        self.params.stack_size
    }

    /// Highest card code in the deck.
    #[must_use]
    pub fn max_card(&self) -> Card {
        self.params.num_ranks * self.params.num_suits - 1
    }

    /// `max_card + 1`, the stride of `enc = hi * (max_card + 1) + lo`.
    #[must_use]
    pub fn max_card1(&self) -> usize {
        usize::from(self.max_card()) + 1
    }

    /// Number of `enc` slots for a dense reach-probability vector.
    #[must_use]
    pub fn num_enc(&self) -> usize {
        self.max_card1() * self.max_card1()
    }

    #[must_use]
    pub fn deck_size(&self) -> usize {
        usize::from(self.params.num_ranks) * usize::from(self.params.num_suits)
    }

    /// Community cards on the board at the given street.
    #[must_use]
    pub fn num_board_cards(&self, st: u8) -> usize {
        usize::from(self.board_cards[usize::from(st)])
    }

    /// Cards dealt on the given street (street 0 = hole cards).
    #[must_use]
    pub fn num_cards_for_street(&self, st: u8) -> usize {
        usize::from(self.params.num_cards_for_street[usize::from(st)])
    }

    /// Number of hole-card pairs disjoint from a street-`st` board.
    #[must_use]
    pub fn num_hole_card_pairs(&self, st: u8) -> usize {
        let live = self.deck_size() - self.num_board_cards(st);
        live * (live - 1) / 2
    }

    /// Display form of a card.
    #[must_use]
    pub fn card_string(&self, card: Card) -> String {
        cards::card_string(card, self.params.num_suits)
    }

    /// Display form of a board.
    #[must_use]
    pub fn board_string(&self, board: &[Card]) -> String {
        cards::cards_string(board, self.params.num_suits)
    }
}

/// A small toy game used by tests throughout the crate: 4 ranks x 2 suits
/// (8 cards), a single street (no community cards), stacks of 10 small
/// blinds.
#[must_use]
pub fn toy_game() -> Game {
    let params = GameParams {
        game_name: "toy".to_string(),
        num_players: 2,
        num_ranks: 4,
        num_suits: 2,
        max_street: 0,
        num_cards_for_street: vec![2],
        small_blind: 1,
        big_blind: 2,
        stack_size: 10,
    };
    Game::new(params).expect("toy game params are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    const HOLDEM_YAML: &str = "\
game_name: holdem
num_players: 2
num_ranks: 13
num_suits: 4
max_street: 3
num_cards_for_street: [2, 3, 1, 1]
stack_size: 200
";

    #[timed_test]
    fn holdem_geometry() {
        let game = Game::new(GameParams::from_yaml(HOLDEM_YAML).unwrap()).unwrap();
        assert_eq!(game.deck_size(), 52);
        assert_eq!(game.max_card(), 51);
        assert_eq!(game.num_board_cards(0), 0);
        assert_eq!(game.num_board_cards(1), 3);
        assert_eq!(game.num_board_cards(3), 5);
        // River: C(47, 2) pairs.
        assert_eq!(game.num_hole_card_pairs(3), 47 * 46 / 2);
        assert_eq!(game.num_hole_card_pairs(0), 52 * 51 / 2);
    }

    #[timed_test]
    fn toy_game_geometry() {
        let game = toy_game();
        assert_eq!(game.deck_size(), 8);
        assert_eq!(game.num_hole_card_pairs(0), 28);
        assert_eq!(game.max_street(), 0);
    }

    #[timed_test]
    fn rejects_three_players() {
        let yaml = HOLDEM_YAML.replace("num_players: 2", "num_players: 3");
        assert!(GameParams::from_yaml(&yaml).is_err());
    }

    #[timed_test]
    fn rejects_street_count_mismatch() {
        let yaml = HOLDEM_YAML.replace("[2, 3, 1, 1]", "[2, 3, 1]");
        assert!(GameParams::from_yaml(&yaml).is_err());
    }

    #[timed_test]
    fn blind_defaults_apply() {
        let game = Game::new(GameParams::from_yaml(HOLDEM_YAML).unwrap()).unwrap();
        assert_eq!(game.small_blind(), 1);
        assert_eq!(game.big_blind(), 2);
    }
}
