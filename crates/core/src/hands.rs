//! Hole-card-pair enumeration for a fixed final-street board.
//!
//! Two indexings coexist. The *raw* index orders pairs `(hi, lo)`
//! lexicographically among pairs disjoint from a board; it addresses bucket
//! maps and unbucketed strategy rows. The *strength-sorted* index orders
//! final-street pairs by hand value, weakest first; the showdown evaluator
//! walks it in equivalence classes of equal value. A per-street projection
//! from the sorted index back to the raw index is precomputed for every
//! board of a [`HandTree`].

use crate::board::BoardTree;
use crate::cards::Card;
use crate::game::Game;
use crate::hand_value::hand_value;

/// One hole-card pair with its final-street value.
#[derive(Debug, Clone, Copy)]
pub struct HandEntry {
    pub hi: Card,
    pub lo: Card,
    pub value: u32,
}

/// All hole-card pairs disjoint from one final-street board, sorted by
/// hand value ascending (ties keep raw order).
#[derive(Debug, Clone)]
pub struct BoardHands {
    hands: Vec<HandEntry>,
    max_card1: usize,
}

impl BoardHands {
    /// Enumerate and sort the pairs for a final-street board.
    #[must_use]
    pub fn new(game: &Game, board: &[Card]) -> Self {
        let deck = game.max_card();
        let mut hands = Vec::with_capacity(game.num_hole_card_pairs(game.max_street()));
        let mut cards = Vec::with_capacity(2 + board.len());
        for hi in 1..=deck {
            if board.contains(&hi) {
                continue;
            }
            for lo in 0..hi {
                if board.contains(&lo) {
                    continue;
                }
                cards.clear();
                cards.push(hi);
                cards.push(lo);
                cards.extend_from_slice(board);
                hands.push(HandEntry {
                    hi,
                    lo,
                    value: hand_value(game.num_ranks(), game.num_suits(), &cards),
                });
            }
        }
        hands.sort_by_key(|h| h.value);
        Self {
            hands,
            max_card1: game.max_card1(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// The `i`-th pair in strength-sorted order.
    #[must_use]
    pub fn hand(&self, i: usize) -> &HandEntry {
        &self.hands[i]
    }

    /// Dense-array subscript of the `i`-th sorted pair.
    #[must_use]
    pub fn enc(&self, i: usize) -> usize {
        let h = &self.hands[i];
        usize::from(h.hi) * self.max_card1 + usize::from(h.lo)
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, HandEntry> {
        self.hands.iter()
    }
}

/// O(1) raw hole-card-pair indexing against a fixed board.
///
/// `index(hi, lo)` is the rank of `(hi, lo)` in the lexicographic
/// enumeration of pairs disjoint from the board.
#[derive(Debug, Clone)]
pub struct HcpIndexer {
    /// Off-board cards strictly below each card code.
    off_before: Vec<usize>,
    /// Pairs whose high card is strictly below each card code.
    pairs_before: Vec<usize>,
}

impl HcpIndexer {
    #[must_use]
    pub fn new(game: &Game, board: &[Card]) -> Self {
        let deck = game.deck_size();
        let mut off_before = vec![0usize; deck + 1];
        let mut pairs_before = vec![0usize; deck + 1];
        for c in 0..deck {
            let on_board = board.contains(&(c as Card));
            off_before[c + 1] = off_before[c] + usize::from(!on_board);
            pairs_before[c + 1] = pairs_before[c] + if on_board { 0 } else { off_before[c] };
        }
        Self {
            off_before,
            pairs_before,
        }
    }

    /// Raw index of a pair; both cards must be off the board.
    #[must_use]
    pub fn index(&self, hi: Card, lo: Card) -> usize {
        self.pairs_before[usize::from(hi)] + self.off_before[usize::from(lo)]
    }
}

struct HandsForBoard {
    hands: BoardHands,
    /// `raw[st][sorted_idx]` = raw hole-card-pair index on street `st`.
    raw: Vec<Vec<u32>>,
}

/// Hands for every final-street board under a root board, locally indexed.
///
/// The walker roots this at the sampled final-street board (one entry);
/// a resolve rooted before the final street spans every runout of the
/// resolve board.
pub struct HandTree {
    root_st: u8,
    root_bd: usize,
    /// Global final-street board index per local index.
    final_boards: Vec<usize>,
    boards: Vec<HandsForBoard>,
}

impl HandTree {
    #[must_use]
    pub fn new(game: &Game, board_tree: &BoardTree, root_st: u8, root_bd: usize) -> Self {
        let max_street = game.max_street();
        let final_boards = board_tree.boards_under(root_st, root_bd, max_street);
        let boards = final_boards
            .iter()
            .map(|&gbd| {
                let full = board_tree.board(max_street, gbd);
                let hands = BoardHands::new(game, full);
                let raw = (0..=max_street)
                    .map(|st| {
                        let prefix = &full[..game.num_board_cards(st)];
                        let indexer = HcpIndexer::new(game, prefix);
                        hands
                            .iter()
                            .map(|h| indexer.index(h.hi, h.lo) as u32)
                            .collect()
                    })
                    .collect();
                HandsForBoard { hands, raw }
            })
            .collect();
        Self {
            root_st,
            root_bd,
            final_boards,
            boards,
        }
    }

    #[must_use]
    pub fn root_st(&self) -> u8 {
        self.root_st
    }

    #[must_use]
    pub fn root_bd(&self) -> usize {
        self.root_bd
    }

    /// Number of final-street boards in this tree.
    #[must_use]
    pub fn num_boards(&self) -> usize {
        self.boards.len()
    }

    /// Global final-street board index of a local board.
    #[must_use]
    pub fn global_board(&self, lbd: usize) -> usize {
        self.final_boards[lbd]
    }

    #[must_use]
    pub fn hands(&self, lbd: usize) -> &BoardHands {
        &self.boards[lbd].hands
    }

    /// Project a strength-sorted index to the raw index on street `st`.
    #[must_use]
    pub fn raw_hcp(&self, lbd: usize, st: u8, sorted_idx: usize) -> usize {
        self.boards[lbd].raw[usize::from(st)][sorted_idx] as usize
    }
}
