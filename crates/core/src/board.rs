//! Canonical board enumeration.
//!
//! Boards are enumerated once per street, deduplicated by suit isomorphism:
//! two boards are equivalent when one maps onto the other by relabeling
//! suits (per-street card order is immaterial). Each stored board carries
//! its multiplicity — the number of raw sorted-per-street boards in its
//! suit orbit — which is the sampling weight used by the evaluator.
//!
//! Boards at street `st` are generated by extending boards at `st - 1`, so
//! every board has a unique predecessor chain. Orbits at a street partition
//! by parent orbit, which keeps local (subtree-relative) indexing
//! consistent with the global order.

use rustc_hash::FxHashMap;

use crate::cards::Card;
use crate::game::Game;

#[derive(Debug, Clone)]
struct BoardEntry {
    /// Full prefix: all community cards from street 1 up to this street,
    /// each street's segment sorted ascending.
    cards: Vec<Card>,
    /// Index of the street-(st-1) board this extends.
    pred: u32,
    /// Number of raw sorted-per-street boards in this board's suit orbit.
    count: u32,
}

/// Per-street canonical board tables.
#[derive(Debug, Clone)]
pub struct BoardTree {
    streets: Vec<Vec<BoardEntry>>,
    /// Segment length per street (0 for street 0).
    seg_lens: Vec<usize>,
}

impl BoardTree {
    /// Enumerate canonical boards for every street of the game.
    #[must_use]
    pub fn build(game: &Game) -> Self {
        let max_street = game.max_street();
        let perms = suit_permutations(game.num_suits());
        let deck: Vec<Card> = (0..=game.max_card()).collect();

        let mut seg_lens = vec![0usize];
        let mut streets = vec![vec![BoardEntry {
            cards: Vec::new(),
            pred: 0,
            count: 1,
        }]];

        for st in 1..=max_street {
            let seg = game.num_cards_for_street(st);
            seg_lens.push(seg);
            let mut entries: Vec<BoardEntry> = Vec::new();
            let mut seen: FxHashMap<Vec<Card>, ()> = FxHashMap::default();
            let parents = &streets[usize::from(st) - 1];
            for (pbd, parent) in parents.iter().enumerate() {
                let live: Vec<Card> = deck
                    .iter()
                    .copied()
                    .filter(|c| !parent.cards.contains(c))
                    .collect();
                for combo in combinations(&live, seg) {
                    let mut seq = parent.cards.clone();
                    seq.extend_from_slice(&combo);
                    let orbit = orbit_of(&seq, &seg_lens[1..=usize::from(st)], &perms, game);
                    let key = orbit
                        .iter()
                        .min()
                        .expect("orbit contains the board itself")
                        .clone();
                    if seen.insert(key, ()).is_none() {
                        entries.push(BoardEntry {
                            cards: seq,
                            pred: pbd as u32,
                            count: orbit.len() as u32,
                        });
                    }
                }
            }
            streets.push(entries);
        }

        Self { streets, seg_lens }
    }

    /// Number of canonical boards at a street.
    #[must_use]
    pub fn num_boards(&self, st: u8) -> usize {
        self.streets[usize::from(st)].len()
    }

    /// The stored board: all community cards through street `st`.
    #[must_use]
    pub fn board(&self, st: u8, bd: usize) -> &[Card] {
        &self.streets[usize::from(st)][bd].cards
    }

    /// Canonical multiplicity of a board.
    #[must_use]
    pub fn board_count(&self, st: u8, bd: usize) -> u32 {
        self.streets[usize::from(st)][bd].count
    }

    /// Street-`st` ancestor of a board at street `from`.
    #[must_use]
    pub fn ancestor(&self, from: u8, bd: usize, st: u8) -> usize {
        debug_assert!(st <= from);
        let mut cur = bd;
        let mut s = from;
        while s > st {
            cur = self.streets[usize::from(s)][cur].pred as usize;
            s -= 1;
        }
        cur
    }

    /// Street-`st` predecessor of a final-street board.
    #[must_use]
    pub fn pred_board(&self, msbd: usize, st: u8) -> usize {
        self.ancestor(self.max_street(), msbd, st)
    }

    /// Global indices of street-`st` boards descending from `root_bd` at
    /// street `root_st`, in global order. This is the local enumeration
    /// used by resolve subtrees and hand trees.
    #[must_use]
    pub fn boards_under(&self, root_st: u8, root_bd: usize, st: u8) -> Vec<usize> {
        (0..self.num_boards(st))
            .filter(|&bd| self.ancestor(st, bd, root_st) == root_bd)
            .collect()
    }

    /// Rank of `gbd` within [`Self::boards_under`]`(root_st, root_bd, st)`.
    ///
    /// The board must descend from the root; this is the reindexing step a
    /// resolving side performs when entering a subtree.
    #[must_use]
    pub fn local_index(&self, root_st: u8, root_bd: usize, st: u8, gbd: usize) -> usize {
        debug_assert_eq!(self.ancestor(st, gbd, root_st), root_bd);
        (0..gbd)
            .filter(|&bd| self.ancestor(st, bd, root_st) == root_bd)
            .count()
    }

    fn max_street(&self) -> u8 {
        (self.streets.len() - 1) as u8
    }
}

/// The suit orbit of a board sequence: every distinct sorted-per-street
/// image under a suit relabeling.
fn orbit_of(
    seq: &[Card],
    seg_lens: &[usize],
    perms: &[Vec<u8>],
    game: &Game,
) -> Vec<Vec<Card>> {
    let num_suits = game.num_suits();
    let mut images: Vec<Vec<Card>> = Vec::with_capacity(perms.len());
    for perm in perms {
        let mut img: Vec<Card> = seq
            .iter()
            .map(|&c| (c / num_suits) * num_suits + perm[usize::from(c % num_suits)])
            .collect();
        let mut start = 0;
        for &len in seg_lens {
            img[start..start + len].sort_unstable();
            start += len;
        }
        if !images.contains(&img) {
            images.push(img);
        }
    }
    images
}

/// All permutations of `0..num_suits`.
fn suit_permutations(num_suits: u8) -> Vec<Vec<u8>> {
    fn recurse(prefix: &mut Vec<u8>, rest: &[u8], out: &mut Vec<Vec<u8>>) {
        if rest.is_empty() {
            out.push(prefix.clone());
            return;
        }
        for (i, &s) in rest.iter().enumerate() {
            prefix.push(s);
            let mut next: Vec<u8> = rest.to_vec();
            next.remove(i);
            recurse(prefix, &next, out);
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    recurse(
        &mut Vec::new(),
        &(0..num_suits).collect::<Vec<_>>(),
        &mut out,
    );
    out
}

/// Ascending `k`-combinations of an ascending card list.
fn combinations(cards: &[Card], k: usize) -> Vec<Vec<Card>> {
    fn recurse(cards: &[Card], k: usize, start: usize, cur: &mut Vec<Card>, out: &mut Vec<Vec<Card>>) {
        if cur.len() == k {
            out.push(cur.clone());
            return;
        }
        let needed = k - cur.len();
        for i in start..=cards.len().saturating_sub(needed) {
            cur.push(cards[i]);
            recurse(cards, k, i + 1, cur, out);
            cur.pop();
        }
    }
    let mut out = Vec::new();
    recurse(cards, k, 0, &mut Vec::new(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Game, GameParams};
    use test_macros::timed_test;

    fn game_with_streets(num_ranks: u8, num_suits: u8, cards_per_street: Vec<u8>) -> Game {
        let max_street = (cards_per_street.len() - 1) as u8;
        Game::new(GameParams {
            game_name: "test".to_string(),
            num_players: 2,
            num_ranks,
            num_suits,
            max_street,
            num_cards_for_street: cards_per_street,
            small_blind: 1,
            big_blind: 2,
            stack_size: 20,
        })
        .unwrap()
    }

    #[timed_test]
    fn street_zero_has_one_empty_board() {
        let game = crate::game::toy_game();
        let tree = BoardTree::build(&game);
        assert_eq!(tree.num_boards(0), 1);
        assert_eq!(tree.board_count(0, 0), 1);
        assert!(tree.board(0, 0).is_empty());
    }

    #[timed_test]
    fn toy_one_card_street_collapses_suits() {
        // 8 cards, 2 suits, one board card: 8 raw boards, 4 orbits of 2.
        let game = game_with_streets(4, 2, vec![2, 1]);
        let tree = BoardTree::build(&game);
        assert_eq!(tree.num_boards(1), 4);
        for bd in 0..4 {
            assert_eq!(tree.board_count(1, bd), 2);
        }
        let total: u32 = (0..4).map(|bd| tree.board_count(1, bd)).sum();
        assert_eq!(total, 8);
    }

    #[timed_test(60)]
    fn holdem_flops_canonicalize_to_1755() {
        let game = game_with_streets(13, 4, vec![2, 3]);
        let tree = BoardTree::build(&game);
        assert_eq!(tree.num_boards(1), 1755);
        let total: u64 = (0..1755)
            .map(|bd| u64::from(tree.board_count(1, bd)))
            .sum();
        assert_eq!(total, 22_100, "counts cover every raw flop");
    }

    #[timed_test]
    fn two_street_counts_cover_raw_boards() {
        // 8 cards, streets deal 1 then 1: raw sorted boards = 8 * 7.
        let game = game_with_streets(4, 2, vec![2, 1, 1]);
        let tree = BoardTree::build(&game);
        let total: u32 = (0..tree.num_boards(2))
            .map(|bd| tree.board_count(2, bd))
            .sum();
        assert_eq!(total, 8 * 7);
        // Every street-2 board chains back to its stored predecessor.
        for bd in 0..tree.num_boards(2) {
            let pred = tree.pred_board(bd, 1);
            assert!(pred < tree.num_boards(1));
            let pred_cards = tree.board(1, pred);
            assert_eq!(&tree.board(2, bd)[..1], pred_cards);
        }
    }

    #[timed_test]
    fn local_index_is_rank_within_subtree() {
        let game = game_with_streets(4, 2, vec![2, 1, 1]);
        let tree = BoardTree::build(&game);
        for root in 0..tree.num_boards(1) {
            let under = tree.boards_under(1, root, 2);
            for (li, &gbd) in under.iter().enumerate() {
                assert_eq!(tree.local_index(1, root, 2, gbd), li);
            }
        }
    }

    #[timed_test]
    fn root_board_local_index_is_zero() {
        let game = game_with_streets(4, 2, vec![2, 1]);
        let tree = BoardTree::build(&game);
        for bd in 0..tree.num_boards(1) {
            assert_eq!(tree.local_index(1, bd, 1, bd), 0);
        }
    }
}
