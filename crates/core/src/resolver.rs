//! Unsafe endgame resolving.
//!
//! Re-solves a betting subtree with the walker's incoming reach
//! probabilities as root-range priors and no opponent counterfactual-value
//! constraint (the "unsafe" variant). Runs a fixed number of vector-form
//! CFR half-iterations, alternating the updated player, and accumulates an
//! average strategy consumable through [`StrategyStore::rm_probs`] with the
//! same offset schema as a base strategy — local board coordinates, the
//! subgame bucket map from the resolve street on.
//!
//! The solve is deterministic: no randomness, a fixed iteration budget,
//! and a fixed traversal order.

use std::sync::Arc;

use crate::betting::{BettingTree, TerminalKind, TreeNode};
use crate::board::BoardTree;
use crate::buckets::Buckets;
use crate::error::EvalResult;
use crate::game::Game;
use crate::hands::HandTree;
use crate::strategy::{StrategySizes, StrategyStore};
use crate::terminal;

/// One subgame resolve: a subtree, its regret and average-strategy tables,
/// and the board coordinates it is rooted at.
pub struct EndgameResolver {
    subtree: Arc<BettingTree>,
    root_st: u8,
    root_bd: usize,
    regrets: StrategyStore,
    sumprobs: StrategyStore,
    half_iterations: u32,
}

impl EndgameResolver {
    /// Allocate resolver state for a subtree rooted at `(root_st, root_bd)`.
    #[must_use]
    pub fn new(
        game: &Game,
        board_tree: &BoardTree,
        subtree: Arc<BettingTree>,
        subgame_buckets: &Buckets,
        root_st: u8,
        root_bd: usize,
        half_iterations: u32,
    ) -> Self {
        let sizes = StrategySizes::local(game, board_tree, subgame_buckets, root_st, root_bd);
        let regrets = StrategyStore::alloc(&subtree, &sizes);
        let sumprobs = StrategyStore::alloc(&subtree, &sizes);
        Self {
            subtree,
            root_st,
            root_bd,
            regrets,
            sumprobs,
            half_iterations,
        }
    }

    /// The subtree this resolver solved; the walker continues on it.
    #[must_use]
    pub fn subtree(&self) -> Arc<BettingTree> {
        Arc::clone(&self.subtree)
    }

    /// Average-strategy counters produced by [`Self::solve`].
    #[must_use]
    pub fn sumprobs(&self) -> &StrategyStore {
        &self.sumprobs
    }

    /// Run the CFR half-iterations with the given root ranges.
    ///
    /// `reach_probs` are dense `enc`-indexed vectors per player, exactly as
    /// the walker carries them into the resolve boundary.
    ///
    /// # Errors
    ///
    /// Propagates strategy-table addressing failures, which indicate a
    /// malformed subtree or bucket map.
    pub fn solve(
        &mut self,
        game: &Game,
        board_tree: &BoardTree,
        buckets: &Buckets,
        hand_tree: &HandTree,
        reach_probs: &[Vec<f64>; 2],
    ) -> EvalResult<()> {
        debug_assert_eq!(hand_tree.root_st(), self.root_st);
        debug_assert_eq!(hand_tree.root_bd(), self.root_bd);

        // Local board index per (final board, street): computed once, used
        // for every strategy-row offset in the traversal.
        let max_street = game.max_street();
        let local_boards: Vec<Vec<usize>> = (0..hand_tree.num_boards())
            .map(|lbd| {
                let gbd = hand_tree.global_board(lbd);
                (0..=max_street)
                    .map(|st| {
                        if st < self.root_st {
                            0
                        } else {
                            let at_st = board_tree.ancestor(max_street, gbd, st);
                            board_tree.local_index(self.root_st, self.root_bd, st, at_st)
                        }
                    })
                    .collect()
            })
            .collect();
        let board_weights: Vec<f64> = (0..hand_tree.num_boards())
            .map(|lbd| f64::from(board_tree.board_count(max_street, hand_tree.global_board(lbd))))
            .collect();

        for half in 0..self.half_iterations {
            // Player 1 updates first, then players alternate.
            let p = 1 - (half % 2) as u8;
            for lbd in 0..hand_tree.num_boards() {
                let hands = hand_tree.hands(lbd);
                let opp = usize::from(1 - p);
                let opp_reach: Vec<f64> = (0..hands.len())
                    .map(|i| reach_probs[opp][hands.enc(i)] * board_weights[lbd])
                    .collect();
                let ctx = SolveContext {
                    game,
                    buckets,
                    hand_tree,
                    lbd,
                    locals: &local_boards[lbd],
                };
                self.process(&ctx, self.subtree.root(), p, &opp_reach)?;
            }
        }
        Ok(())
    }

    /// Vector CFR over one subtree node for one final board. Returns the
    /// traverser's counterfactual value per strength-sorted hand.
    fn process(
        &mut self,
        ctx: &SolveContext<'_>,
        node_id: u32,
        p: u8,
        opp_reach: &[f64],
    ) -> EvalResult<Vec<f64>> {
        let node = self.subtree.node(node_id).clone();
        if let Some(kind) = node.terminal {
            return Ok(self.terminal_values(ctx, &node, kind, p, opp_reach));
        }
        if node.num_succs() == 1 {
            return self.process(ctx, node.succs[0], p, opp_reach);
        }
        if node.player_acting == p {
            self.traverser_node(ctx, &node, p, opp_reach)
        } else {
            self.opponent_node(ctx, &node, p, opp_reach)
        }
    }

    fn terminal_values(
        &self,
        ctx: &SolveContext<'_>,
        node: &TreeNode,
        kind: TerminalKind,
        p: u8,
        opp_reach: &[f64],
    ) -> Vec<f64> {
        let hands = ctx.hand_tree.hands(ctx.lbd);
        let max_card1 = ctx.game.max_card1();
        let half_pot = f64::from(node.last_bet_to);
        match kind {
            TerminalKind::Showdown => {
                terminal::showdown_values(hands, opp_reach, half_pot, max_card1)
            }
            TerminalKind::Fold => {
                // `player_acting` is the remaining player at fold nodes.
                let signed = if node.player_acting == p {
                    half_pot
                } else {
                    -half_pot
                };
                terminal::fold_values(hands, opp_reach, signed, max_card1)
            }
        }
    }

    /// Traverser decision: recurse per successor, regret-match per hand,
    /// and push counterfactual regrets.
    fn traverser_node(
        &mut self,
        ctx: &SolveContext<'_>,
        node: &TreeNode,
        p: u8,
        opp_reach: &[f64],
    ) -> EvalResult<Vec<f64>> {
        let num_succs = node.num_succs();
        let mut succ_vals = Vec::with_capacity(num_succs);
        for s in 0..num_succs {
            succ_vals.push(self.process(ctx, node.succs[s], p, opp_reach)?);
        }

        let hands = ctx.hand_tree.hands(ctx.lbd);
        let n = hands.len();
        let mut vals = vec![0.0; n];
        let mut probs = vec![0.0; num_succs];
        for i in 0..n {
            let offset = ctx.row_offset(node, i);
            self.regrets.rm_probs(
                node.street,
                node.player_acting,
                node.nonterminal_id,
                offset,
                num_succs,
                node.default_succ,
                &mut probs,
            )?;
            let mut v = 0.0;
            for s in 0..num_succs {
                v += probs[s] * succ_vals[s][i];
            }
            vals[i] = v;
            let row = self.regrets.row_mut(
                node.street,
                node.player_acting,
                node.nonterminal_id,
                offset,
                num_succs,
            )?;
            for (s, r) in row.iter_mut().enumerate() {
                *r += succ_vals[s][i] - v;
            }
        }
        Ok(vals)
    }

    /// Opponent decision: scale the opponent's reach through their current
    /// strategy, accumulate their average strategy, and sum successor
    /// values.
    fn opponent_node(
        &mut self,
        ctx: &SolveContext<'_>,
        node: &TreeNode,
        p: u8,
        opp_reach: &[f64],
    ) -> EvalResult<Vec<f64>> {
        let num_succs = node.num_succs();
        let hands = ctx.hand_tree.hands(ctx.lbd);
        let n = hands.len();

        // Per-hand current strategy for the opponent.
        let mut succ_reach = vec![vec![0.0; n]; num_succs];
        let mut probs = vec![0.0; num_succs];
        for i in 0..n {
            let offset = ctx.row_offset(node, i);
            self.regrets.rm_probs(
                node.street,
                node.player_acting,
                node.nonterminal_id,
                offset,
                num_succs,
                node.default_succ,
                &mut probs,
            )?;
            let row = self.sumprobs.row_mut(
                node.street,
                node.player_acting,
                node.nonterminal_id,
                offset,
                num_succs,
            )?;
            for s in 0..num_succs {
                succ_reach[s][i] = opp_reach[i] * probs[s];
                row[s] += opp_reach[i] * probs[s];
            }
        }

        let mut vals = vec![0.0; n];
        for s in 0..num_succs {
            let child_vals = self.process(ctx, node.succs[s], p, &succ_reach[s])?;
            for (v, c) in vals.iter_mut().zip(&child_vals) {
                *v += c;
            }
        }
        Ok(vals)
    }
}

/// Immutable lookup context for one (final board, half-iteration) pass.
struct SolveContext<'a> {
    game: &'a Game,
    buckets: &'a Buckets,
    hand_tree: &'a HandTree,
    lbd: usize,
    /// Local board index per street for this final board.
    locals: &'a [usize],
}

impl SolveContext<'_> {
    /// Strategy-row offset for the `i`-th sorted hand at a node, in the
    /// schema the walker later reads with `rm_probs`.
    fn row_offset(&self, node: &TreeNode, i: usize) -> u64 {
        let st = node.street;
        let num_succs = node.num_succs() as u64;
        let gbd = self.locals[usize::from(st)] as u64;
        let h_st = self.game.num_hole_card_pairs(st) as u64;
        let hcp = if st == self.game.max_street() && self.buckets.none_on(st) {
            i as u64
        } else {
            self.hand_tree.raw_hcp(self.lbd, st, i) as u64
        };
        if self.buckets.none_on(st) {
            (gbd * h_st + hcp) * num_succs
        } else {
            u64::from(self.buckets.bucket(st, gbd * h_st + hcp)) * num_succs
        }
    }
}
