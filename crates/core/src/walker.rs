//! Dual-tree head-to-head evaluation.
//!
//! [`Matchup`] holds the immutable inputs: the game, the board tables, one
//! betting tree and strategy store per side, and the resolve
//! configuration. Each sampled final-street board gets its own
//! [`BoardWalk`] with private mutable state — reach vectors, board
//! cursors, hand trees, resolver instances — so boards can run
//! sequentially or in parallel over shared read-only tables.
//!
//! A walk descends both trees in lockstep, carrying a dense
//! reach-probability vector per player. The two sides keep independent
//! board cursors: after a side resolves, its cursor continues on the
//! resolved subtree with *local* board indices while the other side stays
//! on its original tree with global indices. Each board is walked twice,
//! once per seat B occupies.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::betting::{BettingConfig, BettingTree, TreeNode};
use crate::board::BoardTree;
use crate::buckets::Buckets;
use crate::error::{EvalError, EvalResult};
use crate::game::Game;
use crate::hands::HandTree;
use crate::resolver::EndgameResolver;
use crate::sampler;
use crate::strategy::StrategyStore;
use crate::terminal;

/// Tolerated floating-point drift on reach products; anything further out
/// of `[0, 1]` is fatal.
const REACH_EPSILON: f64 = 1e-9;

/// CFR half-iterations per resolve.
pub const SUBGAME_HALF_ITERATIONS: u32 = 200;

/// Resolve inputs for one side.
pub struct SubgameSpec {
    pub betting: BettingConfig,
    pub buckets: Arc<Buckets>,
}

/// Resolve configuration for a matchup.
#[derive(Debug, Clone)]
pub struct MatchupConfig {
    /// Street to resolve on entry; -1 disables resolving.
    pub resolve_st: i32,
    pub resolve_a: bool,
    pub resolve_b: bool,
    pub subgame_half_iterations: u32,
}

impl Default for MatchupConfig {
    fn default() -> Self {
        Self {
            resolve_st: -1,
            resolve_a: false,
            resolve_b: false,
            subgame_half_iterations: SUBGAME_HALF_ITERATIONS,
        }
    }
}

/// Accumulators for one or more boards. Merging is plain addition, so
/// aggregation over boards is associative.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardTotals {
    pub sum_b_outcomes: f64,
    pub sum_p0_outcomes: f64,
    pub sum_p1_outcomes: f64,
    pub sum_weights: f64,
    pub num_resolves: u32,
    pub resolving_secs: f64,
}

impl BoardTotals {
    fn merge(&mut self, other: &BoardTotals) {
        self.sum_b_outcomes += other.sum_b_outcomes;
        self.sum_p0_outcomes += other.sum_p0_outcomes;
        self.sum_p1_outcomes += other.sum_p1_outcomes;
        self.sum_weights += other.sum_weights;
        self.num_resolves += other.num_resolves;
        self.resolving_secs += other.resolving_secs;
    }
}

/// Final report. Outcomes are in small blinds; `*_mbb_per_g` converts to
/// milli-big-blinds per game (divide by the two small blinds in a big
/// blind, times 1000).
#[derive(Debug, Clone)]
pub struct MatchupReport {
    pub avg_b_outcome: f64,
    pub b_mbb_per_g: f64,
    pub avg_p0_outcome: f64,
    pub avg_p1_outcome: f64,
    pub p1_mbb_per_g: f64,
    pub sum_weights: f64,
    pub num_resolves: u32,
    pub resolving_secs: f64,
}

/// The immutable half of an evaluation: shared tables and configuration.
pub struct Matchup {
    game: Arc<Game>,
    board_tree: Arc<BoardTree>,
    a_tree: Arc<BettingTree>,
    b_tree: Arc<BettingTree>,
    a_base_buckets: Arc<Buckets>,
    b_base_buckets: Arc<Buckets>,
    a_probs: Arc<StrategyStore>,
    b_probs: Arc<StrategyStore>,
    a_subgame: Option<SubgameSpec>,
    b_subgame: Option<SubgameSpec>,
    config: MatchupConfig,
}

impl Matchup {
    /// Assemble a matchup.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Config` when the resolve configuration is
    /// inconsistent: a resolving side without subgame inputs, a resolve
    /// street outside the game, or a resolve street given with neither
    /// side resolving.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        game: Arc<Game>,
        board_tree: Arc<BoardTree>,
        a_tree: Arc<BettingTree>,
        b_tree: Arc<BettingTree>,
        a_base_buckets: Arc<Buckets>,
        b_base_buckets: Arc<Buckets>,
        a_probs: Arc<StrategyStore>,
        b_probs: Arc<StrategyStore>,
        a_subgame: Option<SubgameSpec>,
        b_subgame: Option<SubgameSpec>,
        config: MatchupConfig,
    ) -> EvalResult<Self> {
        if config.resolve_a && a_subgame.is_none() {
            return Err(EvalError::Config(
                "resolve_a set but no A subgame inputs".to_string(),
            ));
        }
        if config.resolve_b && b_subgame.is_none() {
            return Err(EvalError::Config(
                "resolve_b set but no B subgame inputs".to_string(),
            ));
        }
        if !config.resolve_a && !config.resolve_b && config.resolve_st != -1 {
            return Err(EvalError::Config(
                "resolve_st should be -1 if not resolving either A or B".to_string(),
            ));
        }
        if (config.resolve_a || config.resolve_b)
            && !(0..=i32::from(game.max_street())).contains(&config.resolve_st)
        {
            return Err(EvalError::Config(format!(
                "resolve_st {} outside game streets",
                config.resolve_st
            )));
        }
        Ok(Self {
            game,
            board_tree,
            a_tree,
            b_tree,
            a_base_buckets,
            b_base_buckets,
            a_probs,
            b_probs,
            a_subgame,
            b_subgame,
            config,
        })
    }

    /// Evaluate sequentially over sampled boards.
    ///
    /// # Errors
    ///
    /// Propagates configuration and invariant failures from the walk.
    pub fn run(&self, num_sampled_boards: usize, seed: u64) -> EvalResult<MatchupReport> {
        let samples = self.select_boards(num_sampled_boards, seed);
        let mut totals = BoardTotals::default();
        for s in &samples {
            let walk = BoardWalk::new(self, s.bd, s.count);
            totals.merge(&walk.process()?);
        }
        self.report(&totals)
    }

    /// Evaluate with boards distributed over a rayon pool. The shared
    /// tables are read-only; per-board state is private to each worker.
    ///
    /// # Errors
    ///
    /// Propagates configuration and invariant failures from any board.
    pub fn run_parallel(&self, num_sampled_boards: usize, seed: u64) -> EvalResult<MatchupReport> {
        let samples = self.select_boards(num_sampled_boards, seed);
        let per_board: EvalResult<Vec<BoardTotals>> = samples
            .par_iter()
            .map(|s| BoardWalk::new(self, s.bd, s.count).process())
            .collect();
        let mut totals = BoardTotals::default();
        for t in &per_board? {
            totals.merge(t);
        }
        self.report(&totals)
    }

    fn select_boards(&self, requested: usize, seed: u64) -> Vec<sampler::BoardSample> {
        let ms = self.game.max_street();
        let num_boards = self.board_tree.num_boards(ms);
        if requested == 0 || requested >= num_boards {
            eprintln!("Processing all max street boards");
        }
        sampler::sample_final_boards(&self.board_tree, ms, requested, seed)
    }

    fn report(&self, totals: &BoardTotals) -> EvalResult<MatchupReport> {
        if totals.sum_weights <= 0.0 {
            return Err(EvalError::Invariant(format!(
                "aggregate weight {} is not positive",
                totals.sum_weights
            )));
        }
        let avg_b_outcome = totals.sum_b_outcomes / totals.sum_weights;
        let avg_p0_outcome = totals.sum_p0_outcomes / totals.sum_weights;
        let avg_p1_outcome = totals.sum_p1_outcomes / totals.sum_weights;
        Ok(MatchupReport {
            avg_b_outcome,
            b_mbb_per_g: (avg_b_outcome / 2.0) * 1000.0,
            avg_p0_outcome,
            avg_p1_outcome,
            p1_mbb_per_g: (avg_p1_outcome / 2.0) * 1000.0,
            sum_weights: totals.sum_weights,
            num_resolves: totals.num_resolves,
            resolving_secs: totals.resolving_secs,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// Mutable per-board evaluation state.
struct BoardWalk<'a> {
    m: &'a Matchup,
    msbd: usize,
    num_samples: u32,
    b_pos: u8,
    /// Per-street board cursor for each side: global indices, switched to
    /// subtree-local on a resolve.
    a_boards: Vec<usize>,
    b_boards: Vec<usize>,
    hand_tree: HandTree,
    /// Distinct from `hand_tree` only when resolving before the final
    /// street.
    resolve_hand_tree: Option<HandTree>,
    a_resolver: Option<EndgameResolver>,
    b_resolver: Option<EndgameResolver>,
    totals: BoardTotals,
}

impl<'a> BoardWalk<'a> {
    fn new(m: &'a Matchup, msbd: usize, num_samples: u32) -> Self {
        let game = &m.game;
        let ms = game.max_street();
        let mut boards = vec![0usize; usize::from(ms) + 1];
        boards[usize::from(ms)] = msbd;
        for st in 1..ms {
            boards[usize::from(st)] = m.board_tree.pred_board(msbd, st);
        }
        let hand_tree = HandTree::new(game, &m.board_tree, ms, msbd);
        let resolve_hand_tree = match m.config.resolve_st {
            rst if (m.config.resolve_a || m.config.resolve_b)
                && rst >= 0
                && (rst as u8) < ms =>
            {
                let rst = rst as u8;
                Some(HandTree::new(
                    game,
                    &m.board_tree,
                    rst,
                    m.board_tree.pred_board(msbd, rst),
                ))
            }
            _ => None,
        };
        Self {
            m,
            msbd,
            num_samples,
            b_pos: 0,
            a_boards: boards.clone(),
            b_boards: boards,
            hand_tree,
            resolve_hand_tree,
            a_resolver: None,
            b_resolver: None,
            totals: BoardTotals::default(),
        }
    }

    /// Walk the board from both seats and return its accumulators.
    fn process(mut self) -> EvalResult<BoardTotals> {
        let num_enc = self.m.game.num_enc();
        let mut reach = [vec![0.0; num_enc], vec![0.0; num_enc]];
        let hands = self.hand_tree.hands(0);
        for i in 0..hands.len() {
            let enc = hands.enc(i);
            reach[0][enc] = 1.0;
            reach[1][enc] = 1.0;
        }
        let a_tree = Arc::clone(&self.m.a_tree);
        let b_tree = Arc::clone(&self.m.b_tree);
        for b_pos in 0..2 {
            self.b_pos = b_pos;
            self.walk(&a_tree, a_tree.root(), &b_tree, b_tree.root(), "x", &reach, 0)?;
        }
        Ok(self.totals)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        a_tree: &Arc<BettingTree>,
        a_id: u32,
        b_tree: &Arc<BettingTree>,
        b_id: u32,
        seq: &str,
        reach: &[Vec<f64>; 2],
        last_st: u8,
    ) -> EvalResult<()> {
        let st = a_tree.node(a_id).street;
        if st > last_st && i32::from(st) == self.m.config.resolve_st {
            let (next_a_tree, next_a) = if self.m.config.resolve_a {
                let subtree = self.resolve(Side::A, a_tree.node(a_id), reach)?;
                let root = subtree.root();
                (subtree, root)
            } else {
                (Arc::clone(a_tree), a_id)
            };
            let (next_b_tree, next_b) = if self.m.config.resolve_b {
                let subtree = self.resolve(Side::B, b_tree.node(b_id), reach)?;
                let root = subtree.root();
                (subtree, root)
            } else {
                (Arc::clone(b_tree), b_id)
            };
            return self.walk(&next_a_tree, next_a, &next_b_tree, next_b, seq, reach, st);
        }

        let a = a_tree.node(a_id);
        let b = b_tree.node(b_id);
        match (a.is_terminal(), b.is_terminal()) {
            (true, true) => {
                if a.is_showdown() {
                    self.showdown(a, reach)
                } else {
                    self.fold(a, reach)
                }
            }
            (true, false) | (false, true) => Err(EvalError::Invariant(format!(
                "terminal mismatch between A and B trees at '{seq}'"
            ))),
            (false, false) => self.nonterminal(a_tree, a_id, b_tree, b_id, seq, reach),
        }
    }

    /// Resolve one side's subtree at a street entry and switch that side's
    /// board cursor to local coordinates.
    fn resolve(
        &mut self,
        side: Side,
        node: &TreeNode,
        reach: &[Vec<f64>; 2],
    ) -> EvalResult<Arc<BettingTree>> {
        let game = &self.m.game;
        let ms = game.max_street();
        let st = node.street;
        let root_bd = if st == ms {
            self.msbd
        } else {
            self.m.board_tree.pred_board(self.msbd, st)
        };
        let spec = match side {
            Side::A => self.m.a_subgame.as_ref(),
            Side::B => self.m.b_subgame.as_ref(),
        }
        .expect("validated at construction");

        let subtree = Arc::new(BettingTree::subtree(
            game,
            &spec.betting,
            st,
            node.player_acting,
            node.last_bet_to,
        ));
        let mut resolver = EndgameResolver::new(
            game,
            &self.m.board_tree,
            Arc::clone(&subtree),
            &spec.buckets,
            st,
            root_bd,
            self.m.config.subgame_half_iterations,
        );
        let hand_tree = self.resolve_hand_tree.as_ref().unwrap_or(&self.hand_tree);
        let start = Instant::now();
        resolver.solve(game, &self.m.board_tree, &spec.buckets, hand_tree, reach)?;
        self.totals.resolving_secs += start.elapsed().as_secs_f64();
        self.totals.num_resolves += 1;

        let boards = match side {
            Side::A => &mut self.a_boards,
            Side::B => &mut self.b_boards,
        };
        for st1 in st..=ms {
            let gbd = if st1 == ms {
                self.msbd
            } else {
                self.m.board_tree.pred_board(self.msbd, st1)
            };
            boards[usize::from(st1)] = self.m.board_tree.local_index(st, root_bd, st1, gbd);
        }
        match side {
            Side::A => self.a_resolver = Some(resolver),
            Side::B => self.b_resolver = Some(resolver),
        }
        Ok(subtree)
    }

    #[allow(clippy::too_many_arguments)]
    fn nonterminal(
        &mut self,
        a_tree: &Arc<BettingTree>,
        a_id: u32,
        b_tree: &Arc<BettingTree>,
        b_id: u32,
        seq: &str,
        reach: &[Vec<f64>; 2],
    ) -> EvalResult<()> {
        let a = a_tree.node(a_id);
        let b = b_tree.node(b_id);
        if a.num_succs() != b.num_succs() {
            return Err(EvalError::Invariant(format!(
                "A and B disagree on successors at '{seq}': {} vs {}",
                a.num_succs(),
                b.num_succs()
            )));
        }
        let st = a.street;
        let ms = self.m.game.max_street();
        let resolving_final = |resolve: bool| resolve && st == ms;
        let in_subgame =
            |resolve: bool| resolve && i32::from(st) >= self.m.config.resolve_st;

        let succ_reach = if a.player_acting == self.b_pos {
            let store: &StrategyStore = if resolving_final(self.m.config.resolve_b) {
                self.b_resolver
                    .as_ref()
                    .map(EndgameResolver::sumprobs)
                    .ok_or_else(|| {
                        EvalError::Invariant("B resolves but no resolver is live".to_string())
                    })?
            } else {
                &self.m.b_probs
            };
            let buckets: &Buckets = if in_subgame(self.m.config.resolve_b) {
                &self.m.b_subgame.as_ref().expect("validated").buckets
            } else {
                &self.m.b_base_buckets
            };
            self.succ_reach_probs(b, self.b_boards[usize::from(st)], buckets, store, reach, seq)?
        } else {
            let store: &StrategyStore = if resolving_final(self.m.config.resolve_a) {
                self.a_resolver
                    .as_ref()
                    .map(EndgameResolver::sumprobs)
                    .ok_or_else(|| {
                        EvalError::Invariant("A resolves but no resolver is live".to_string())
                    })?
            } else {
                &self.m.a_probs
            };
            let buckets: &Buckets = if in_subgame(self.m.config.resolve_a) {
                &self.m.a_subgame.as_ref().expect("validated").buckets
            } else {
                &self.m.a_base_buckets
            };
            self.succ_reach_probs(a, self.a_boards[usize::from(st)], buckets, store, reach, seq)?
        };

        for s in 0..a.num_succs() {
            let child_seq = format!("{seq}{}", a.labels[s]);
            self.walk(
                a_tree,
                a.succs[s],
                b_tree,
                b.succs[s],
                &child_seq,
                &succ_reach[s],
                st,
            )?;
        }
        Ok(())
    }

    /// Reach propagation through one decision: per-hand strategy lookup for
    /// the acting player, pass-through for the other.
    fn succ_reach_probs(
        &self,
        node: &TreeNode,
        gbd: usize,
        buckets: &Buckets,
        store: &StrategyStore,
        reach: &[Vec<f64>; 2],
        seq: &str,
    ) -> EvalResult<Vec<[Vec<f64>; 2]>> {
        let game = &self.m.game;
        let ms = game.max_street();
        let st = node.street;
        let num_succs = node.num_succs();
        let num_enc = game.num_enc();
        let hands = self.hand_tree.hands(0);

        let mut out: Vec<[Vec<f64>; 2]> = (0..num_succs)
            .map(|_| [vec![0.0; num_enc], vec![0.0; num_enc]])
            .collect();

        // Forced action (all-in checks): the distribution is the identity.
        if num_succs == 1 {
            for i in 0..hands.len() {
                let enc = hands.enc(i);
                out[0][0][enc] = reach[0][enc];
                out[0][1][enc] = reach[1][enc];
            }
            return Ok(out);
        }

        let pa = usize::from(node.player_acting);
        let h_st = game.num_hole_card_pairs(st) as u64;
        let mut probs = vec![0.0; num_succs];
        for i in 0..hands.len() {
            let enc = hands.enc(i);
            let hcp = if st == ms && buckets.none_on(st) {
                i as u64
            } else {
                self.hand_tree.raw_hcp(0, st, i) as u64
            };
            let offset = if buckets.none_on(st) {
                (gbd as u64 * h_st + hcp) * num_succs as u64
            } else {
                u64::from(buckets.bucket(st, gbd as u64 * h_st + hcp)) * num_succs as u64
            };
            store.rm_probs(
                st,
                node.player_acting,
                node.nonterminal_id,
                offset,
                num_succs,
                node.default_succ,
                &mut probs,
            )?;
            for s in 0..num_succs {
                for p in 0..2usize {
                    let raw = if p == pa {
                        reach[p][enc] * probs[s]
                    } else {
                        reach[p][enc]
                    };
                    out[s][p][enc] = self.checked_reach(raw, enc, st, i, seq)?;
                }
            }
        }
        Ok(out)
    }

    /// Clamp floating drift at the `[0, 1]` boundary; anything further out
    /// is fatal with a full diagnostic.
    fn checked_reach(
        &self,
        prob: f64,
        enc: usize,
        st: u8,
        hand_idx: usize,
        seq: &str,
    ) -> EvalResult<f64> {
        if (0.0..=1.0).contains(&prob) {
            return Ok(prob);
        }
        if (-REACH_EPSILON..0.0).contains(&prob) {
            return Ok(0.0);
        }
        if prob > 1.0 && prob <= 1.0 + REACH_EPSILON {
            return Ok(1.0);
        }
        let game = &self.m.game;
        let h = self.hand_tree.hands(0).hand(hand_idx);
        Err(EvalError::Invariant(format!(
            "OOB reach prob {prob} at '{seq}' st {st} enc {enc} hand {} {} board {}",
            game.card_string(h.hi),
            game.card_string(h.lo),
            game.board_string(self.m.board_tree.board(game.max_street(), self.msbd)),
        )))
    }

    /// Showdown payoff from B's perspective.
    fn showdown(&mut self, node: &TreeNode, reach: &[Vec<f64>; 2]) -> EvalResult<()> {
        let game = &self.m.game;
        let max_card1 = game.max_card1();
        let (a_seat, b_seat) = if self.b_pos == 0 { (1, 0) } else { (0, 1) };
        let a_probs = &reach[a_seat];
        let b_probs = &reach[b_seat];
        let hands = self.hand_tree.hands(0);

        let mut opp = Vec::with_capacity(hands.len());
        for i in 0..hands.len() {
            let p = a_probs[hands.enc(i)];
            if p > 1.0 + REACH_EPSILON {
                return Err(EvalError::Invariant(format!(
                    "showdown: opponent reach {p} for hand {i}"
                )));
            }
            opp.push(p);
        }

        let half_pot = f64::from(node.last_bet_to);
        let vals = terminal::showdown_values(hands, &opp, half_pot, max_card1);
        let cons = terminal::consistent_opp_sums(hands, &opp, max_card1);
        let mut sum_our_vals = 0.0;
        let mut sum_joint_probs = 0.0;
        for i in 0..hands.len() {
            let our = b_probs[hands.enc(i)];
            sum_our_vals += our * vals[i];
            sum_joint_probs += our * cons[i];
        }
        self.accumulate(sum_our_vals, sum_joint_probs);
        Ok(())
    }

    /// Fold payoff from B's perspective. No strength ordering needed.
    fn fold(&mut self, node: &TreeNode, reach: &[Vec<f64>; 2]) -> EvalResult<()> {
        let game = &self.m.game;
        let max_card1 = game.max_card1();
        // The acting player encodes the remaining player at fold nodes.
        let remaining = node.player_acting;
        let mut half_pot = f64::from(node.last_bet_to);
        if self.b_pos != remaining {
            half_pot = -half_pot;
        }
        let (a_seat, b_seat) = if self.b_pos == 0 { (1, 0) } else { (0, 1) };
        let a_probs = &reach[a_seat];
        let b_probs = &reach[b_seat];
        let hands = self.hand_tree.hands(0);

        let opp: Vec<f64> = (0..hands.len()).map(|i| a_probs[hands.enc(i)]).collect();
        let cons = terminal::consistent_opp_sums(hands, &opp, max_card1);
        let mut sum_our_vals = 0.0;
        let mut sum_joint_probs = 0.0;
        for i in 0..hands.len() {
            let our = b_probs[hands.enc(i)];
            sum_our_vals += our * half_pot * cons[i];
            sum_joint_probs += our * cons[i];
        }
        self.accumulate(sum_our_vals, sum_joint_probs);
        Ok(())
    }

    /// Weight by the board's sample count and fold into the accumulators.
    fn accumulate(&mut self, sum_our_vals: f64, sum_joint_probs: f64) {
        let w = f64::from(self.num_samples);
        let wtd_vals = sum_our_vals * w;
        let wtd_joint = sum_joint_probs * w;
        self.totals.sum_b_outcomes += wtd_vals;
        if self.b_pos == 0 {
            self.totals.sum_p0_outcomes += wtd_vals;
            self.totals.sum_p1_outcomes -= wtd_vals;
        } else {
            self.totals.sum_p0_outcomes -= wtd_vals;
            self.totals.sum_p1_outcomes += wtd_vals;
        }
        self.totals.sum_weights += wtd_joint;
    }
}
