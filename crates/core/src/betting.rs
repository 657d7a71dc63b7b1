//! Betting-tree construction.
//!
//! The tree is an immutable node arena built once per side from a betting
//! abstraction. Nodes carry the attributes the walker and the strategy
//! store key on: street, acting player, `last_bet_to` (the half-pot: chips
//! the bettor has committed), terminal kind, a per-(street, player)
//! nonterminal id, and the default successor (the check/call action).
//!
//! Fold terminals store the *remaining* player in `player_acting` and the
//! folder's committed amount in `last_bet_to` — exactly what the fold
//! payoff needs. An all-in before the final street produces forced
//! single-successor check nodes on the remaining streets, ending in a
//! final-street showdown.
//!
//! All chip amounts are small blinds. Player 0 posts the big blind and
//! player 1 the small blind; player 1 opens street 0, player 0 opens every
//! later street.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{EvalError, EvalResult};
use crate::game::Game;

fn default_max_bets() -> u8 {
    3
}

fn default_all_in() -> bool {
    true
}

/// Betting abstraction parameters as loaded from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct BettingConfig {
    /// Identity used for sharing decisions and strategy directory names.
    pub name: String,
    /// Pot-fraction bet sizes offered at each decision.
    #[serde(default)]
    pub bet_fractions: Vec<f64>,
    /// Maximum bets/raises per street (the big blind counts on street 0).
    #[serde(default = "default_max_bets")]
    pub max_bets_per_street: u8,
    /// Whether all-in is always offered as a raise size.
    #[serde(default = "default_all_in")]
    pub all_in: bool,
}

impl BettingConfig {
    /// Load betting parameters from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> EvalResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EvalError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse betting parameters from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Config` on invalid YAML or nonpositive fractions.
    pub fn from_yaml(yaml: &str) -> EvalResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| EvalError::Config(e.to_string()))?;
        if config.bet_fractions.iter().any(|&f| f <= 0.0) {
            return Err(EvalError::Config(
                "bet_fractions must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    /// Calls and checks only: the tightest abstraction that still reaches
    /// showdown.
    #[must_use]
    pub fn check_call_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bet_fractions: Vec::new(),
            max_bets_per_street: 1,
            all_in: false,
        }
    }
}

/// Terminal classification of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Showdown,
    Fold,
}

/// One betting-tree node.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub street: u8,
    /// Acting player; at fold terminals, the remaining player.
    pub player_acting: u8,
    /// Chips committed by the bettor (fold terminals: by the folder).
    pub last_bet_to: u32,
    pub terminal: Option<TerminalKind>,
    /// Stable id within (street, acting player); undefined at terminals.
    pub nonterminal_id: u32,
    /// Index of the check/call successor.
    pub default_succ: usize,
    pub succs: Vec<u32>,
    /// Action labels aligned with `succs` (`f`, `c`, `b<amount>`).
    pub labels: Vec<String>,
}

impl TreeNode {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    #[must_use]
    pub fn is_showdown(&self) -> bool {
        self.terminal == Some(TerminalKind::Showdown)
    }

    #[must_use]
    pub fn num_succs(&self) -> usize {
        self.succs.len()
    }
}

/// An immutable betting tree (the full game or a resolve subtree).
#[derive(Debug, Clone)]
pub struct BettingTree {
    nodes: Vec<TreeNode>,
    nonterminals: FxHashMap<(u8, u8), u32>,
}

impl BettingTree {
    /// Build the full-game tree: blinds posted, player 1 to act.
    #[must_use]
    pub fn build(game: &Game, config: &BettingConfig) -> Self {
        let mut builder = Builder::new(game, config);
        let root = State {
            st: 0,
            pa: 1,
            committed: [game.big_blind(), game.small_blind()],
            street_bets: 1,
            street_actions: 0,
        };
        builder.expand(&root);
        builder.finish()
    }

    /// Build a resolve subtree rooted at the street-`st` transition:
    /// both players have `last_bet_to` committed and `pa` opens the street.
    #[must_use]
    pub fn subtree(game: &Game, config: &BettingConfig, st: u8, pa: u8, last_bet_to: u32) -> Self {
        let mut builder = Builder::new(game, config);
        let root = State {
            st,
            pa,
            committed: [last_bet_to, last_bet_to],
            street_bets: 0,
            street_actions: 0,
        };
        builder.expand(&root);
        builder.finish()
    }

    #[must_use]
    pub fn root(&self) -> u32 {
        0
    }

    #[must_use]
    pub fn node(&self, id: u32) -> &TreeNode {
        &self.nodes[id as usize]
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nonterminal ids assigned for (street, player).
    #[must_use]
    pub fn num_nonterminals(&self, st: u8, pa: u8) -> u32 {
        self.nonterminals.get(&(st, pa)).copied().unwrap_or(0)
    }
}

/// Mutable per-node state threaded through the recursive build.
#[derive(Clone)]
struct State {
    st: u8,
    pa: u8,
    committed: [u32; 2],
    street_bets: u8,
    street_actions: u8,
}

struct Builder<'a> {
    game: &'a Game,
    config: &'a BettingConfig,
    nodes: Vec<TreeNode>,
    nonterminals: FxHashMap<(u8, u8), u32>,
}

impl<'a> Builder<'a> {
    fn new(game: &'a Game, config: &'a BettingConfig) -> Self {
        Self {
            game,
            config,
            nodes: Vec::new(),
            nonterminals: FxHashMap::default(),
        }
    }

    fn finish(self) -> BettingTree {
        BettingTree {
            nodes: self.nodes,
            nonterminals: self.nonterminals,
        }
    }

    fn next_nonterminal_id(&mut self, st: u8, pa: u8) -> u32 {
        let counter = self.nonterminals.entry((st, pa)).or_insert(0);
        let id = *counter;
        *counter += 1;
        id
    }

    /// Expand a decision node, returning its index.
    fn expand(&mut self, state: &State) -> u32 {
        let me = usize::from(state.pa);
        let opp = 1 - me;
        let to_call = state.committed[opp] - state.committed[me];

        let mut labels = Vec::new();
        if to_call > 0 {
            labels.push("f".to_string());
        }
        labels.push("c".to_string());
        for to in self.raise_targets(state) {
            labels.push(format!("b{to}"));
        }
        let default_succ = labels.iter().position(|l| l == "c").expect("call is always offered");

        let nt = self.next_nonterminal_id(state.st, state.pa);
        let node_idx = self.nodes.len() as u32;
        self.nodes.push(TreeNode {
            street: state.st,
            player_acting: state.pa,
            last_bet_to: state.committed[me],
            terminal: None,
            nonterminal_id: nt,
            default_succ,
            succs: Vec::new(),
            labels: labels.clone(),
        });

        let mut succs = Vec::with_capacity(labels.len());
        for label in &labels {
            let child = match label.as_str() {
                "f" => self.push_fold(state),
                "c" => self.apply_call(state),
                bet => {
                    let to: u32 = bet[1..].parse().expect("bet label carries the amount");
                    self.apply_raise(state, to)
                }
            };
            succs.push(child);
        }
        self.nodes[node_idx as usize].succs = succs;
        node_idx
    }

    /// Distinct raise-to amounts available from this state, ascending.
    fn raise_targets(&self, state: &State) -> Vec<u32> {
        let me = usize::from(state.pa);
        let opp = 1 - me;
        let stack = self.game.stack_size();
        if state.street_bets >= self.config.max_bets_per_street || state.committed[opp] >= stack {
            return Vec::new();
        }
        let pot_after_call = 2 * state.committed[opp];
        let mut targets = Vec::new();
        for &frac in &self.config.bet_fractions {
            let raise_by = (frac * f64::from(pot_after_call)).round() as u32;
            let to = (state.committed[opp] + raise_by.max(1)).min(stack);
            if to > state.committed[opp] && !targets.contains(&to) {
                targets.push(to);
            }
        }
        if self.config.all_in && stack > state.committed[opp] && !targets.contains(&stack) {
            targets.push(stack);
        }
        targets.sort_unstable();
        targets
    }

    fn push_fold(&mut self, state: &State) -> u32 {
        let me = usize::from(state.pa);
        let idx = self.nodes.len() as u32;
        self.nodes.push(TreeNode {
            street: state.st,
            player_acting: 1 - state.pa,
            last_bet_to: state.committed[me],
            terminal: Some(TerminalKind::Fold),
            nonterminal_id: 0,
            default_succ: 0,
            succs: Vec::new(),
            labels: Vec::new(),
        });
        idx
    }

    fn push_showdown(&mut self, st: u8, committed: u32) -> u32 {
        let idx = self.nodes.len() as u32;
        self.nodes.push(TreeNode {
            street: st,
            player_acting: 0,
            last_bet_to: committed,
            terminal: Some(TerminalKind::Showdown),
            nonterminal_id: 0,
            default_succ: 0,
            succs: Vec::new(),
            labels: Vec::new(),
        });
        idx
    }

    /// Check or call: match the bet, then close the street or pass action.
    fn apply_call(&mut self, state: &State) -> u32 {
        let me = usize::from(state.pa);
        let opp = 1 - me;
        let to_call = state.committed[opp] - state.committed[me];
        let mut committed = state.committed;
        committed[me] = committed[opp];

        // The opening preflop limp leaves the big blind an option; every
        // other call, and any check after the first action, ends the street.
        let closes = if to_call > 0 {
            !(state.st == 0 && state.street_actions == 0)
        } else {
            state.street_actions >= 1
        };

        if !closes {
            let child = State {
                st: state.st,
                pa: 1 - state.pa,
                committed,
                street_bets: state.street_bets,
                street_actions: state.street_actions + 1,
            };
            return self.expand(&child);
        }
        if state.st == self.game.max_street() {
            return self.push_showdown(state.st, committed[0]);
        }
        // Next street: player 0 opens.
        let child = State {
            st: state.st + 1,
            pa: 0,
            committed,
            street_bets: 0,
            street_actions: 0,
        };
        self.expand(&child)
    }

    fn apply_raise(&mut self, state: &State, to: u32) -> u32 {
        let me = usize::from(state.pa);
        let mut committed = state.committed;
        committed[me] = to;
        let child = State {
            st: state.st,
            pa: 1 - state.pa,
            committed,
            street_bets: state.street_bets + 1,
            street_actions: state.street_actions + 1,
        };
        self.expand(&child)
    }
}
