//! Strategy storage.
//!
//! An average strategy is a set of regret-matching counter tables, one per
//! betting-tree nonterminal, keyed by a packed `(street, player,
//! nonterminal id)` and laid out row-major `[holding][successor]`. A
//! holding is a bucket, or — on `none` streets — a `(board, hole-card
//! pair)` coordinate. Callers compute row offsets; the store only
//! reconstructs probabilities and round-trips the tables through disk.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::betting::BettingTree;
use crate::board::BoardTree;
use crate::buckets::Buckets;
use crate::error::{EvalError, EvalResult};
use crate::game::Game;

/// CFR configuration: an identity plus an optional algorithm tag. The
/// evaluator only consumes strategies, so the name is what matters — it
/// keys the strategy directory and the sharing decision.
#[derive(Debug, Clone, Deserialize)]
pub struct CfrConfig {
    pub name: String,
    #[serde(default)]
    pub algorithm: Option<String>,
}

impl CfrConfig {
    /// Load a CFR config from a YAML file.
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
        serde_yaml::from_str(&text).map_err(|e| EvalError::Config(e.to_string()))
    }
}

/// The identity quadruple behind the sharing optimization: two sides with
/// equal ids may share one store. Compared by value, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyId {
    pub card_abstraction: String,
    pub betting_abstraction: String,
    pub cfr_config: String,
    pub iteration: u32,
}

/// Strategy directory path for one side:
/// `<base>/<game>.<players>.<card>.<ranks>.<suits>.<max_street>.<betting>.<cfr>`.
#[must_use]
pub fn strategy_dir(
    base: &Path,
    game: &Game,
    card_abstraction: &str,
    betting_abstraction: &str,
    cfr_config: &str,
) -> PathBuf {
    base.join(format!(
        "{}.{}.{}.{}.{}.{}.{}.{}",
        game.name(),
        game.num_players(),
        card_abstraction,
        game.num_ranks(),
        game.num_suits(),
        game.max_street(),
        betting_abstraction,
        cfr_config
    ))
}

/// Holdings-per-street row counts used to size tables.
#[derive(Debug, Clone)]
pub struct StrategySizes {
    rows: Vec<u64>,
}

impl StrategySizes {
    /// Row counts for a full tree with global board coordinates.
    #[must_use]
    pub fn global(game: &Game, board_tree: &BoardTree, buckets: &Buckets) -> Self {
        let rows = (0..=game.max_street())
            .map(|st| {
                if buckets.none_on(st) {
                    board_tree.num_boards(st) as u64 * game.num_hole_card_pairs(st) as u64
                } else {
                    u64::from(buckets.num_buckets(st))
                }
            })
            .collect();
        Self { rows }
    }

    /// Row counts for a resolve subtree with local board coordinates.
    /// Streets before the root get zero rows; they do not occur in the
    /// subtree.
    #[must_use]
    pub fn local(
        game: &Game,
        board_tree: &BoardTree,
        buckets: &Buckets,
        root_st: u8,
        root_bd: usize,
    ) -> Self {
        let rows = (0..=game.max_street())
            .map(|st| {
                if st < root_st {
                    0
                } else if buckets.none_on(st) {
                    board_tree.boards_under(root_st, root_bd, st).len() as u64
                        * game.num_hole_card_pairs(st) as u64
                } else {
                    u64::from(buckets.num_buckets(st))
                }
            })
            .collect();
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self, st: u8) -> u64 {
        self.rows[usize::from(st)]
    }
}

fn table_key(st: u8, pa: u8, nt: u32) -> u64 {
    (u64::from(st) << 40) | (u64::from(pa) << 32) | u64::from(nt)
}

fn key_street(key: u64) -> u8 {
    (key >> 40) as u8
}

/// Wire form for bincode: plain `HashMap`, which serializes natively.
#[derive(Serialize, Deserialize)]
struct WireStore {
    tables: HashMap<u64, Vec<f64>>,
}

/// Regret-matching counter tables for one side (or one resolve).
#[derive(Debug, Clone, Default)]
pub struct StrategyStore {
    tables: FxHashMap<u64, Vec<f64>>,
}

impl StrategyStore {
    /// Allocate zeroed tables for every nonterminal of a tree.
    #[must_use]
    pub fn alloc(tree: &BettingTree, sizes: &StrategySizes) -> Self {
        let mut tables = FxHashMap::default();
        for id in 0..tree.num_nodes() as u32 {
            let node = tree.node(id);
            if node.is_terminal() {
                continue;
            }
            let key = table_key(node.street, node.player_acting, node.nonterminal_id);
            let len = sizes.rows(node.street) as usize * node.num_succs();
            tables.entry(key).or_insert_with(|| vec![0.0; len]);
        }
        Self { tables }
    }

    /// Reconstruct successor probabilities from counters (`RMProbs`):
    /// positive counters normalize; when none are positive the default
    /// successor takes all mass.
    ///
    /// # Errors
    ///
    /// `MissingData` for an absent table; `Invariant` when the offset runs
    /// past the table.
    pub fn rm_probs(
        &self,
        st: u8,
        pa: u8,
        nt: u32,
        offset: u64,
        num_succs: usize,
        dsi: usize,
        out: &mut [f64],
    ) -> EvalResult<()> {
        let key = table_key(st, pa, nt);
        let table = self.tables.get(&key).ok_or_else(|| {
            EvalError::MissingData(format!("no strategy table for st {st} pa {pa} nt {nt}"))
        })?;
        let start = usize::try_from(offset)
            .map_err(|_| EvalError::Invariant(format!("offset {offset} overflows usize")))?;
        let end = start + num_succs;
        if end > table.len() {
            return Err(EvalError::Invariant(format!(
                "offset {offset}+{num_succs} past table of {} for st {st} pa {pa} nt {nt}",
                table.len()
            )));
        }
        let row = &table[start..end];
        let positive_sum: f64 = row.iter().filter(|&&v| v > 0.0).sum();
        if positive_sum > 0.0 {
            for (o, &v) in out.iter_mut().zip(row) {
                *o = if v > 0.0 { v / positive_sum } else { 0.0 };
            }
        } else {
            for o in out.iter_mut() {
                *o = 0.0;
            }
            out[dsi] = 1.0;
        }
        Ok(())
    }

    /// Mutable row access for accumulation (resolver, test setup).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::rm_probs`].
    pub fn row_mut(
        &mut self,
        st: u8,
        pa: u8,
        nt: u32,
        offset: u64,
        num_succs: usize,
    ) -> EvalResult<&mut [f64]> {
        let key = table_key(st, pa, nt);
        let table = self.tables.get_mut(&key).ok_or_else(|| {
            EvalError::MissingData(format!("no strategy table for st {st} pa {pa} nt {nt}"))
        })?;
        let start = usize::try_from(offset)
            .map_err(|_| EvalError::Invariant(format!("offset {offset} overflows usize")))?;
        let end = start + num_succs;
        if end > table.len() {
            return Err(EvalError::Invariant(format!(
                "offset {offset}+{num_succs} past table of {} for st {st} pa {pa} nt {nt}",
                table.len()
            )));
        }
        Ok(&mut table[start..end])
    }

    /// Overwrite one row of counters.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::rm_probs`].
    pub fn set_row(&mut self, st: u8, pa: u8, nt: u32, offset: u64, vals: &[f64]) -> EvalResult<()> {
        let row = self.row_mut(st, pa, nt, offset, vals.len())?;
        row.copy_from_slice(vals);
        Ok(())
    }

    /// Number of stored tables.
    #[must_use]
    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    /// Write the tables for one iteration under a strategy directory.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or serialization failure.
    pub fn write(&self, dir: &Path, it: u32) -> EvalResult<()> {
        std::fs::create_dir_all(dir)?;
        let file = File::create(dir.join(format!("iter_{it}.bin")))?;
        let wire = WireStore {
            tables: self.tables.iter().map(|(&k, v)| (k, v.clone())).collect(),
        };
        bincode::serialize_into(BufWriter::new(file), &wire)
            .map_err(|e| EvalError::Serialize(e.to_string()))
    }

    /// Read the tables for one iteration, keeping only masked streets.
    ///
    /// # Errors
    ///
    /// `MissingData` when the iteration file does not exist;
    /// `Serialize` when it cannot be decoded.
    pub fn read(dir: &Path, it: u32, streets: &[bool]) -> EvalResult<Self> {
        let path = dir.join(format!("iter_{it}.bin"));
        let file = File::open(&path).map_err(|e| {
            EvalError::MissingData(format!("{}: {e}", path.display()))
        })?;
        let wire: WireStore = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| EvalError::Serialize(e.to_string()))?;
        let tables = wire
            .tables
            .into_iter()
            .filter(|(k, _)| {
                streets
                    .get(usize::from(key_street(*k)))
                    .copied()
                    .unwrap_or(false)
            })
            .collect();
        Ok(Self { tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::BettingConfig;
    use crate::game::toy_game;
    use test_macros::timed_test;

    fn toy_store() -> (crate::game::Game, BettingTree, StrategyStore) {
        let game = toy_game();
        let board_tree = BoardTree::build(&game);
        let buckets = Buckets::trivial(&game);
        let tree = BettingTree::build(&game, &BettingConfig::check_call_only("cc"));
        let sizes = StrategySizes::global(&game, &board_tree, &buckets);
        let store = StrategyStore::alloc(&tree, &sizes);
        (game, tree, store)
    }

    #[timed_test]
    fn alloc_covers_every_nonterminal() {
        let (_, tree, store) = toy_store();
        let nonterminals = (0..tree.num_nodes() as u32)
            .filter(|&id| !tree.node(id).is_terminal())
            .count();
        assert_eq!(store.num_tables(), nonterminals);
    }

    #[timed_test]
    fn zero_counters_fall_back_to_default_succ() {
        let (_, _, store) = toy_store();
        let mut probs = [0.0f64; 2];
        store.rm_probs(0, 1, 0, 0, 2, 1, &mut probs).unwrap();
        assert_eq!(probs, [0.0, 1.0]);
    }

    #[timed_test]
    fn positive_counters_normalize() {
        let (_, _, mut store) = toy_store();
        store.set_row(0, 1, 0, 0, &[1.0, 3.0]).unwrap();
        let mut probs = [0.0f64; 2];
        store.rm_probs(0, 1, 0, 0, 2, 1, &mut probs).unwrap();
        assert!((probs[0] - 0.25).abs() < 1e-12);
        assert!((probs[1] - 0.75).abs() < 1e-12);
    }

    #[timed_test]
    fn negative_counters_are_ignored() {
        let (_, _, mut store) = toy_store();
        store.set_row(0, 1, 0, 0, &[-2.0, 3.0]).unwrap();
        let mut probs = [0.0f64; 2];
        store.rm_probs(0, 1, 0, 0, 2, 1, &mut probs).unwrap();
        assert_eq!(probs, [0.0, 1.0]);
    }

    #[timed_test]
    fn out_of_range_offset_is_invariant_error() {
        let (_, _, store) = toy_store();
        let mut probs = [0.0f64; 2];
        let err = store.rm_probs(0, 1, 0, 1_000_000, 2, 1, &mut probs);
        assert!(matches!(err, Err(EvalError::Invariant(_))));
    }

    #[timed_test]
    fn missing_table_is_missing_data() {
        let (_, _, store) = toy_store();
        let mut probs = [0.0f64; 2];
        let err = store.rm_probs(0, 0, 99, 0, 2, 1, &mut probs);
        assert!(matches!(err, Err(EvalError::MissingData(_))));
    }

    #[timed_test]
    fn disk_round_trip_preserves_tables() {
        let (_, _, mut store) = toy_store();
        store.set_row(0, 1, 0, 0, &[0.5, 1.5]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        store.write(dir.path(), 7).unwrap();

        let loaded = StrategyStore::read(dir.path(), 7, &[true]).unwrap();
        assert_eq!(loaded.num_tables(), store.num_tables());
        let mut probs = [0.0f64; 2];
        loaded.rm_probs(0, 1, 0, 0, 2, 1, &mut probs).unwrap();
        assert!((probs[0] - 0.25).abs() < 1e-12);
    }

    #[timed_test]
    fn street_mask_filters_tables() {
        let (_, _, store) = toy_store();
        let dir = tempfile::tempdir().unwrap();
        store.write(dir.path(), 1).unwrap();
        let loaded = StrategyStore::read(dir.path(), 1, &[false]).unwrap();
        assert_eq!(loaded.num_tables(), 0);
    }

    #[timed_test]
    fn missing_iteration_is_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = StrategyStore::read(dir.path(), 3, &[true]);
        assert!(matches!(err, Err(EvalError::MissingData(_))));
    }

    #[timed_test]
    fn strategy_dir_layout() {
        let game = toy_game();
        let dir = strategy_dir(Path::new("/base"), &game, "nb", "cc", "vanilla");
        assert_eq!(
            dir,
            PathBuf::from("/base/toy.2.nb.4.2.0.cc.vanilla")
        );
    }

    #[timed_test]
    fn strategy_id_equality_is_by_value() {
        let a = StrategyId {
            card_abstraction: "nb".to_string(),
            betting_abstraction: "cc".to_string(),
            cfr_config: "vanilla".to_string(),
            iteration: 100,
        };
        let b = a.clone();
        assert_eq!(a, b);
        let c = StrategyId {
            iteration: 200,
            ..a.clone()
        };
        assert_ne!(a, c);
    }
}
