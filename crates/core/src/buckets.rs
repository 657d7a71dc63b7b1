//! Card abstraction: per-street bucket maps.
//!
//! A bucket map collapses `(board, hole-card-pair)` holdings into a smaller
//! set of strategy rows. A street may instead be `none` — one row per
//! holding — which is how unabstracted final streets and toy games run.
//!
//! Hand indices into a map are `gbd * num_hole_card_pairs(st) + raw_hcp`,
//! computed in 64-bit arithmetic: the product overflows 32 bits for full
//! hold'em.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::board::BoardTree;
use crate::error::{EvalError, EvalResult};
use crate::game::Game;

/// Per-street bucket specification in a card-abstraction params file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreetBucketsSpec {
    /// The literal string `none`: bucket-per-hand on this street.
    Keyword(String),
    /// A bucket map file (bincode `Vec<u32>`) and its bucket count.
    File { path: PathBuf, num_buckets: u32 },
}

/// Card abstraction parameters as loaded from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct CardAbstractionConfig {
    /// Identity used for sharing decisions and strategy directory names.
    pub name: String,
    /// One spec per street, index 0 first.
    pub streets: Vec<StreetBucketsSpec>,
}

impl CardAbstractionConfig {
    /// Load card-abstraction parameters from a YAML file.
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

    /// Parse card-abstraction parameters from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Config` on invalid YAML or a bad street keyword.
    pub fn from_yaml(yaml: &str) -> EvalResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| EvalError::Config(e.to_string()))?;
        for spec in &config.streets {
            if let StreetBucketsSpec::Keyword(word) = spec {
                if word != "none" {
                    return Err(EvalError::Config(format!(
                        "unknown street bucket keyword '{word}' (expected 'none')"
                    )));
                }
            }
        }
        Ok(config)
    }

    /// A bucket-per-hand abstraction for every street, named `none`.
    #[must_use]
    pub fn none(game: &Game) -> Self {
        Self {
            name: "none".to_string(),
            streets: vec![
                StreetBucketsSpec::Keyword("none".to_string());
                usize::from(game.max_street()) + 1
            ],
        }
    }
}

#[derive(Debug)]
struct StreetMap {
    map: Vec<u32>,
    num_buckets: u32,
}

/// Loaded per-street bucket maps.
#[derive(Debug)]
pub struct Buckets {
    name: String,
    streets: Vec<Option<StreetMap>>,
}

impl Buckets {
    /// Load the maps named by a card-abstraction config.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Config` if the street count does not match the
    /// game, `EvalError::MissingData` if a map file cannot be read, or
    /// `EvalError::Invariant` if a map's length does not cover the street's
    /// holdings.
    pub fn load(game: &Game, board_tree: &BoardTree, config: &CardAbstractionConfig) -> EvalResult<Self> {
        let num_streets = usize::from(game.max_street()) + 1;
        if config.streets.len() != num_streets {
            return Err(EvalError::Config(format!(
                "card abstraction '{}' specifies {} streets, game has {}",
                config.name,
                config.streets.len(),
                num_streets
            )));
        }
        let mut streets = Vec::with_capacity(num_streets);
        for (st, spec) in config.streets.iter().enumerate() {
            match spec {
                StreetBucketsSpec::Keyword(_) => streets.push(None),
                StreetBucketsSpec::File { path, num_buckets } => {
                    let file = std::fs::File::open(path).map_err(|e| {
                        EvalError::MissingData(format!(
                            "bucket map {} for street {st}: {e}",
                            path.display()
                        ))
                    })?;
                    let map: Vec<u32> = bincode::deserialize_from(std::io::BufReader::new(file))
                        .map_err(|e| EvalError::Serialize(e.to_string()))?;
                    let st = st as u8;
                    let expected =
                        board_tree.num_boards(st) as u64 * game.num_hole_card_pairs(st) as u64;
                    if (map.len() as u64) < expected {
                        return Err(EvalError::Invariant(format!(
                            "bucket map for street {st} has {} entries, needs {expected}",
                            map.len()
                        )));
                    }
                    if let Some(&bad) = map.iter().find(|&&b| b >= *num_buckets) {
                        return Err(EvalError::Invariant(format!(
                            "bucket map for street {st} contains id {bad} >= {num_buckets}"
                        )));
                    }
                    streets.push(Some(StreetMap {
                        map,
                        num_buckets: *num_buckets,
                    }));
                }
            }
        }
        Ok(Self {
            name: config.name.clone(),
            streets,
        })
    }

    /// Bucket-per-hand on every street.
    #[must_use]
    pub fn trivial(game: &Game) -> Self {
        Self {
            name: "none".to_string(),
            streets: (0..=game.max_street()).map(|_| None).collect(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when this street is bucket-per-hand.
    #[must_use]
    pub fn none_on(&self, st: u8) -> bool {
        self.streets[usize::from(st)].is_none()
    }

    /// Bucket id of a hand index. The index is 64-bit on purpose: see the
    /// module docs.
    #[must_use]
    pub fn bucket(&self, st: u8, h: u64) -> u32 {
        let street = self.streets[usize::from(st)]
            .as_ref()
            .expect("bucket lookup on a street with no buckets");
        street.map[usize::try_from(h).expect("hand index fits usize")]
    }

    /// Bucket count on a street (0 when `none`).
    #[must_use]
    pub fn num_buckets(&self, st: u8) -> u32 {
        self.streets[usize::from(st)]
            .as_ref()
            .map_or(0, |s| s.num_buckets)
    }
}

/// Write a bucket map file in the format [`Buckets::load`] reads.
///
/// # Errors
///
/// Returns an error on I/O or serialization failure.
pub fn write_bucket_map(path: &Path, map: &[u32]) -> EvalResult<()> {
    let file = std::fs::File::create(path)?;
    bincode::serialize_into(std::io::BufWriter::new(file), &map.to_vec())
        .map_err(|e| EvalError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::toy_game;
    use test_macros::timed_test;

    #[timed_test]
    fn trivial_buckets_are_none_everywhere() {
        let game = toy_game();
        let buckets = Buckets::trivial(&game);
        assert!(buckets.none_on(0));
        assert_eq!(buckets.num_buckets(0), 0);
        assert_eq!(buckets.name(), "none");
    }

    #[timed_test]
    fn none_keyword_parses() {
        let config = CardAbstractionConfig::from_yaml(
            "name: nb\nstreets:\n  - none\n",
        )
        .unwrap();
        assert_eq!(config.name, "nb");
        assert!(matches!(config.streets[0], StreetBucketsSpec::Keyword(_)));
    }

    #[timed_test]
    fn unknown_keyword_rejected() {
        let result = CardAbstractionConfig::from_yaml("name: x\nstreets:\n  - all\n");
        assert!(result.is_err());
    }

    #[timed_test]
    fn bucket_map_round_trip() {
        let game = toy_game();
        let board_tree = crate::board::BoardTree::build(&game);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("st0.bin");
        // 28 holdings on street 0; map them to 4 buckets round-robin.
        let map: Vec<u32> = (0..28u32).map(|i| i % 4).collect();
        write_bucket_map(&path, &map).unwrap();

        let config = CardAbstractionConfig {
            name: "rr4".to_string(),
            streets: vec![StreetBucketsSpec::File {
                path,
                num_buckets: 4,
            }],
        };
        let buckets = Buckets::load(&game, &board_tree, &config).unwrap();
        assert!(!buckets.none_on(0));
        assert_eq!(buckets.num_buckets(0), 4);
        assert_eq!(buckets.bucket(0, 0), 0);
        assert_eq!(buckets.bucket(0, 27), 27 % 4);
    }

    #[timed_test]
    fn short_map_rejected() {
        let game = toy_game();
        let board_tree = crate::board::BoardTree::build(&game);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("st0.bin");
        write_bucket_map(&path, &[0, 1, 2]).unwrap();
        let config = CardAbstractionConfig {
            name: "short".to_string(),
            streets: vec![StreetBucketsSpec::File {
                path,
                num_buckets: 4,
            }],
        };
        assert!(Buckets::load(&game, &board_tree, &config).is_err());
    }

    #[timed_test]
    fn missing_map_file_is_missing_data() {
        let game = toy_game();
        let board_tree = crate::board::BoardTree::build(&game);
        let config = CardAbstractionConfig {
            name: "gone".to_string(),
            streets: vec![StreetBucketsSpec::File {
                path: PathBuf::from("/nonexistent/map.bin"),
                num_buckets: 4,
            }],
        };
        match Buckets::load(&game, &board_tree, &config) {
            Err(EvalError::MissingData(_)) => {}
            other => panic!("expected MissingData, got {other:?}"),
        }
    }
}
