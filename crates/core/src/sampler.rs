//! Final-street board sampling.
//!
//! Full enumeration weights every canonical board by its multiplicity.
//! Sampling draws approximately importance-weighted boards without
//! replacement: each board contributes `multiplicity` tickets tagged with a
//! uniform random key, the tickets are sorted, and the first N win. A
//! board drawn k times carries sample count k.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::BoardTree;

/// One selected board and the number of samples it absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSample {
    pub bd: usize,
    pub count: u32,
}

/// Default RNG seed: wall time at millisecond granularity. Inject an
/// explicit seed for reproducible runs.
#[must_use]
pub fn wall_clock_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Select final-street boards. `requested == 0` or anything at or above the
/// total board count enumerates everything with multiplicity weights.
#[must_use]
pub fn sample_final_boards(
    board_tree: &BoardTree,
    max_street: u8,
    requested: usize,
    seed: u64,
) -> Vec<BoardSample> {
    let num_boards = board_tree.num_boards(max_street);
    if requested == 0 || requested >= num_boards {
        return (0..num_boards)
            .map(|bd| BoardSample {
                bd,
                count: board_tree.board_count(max_street, bd),
            })
            .collect();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut tickets: Vec<(f64, usize)> = Vec::new();
    for bd in 0..num_boards {
        for _ in 0..board_tree.board_count(max_street, bd) {
            tickets.push((rng.gen::<f64>(), bd));
        }
    }
    tickets.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut counts = vec![0u32; num_boards];
    for &(_, bd) in tickets.iter().take(requested) {
        counts[bd] += 1;
    }
    (0..num_boards)
        .filter(|&bd| counts[bd] > 0)
        .map(|bd| BoardSample {
            bd,
            count: counts[bd],
        })
        .collect()
}
