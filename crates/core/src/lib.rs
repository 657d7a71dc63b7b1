#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Head-to-Head Evaluation Core
//!
//! Computes the exact expected value of one precomputed CFR strategy
//! against another over full hole-card ranges, with optional on-the-fly
//! subgame resolving of either side and importance-weighted sampling of
//! final-street boards.
//!
//! # Modules
//!
//! - `game` / `cards` - deck geometry and game parameters
//! - `board` / `hands` / `hand_value` - canonical boards, hand indexing,
//!   hand ranking
//! - `buckets` / `betting` / `strategy` - card abstraction, betting trees,
//!   strategy tables
//! - `terminal` / `resolver` / `walker` / `sampler` - range-vs-range
//!   payoffs, endgame resolving, the dual-tree walk, board selection
//! - `error` - error types

pub mod betting;
pub mod board;
pub mod buckets;
pub mod cards;
pub mod error;
pub mod game;
pub mod hand_value;
pub mod hands;
pub mod resolver;
pub mod sampler;
pub mod strategy;
pub mod terminal;
pub mod walker;

pub use error::{EvalError, EvalResult};
pub use game::{Game, GameParams};
pub use walker::{Matchup, MatchupConfig, MatchupReport};
