use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the evaluation engine.
///
/// `Invariant` covers the fatal structural violations described in the
/// error-handling design: mismatched A/B trees, out-of-bounds reach
/// probabilities, and malformed strategy tables. These are never recovered
/// from; the run aborts because produced EVs cannot be trusted.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("missing strategy data: {0}")]
    MissingData(String),

    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Shorthand result alias used throughout the crate.
pub type EvalResult<T> = Result<T, EvalError>;
