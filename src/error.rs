//! Crate-wide error types.
//!
//! Protocol-facing mistakes (bad GTP arguments, an illegal move supplied from outside the
//! engine, a malformed position literal) are [`EngineError`] values that the caller can recover
//! from. Violations of the engine's own invariants (an illegal move reaching [`crate::position::Position::play`]
//! after its own legality check passed) are bugs, not [`EngineError`]s, and are reported with
//! `panic!`/`debug_assert!` instead.

use thiserror::Error;

/// Recoverable errors raised at the boundary between the engine and the outside world.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("unsupported board size: {0} (must be 1..=25)")]
    InvalidBoardSize(usize),

    #[error("malformed position literal: {0}")]
    InvalidDiagram(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
