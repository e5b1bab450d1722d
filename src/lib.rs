//! Gorai: a parallel Monte-Carlo Go engine.
//!
//! The strength of the engine rests on two tightly-coupled subsystems: an
//! incrementally-maintained board engine ([`position`]) that answers legality, liberty,
//! capture, and ko questions in time proportional to a chain's boundary rather than the
//! whole board, and a parallel MC-RAVE tree search ([`mcts`]) that drives a configurable
//! number of concurrent worker threads over a shared, lock-per-node tree.
//!
//! ## Modules
//!
//! - [`bitset`] - fixed-capacity bitmap over board points
//! - [`zobrist`] - process-global Zobrist key table for superko hashing
//! - [`patterns`] - 3x3/5x5 stone-pattern DFA for prior biases and playout ordering
//! - [`position`] - the board engine: stone chains, legality, move generation, scoring
//! - [`mcts`] - the search tree, selection/playout policies, workers, and the driver
//! - [`gtp`] - the Go Text Protocol front end
//! - [`error`] - crate-wide error types
//! - [`constants`] - board-geometry bounds and search tuning parameters

pub mod bitset;
pub mod constants;
pub mod error;
pub mod gtp;
pub mod mcts;
pub mod patterns;
pub mod position;
pub mod zobrist;
