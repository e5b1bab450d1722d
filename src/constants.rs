//! Board-geometry bounds, MCTS tuning parameters, and prior weights.
//!
//! Board size is a runtime property of a [`crate::position::Position`] (1..=MAX_N), not a
//! compile-time feature, so the constants here are upper bounds used to size fixed-capacity
//! arrays rather than exact dimensions.

/// Largest board edge length the engine will accept.
pub const MAX_N: usize = 25;

/// Largest board area, used to size fixed-capacity point/chain storage.
pub const MAX_AREA: usize = MAX_N * MAX_N;

/// Sentinel coordinate for a pass move.
pub const PASS: i32 = -1;

/// Sentinel coordinate for an invalid/no move (e.g. a random-move query that found nothing).
pub const BAD_MOVE: i32 = -2;

/// Default board size used when none is given.
pub const DEFAULT_N: usize = 9;

/// Default komi (area scoring, 9x9 convention).
pub const DEFAULT_KOMI: f32 = 7.5;

/// Maximum game length before a playout is forced to terminate (captures/replays headroom).
pub const MAX_GAME_LEN_FACTOR: usize = 3;

// =============================================================================
// MCTS (Monte Carlo Tree Search) Parameters
// =============================================================================

/// Default number of tree workers.
pub const DEFAULT_WORKERS: usize = 2;

/// Default per-move time budget in milliseconds.
pub const DEFAULT_TIME_MS: u64 = 5000;

/// RAVE cross-over constant K: point where MC and RAVE estimates are equally weighted.
pub const RAVE_K: f64 = 1000.0;

/// UCB exploration constant (multiplied by 100 in the classic formulation; kept as a plain
/// float here since Rust const generics on f64 are awkward).
pub const UCB_EXPLORATION: f64 = 2.0;

/// Winrate threshold below which the engine resigns.
pub const RESIGN_THRES: f64 = 0.1;

/// Winrate threshold above which the engine passes rather than keep playing.
pub const PASS_THRES: f64 = 0.9999;

// =============================================================================
// Prior Values (RAVE-counter seeding on first expansion of a node's children)
// =============================================================================

/// (visits, wins) added to a child's RAVE counters when its move captures stones.
pub const PRIOR_CAPTURE: (u32, u32) = (30, 30);

/// (visits, wins) added when the move saves a friendly chain from atari.
pub const PRIOR_SAVE: (u32, u32) = (20, 20);

/// (visits, wins) added when the move is a self-atari (visits only, no wins).
pub const PRIOR_SELF_ATARI: (u32, u32) = (20, 0);

/// (visits, wins) added when the move is orthogonal to the last move played.
pub const PRIOR_LOCAL: (u32, u32) = (30, 30);

// =============================================================================
// Playout Heuristic Probabilities (biased best-of-N playout policy)
// =============================================================================

/// Probability of attempting a global capturing move first.
pub const PROB_ATTACK: f64 = 0.45;

/// Probability of attempting a global saving move next.
pub const PROB_SAVE: f64 = 0.55;

/// Probability of attempting a local urgent move next.
pub const PROB_LOCAL_URGENT: f64 = 0.55;

/// N used by the best-of-N and biased-best-of-N playout policies.
pub const BEST_OF_N: usize = 8;

/// Number of random-point guesses the uniform playout policy tries before falling back to a
/// full move scan.
pub const UNIFORM_GUESS_TRIES: usize = 4;

// =============================================================================
// GTP protocol
// =============================================================================

/// GTP protocol version this engine implements.
pub const GTP_PROTOCOL_VERSION: &str = "2.0";

/// Column letters used in vertex notation. Note 'I' is skipped, per Go convention.
pub const COLUMN_LETTERS: &str = "ABCDEFGHJKLMNOPQRSTUVWXYZ";
