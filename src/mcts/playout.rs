//! Policies for choosing the move to play during a simulated random playout.
//!
//! A playout policy's `select` is called repeatedly on a worker's scratch position until it
//! returns [`crate::constants::BAD_MOVE`], which the worker treats as "both sides have passed,
//! stop simulating".

use crate::constants::{BAD_MOVE, BEST_OF_N, PROB_ATTACK, PROB_LOCAL_URGENT, PROB_SAVE, UNIFORM_GUESS_TRIES};
use crate::position::{Coord, MoveInfo, Position};

pub trait PlayoutPolicy: Send + Sync {
    fn select(&self, pos: &Position, last_move: Coord, rng: &mut fastrand::Rng) -> Coord;
}

/// Uniformly random legal, non-eye-filling move; falls back to a full scan of legal moves after
/// a handful of rejected guesses.
pub struct Uniform;

impl PlayoutPolicy for Uniform {
    fn select(&self, pos: &Position, _last_move: Coord, rng: &mut fastrand::Rng) -> Coord {
        let guesses = pos.random_legal_non_eye(UNIFORM_GUESS_TRIES, rng);
        if let Some(&mv) = guesses.first() {
            return mv;
        }
        let moves = pos.legal_moves(true);
        if moves.is_empty() {
            return BAD_MOVE;
        }
        moves[rng.usize(..moves.len())]
    }
}

fn move_weight(info: MoveInfo) -> i32 {
    let mut w = 0;
    if info.contains(MoveInfo::CAPTURE) {
        w += 10;
    }
    if info.contains(MoveInfo::ATARI) {
        w += 5;
    }
    if info.contains(MoveInfo::SELF_ATARI) {
        w -= 8;
    }
    if info.contains(MoveInfo::SAVE) {
        w += 10;
    }
    if info.contains(MoveInfo::CONNECTION) {
        w += 1;
    }
    if info.contains(MoveInfo::EYE_SHAPE) {
        w += 1;
    }
    w
}

/// Draws `K` random legal non-eye moves and plays the one whose `MoveInfo` flags score highest.
pub struct BestOfN {
    pub k: usize,
}

impl Default for BestOfN {
    fn default() -> Self {
        BestOfN { k: BEST_OF_N }
    }
}

impl BestOfN {
    fn best_of(&self, pos: &Position, rng: &mut fastrand::Rng) -> Coord {
        let candidates = pos.random_legal_non_eye(self.k, rng);
        if candidates.is_empty() {
            let moves = pos.legal_moves(true);
            return moves.first().copied().unwrap_or(BAD_MOVE);
        }
        let colour = pos.side_to_move();
        let mut best = candidates[0];
        let mut best_score = i32::MIN;
        for &mv in &candidates {
            let score = move_weight(pos.check(colour, mv));
            if score > best_score {
                best_score = score;
                best = mv;
            }
        }
        best
    }
}

impl PlayoutPolicy for BestOfN {
    fn select(&self, pos: &Position, _last_move: Coord, rng: &mut fastrand::Rng) -> Coord {
        self.best_of(pos, rng)
    }
}

/// Tries a cascade of tactical biases — attack, save, local urgency — before falling back to
/// [`BestOfN`]. Biases are evaluated against the move actually last played in the simulation,
/// not the root move the search started from.
pub struct BiasedBestOfN {
    pub best_of: BestOfN,
}

impl Default for BiasedBestOfN {
    fn default() -> Self {
        BiasedBestOfN {
            best_of: BestOfN::default(),
        }
    }
}

impl PlayoutPolicy for BiasedBestOfN {
    fn select(&self, pos: &Position, last_move: Coord, rng: &mut fastrand::Rng) -> Coord {
        if rng.f64() < PROB_ATTACK {
            let mv = pos.random_attacking(1, rng);
            if mv != BAD_MOVE {
                return mv;
            }
        }
        if rng.f64() < PROB_SAVE {
            let mv = pos.random_saving(rng);
            if mv != BAD_MOVE {
                return mv;
            }
        }
        if last_move != crate::constants::PASS && rng.f64() < PROB_LOCAL_URGENT {
            let urgent = MoveInfo::CAPTURE | MoveInfo::ATARI;
            let mv = pos.random_local_urgent(last_move, urgent, rng);
            if mv != BAD_MOVE {
                return mv;
            }
        }
        self.best_of.best_of(pos, rng)
    }
}
