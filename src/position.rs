//! The board engine: stone chains, incremental liberty/capture maintenance, legality
//! classification, move generation, and area scoring.
//!
//! Unlike a from-scratch flood-fill board, a [`Position`] never recomputes a chain's liberties
//! by walking the whole board: every placement, merge, and capture updates the affected chains'
//! bitsets directly, so a legality check or a move is O(boundary), not O(area).

use std::fmt;
use std::sync::Arc;

use crate::bitset::{BitSelector, Bitset};
use crate::constants::{BAD_MOVE, MAX_N, PASS};
use crate::error::{EngineError, EngineResult};
use crate::patterns::PatternDfa;
use crate::zobrist;

/// Board coordinate, row-major, 0-based. `PASS` and `BAD_MOVE` are carried as `i32` sentinels
/// everywhere a coordinate is expected but may be absent.
pub type Coord = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Colour {
    Black = 0,
    White = 1,
}

impl Colour {
    pub fn opposite(self) -> Colour {
        match self {
            Colour::Black => Colour::White,
            Colour::White => Colour::Black,
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Colour::Black => "black",
            Colour::White => "white",
        })
    }
}

/// A classifier bitmask describing what a candidate move would do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveInfo(u16);

impl MoveInfo {
    pub const NONE: MoveInfo = MoveInfo(0);
    pub const OCCUPIED: MoveInfo = MoveInfo(1 << 0);
    pub const SUICIDE: MoveInfo = MoveInfo(1 << 1);
    pub const REPETITION: MoveInfo = MoveInfo(1 << 2);
    pub const LEGAL: MoveInfo = MoveInfo(1 << 3);
    pub const SELF_ATARI: MoveInfo = MoveInfo(1 << 4);
    pub const ATARI: MoveInfo = MoveInfo(1 << 5);
    pub const SAVE: MoveInfo = MoveInfo(1 << 6);
    pub const CAPTURE: MoveInfo = MoveInfo(1 << 7);
    pub const FILLS_EYE: MoveInfo = MoveInfo(1 << 8);
    pub const PAT3_MATCH: MoveInfo = MoveInfo(1 << 9);
    pub const PAT5_MATCH: MoveInfo = MoveInfo(1 << 10);
    pub const LOCAL: MoveInfo = MoveInfo(1 << 11);
    pub const CONNECTION: MoveInfo = MoveInfo(1 << 12);
    pub const EYE_SHAPE: MoveInfo = MoveInfo(1 << 13);

    pub fn contains(self, flag: MoveInfo) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }

    pub fn intersects(self, flags: MoveInfo) -> bool {
        self.0 & flags.0 != 0
    }
}

impl std::ops::BitOr for MoveInfo {
    type Output = MoveInfo;
    fn bitor(self, rhs: Self) -> Self {
        MoveInfo(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for MoveInfo {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

const NO_CHAIN: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Point {
    colour: Option<Colour>,
    chain_id: u32,
}

impl Default for Point {
    fn default() -> Self {
        Point {
            colour: None,
            chain_id: NO_CHAIN,
        }
    }
}

/// A maximal connected group of same-colour stones.
#[derive(Clone, Copy, Debug)]
pub struct StoneChain {
    colour: Colour,
    stones: Bitset,
    frontier: Bitset,
    liberties: usize,
    zobrist_xor: u64,
    dead: bool,
}

impl StoneChain {
    pub fn colour(&self) -> Colour {
        self.colour
    }

    pub fn liberties(&self) -> usize {
        self.liberties
    }

    pub fn stones(&self) -> &Bitset {
        &self.stones
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

fn row_col(size: usize, coord: usize) -> (isize, isize) {
    ((coord / size) as isize, (coord % size) as isize)
}

fn coord_of(size: usize, row: isize, col: isize) -> Option<usize> {
    if row < 0 || col < 0 || row as usize >= size || col as usize >= size {
        None
    } else {
        Some(row as usize * size + col as usize)
    }
}

fn orthogonal_neighbours(size: usize, coord: usize) -> [Option<usize>; 4] {
    let (r, c) = row_col(size, coord);
    [
        coord_of(size, r - 1, c),
        coord_of(size, r + 1, c),
        coord_of(size, r, c - 1),
        coord_of(size, r, c + 1),
    ]
}

fn diagonal_neighbours(size: usize, coord: usize) -> [Option<usize>; 4] {
    let (r, c) = row_col(size, coord);
    [
        coord_of(size, r - 1, c - 1),
        coord_of(size, r - 1, c + 1),
        coord_of(size, r + 1, c - 1),
        coord_of(size, r + 1, c + 1),
    ]
}

fn is_orthogonal(size: usize, a: usize, b: usize) -> bool {
    orthogonal_neighbours(size, a)
        .into_iter()
        .flatten()
        .any(|n| n == b)
}

/// Distinct chain ids (and raw empty coords) touching a candidate move, gathered before any
/// mutation so [`Position::check`] and [`Position::play`] classify off the same snapshot.
struct NeighbourSummary {
    friendly: Vec<u32>,
    enemy_atari: Vec<u32>,
    enemy_safe: Vec<u32>,
}

/// A complete board state: stones, chains, side to move, and enough history to enforce
/// situational superko.
#[derive(Debug)]
pub struct Position {
    size: usize,
    area: usize,
    points: Vec<Point>,
    black: Bitset,
    white: Bitset,
    empty: Bitset,
    chains: Vec<StoneChain>,
    side_to_move: Colour,
    turn_number: u32,
    hash: u64,
    hash_history: Vec<u64>,
    passed: [bool; 2],
    last_move: Coord,
    pub komi: f32,
    /// Optional 3x3/5x5 prior-bias matchers, shared read-only across every clone of a search's
    /// root position. `None` means "no patterns loaded", and `check` simply never sets the
    /// corresponding `MoveInfo` flag; see the pattern file's silent-degradation contract.
    pat3: Option<Arc<PatternDfa>>,
    pat5: Option<Arc<PatternDfa>>,
}

impl Clone for Position {
    fn clone(&self) -> Self {
        Position {
            size: self.size,
            area: self.area,
            points: self.points.clone(),
            black: self.black,
            white: self.white,
            empty: self.empty,
            chains: self.chains.clone(),
            side_to_move: self.side_to_move,
            turn_number: self.turn_number,
            hash: self.hash,
            hash_history: self.hash_history.clone(),
            passed: self.passed,
            last_move: self.last_move,
            komi: self.komi,
            pat3: self.pat3.clone(),
            pat5: self.pat5.clone(),
        }
    }

    /// Reuses `self`'s existing `Vec` allocations instead of dropping and reallocating them,
    /// which is what makes cloning the root position into a per-worker scratch cheap enough to
    /// do on every MCTS iteration.
    fn clone_from(&mut self, source: &Self) {
        self.size = source.size;
        self.area = source.area;
        self.points.clone_from(&source.points);
        self.black = source.black;
        self.white = source.white;
        self.empty = source.empty;
        self.chains.clone_from(&source.chains);
        self.side_to_move = source.side_to_move;
        self.turn_number = source.turn_number;
        self.hash = source.hash;
        self.hash_history.clone_from(&source.hash_history);
        self.passed = source.passed;
        self.last_move = source.last_move;
        self.komi = source.komi;
        self.pat3.clone_from(&source.pat3);
        self.pat5.clone_from(&source.pat5);
    }
}

impl Position {
    /// Construct an empty board of the given size.
    pub fn new(size: usize, komi: f32) -> EngineResult<Self> {
        if size == 0 || size > MAX_N {
            return Err(EngineError::InvalidBoardSize(size));
        }
        let area = size * size;
        let mut pos = Position {
            size,
            area,
            points: vec![Point::default(); area],
            black: Bitset::new(area),
            white: Bitset::new(area),
            empty: Bitset::new(area),
            chains: Vec::new(),
            side_to_move: Colour::Black,
            turn_number: 0,
            hash: 0,
            hash_history: Vec::new(),
            passed: [false, false],
            last_move: PASS,
            komi,
            pat3: None,
            pat5: None,
        };
        pos.empty.invert();
        pos.hash_history.push(pos.hash);
        Ok(pos)
    }

    /// Replay a sequence of (colour, coord) moves onto a fresh board, rejecting the whole
    /// sequence if any move is illegal at the point it's played.
    pub fn from_moves(size: usize, komi: f32, moves: &[(Colour, Coord)]) -> EngineResult<Self> {
        let mut pos = Position::new(size, komi)?;
        for &(colour, coord) in moves {
            let info = pos.check(colour, coord);
            if !info.contains(MoveInfo::LEGAL) {
                return Err(EngineError::IllegalMove(format!(
                    "{colour} at {} is not legal",
                    str_coord(size, coord)
                )));
            }
            pos.play(colour, coord);
        }
        Ok(pos)
    }

    /// Parse a position literal: `rows[0]` is the top printed row, each row `size` characters
    /// from `{. B W}`.
    pub fn from_diagram(rows: &[&str], komi: f32, side_to_move: Colour) -> EngineResult<Self> {
        let size = rows.len();
        if size == 0 || size > MAX_N {
            return Err(EngineError::InvalidBoardSize(size));
        }
        let mut pos = Position::new(size, komi)?;
        for (print_row, line) in rows.iter().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            if chars.len() != size {
                return Err(EngineError::InvalidDiagram(format!(
                    "row {print_row} has {} characters, expected {size}",
                    chars.len()
                )));
            }
            let board_row = size - 1 - print_row;
            for (col, ch) in chars.into_iter().enumerate() {
                let coord = board_row * size + col;
                let colour = match ch {
                    '.' => None,
                    'B' => Some(Colour::Black),
                    'W' => Some(Colour::White),
                    other => {
                        return Err(EngineError::InvalidDiagram(format!(
                            "unexpected character '{other}'"
                        )));
                    }
                };
                if let Some(c) = colour {
                    pos.place_raw(c, coord);
                }
            }
        }
        pos.side_to_move = side_to_move;
        pos.recompute_all_liberties();
        pos.hash_history.clear();
        pos.hash_history.push(pos.hash);
        Ok(pos)
    }

    /// Place a stone directly without legality checking or capture resolution, used only while
    /// constructing a position from a diagram. Chains are merged the same way a real move
    /// would, but enemy liberties are fixed up in one pass afterwards by
    /// [`recompute_all_liberties`].
    fn place_raw(&mut self, colour: Colour, coord: usize) {
        let mut friendly = Vec::new();
        for n in orthogonal_neighbours(self.size, coord).into_iter().flatten() {
            if self.points[n].colour == Some(colour) {
                let id = self.points[n].chain_id;
                if !friendly.contains(&id) {
                    friendly.push(id);
                }
            }
        }
        let new_id = self.chains.len() as u32;
        let mut stones = Bitset::new(self.area);
        stones.set(coord);
        let mut frontier = Bitset::new(self.area);
        for n in orthogonal_neighbours(self.size, coord).into_iter().flatten() {
            frontier.set(n);
        }
        self.chains.push(StoneChain {
            colour,
            stones,
            frontier,
            liberties: 0,
            zobrist_xor: zobrist::key(colour, coord),
            dead: false,
        });
        self.points[coord] = Point {
            colour: Some(colour),
            chain_id: new_id,
        };
        match colour {
            Colour::Black => self.black.set(coord),
            Colour::White => self.white.set(coord),
        }
        self.empty.clear(coord);
        for id in friendly {
            self.merge_chain_into(new_id as usize, id as usize);
        }
        let stones_snapshot = self.chains[new_id as usize].stones;
        self.chains[new_id as usize].frontier.subtract_in(&stones_snapshot);
        self.hash ^= zobrist::key(colour, coord);
    }

    fn recompute_all_liberties(&mut self) {
        for chain in self.chains.iter_mut() {
            if chain.dead {
                continue;
            }
            chain.liberties = chain.frontier.count_and(&self.empty);
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn area(&self) -> usize {
        self.area
    }

    pub fn side_to_move(&self) -> Colour {
        self.side_to_move
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn last_move(&self) -> Coord {
        self.last_move
    }

    pub fn colour_at(&self, coord: usize) -> Option<Colour> {
        self.points[coord].colour
    }

    pub fn chain_at(&self, coord: usize) -> Option<&StoneChain> {
        let id = self.points[coord].chain_id;
        if id == NO_CHAIN {
            None
        } else {
            Some(&self.chains[id as usize])
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.passed[0] && self.passed[1]
    }

    /// Attach (or detach) the 3x3/5x5 pattern matchers `check` consults for `PAT3_MATCH` /
    /// `PAT5_MATCH`. Cloning an `Arc` is cheap enough to do on every worker's per-iteration
    /// scratch clone, so this is normally called once on the root before a search starts and
    /// then carried along by `Clone`/`clone_from`.
    pub fn set_patterns(&mut self, pat3: Option<Arc<PatternDfa>>, pat5: Option<Arc<PatternDfa>>) {
        self.pat3 = pat3;
        self.pat5 = pat5;
    }

    fn neighbour_summary(&self, colour: Colour, coord: usize) -> NeighbourSummary {
        let mut friendly = Vec::new();
        let mut enemy_atari = Vec::new();
        let mut enemy_safe = Vec::new();
        for n in orthogonal_neighbours(self.size, coord).into_iter().flatten() {
            match self.points[n].colour {
                None => {}
                Some(c) if c == colour => {
                    let id = self.points[n].chain_id;
                    if !friendly.contains(&id) {
                        friendly.push(id);
                    }
                }
                Some(_) => {
                    let id = self.points[n].chain_id;
                    if self.chains[id as usize].liberties == 1 {
                        if !enemy_atari.contains(&id) {
                            enemy_atari.push(id);
                        }
                    } else if !enemy_safe.contains(&id) {
                        enemy_safe.push(id);
                    }
                }
            }
        }
        NeighbourSummary {
            friendly,
            enemy_atari,
            enemy_safe,
        }
    }

    /// Would-be hash after playing `coord`, used only by the superko check in [`Position::check`].
    fn hash_after_move(&self, colour: Colour, coord: usize, summary: &NeighbourSummary) -> u64 {
        let mut hash = self.hash;
        for &id in &summary.enemy_atari {
            hash ^= self.chains[id as usize].zobrist_xor;
        }
        hash ^= zobrist::key(colour, coord);
        hash ^= zobrist::black_turn_key();
        hash
    }

    /// Classify a candidate move without mutating the position.
    pub fn check(&self, colour: Colour, coord: Coord) -> MoveInfo {
        if coord == PASS {
            return MoveInfo::LEGAL;
        }
        if coord < 0 || coord as usize >= self.area {
            return MoveInfo::OCCUPIED; // out-of-range coordinates are never playable
        }
        let coord = coord as usize;
        if self.points[coord].colour.is_some() {
            return MoveInfo::OCCUPIED;
        }

        let summary = self.neighbour_summary(colour, coord);

        let mut new_chain_stones = Bitset::new(self.area);
        new_chain_stones.set(coord);
        for &id in &summary.friendly {
            new_chain_stones.or_in(&self.chains[id as usize].stones);
        }

        let mut freed = Bitset::new(self.area);
        for &id in &summary.enemy_atari {
            freed.or_in(&self.chains[id as usize].stones);
        }
        let mut effective_empty = self.empty;
        effective_empty.or_in(&freed);

        let mut frontier = Bitset::new(self.area);
        for s in new_chain_stones.iter() {
            for n in orthogonal_neighbours(self.size, s).into_iter().flatten() {
                frontier.set(n);
            }
        }
        frontier.subtract_in(&new_chain_stones);
        let liberties_after = frontier.count_and(&effective_empty);

        let captured_stones: usize = summary
            .enemy_atari
            .iter()
            .map(|&id| self.chains[id as usize].stones.count())
            .sum();

        if liberties_after == 0 && captured_stones == 0 {
            return MoveInfo::SUICIDE;
        }

        if captured_stones == 1 {
            let candidate_hash = self.hash_after_move(colour, coord, &summary);
            if self.hash_history.contains(&candidate_hash) {
                return MoveInfo::REPETITION;
            }
        }

        let mut info = MoveInfo::LEGAL;
        if liberties_after == 1 {
            info |= MoveInfo::SELF_ATARI;
        }
        if captured_stones > 0 {
            info |= MoveInfo::CAPTURE;
        }
        for &id in &summary.enemy_safe {
            if self.chains[id as usize].liberties == 2 {
                info |= MoveInfo::ATARI;
                break;
            }
        }
        if summary
            .friendly
            .iter()
            .any(|&id| self.chains[id as usize].liberties == 1)
            && liberties_after > 1
        {
            info |= MoveInfo::SAVE;
        }
        if summary.friendly.len() >= 2 {
            info |= MoveInfo::CONNECTION;
        }
        if captured_stones == 1 && self.is_ponnuki_shape(colour, coord, &summary) {
            info |= MoveInfo::EYE_SHAPE;
        }
        if self.is_eye(colour, coord) {
            info |= MoveInfo::FILLS_EYE;
        }
        if self.last_move != PASS && is_orthogonal(self.size, self.last_move as usize, coord) {
            info |= MoveInfo::LOCAL;
        }
        if let Some(pat3) = &self.pat3 {
            if pat3.has_match(self, colour, coord) {
                info |= MoveInfo::PAT3_MATCH;
            }
        }
        if let Some(pat5) = &self.pat5 {
            if pat5.has_match(self, colour, coord) {
                info |= MoveInfo::PAT5_MATCH;
            }
        }
        info
    }

    /// A capture of a single stone is a "ponnuki" shape if, after the move, all four
    /// orthogonal neighbours of the captured point belong to the capturing colour.
    fn is_ponnuki_shape(&self, colour: Colour, coord: usize, summary: &NeighbourSummary) -> bool {
        let Some(&captured_id) = summary.enemy_atari.first() else {
            return false;
        };
        let chain = &self.chains[captured_id as usize];
        if chain.stones.count() != 1 {
            return false;
        }
        let captured_coord = chain.stones.iter().next().unwrap();
        orthogonal_neighbours(self.size, captured_coord)
            .into_iter()
            .flatten()
            .all(|n| n == coord || self.points[n].colour == Some(colour))
    }

    /// Eye rule: empty point whose orthogonal neighbours are all friendly chains with more
    /// than one liberty, and whose enemy-coloured diagonals are bounded (0 on an edge, 1
    /// interior).
    pub fn is_eye(&self, colour: Colour, coord: usize) -> bool {
        if self.points[coord].colour.is_some() {
            return false;
        }
        let mut orth_count = 0;
        for n in orthogonal_neighbours(self.size, coord).into_iter().flatten() {
            orth_count += 1;
            match self.points[n].colour {
                Some(c) if c == colour => {
                    let id = self.points[n].chain_id;
                    if self.chains[id as usize].liberties <= 1 {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        let mut enemy_diag = 0;
        for d in diagonal_neighbours(self.size, coord).into_iter().flatten() {
            if let Some(c) = self.points[d].colour {
                if c != colour {
                    enemy_diag += 1;
                }
            }
        }
        let max_enemy_diag = if orth_count < 4 { 0 } else { 1 };
        enemy_diag <= max_enemy_diag
    }

    fn capture_chain(&mut self, id: usize) {
        let colour = self.chains[id].colour;
        let stones = self.chains[id].stones;
        self.hash ^= self.chains[id].zobrist_xor;
        for s in stones.iter() {
            self.points[s] = Point::default();
        }
        match colour {
            Colour::Black => self.black.subtract_in(&stones),
            Colour::White => self.white.subtract_in(&stones),
        }
        self.empty.or_in(&stones);
        let chain = &mut self.chains[id];
        chain.dead = true;
        chain.stones = Bitset::new(self.area);
        chain.frontier = Bitset::new(self.area);
        chain.liberties = 0;
    }

    fn merge_chain_into(&mut self, new_id: usize, old_id: usize) {
        let old_stones = self.chains[old_id].stones;
        let old_frontier = self.chains[old_id].frontier;
        let old_hash = self.chains[old_id].zobrist_xor;
        self.chains[new_id].stones.or_in(&old_stones);
        self.chains[new_id].frontier.or_in(&old_frontier);
        self.chains[new_id].zobrist_xor ^= old_hash;
        self.chains[old_id].dead = true;
        for s in old_stones.iter() {
            self.points[s].chain_id = new_id as u32;
        }
    }

    /// Play a move. The caller must have already verified `check(colour, coord)` was legal;
    /// violating that precondition is a bug, not a recoverable error.
    pub fn play(&mut self, colour: Colour, coord: Coord) {
        assert_eq!(
            colour, self.side_to_move,
            "play() called out of turn order"
        );
        if coord == PASS {
            self.passed[colour as usize] = true;
            self.hash ^= zobrist::black_turn_key();
            self.side_to_move = colour.opposite();
            self.turn_number += 1;
            self.last_move = PASS;
            self.hash_history.push(self.hash);
            return;
        }

        let coord = coord as usize;
        debug_assert!(
            self.points[coord].colour.is_none(),
            "play() called on an occupied point; caller skipped check()"
        );
        self.passed[colour as usize] = false;

        let summary = self.neighbour_summary(colour, coord);

        for &id in &summary.enemy_atari {
            self.capture_chain(id as usize);
        }

        let new_id = self.chains.len() as u32;
        let mut stones = Bitset::new(self.area);
        stones.set(coord);
        let mut frontier = Bitset::new(self.area);
        for n in orthogonal_neighbours(self.size, coord).into_iter().flatten() {
            frontier.set(n);
        }
        self.chains.push(StoneChain {
            colour,
            stones,
            frontier,
            liberties: 0,
            zobrist_xor: zobrist::key(colour, coord),
            dead: false,
        });
        self.points[coord] = Point {
            colour: Some(colour),
            chain_id: new_id,
        };
        match colour {
            Colour::Black => self.black.set(coord),
            Colour::White => self.white.set(coord),
        }
        self.empty.clear(coord);

        for &id in &summary.friendly {
            self.merge_chain_into(new_id as usize, id as usize);
        }

        let stones_snapshot = self.chains[new_id as usize].stones;
        self.chains[new_id as usize].frontier.subtract_in(&stones_snapshot);
        let libs = self.chains[new_id as usize].frontier.count_and(&self.empty);
        self.chains[new_id as usize].liberties = libs;
        debug_assert!(libs > 0, "play() produced a suicide; caller skipped check()");

        for &id in &summary.enemy_safe {
            let libs = self.chains[id as usize].frontier.count_and(&self.empty);
            self.chains[id as usize].liberties = libs;
        }

        self.hash ^= zobrist::black_turn_key();
        self.side_to_move = colour.opposite();
        self.turn_number += 1;
        self.last_move = coord as Coord;
        self.hash_history.push(self.hash);
    }

    /// All legal moves for the side to move. During a playout, eye-filling moves are excluded
    /// and, if no non-pass move is admissible, a single pass is yielded; outside a playout,
    /// pass is always appended.
    pub fn legal_moves(&self, during_playout: bool) -> Vec<Coord> {
        let mut out = Vec::with_capacity(self.empty.count());
        for coord in self.empty.iter() {
            let info = self.check(self.side_to_move, coord as Coord);
            if !info.contains(MoveInfo::LEGAL) {
                continue;
            }
            if during_playout && info.contains(MoveInfo::FILLS_EYE) {
                continue;
            }
            out.push(coord as Coord);
        }
        if during_playout {
            if out.is_empty() {
                out.push(PASS);
            }
        } else {
            out.push(PASS);
        }
        out
    }

    /// Rejection-sample up to `5k` empty points, returning up to `k` distinct legal non-eye
    /// moves. Falls back to a full move scan if rejection sampling finds nothing.
    pub fn random_legal_non_eye(&self, k: usize, rng: &mut fastrand::Rng) -> Vec<Coord> {
        let pop = self.empty.count();
        let mut out = Vec::with_capacity(k);
        if pop == 0 {
            return out;
        }
        let selector = BitSelector::new(&self.empty);
        for _ in 0..(5 * k).max(1) {
            if out.len() >= k {
                break;
            }
            let idx = rng.usize(0..pop);
            let coord = selector.select(&self.empty, idx);
            let info = self.check(self.side_to_move, coord as Coord);
            if info.contains(MoveInfo::LEGAL)
                && !info.contains(MoveInfo::FILLS_EYE)
                && !out.contains(&(coord as Coord))
            {
                out.push(coord as Coord);
            }
        }
        if out.is_empty() {
            out = self
                .legal_moves(true)
                .into_iter()
                .filter(|&m| m != PASS)
                .collect();
        }
        out
    }

    fn random_legal_from(&self, candidates: &Bitset, rng: &mut fastrand::Rng) -> Coord {
        let pop = candidates.count();
        if pop == 0 {
            return BAD_MOVE;
        }
        let selector = BitSelector::new(candidates);
        let start = rng.usize(0..pop);
        for i in 0..pop {
            let idx = (start + i) % pop;
            let coord = selector.select(candidates, idx);
            let info = self.check(self.side_to_move, coord as Coord);
            if info.contains(MoveInfo::LEGAL) {
                return coord as Coord;
            }
        }
        BAD_MOVE
    }

    /// A uniform-random legal move among points adjacent to an opponent chain with exactly
    /// `target_liberties` liberties.
    pub fn random_attacking(&self, target_liberties: usize, rng: &mut fastrand::Rng) -> Coord {
        let opponent = self.side_to_move.opposite();
        let mut candidates = Bitset::new(self.area);
        for chain in &self.chains {
            if !chain.dead && chain.colour == opponent && chain.liberties == target_liberties {
                let mut libs = chain.frontier;
                libs.and_in(&self.empty);
                candidates.or_in(&libs);
            }
        }
        self.random_legal_from(&candidates, rng)
    }

    /// A uniform-random legal move among points adjacent to one of the side-to-move's own
    /// chains that is in atari.
    pub fn random_saving(&self, rng: &mut fastrand::Rng) -> Coord {
        let colour = self.side_to_move;
        let mut candidates = Bitset::new(self.area);
        for chain in &self.chains {
            if !chain.dead && chain.colour == colour && chain.liberties == 1 {
                let mut libs = chain.frontier;
                libs.and_in(&self.empty);
                candidates.or_in(&libs);
            }
        }
        self.random_legal_from(&candidates, rng)
    }

    /// A uniform-random legal move among points orthogonal to `last_coord` whose classifier
    /// intersects `urgent`.
    pub fn random_local_urgent(&self, last_coord: Coord, urgent: MoveInfo, rng: &mut fastrand::Rng) -> Coord {
        if last_coord < 0 {
            return BAD_MOVE;
        }
        let mut candidates: Vec<usize> = orthogonal_neighbours(self.size, last_coord as usize)
            .into_iter()
            .flatten()
            .filter(|&n| self.points[n].colour.is_none())
            .collect();
        rng.shuffle(&mut candidates);
        for n in candidates {
            let info = self.check(self.side_to_move, n as Coord);
            if info.contains(MoveInfo::LEGAL) && info.intersects(urgent) {
                return n as Coord;
            }
        }
        BAD_MOVE
    }

    fn eye_owner(&self, coord: usize) -> Option<Colour> {
        orthogonal_neighbours(self.size, coord)
            .into_iter()
            .flatten()
            .find_map(|n| self.points[n].colour)
    }

    /// Area score from black's perspective: `+1` per black point (stone or eye-owned empty
    /// point), `-1` per white point, minus komi. Only meaningful on a terminal position.
    pub fn score(&self) -> i32 {
        let mut black = 0i32;
        let mut white = 0i32;
        for coord in 0..self.area {
            let effective = self.points[coord].colour.or_else(|| self.eye_owner(coord));
            match effective {
                Some(Colour::Black) => black += 1,
                Some(Colour::White) => white += 1,
                None => {}
            }
        }
        let diff = black as f32 - white as f32 - self.komi;
        if diff > 0.0 {
            1
        } else if diff < 0.0 {
            -1
        } else {
            0
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for print_row in 0..self.size {
            let board_row = self.size - 1 - print_row;
            write!(f, "{:>2} ", board_row + 1)?;
            for col in 0..self.size {
                let coord = board_row * self.size + col;
                let ch = match self.points[coord].colour {
                    Some(Colour::Black) => 'X',
                    Some(Colour::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        write!(f, "   ")?;
        for col in 0..self.size {
            write!(f, "{} ", crate::constants::COLUMN_LETTERS.chars().nth(col).unwrap())?;
        }
        writeln!(f)
    }
}

/// Render a coordinate as GTP vertex notation (`pass` or e.g. `D4`). Column letters skip `I`.
pub fn str_coord(size: usize, coord: Coord) -> String {
    if coord == PASS {
        return "pass".to_string();
    }
    if coord == BAD_MOVE || coord < 0 {
        return "resign".to_string();
    }
    let coord = coord as usize;
    let col = coord % size;
    let row = coord / size;
    let letter = crate::constants::COLUMN_LETTERS.chars().nth(col).unwrap_or('?');
    format!("{letter}{}", size - row)
}

/// Parse a GTP vertex (`pass` or e.g. `D4`) into a coordinate, or `BAD_MOVE` if malformed.
pub fn parse_coord(size: usize, s: &str) -> Coord {
    let s = s.trim();
    if s.eq_ignore_ascii_case("pass") {
        return PASS;
    }
    if s.eq_ignore_ascii_case("resign") {
        return BAD_MOVE;
    }
    let mut chars = s.chars();
    let Some(col_char) = chars.next() else {
        return BAD_MOVE;
    };
    let col_char = col_char.to_ascii_uppercase();
    let Some(col) = crate::constants::COLUMN_LETTERS.find(col_char) else {
        return BAD_MOVE;
    };
    let rest: String = chars.collect();
    let Ok(rank) = rest.parse::<usize>() else {
        return BAD_MOVE;
    };
    if rank == 0 || rank > size {
        return BAD_MOVE;
    }
    let row = size - rank;
    (row * size + col) as Coord
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_round_trip() {
        for size in [9usize, 13, 19] {
            for coord in [0i32, (size * size / 2) as i32, (size * size - 1) as i32] {
                let s = str_coord(size, coord);
                assert_eq!(parse_coord(size, &s), coord);
            }
            assert_eq!(parse_coord(size, "pass"), PASS);
            assert_eq!(str_coord(size, PASS), "pass");
        }
    }

    #[test]
    fn empty_position_partitions_the_board() {
        let pos = Position::new(9, 7.5).unwrap();
        assert_eq!(pos.empty.count(), 81);
        assert_eq!(pos.black.count() + pos.white.count() + pos.empty.count(), 81);
    }

    #[test]
    fn suicide_is_rejected() {
        // White stones ring a single empty point at the centre; black cannot play there.
        let moves = vec![
            (Colour::Black, parse_coord(9, "J9")), // filler, keeps turn order alternating from black
            (Colour::White, parse_coord(9, "D5")),
            (Colour::Black, parse_coord(9, "A1")),
            (Colour::White, parse_coord(9, "F5")),
            (Colour::Black, parse_coord(9, "A2")),
            (Colour::White, parse_coord(9, "E4")),
            (Colour::Black, parse_coord(9, "A3")),
            (Colour::White, parse_coord(9, "E6")),
            (Colour::Black, parse_coord(9, "A4")),
        ];
        let pos = Position::from_moves(9, 7.5, &moves).unwrap();
        let info = pos.check(Colour::White, parse_coord(9, "E5"));
        assert!(info.contains(MoveInfo::SUICIDE));
    }

    #[test]
    fn capture_removes_stones_and_frees_liberties() {
        // Black surrounds a single white stone at E5.
        let moves = vec![
            (Colour::Black, parse_coord(9, "J9")), // filler, keeps turn order alternating from black
            (Colour::White, parse_coord(9, "E5")),
            (Colour::Black, parse_coord(9, "D5")),
            (Colour::White, parse_coord(9, "A1")),
            (Colour::Black, parse_coord(9, "F5")),
            (Colour::White, parse_coord(9, "A2")),
            (Colour::Black, parse_coord(9, "E4")),
            (Colour::White, parse_coord(9, "A3")),
        ];
        let mut pos = Position::from_moves(9, 7.5, &moves).unwrap();
        let capture_info = pos.check(Colour::Black, parse_coord(9, "E6"));
        assert!(capture_info.contains(MoveInfo::LEGAL));
        assert!(capture_info.contains(MoveInfo::CAPTURE));
        pos.play(Colour::Black, parse_coord(9, "E6"));
        assert_eq!(pos.colour_at(parse_coord(9, "E5") as usize), None);
        assert!(pos.empty.test(parse_coord(9, "E5") as usize));
    }

    #[test]
    fn ko_recapture_is_rejected() {
        // Classic corner ko shape; after black captures at E5, white cannot immediately
        // recapture at the same point.
        let moves = vec![
            (Colour::Black, parse_coord(9, "E5")),
            (Colour::White, parse_coord(9, "F5")),
            (Colour::Black, parse_coord(9, "D5")),
            (Colour::White, parse_coord(9, "E4")),
            (Colour::Black, parse_coord(9, "E6")),
            (Colour::White, parse_coord(9, "F6")),
            (Colour::Black, parse_coord(9, "F4")),
            (Colour::White, parse_coord(9, "G5")),
        ];
        let pos = Position::from_moves(9, 7.5, &moves).unwrap();
        let info = pos.check(Colour::Black, parse_coord(9, "E5"));
        assert!(info.contains(MoveInfo::REPETITION));
    }

    #[test]
    fn eye_is_detected_for_fully_surrounded_point() {
        let moves = vec![
            (Colour::Black, parse_coord(9, "D5")),
            (Colour::White, parse_coord(9, "A1")),
            (Colour::Black, parse_coord(9, "F5")),
            (Colour::White, parse_coord(9, "A2")),
            (Colour::Black, parse_coord(9, "E4")),
            (Colour::White, parse_coord(9, "A3")),
            (Colour::Black, parse_coord(9, "E6")),
            (Colour::White, parse_coord(9, "A4")),
        ];
        let pos = Position::from_moves(9, 7.5, &moves).unwrap();
        assert!(pos.is_eye(Colour::Black, parse_coord(9, "E5") as usize));
        assert!(!pos.is_eye(Colour::White, parse_coord(9, "E5") as usize));
    }

    #[test]
    fn scoring_applies_komi_symmetrically() {
        let pos = Position::new(9, 7.5).unwrap();
        // Fully empty, uncontested board: no owner for any point, score is purely -komi.
        assert_eq!(pos.score(), -1);
    }

    #[test]
    fn clone_from_does_not_disturb_the_source() {
        let moves = vec![
            (Colour::Black, parse_coord(9, "E5")),
            (Colour::White, parse_coord(9, "F5")),
        ];
        let original = Position::from_moves(9, 7.5, &moves).unwrap();
        let mut scratch = Position::new(9, 7.5).unwrap();
        scratch.clone_from(&original);
        let original_hash = original.hash();
        scratch.play(Colour::Black, parse_coord(9, "D5"));
        assert_eq!(original.hash(), original_hash);
    }
}
