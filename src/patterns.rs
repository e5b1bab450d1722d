//! 3x3 and 5x5 stone-pattern matching, used for prior biases and playout move ordering.
//!
//! A pattern is loaded as an `n x n` grid of `{. P O X}` meaning `{empty, player-to-move stone,
//! opponent stone, off-board}`. Patterns are expanded across the 8 dihedral symmetries (4
//! rotations x 2 reflections, de-duplicated) and compiled into a trie keyed by [`Location`],
//! walked in a fixed spiral order around the query point: innermost ring first, each ring
//! traversed down its left edge, across the bottom, up the right edge, and back across the top.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::position::{Colour, Position};

/// The four symbols a pattern cell, or a queried board point, can take relative to the side to
/// move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Empty = 0,
    Player = 1,
    Opponent = 2,
    OffBoard = 3,
}

impl Location {
    fn from_char(c: char) -> Option<Location> {
        match c {
            '.' => Some(Location::Empty),
            'P' => Some(Location::Player),
            'O' => Some(Location::Opponent),
            'X' => Some(Location::OffBoard),
            _ => None,
        }
    }
}

/// Precomputed (row, col) offsets from a pattern's centre, in spiral order, for a given
/// pattern side length `n`.
fn spiral_deltas(n: usize) -> Vec<(isize, isize)> {
    let path = spiral_flat_indices(n);
    let half = (n / 2) as isize;
    path.into_iter()
        .map(|idx| {
            let row = (idx / n) as isize;
            let col = (idx % n) as isize;
            (row - half, col - half)
        })
        .collect()
}

/// The ring-by-ring spiral traversal over a flattened `n x n` grid (row-major), excluding the
/// centre cell. Rings are visited innermost-first; each ring starts at its top-left corner,
/// goes down the left edge, across the bottom, up the right edge, and back across the top to
/// the start.
fn spiral_flat_indices(n: usize) -> Vec<usize> {
    let side = n as isize;
    let size = (n * n - 1) as isize;
    let num_rings = size / 2;
    let mut path = Vec::with_capacity(size as usize);
    for r in (0..num_rings).rev() {
        let ring_size = side - 2 * r;
        if ring_size < 2 {
            continue;
        }
        let ring_start = r * (side + 1);
        add_ring(&mut path, side, ring_size, ring_start);
    }
    path
}

fn add_ring(path: &mut Vec<usize>, side: isize, ring_size: isize, ring_start: isize) {
    let mut current = ring_start;
    for _ in 1..ring_size {
        current += side;
        path.push(current as usize);
    }
    for _ in 1..ring_size {
        current += 1;
        path.push(current as usize);
    }
    for _ in 1..ring_size {
        current -= side;
        path.push(current as usize);
    }
    for _ in 1..ring_size {
        current -= 1;
        path.push(current as usize);
    }
}

#[derive(Default)]
struct DfaNode {
    children: [Option<Box<DfaNode>>; 4],
    /// Number of loaded patterns whose path passes through (or terminates at) this node.
    count: u32,
}

impl DfaNode {
    fn insert(&mut self, path: &[Location]) {
        self.count += 1;
        if let Some((&first, rest)) = path.split_first() {
            let slot = &mut self.children[first as usize];
            let child = slot.get_or_insert_with(|| Box::new(DfaNode::default()));
            child.insert(rest);
        }
    }
}

/// A compiled pattern matcher for a single pattern size (3 or 5).
pub struct PatternDfa {
    n: usize,
    deltas: Vec<(isize, isize)>,
    root: DfaNode,
    num_patterns: usize,
}

impl fmt::Debug for PatternDfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternDfa")
            .field("n", &self.n)
            .field("num_patterns", &self.num_patterns)
            .finish()
    }
}

impl PatternDfa {
    /// Build an empty matcher of the given size; every query returns false. Used when a
    /// pattern file is absent or fails to parse, so prior biasing degrades rather than fails.
    pub fn empty(n: usize) -> Self {
        Self {
            n,
            deltas: spiral_deltas(n),
            root: DfaNode::default(),
            num_patterns: 0,
        }
    }

    /// Load a pattern file of `n`-sized patterns. Never returns an error: on any I/O or parse
    /// failure the matcher is simply left with zero patterns and the caller should log a
    /// warning.
    pub fn load(path: impl AsRef<Path>, n: usize) -> Self {
        let mut dfa = Self::empty(n);
        let Ok(text) = fs::read_to_string(path) else {
            return dfa;
        };
        for grid in parse_pattern_grids(&text, n) {
            dfa.insert_with_symmetries(&grid);
        }
        dfa
    }

    fn insert_with_symmetries(&mut self, grid: &[Vec<Location>]) {
        let mut seen: Vec<Vec<Vec<Location>>> = Vec::with_capacity(8);
        for variant in dihedral_variants(grid) {
            if seen.iter().any(|g| *g == variant) {
                continue;
            }
            let path = self.flatten_in_spiral_order(&variant);
            self.root.insert(&path);
            self.num_patterns += 1;
            seen.push(variant);
        }
    }

    fn flatten_in_spiral_order(&self, grid: &[Vec<Location>]) -> Vec<Location> {
        let half = (self.n / 2) as isize;
        self.deltas
            .iter()
            .map(|&(dr, dc)| {
                let row = half + dr;
                let col = half + dc;
                grid[row as usize][col as usize]
            })
            .collect()
    }

    /// Number of distinct pattern variants (after symmetry expansion) compiled into this
    /// matcher.
    pub fn num_patterns(&self) -> usize {
        self.num_patterns
    }

    /// Does any loaded pattern match the board around `centre`, from `colour_to_move`'s point
    /// of view?
    pub fn has_match(&self, pos: &Position, colour_to_move: Colour, centre: usize) -> bool {
        if self.num_patterns == 0 {
            return false;
        }
        let size = pos.size();
        let crow = (centre / size) as isize;
        let ccol = (centre % size) as isize;
        let mut node = &self.root;
        for &(dr, dc) in &self.deltas {
            let row = crow + dr;
            let col = ccol + dc;
            let loc = if row < 0 || col < 0 || row as usize >= size || col as usize >= size {
                Location::OffBoard
            } else {
                let coord = row as usize * size + col as usize;
                match pos.colour_at(coord) {
                    None => Location::Empty,
                    Some(c) if c == colour_to_move => Location::Player,
                    Some(_) => Location::Opponent,
                }
            };
            match &node.children[loc as usize] {
                Some(child) if child.count > 0 => node = child,
                _ => return false,
            }
        }
        true
    }
}

/// Parse a text blob into a list of `n x n` character grids, each mapped to [`Location`].
/// Patterns are separated by blank lines; any line shorter than `n` characters (after
/// trimming) is treated as a separator, matching the loader's tolerant behaviour for stray
/// whitespace between patterns.
fn parse_pattern_grids(text: &str, n: usize) -> Vec<Vec<Vec<Location>>> {
    let mut grids = Vec::new();
    let mut current: Vec<Vec<Location>> = Vec::with_capacity(n);
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.chars().count() < n {
            if current.len() == n {
                grids.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            continue;
        }
        let row: Option<Vec<Location>> = trimmed.chars().take(n).map(Location::from_char).collect();
        match row {
            Some(row) => current.push(row),
            None => current.clear(),
        }
        if current.len() == n {
            grids.push(std::mem::take(&mut current));
        }
    }
    if current.len() == n {
        grids.push(current);
    }
    grids
}

/// Generate all 8 dihedral transforms (4 rotations, each with and without a horizontal flip)
/// of an `n x n` grid.
fn dihedral_variants(grid: &[Vec<Location>]) -> Vec<Vec<Vec<Location>>> {
    let mut variants = Vec::with_capacity(8);
    let mut g = grid.to_vec();
    for _ in 0..4 {
        variants.push(g.clone());
        variants.push(horiz_flip(&g));
        g = rotate90(&g);
    }
    variants
}

fn rotate90(grid: &[Vec<Location>]) -> Vec<Vec<Location>> {
    let n = grid.len();
    let mut out = vec![vec![Location::Empty; n]; n];
    for r in 0..n {
        for c in 0..n {
            out[c][n - 1 - r] = grid[r][c];
        }
    }
    out
}

fn horiz_flip(grid: &[Vec<Location>]) -> Vec<Vec<Location>> {
    let n = grid.len();
    let mut out = vec![vec![Location::Empty; n]; n];
    for r in 0..n {
        for c in 0..n {
            out[r][n - 1 - c] = grid[r][c];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spiral_visits_every_cell_but_centre() {
        for &n in &[3usize, 5] {
            let deltas = spiral_deltas(n);
            assert_eq!(deltas.len(), n * n - 1);
            let half = (n / 2) as isize;
            let mut seen = std::collections::HashSet::new();
            for &(dr, dc) in &deltas {
                assert!(dr != 0 || dc != 0, "spiral must not revisit the centre");
                seen.insert((dr + half, dc + half));
            }
            assert_eq!(seen.len(), n * n - 1);
        }
    }

    #[test]
    fn empty_matcher_never_matches() {
        let dfa = PatternDfa::empty(3);
        assert_eq!(dfa.num_patterns(), 0);
    }

    #[test]
    fn parses_single_pattern_block() {
        let text = "...\n.P.\n.O.\n";
        let grids = parse_pattern_grids(text, 3);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0][1][1], Location::Player);
        assert_eq!(grids[0][2][1], Location::Opponent);
    }

    #[test]
    fn symmetry_expansion_deduplicates_symmetric_patterns() {
        // A fully symmetric pattern (all-empty ring) has only 1 distinct variant.
        let grid = vec![vec![Location::Empty; 3]; 3];
        let variants: Vec<_> = dihedral_variants(&grid);
        let mut distinct: Vec<Vec<Vec<Location>>> = Vec::new();
        for v in variants {
            if !distinct.contains(&v) {
                distinct.push(v);
            }
        }
        assert_eq!(distinct.len(), 1);
    }

    #[test]
    fn missing_file_yields_empty_matcher() {
        let dfa = PatternDfa::load("/nonexistent/path/to/patterns.txt", 3);
        assert_eq!(dfa.num_patterns(), 0);
    }
}
