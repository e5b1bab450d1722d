//! Parallel Monte-Carlo tree search: the worker loop and the driver that owns it.
//!
//! A [`SearchDriver`] owns a shared [`node::Tree`] and spawns one native thread per
//! [`Worker`]. Each worker repeatedly clones the root position into a scratch buffer,
//! descends the tree under per-node locks (select), grows one new leaf (expand), plays
//! a simulated game to the end (simulate), and walks back up crediting both the regular
//! Monte-Carlo counters and the RAVE all-moves-as-first counters of every sibling whose
//! move appeared in the simulation (backpropagate). Workers never hold more than one
//! node's lock at a time, and every iteration either completes all four phases or is
//! abandoned before the first counter is touched, so a worker that panics mid-iteration
//! cannot corrupt the tree.

pub mod node;
pub mod playout;
pub mod selection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::constants::{
    BAD_MOVE, DEFAULT_WORKERS, MAX_GAME_LEN_FACTOR, PASS, PRIOR_CAPTURE, PRIOR_LOCAL,
    PRIOR_SAVE, PRIOR_SELF_ATARI,
};
use crate::position::{Colour, Coord, MoveInfo, Position};

pub use node::{MoveStats, Node, Tree, ROOT};
pub use playout::{BestOfN, BiasedBestOfN, PlayoutPolicy, Uniform};
pub use selection::{arg_max, McRave, SelectionPolicy, Ucb};

/// Which selection policy a search uses, including whether first-expansion RAVE priors
/// are seeded (see [`node::NodeInner::prioritised`] and §4.6 of the design).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionKind {
    Ucb,
    McRave,
    McRaveWithPriors,
}

/// Which leaf-simulation policy a search uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayoutKind {
    Uniform,
    BestOfN,
    BiasedBestOfN,
}

fn make_selection(kind: SelectionKind) -> Box<dyn SelectionPolicy> {
    match kind {
        SelectionKind::Ucb => Box::new(Ucb::default()),
        SelectionKind::McRave | SelectionKind::McRaveWithPriors => Box::new(McRave::default()),
    }
}

fn make_playout(kind: PlayoutKind) -> Box<dyn PlayoutPolicy> {
    match kind {
        PlayoutKind::Uniform => Box::new(Uniform),
        PlayoutKind::BestOfN => Box::new(BestOfN::default()),
        PlayoutKind::BiasedBestOfN => Box::new(BiasedBestOfN::default()),
    }
}

/// Tunables for one search: worker count, policy choice, and the seed the driver draws
/// per-worker seeds from (so a given driver seed reproduces the same worker streams).
#[derive(Clone, Copy, Debug)]
pub struct SearchConfig {
    pub num_workers: usize,
    pub selection: SelectionKind,
    pub playout: PlayoutKind,
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            num_workers: DEFAULT_WORKERS,
            selection: SelectionKind::McRaveWithPriors,
            playout: PlayoutKind::BiasedBestOfN,
            seed: 0x5EED_C0DE,
        }
    }
}

/// Hardware concurrency as reported by the OS, falling back to [`DEFAULT_WORKERS`] if the
/// query fails. A CLI override should be preferred over this when one is given.
pub fn default_num_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_WORKERS)
}

/// `true` iff `colour` is the winner of a terminal position scored `score` (black wins on
/// positive scores, white on negative; a drawn score credits neither side).
fn colour_won(colour: Colour, score: i32) -> bool {
    match colour {
        Colour::Black => score > 0,
        Colour::White => score < 0,
    }
}

fn record_ownership(ownership: &mut [Option<Colour>], mv: Coord, colour: Colour) {
    if mv != PASS {
        let slot = &mut ownership[mv as usize];
        if slot.is_none() {
            *slot = Some(colour);
        }
    }
}

/// One concurrent tree worker: its own PRNG and policy instances, and a shared handle to
/// the tree and the frozen root position every iteration starts from.
struct Worker {
    tree: Arc<Tree>,
    root: Arc<Position>,
    selection: Box<dyn SelectionPolicy>,
    selection_kind: SelectionKind,
    playout: Box<dyn PlayoutPolicy>,
    rng: fastrand::Rng,
}

impl Worker {
    fn new(tree: Arc<Tree>, root: Arc<Position>, config: SearchConfig, seed: u64) -> Self {
        Worker {
            tree,
            root,
            selection: make_selection(config.selection),
            selection_kind: config.selection,
            playout: make_playout(config.playout),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// The main loop: run iterations until `stop` is observed at an iteration boundary.
    fn run_until_stopped(&mut self, stop: &AtomicBool) {
        let mut scratch = (*self.root).clone();
        while !stop.load(Ordering::Relaxed) {
            scratch.clone_from(&self.root);
            self.run_iteration(&mut scratch);
        }
    }

    fn run_iteration(&mut self, scratch: &mut Position) {
        let (path, mut ownership) = self.select_and_expand(scratch);
        self.simulate(scratch, &mut ownership);
        let score = scratch.score();
        self.backpropagate(&path, &ownership, score);
    }

    /// Stats of each id in `ids`, fetched one node-lock at a time (never two locks held
    /// concurrently).
    fn child_stats(&self, ids: &[usize]) -> Vec<(usize, MoveStats)> {
        ids.iter()
            .map(|&id| (id, self.tree.with_node(id, |n| n.lock().stats)))
            .collect()
    }

    fn pick_child(&self, ids: &[usize], parent_visits: u32) -> usize {
        let stats = self.child_stats(ids);
        let i = arg_max(&stats, parent_visits, self.selection.as_ref());
        stats[i].0
    }

    /// Select a child under `node_idx`'s lock, charge it a virtual loss, play its move on
    /// `scratch`, and record ownership. Returns the chosen child's index.
    fn descend_one(&self, node_idx: usize, scratch: &mut Position, ownership: &mut [Option<Colour>]) -> usize {
        let children = self.tree.with_node(node_idx, |n| n.lock().children.clone());
        let visits = self.tree.with_node(node_idx, |n| n.lock().stats.visits);
        let chosen = self.pick_child(&children, visits);
        let (mv, colour) = self.tree.with_node(chosen, |n| {
            n.lock().stats.apply_virtual_loss();
            (n.mv, n.colour)
        });
        scratch.play(colour, mv);
        record_ownership(ownership, mv, colour);
        chosen
    }

    /// Create `node_idx`'s children if it doesn't have any yet, seeding RAVE priors on the
    /// first worker to win the race. A worker that loses the race leaves its freshly
    /// pushed nodes as unreferenced arena entries; harmless, since the arena only grows.
    fn ensure_children(&self, node_idx: usize, scratch: &Position) {
        let already = self.tree.with_node(node_idx, |n| !n.lock().children.is_empty());
        if already {
            return;
        }
        let side = scratch.side_to_move();
        let moves: Vec<(Coord, Colour)> = scratch
            .legal_moves(false)
            .into_iter()
            .map(|m| (m, side))
            .collect();
        let ids = self.tree.push_children(node_idx, &moves);
        let won_race = self.tree.with_node(node_idx, |n| {
            let mut inner = n.lock();
            if inner.children.is_empty() {
                inner.children = ids.clone();
                let first_time = !inner.prioritised;
                inner.prioritised = true;
                first_time
            } else {
                false
            }
        });
        if won_race && self.selection_kind == SelectionKind::McRaveWithPriors {
            self.seed_priors(&ids, scratch);
        }
    }

    fn seed_priors(&self, ids: &[usize], scratch: &Position) {
        for &cid in ids {
            let (mv, colour) = self.tree.with_node(cid, |n| (n.mv, n.colour));
            if mv == PASS {
                continue;
            }
            let info = scratch.check(colour, mv);
            let mut visits = 0u32;
            let mut wins = 0u32;
            let mut add = |prior: (u32, u32)| {
                visits += prior.0;
                wins += prior.1;
            };
            if info.contains(MoveInfo::CAPTURE) {
                add(PRIOR_CAPTURE);
            }
            if info.contains(MoveInfo::SAVE) {
                add(PRIOR_SAVE);
            }
            if info.contains(MoveInfo::SELF_ATARI) {
                add(PRIOR_SELF_ATARI);
            }
            if info.contains(MoveInfo::LOCAL) {
                add(PRIOR_LOCAL);
            }
            if visits > 0 {
                self.tree.with_node(cid, |n| {
                    let mut inner = n.lock();
                    inner.stats.rave_visits += visits;
                    inner.stats.rave_wins += wins;
                });
            }
        }
    }

    /// Descend the tree while the current node is considered "fully expanded enough"
    /// (has children and its own visit count has caught up to its child count), then grow
    /// one new leaf at the node where that stops and descend into it once more. Returns
    /// the path from root to the newly expanded node, and the per-coord ownership map
    /// accumulated along the way.
    fn select_and_expand(&self, scratch: &mut Position) -> (Vec<usize>, Vec<Option<Colour>>) {
        let mut ownership = vec![None; scratch.area()];
        let mut path = vec![ROOT];
        let mut current = ROOT;
        loop {
            let (has_children, visits, num_children) = self.tree.with_node(current, |n| {
                let inner = n.lock();
                (!inner.children.is_empty(), inner.stats.visits, inner.children.len())
            });
            if !(has_children && visits as usize >= num_children) {
                break;
            }
            current = self.descend_one(current, scratch, &mut ownership);
            path.push(current);
        }
        self.ensure_children(current, scratch);
        current = self.descend_one(current, scratch, &mut ownership);
        path.push(current);
        (path, ownership)
    }

    /// Play out the rest of the game from `scratch` using the playout policy, recording
    /// each move's first player into `ownership`. `MAX_GAME_LEN_FACTOR` bounds runaway
    /// playouts (mirroring the teacher's own `MAX_GAME_LEN` guard) so a worker can never
    /// spin forever on one iteration; if it ever fires, that's a sign the playout policy
    /// isn't converging, so it's logged rather than silently scored as a normal result.
    fn simulate(&mut self, scratch: &mut Position, ownership: &mut [Option<Colour>]) {
        let max_steps = scratch.area() * MAX_GAME_LEN_FACTOR;
        let mut last_move = scratch.last_move();
        let mut steps = 0usize;
        loop {
            let colour = scratch.side_to_move();
            let mv = self.playout.select(scratch, last_move, &mut self.rng);
            if mv == BAD_MOVE {
                break;
            }
            scratch.play(colour, mv);
            record_ownership(ownership, mv, colour);
            last_move = mv;
            steps += 1;
            if steps > max_steps {
                warn!(
                    "playout exceeded {max_steps} moves without both sides passing; \
                     scoring the truncated position as terminal"
                );
                break;
            }
        }
    }

    /// Walk from the expanded leaf back up to the root. At every node on the path, credit
    /// RAVE to every one of its children whose move was actually played (by the matching
    /// colour) somewhere in this simulation; then undo that node's own virtual loss (the
    /// root never had one) and apply the real score update.
    fn backpropagate(&self, path: &[usize], ownership: &[Option<Colour>], score: i32) {
        for &current in path.iter().rev() {
            let children = self.tree.with_node(current, |n| n.lock().children.clone());
            for cid in children {
                let (mv, colour) = self.tree.with_node(cid, |n| (n.mv, n.colour));
                if mv == PASS {
                    continue;
                }
                if ownership[mv as usize] == Some(colour) {
                    let win = colour_won(colour, score);
                    self.tree.with_node(cid, |n| n.lock().stats.update_rave(win));
                }
            }
            if current == ROOT {
                let root_colour = self.tree.with_node(ROOT, |n| n.colour);
                let win = colour_won(root_colour, score);
                self.tree.with_node(ROOT, |n| n.lock().stats.update_score(win));
            } else {
                let colour = self.tree.with_node(current, |n| n.colour);
                let win = colour_won(colour, score);
                self.tree.with_node(current, |n| {
                    let mut inner = n.lock();
                    inner.stats.undo_virtual_loss();
                    inner.stats.update_score(win);
                });
            }
        }
    }
}

/// The outcome of a stopped search: the move to play, its estimated winrate, and the
/// total number of simulations that passed through the root (the "tree size").
#[derive(Clone, Copy, Debug)]
pub struct SearchResult {
    pub best_move: Coord,
    pub winrate: f64,
    pub tree_size: u64,
}

/// Owns the shared tree and the running workers for one move decision. Created with
/// [`SearchDriver::start`], stopped with [`SearchDriver::stop`], which blocks until every
/// worker has settled and then reports the root child with the most visits.
pub struct SearchDriver {
    tree: Arc<Tree>,
    stop_flag: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl SearchDriver {
    /// Build a fresh root from `position` and spawn `config.num_workers` (at least 1)
    /// worker threads, each seeded independently but deterministically from `config.seed`.
    pub fn start(position: &Position, config: SearchConfig) -> Self {
        let root_colour = position.side_to_move();
        let tree = Arc::new(Tree::new(root_colour));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let root_position = Arc::new(position.clone());
        let mut seeder = fastrand::Rng::with_seed(config.seed);
        let num_workers = config.num_workers.max(1);
        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let worker_seed = seeder.u64(..);
            let tree = Arc::clone(&tree);
            let root_position = Arc::clone(&root_position);
            let stop_flag_for_worker = Arc::clone(&stop_flag);
            handles.push(thread::spawn(move || {
                let mut worker = Worker::new(tree, root_position, config, worker_seed);
                worker.run_until_stopped(&stop_flag_for_worker);
            }));
        }
        SearchDriver {
            tree,
            stop_flag,
            handles,
        }
    }

    /// Run a search for approximately `budget`, then stop and report the result. The
    /// convenience wrapper around `start` + sleep + `stop` that a GTP `genmove` uses.
    pub fn search_for(position: &Position, config: SearchConfig, budget: Duration) -> SearchResult {
        let driver = Self::start(position, config);
        thread::sleep(budget);
        driver.stop()
    }

    /// Signal every worker to stop, block until all have joined, then pick the root child
    /// with the greatest visit count (ties broken by first index, matching every other
    /// arg-max in the search).
    pub fn stop(mut self) -> SearchResult {
        self.stop_flag.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        let children = self.tree.with_node(ROOT, |n| n.lock().children.clone());
        let mut best: Option<(Coord, MoveStats)> = None;
        let mut tree_size = 0u64;
        for id in children {
            let (mv, stats) = self.tree.with_node(id, |n| (n.mv, n.lock().stats));
            tree_size += stats.visits as u64;
            let better = match best {
                None => true,
                Some((_, b)) => stats.visits > b.visits,
            };
            if better {
                best = Some((mv, stats));
            }
        }
        match best {
            Some((mv, stats)) => SearchResult {
                best_move: mv,
                winrate: stats.winning_chance(),
                tree_size,
            },
            None => SearchResult {
                best_move: PASS,
                winrate: 0.0,
                tree_size: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn single_worker_search_returns_a_legal_move() {
        let pos = Position::new(9, 7.5).unwrap();
        let config = SearchConfig {
            num_workers: 1,
            ..SearchConfig::default()
        };
        let result = SearchDriver::search_for(&pos, config, Duration::from_millis(200));
        assert!(result.tree_size > 0);
        if result.best_move != PASS {
            let info = pos.check(Colour::Black, result.best_move);
            assert!(info.contains(MoveInfo::LEGAL));
        }
    }

    #[test]
    fn multi_worker_search_completes_and_reports_visits() {
        let pos = Position::new(9, 7.5).unwrap();
        let config = SearchConfig {
            num_workers: 4,
            ..SearchConfig::default()
        };
        let result = SearchDriver::search_for(&pos, config, Duration::from_millis(200));
        assert!(result.tree_size > 0);
        assert!((0.0..=1.0).contains(&result.winrate));
    }

    #[test]
    fn ucb_selection_also_produces_a_legal_move() {
        let pos = Position::new(9, 7.5).unwrap();
        let config = SearchConfig {
            num_workers: 2,
            selection: SelectionKind::Ucb,
            playout: PlayoutKind::Uniform,
            ..SearchConfig::default()
        };
        let result = SearchDriver::search_for(&pos, config, Duration::from_millis(150));
        if result.best_move != PASS {
            assert!(pos.check(Colour::Black, result.best_move).contains(MoveInfo::LEGAL));
        }
    }

    #[test]
    fn stopping_an_unstarted_worker_set_is_harmless() {
        let pos = Position::new(5, 0.5).unwrap();
        let config = SearchConfig {
            num_workers: 1,
            ..SearchConfig::default()
        };
        let driver = SearchDriver::start(&pos, config);
        let result = driver.stop();
        assert!(result.tree_size >= 0);
    }
}
