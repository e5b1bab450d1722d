//! Go Text Protocol (GTP) front end.
//!
//! This is the "external collaborator" described by the design: a line-oriented command
//! loop whose only real contract with the core is pushing moves into a [`Position`]'s
//! history and then asking a [`crate::mcts::SearchDriver`] to run for a time budget and
//! report the best move. Everything else here — board-size/komi bookkeeping, clock
//! tracking, id echoing — is protocol plumbing around that contract.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::constants::{
    DEFAULT_KOMI, DEFAULT_N, DEFAULT_TIME_MS, GTP_PROTOCOL_VERSION, MAX_N, PASS_THRES,
    RESIGN_THRES,
};
use crate::mcts::{default_num_workers, PlayoutKind, SearchConfig, SearchDriver, SelectionKind};
use crate::patterns::PatternDfa;
use crate::position::{parse_coord, str_coord, Colour, Coord, MoveInfo, Position};

const KNOWN_COMMANDS: &[&str] = &[
    "protocol_version",
    "name",
    "version",
    "known_command",
    "list_commands",
    "boardsize",
    "clear_board",
    "komi",
    "play",
    "genmove",
    "undo",
    "time_settings",
    "time_left",
    "quit",
    "opg_parameters",
];

/// A single colour's clock: main time remaining, then byoyomi time/stones once main time
/// is exhausted.
#[derive(Clone, Copy, Debug)]
struct Clock {
    main_left_secs: f64,
    byoyomi_left_secs: f64,
    byoyomi_stones_left: u32,
}

impl Default for Clock {
    fn default() -> Self {
        Clock {
            main_left_secs: 0.0,
            byoyomi_left_secs: 0.0,
            byoyomi_stones_left: 0,
        }
    }
}

/// GTP session state: the move history (so `undo` can simply drop its last entry and
/// `play`/`genmove` rebuild a [`Position`] from scratch, which is also how the engine
/// enforces superko across the whole game, not just one in-memory board), board
/// configuration, clocks, and the online-tuning parameter vector fed by `opg_parameters`.
pub struct GtpEngine {
    size: usize,
    komi: f32,
    moves: Vec<(Colour, Coord)>,
    clocks: [Clock; 2],
    search_config: SearchConfig,
    time_budget_ms: u64,
    /// Appended to by `opg_parameters`; not otherwise consumed by the core search.
    tuning_parameters: Vec<f64>,
    pat3: Option<Arc<PatternDfa>>,
    pat5: Option<Arc<PatternDfa>>,
}

impl Default for GtpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GtpEngine {
    pub fn new() -> Self {
        GtpEngine {
            size: DEFAULT_N,
            komi: DEFAULT_KOMI,
            moves: Vec::new(),
            clocks: [Clock::default(); 2],
            search_config: SearchConfig {
                num_workers: default_num_workers(),
                selection: SelectionKind::McRaveWithPriors,
                playout: PlayoutKind::BiasedBestOfN,
                seed: 0x5EED_C0DE,
            },
            time_budget_ms: DEFAULT_TIME_MS,
            tuning_parameters: Vec::new(),
            pat3: None,
            pat5: None,
        }
    }

    /// Override the starting board size (before any `boardsize` command arrives).
    pub fn set_board_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Override the starting komi (before any `komi` command arrives).
    pub fn set_komi(&mut self, komi: f32) {
        self.komi = komi;
    }

    /// Override the worker count the search driver uses, in place of hardware concurrency.
    pub fn set_num_workers(&mut self, workers: usize) {
        self.search_config.num_workers = workers.max(1);
    }

    /// Override the per-worker seeder seed (each worker still draws its own independent
    /// stream from it, per the driver's determinism contract).
    pub fn set_seed(&mut self, seed: u64) {
        self.search_config.seed = seed;
    }

    /// Override the default per-move time budget used until a GTP clock is configured.
    pub fn set_time_budget_ms(&mut self, time_ms: u64) {
        self.time_budget_ms = time_ms;
    }

    /// Attach prior-bias pattern matchers, applied to every position built from the move
    /// history from now on.
    pub fn set_patterns(&mut self, pat3: Option<Arc<PatternDfa>>, pat5: Option<Arc<PatternDfa>>) {
        self.pat3 = pat3;
        self.pat5 = pat5;
    }

    /// Rebuild the current position from the full move history. Every move in `self.moves`
    /// was legality-checked before being appended, so this cannot fail.
    fn current_position(&self) -> Position {
        let mut pos = Position::from_moves(self.size, self.komi, &self.moves)
            .expect("history only ever holds moves that were legal when appended");
        pos.set_patterns(self.pat3.clone(), self.pat5.clone());
        pos
    }

    /// Read lines from `stdin`, execute them, and write GTP responses to `stdout`. Runs
    /// until `quit` or end of input.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        for line in stdin.lock().lines() {
            let Ok(raw) = line else { break };
            let Some(line) = preprocess(&raw) else {
                continue;
            };
            let (id, rest) = split_id(&line);
            let mut parts = rest.split_whitespace();
            let Some(command) = parts.next() else {
                continue;
            };
            let args: Vec<&str> = parts.collect();
            let (ok, message) = self.execute(command, &args);
            let prefix = if ok { '=' } else { '?' };
            let id_part = id.map(|i| i.to_string()).unwrap_or_default();
            let _ = writeln!(stdout, "{prefix}{id_part} {message}\n");
            let _ = stdout.flush();
            if command == "quit" {
                break;
            }
        }
    }

    fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        match command {
            "protocol_version" => (true, GTP_PROTOCOL_VERSION.to_string()),
            "name" => (true, "gorai".to_string()),
            "version" => (true, env!("CARGO_PKG_VERSION").to_string()),
            "known_command" => match args.first() {
                Some(cmd) => (true, KNOWN_COMMANDS.contains(cmd).to_string()),
                None => (false, "missing argument".to_string()),
            },
            "list_commands" => (true, KNOWN_COMMANDS.join("\n")),
            "boardsize" => self.cmd_boardsize(args),
            "clear_board" => {
                self.moves.clear();
                (true, String::new())
            }
            "komi" => self.cmd_komi(args),
            "play" => self.cmd_play(args),
            "genmove" => self.cmd_genmove(args),
            "undo" => self.cmd_undo(),
            "time_settings" => self.cmd_time_settings(args),
            "time_left" => self.cmd_time_left(args),
            "opg_parameters" => self.cmd_opg_parameters(args),
            "quit" => (true, String::new()),
            other => (false, format!("unknown command: {other}")),
        }
    }

    fn cmd_boardsize(&mut self, args: &[&str]) -> (bool, String) {
        let Some(arg) = args.first() else {
            return (false, "missing argument".to_string());
        };
        match arg.parse::<usize>() {
            Ok(size) if size >= 1 && size <= MAX_N => {
                self.size = size;
                self.moves.clear();
                (true, String::new())
            }
            Ok(size) => (false, format!("unacceptable size {size}")),
            Err(_) => (false, "invalid size".to_string()),
        }
    }

    fn cmd_komi(&mut self, args: &[&str]) -> (bool, String) {
        let Some(arg) = args.first() else {
            return (false, "missing argument".to_string());
        };
        match arg.parse::<f32>() {
            Ok(komi) => {
                self.komi = komi;
                (true, String::new())
            }
            Err(_) => (false, "invalid komi".to_string()),
        }
    }

    fn cmd_play(&mut self, args: &[&str]) -> (bool, String) {
        if args.len() < 2 {
            return (false, "missing arguments".to_string());
        }
        let Some(colour) = parse_colour(args[0]) else {
            return (false, format!("invalid colour: {}", args[0]));
        };
        let coord = parse_coord(self.size, args[1]);
        let pos = self.current_position();
        if pos.side_to_move() != colour {
            return (false, "out of turn".to_string());
        }
        let info = pos.check(colour, coord);
        if !info.contains(MoveInfo::LEGAL) {
            return (false, "illegal move".to_string());
        }
        self.moves.push((colour, coord));
        (true, String::new())
    }

    fn cmd_genmove(&mut self, args: &[&str]) -> (bool, String) {
        let Some(colour) = args.first().and_then(|a| parse_colour(a)) else {
            return (false, "missing or invalid colour".to_string());
        };
        let pos = self.current_position();
        if pos.side_to_move() != colour {
            return (false, "out of turn".to_string());
        }
        if pos.is_terminal() {
            self.moves.push((colour, crate::constants::PASS));
            return (true, "pass".to_string());
        }
        let budget = Duration::from_millis(self.time_budget_for(colour));
        let result = SearchDriver::search_for(&pos, self.search_config, budget);

        if result.winrate >= PASS_THRES {
            self.moves.push((colour, crate::constants::PASS));
            return (true, "pass".to_string());
        }
        if result.winrate < RESIGN_THRES && result.tree_size > 0 {
            return (true, "resign".to_string());
        }
        self.moves.push((colour, result.best_move));
        (true, str_coord(self.size, result.best_move))
    }

    fn cmd_undo(&mut self) -> (bool, String) {
        if self.moves.pop().is_some() {
            (true, String::new())
        } else {
            (false, "cannot undo".to_string())
        }
    }

    fn cmd_time_settings(&mut self, args: &[&str]) -> (bool, String) {
        if args.len() < 3 {
            return (false, "missing arguments".to_string());
        }
        let (Ok(main), Ok(byoyomi), Ok(stones)) = (
            args[0].parse::<f64>(),
            args[1].parse::<f64>(),
            args[2].parse::<u32>(),
        ) else {
            return (false, "invalid time settings".to_string());
        };
        for clock in &mut self.clocks {
            clock.main_left_secs = main;
            clock.byoyomi_left_secs = byoyomi;
            clock.byoyomi_stones_left = stones;
        }
        (true, String::new())
    }

    fn cmd_time_left(&mut self, args: &[&str]) -> (bool, String) {
        if args.len() < 3 {
            return (false, "missing arguments".to_string());
        }
        let Some(colour) = parse_colour(args[0]) else {
            return (false, format!("invalid colour: {}", args[0]));
        };
        let (Ok(secs), Ok(stones)) = (args[1].parse::<f64>(), args[2].parse::<u32>()) else {
            return (false, "invalid time left".to_string());
        };
        let clock = &mut self.clocks[colour as usize];
        if stones == 0 {
            clock.main_left_secs = secs;
        } else {
            clock.byoyomi_left_secs = secs;
            clock.byoyomi_stones_left = stones;
        }
        (true, String::new())
    }

    fn cmd_opg_parameters(&mut self, args: &[&str]) -> (bool, String) {
        for arg in args {
            match arg.parse::<f64>() {
                Ok(v) => self.tuning_parameters.push(v),
                Err(_) => return (false, format!("invalid parameter: {arg}")),
            }
        }
        (true, String::new())
    }

    /// A per-move time budget derived from the clock the collaborator has reported, or the
    /// engine's default fixed budget if no clock has been configured. This is a simplified
    /// stand-in for the time-budget calculation the design treats as an external concern.
    fn time_budget_for(&self, colour: Colour) -> u64 {
        let clock = self.clocks[colour as usize];
        if clock.byoyomi_stones_left > 0 && clock.main_left_secs <= 0.0 {
            let per_move = clock.byoyomi_left_secs / clock.byoyomi_stones_left as f64;
            return (per_move * 1000.0).max(50.0) as u64;
        }
        if clock.main_left_secs > 0.0 {
            const ASSUMED_MOVES_LEFT: f64 = 30.0;
            let per_move = clock.main_left_secs / ASSUMED_MOVES_LEFT;
            return (per_move * 1000.0).clamp(50.0, 60_000.0) as u64;
        }
        self.time_budget_ms
    }
}

fn parse_colour(s: &str) -> Option<Colour> {
    match s.to_ascii_lowercase().as_str() {
        "b" | "black" => Some(Colour::Black),
        "w" | "white" => Some(Colour::White),
        _ => None,
    }
}

/// Split a leading integer id off a command line, per the GTP id-echoing rule.
fn split_id(line: &str) -> (Option<u64>, &str) {
    let trimmed = line.trim_start();
    let digits_end = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, c)| i + c.len_utf8());
    match digits_end {
        Some(end) => match trimmed[..end].parse::<u64>() {
            Ok(id) => (Some(id), trimmed[end..].trim_start()),
            Err(_) => (None, trimmed),
        },
        None => (None, trimmed),
    }
}

/// Strip `#`-introduced comments, convert tabs to spaces, and drop other control
/// characters, per the protocol's input pre-processing rule. Returns `None` for a line
/// that is empty (or becomes empty) after cleaning.
fn preprocess(line: &str) -> Option<String> {
    let without_comment = line.split('#').next().unwrap_or("");
    let cleaned: String = without_comment
        .chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control() || *c == ' ')
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Load a pattern file, logging and falling back to an empty matcher on any failure (the
/// file-I/O error taxonomy this engine uses: a missing prior file degrades the engine
/// rather than aborting it).
pub fn load_pattern_file(path: &str, n: usize) -> crate::patterns::PatternDfa {
    if !std::path::Path::new(path).exists() {
        warn!("pattern file {path} not found; continuing with no {n}x{n} priors");
        return crate::patterns::PatternDfa::empty(n);
    }
    crate::patterns::PatternDfa::load(path, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_and_name() {
        let mut engine = GtpEngine::new();
        assert_eq!(engine.execute("protocol_version", &[]), (true, "2.0".to_string()));
        assert_eq!(engine.execute("name", &[]).1, "gorai");
    }

    #[test]
    fn known_command_distinguishes_real_from_fake() {
        let mut engine = GtpEngine::new();
        assert_eq!(engine.execute("known_command", &["play"]), (true, "true".to_string()));
        assert_eq!(
            engine.execute("known_command", &["not_a_command"]),
            (true, "false".to_string())
        );
    }

    #[test]
    fn boardsize_accepts_in_range_and_rejects_out_of_range() {
        let mut engine = GtpEngine::new();
        assert!(engine.execute("boardsize", &["19"]).0);
        assert!(!engine.execute("boardsize", &["26"]).0);
    }

    #[test]
    fn play_then_undo_restores_the_empty_board() {
        let mut engine = GtpEngine::new();
        assert!(engine.execute("play", &["black", "D4"]).0);
        assert_eq!(engine.moves.len(), 1);
        assert!(engine.execute("undo", &[]).0);
        assert_eq!(engine.moves.len(), 0);
    }

    #[test]
    fn play_rejects_illegal_move_on_occupied_point() {
        let mut engine = GtpEngine::new();
        assert!(engine.execute("play", &["black", "D4"]).0);
        assert!(!engine.execute("play", &["white", "D4"]).0);
    }

    #[test]
    fn play_rejects_out_of_turn_colour() {
        let mut engine = GtpEngine::new();
        // Black is to move first; white playing first is out of turn.
        assert!(!engine.execute("play", &["white", "D4"]).0);
    }

    #[test]
    fn split_id_extracts_leading_integer() {
        assert_eq!(split_id("17 genmove black"), (Some(17), "genmove black"));
        assert_eq!(split_id("genmove black"), (None, "genmove black"));
    }

    #[test]
    fn preprocess_strips_comments_and_control_chars() {
        assert_eq!(preprocess("play black D4 # a comment"), Some("play black D4".to_string()));
        assert_eq!(preprocess("   "), None);
        assert_eq!(preprocess("#just a comment"), None);
    }

    #[test]
    fn time_settings_then_time_left_updates_clock() {
        let mut engine = GtpEngine::new();
        assert!(engine.execute("time_settings", &["300", "30", "1"]).0);
        assert!(engine.execute("time_left", &["black", "45", "1"]).0);
        assert_eq!(engine.clocks[Colour::Black as usize].byoyomi_left_secs, 45.0);
    }

    #[test]
    fn opg_parameters_accumulates_values() {
        let mut engine = GtpEngine::new();
        assert!(engine.execute("opg_parameters", &["1.5", "-2.0"]).0);
        assert_eq!(engine.tuning_parameters, vec![1.5, -2.0]);
    }
}
