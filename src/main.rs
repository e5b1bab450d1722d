//! Gorai: a parallel Monte-Carlo Go engine.
//!
//! `gorai gtp` starts a GTP session on stdin/stdout, ready to be driven by a GUI such as
//! Sabaki or GoGui (and is also what runs when no subcommand is given). `gorai genmove`
//! replays a move sequence and prints one decision without the protocol loop around it;
//! `gorai bench` runs the search for a fixed budget and reports its throughput. CLI flags
//! override the engine's defaults for board size, komi, worker count, and time budget; the
//! GTP `boardsize`/`komi`/`time_settings` commands can still change them once a session is
//! running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use gorai::constants::{DEFAULT_KOMI, DEFAULT_N, DEFAULT_TIME_MS};
use gorai::error::EngineError;
use gorai::gtp::{load_pattern_file, GtpEngine};
use gorai::mcts::{default_num_workers, SearchConfig, SearchDriver};
use gorai::position::{parse_coord, str_coord, Colour, Position};

#[derive(Parser)]
#[command(name = "gorai", author, version, about = "A parallel MC-RAVE Go engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Board edge length used until a `boardsize` command (or `genmove`/`bench` replay)
    /// says otherwise.
    #[arg(long, default_value_t = DEFAULT_N)]
    board_size: usize,

    /// Komi used until a `komi` command says otherwise.
    #[arg(long, default_value_t = DEFAULT_KOMI)]
    komi: f32,

    /// Number of concurrent tree workers. Defaults to hardware concurrency.
    #[arg(long)]
    workers: Option<usize>,

    /// Default per-move time budget in milliseconds, used until a GTP clock is set.
    #[arg(long, default_value_t = DEFAULT_TIME_MS)]
    time_ms: u64,

    /// Directory containing `patterns3x3.txt` and `patterns5x5.txt` prior-bias pattern
    /// files. Missing files degrade to no patterns rather than failing.
    #[arg(long)]
    pattern_dir: Option<String>,

    /// Deterministic seed the driver draws per-worker seeds from.
    #[arg(long, default_value_t = 0x5EED_C0DE)]
    seed: u64,

    /// Log level passed through to `env_logger` (`error`, `warn`, `info`, `debug`, `trace`),
    /// unless `RUST_LOG` is already set in the environment.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the GTP protocol loop over stdin/stdout.
    Gtp,
    /// Replay a sequence of moves and print the engine's choice for one side, without a
    /// protocol loop.
    Genmove {
        /// Colour to generate a move for ("b"/"black" or "w"/"white").
        colour: String,
        /// Moves already played, in order, as GTP vertices (e.g. `D4 Q16 pass`). Colours
        /// alternate starting with black.
        moves: Vec<String>,
    },
    /// Run the search for a fixed time budget from an empty board and report throughput.
    Bench {
        /// How long to run the search, in milliseconds.
        #[arg(long, default_value_t = 2000)]
        millis: u64,
    },
}

/// Load the prior-bias pattern matchers from `--pattern-dir`, if given. Each file's absence
/// degrades silently per the pattern-loading contract; only the directory lookup itself is
/// logged here.
fn load_patterns(dir: Option<&str>) -> (Option<Arc<gorai::patterns::PatternDfa>>, Option<Arc<gorai::patterns::PatternDfa>>) {
    let Some(dir) = dir else {
        return (None, None);
    };
    info!("loading prior-bias patterns from {dir}");
    let pat3 = Arc::new(load_pattern_file(&format!("{dir}/patterns3x3.txt"), 3));
    let pat5 = Arc::new(load_pattern_file(&format!("{dir}/patterns5x5.txt"), 5));
    (Some(pat3), Some(pat5))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &cli.log_level);
    }
    env_logger::init();

    let (pat3, pat5) = load_patterns(cli.pattern_dir.as_deref());

    match cli.command.unwrap_or(Commands::Gtp) {
        Commands::Gtp => {
            let mut engine = GtpEngine::new();
            engine.set_board_size(cli.board_size);
            engine.set_komi(cli.komi);
            if let Some(workers) = cli.workers {
                engine.set_num_workers(workers);
            }
            engine.set_seed(cli.seed);
            engine.set_time_budget_ms(cli.time_ms);
            engine.set_patterns(pat3, pat5);
            info!("gorai starting GTP session");
            engine.run();
            Ok(())
        }
        Commands::Genmove { colour, moves } => run_genmove(&cli, &colour, &moves, pat3.clone(), pat5.clone()),
        Commands::Bench { millis } => run_bench(&cli, millis, pat3, pat5),
    }
}

fn parse_colour(s: &str) -> Colour {
    match s.to_ascii_lowercase().as_str() {
        "w" | "white" => Colour::White,
        _ => Colour::Black,
    }
}

fn run_genmove(
    cli: &Cli,
    colour: &str,
    moves: &[String],
    pat3: Option<Arc<gorai::patterns::PatternDfa>>,
    pat5: Option<Arc<gorai::patterns::PatternDfa>>,
) -> anyhow::Result<()> {
    let mut history = Vec::with_capacity(moves.len());
    let mut side = Colour::Black;
    for mv in moves {
        history.push((side, parse_coord(cli.board_size, mv)));
        side = side.opposite();
    }
    let mut pos = Position::from_moves(cli.board_size, cli.komi, &history)
        .context("genmove move list is not legal")?;
    pos.set_patterns(pat3, pat5);

    let requested = parse_colour(colour);
    if pos.side_to_move() != requested {
        return Err(EngineError::Config(format!(
            "requested {colour} to move, but the replayed history has {} to move",
            pos.side_to_move()
        ))
        .into());
    }

    let config = SearchConfig {
        num_workers: cli.workers.unwrap_or_else(default_num_workers),
        seed: cli.seed,
        ..SearchConfig::default()
    };
    let result = SearchDriver::search_for(&pos, config, Duration::from_millis(cli.time_ms));
    println!("{}", str_coord(cli.board_size, result.best_move));
    eprintln!(
        "winrate {:.4} over {} simulations",
        result.winrate, result.tree_size
    );
    Ok(())
}

fn run_bench(
    cli: &Cli,
    millis: u64,
    pat3: Option<Arc<gorai::patterns::PatternDfa>>,
    pat5: Option<Arc<gorai::patterns::PatternDfa>>,
) -> anyhow::Result<()> {
    let mut pos = Position::new(cli.board_size, cli.komi).context("invalid --board-size")?;
    pos.set_patterns(pat3, pat5);
    let config = SearchConfig {
        num_workers: cli.workers.unwrap_or_else(default_num_workers),
        seed: cli.seed,
        ..SearchConfig::default()
    };
    let started = Instant::now();
    let result = SearchDriver::search_for(&pos, config, Duration::from_millis(millis));
    let elapsed = started.elapsed().as_secs_f64().max(1e-6);
    println!(
        "{} simulations in {:.2}s ({:.0} sims/sec, {} workers)",
        result.tree_size,
        elapsed,
        result.tree_size as f64 / elapsed,
        config.num_workers
    );
    Ok(())
}
