mod solve;
mod view;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sokoban_core::environment::SokobanConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a stream of levels, appending one row per level to a log
    Solve(solve::SolveArgs),
    /// Solve a single level of a file, addressed by its position in the file
    SolveLevel(solve::SolveLevelArgs),
    /// Play levels interactively, or watch the solver play them
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// JSON environment configuration
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Level file or directory, overriding the configuration
    #[arg(short, long, value_name = "LEVELS")]
    levels: Option<PathBuf>,
    /// Node budget when planning with the solver
    #[arg(long, default_value_t = 1_000_000)]
    max_nodes: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &PlayArgs) -> Result<SokobanConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SokobanConfig::default(),
    };
    if let Some(levels) = &args.levels {
        config.levels_dir = levels.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Solve(args) => {
            init_tracing();
            solve::run(&args)
        }
        Command::SolveLevel(args) => {
            init_tracing();
            solve::run_level(&args)
        }
        // the viewer owns the terminal, so nothing is logged to it
        Command::Play(args) => {
            let config = load_config(&args)?;
            view::run(config, args.max_nodes)
        }
    }
}
