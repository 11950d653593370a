use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use rand::{SeedableRng, rngs::StdRng};
use sokoban_core::{
    level_loader::{LevelError, LevelLoader, LoadedLevel, LoaderOptions},
    solve_log::SolveLog,
    solver::solve_room,
};

#[derive(Args, Debug)]
pub struct SolveArgs {
    /// Level file or directory of level files
    #[arg(short, long)]
    levels: PathBuf,
    /// Log file; rows already present are skipped
    #[arg(long)]
    log: PathBuf,
    /// Number of levels this worker solves
    #[arg(long, default_value_t = 1000)]
    total: usize,
    /// Node budget per level
    #[arg(long, default_value_t = 1_000_000)]
    max_nodes: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Draw files and rooms in random order instead of sequentially
    #[arg(long)]
    random: bool,
    #[arg(long, default_value_t = 0)]
    worker_id: usize,
    #[arg(long, default_value_t = 1)]
    workers: usize,
    #[arg(long, default_value_t = 10)]
    dim_room: usize,
}

#[derive(Args, Debug)]
pub struct SolveLevelArgs {
    /// Level file
    #[arg(short, long)]
    levels: PathBuf,
    #[arg(long)]
    log: PathBuf,
    /// Position of the level in the sequential stream
    #[arg(long)]
    level: usize,
    #[arg(long, default_value_t = 1_000_000)]
    max_nodes: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Solves `args.total` levels of this worker's share, resuming after any logged rows.
pub fn run(args: &SolveArgs) -> Result<()> {
    let options = LoaderOptions {
        load_sequentially: !args.random,
        worker_id: args.worker_id,
        worker_count: args.workers,
        ..LoaderOptions::default()
    };
    let mut loader = LevelLoader::new(&args.levels, options)?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    let (mut log, done) = SolveLog::open(&args.log)
        .with_context(|| format!("opening log {}", args.log.display()))?;
    if done > 0 {
        tracing::info!("{done} levels already logged, skipping them");
    }
    // replaying the seeded stream puts the loader where the previous run stopped
    for _ in 0..done.min(args.total) {
        loader.get_level(&mut rng)?;
    }

    for level_idx in done..args.total {
        let level = match loader.get_level(&mut rng) {
            Ok(level) => level,
            Err(LevelError::Exhausted) => {
                tracing::info!("level stream exhausted after {level_idx} levels");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if level.room.dim() != args.dim_room {
            bail!(
                "level {level_idx} is {0}x{0}, expected dim_room={1}",
                level.room.dim(),
                args.dim_room
            );
        }
        solve_one(&mut log, level_idx, &level, args.max_nodes)?;
    }
    Ok(())
}

/// Solves the level at position `args.level` of a sequentially read file.
pub fn run_level(args: &SolveLevelArgs) -> Result<()> {
    let options = LoaderOptions {
        load_sequentially: true,
        ..LoaderOptions::default()
    };
    let mut loader = LevelLoader::new(&args.levels, options)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    for _ in 0..args.level {
        loader.get_level(&mut rng)?;
    }
    let level = loader
        .get_level(&mut rng)
        .with_context(|| format!("reading level {}", args.level))?;

    let (mut log, _) = SolveLog::open(&args.log)
        .with_context(|| format!("opening log {}", args.log.display()))?;
    solve_one(&mut log, args.level, &level, args.max_nodes)
}

fn solve_one(
    log: &mut SolveLog,
    level_idx: usize,
    level: &LoadedLevel,
    max_nodes: usize,
) -> Result<()> {
    tracing::info!(
        file_index = level.file_index,
        room_index = level.room_index,
        "running level {level_idx}"
    );
    let outcome = solve_room(&level.room, max_nodes)?;
    if outcome.is_solved() {
        tracing::info!(
            moves = outcome.actions.len(),
            search_steps = outcome.search_steps,
            "level {level_idx} solved"
        );
    } else {
        tracing::warn!(
            search_steps = outcome.search_steps,
            "level {level_idx} not solved: {}",
            outcome.state
        );
    }
    if !outcome.consistent {
        tracing::warn!("level {level_idx}: solution does not match its own moves");
    }
    log.write(level_idx, &outcome)
        .with_context(|| format!("writing level {level_idx} to log"))?;
    Ok(())
}
