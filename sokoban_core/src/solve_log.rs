//! Append-only CSV-like log of solver runs, one row per level.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::Path,
};

use crate::{search::SearchState, solver::SolveOutcome};

pub const LOG_HEADER: &str = "Level, Actions, Steps, SearchSteps";

/// Steps column of a solution whose moves disagree with its player positions.
pub const INCORRECT_SOLUTION: &str = "INCORRECT_SOLUTION_FOUND";

/// Formats one log row, without the trailing newline.
pub fn format_record(level: usize, outcome: &SolveOutcome) -> String {
    let search_steps = outcome.search_steps;
    match outcome.state {
        SearchState::Succeeded if outcome.consistent => format!(
            "{level}, {}, {}, {search_steps}",
            outcome.action_digits(),
            outcome.actions.len()
        ),
        SearchState::Succeeded => format!(
            "{level}, {}, {INCORRECT_SOLUTION}, {search_steps}",
            outcome.action_digits()
        ),
        state => format!("{level}, {}, -1, {search_steps}", state.label()),
    }
}

/// An open run log.
#[derive(Debug)]
pub struct SolveLog {
    file: File,
}

impl SolveLog {
    /// Opens `path` for appending.
    ///
    /// A new or empty file gets the header. Otherwise returns the number of rows
    /// already written, which a resumed run skips.
    pub fn open(path: impl AsRef<Path>) -> io::Result<(Self, usize)> {
        let path = path.as_ref();
        let existing = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let done = if existing.is_empty() {
            writeln!(file, "{LOG_HEADER}")?;
            0
        } else {
            existing
                .lines()
                .skip(1)
                .filter(|line| !line.trim().is_empty())
                .count()
        };
        Ok((Self { file }, done))
    }

    pub fn write(&mut self, level: usize, outcome: &SolveOutcome) -> io::Result<()> {
        writeln!(self.file, "{}", format_record(level, outcome))?;
        self.file.flush()
    }
}
