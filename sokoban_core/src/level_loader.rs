use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use rand::{Rng, seq::SliceRandom};

use crate::room::{ParseError, Room, parse_rooms};

/// Represents errors that can occur while discovering or reading the level corpus.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("level path '{}' does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no level files found in '{}'", path.display())]
    EmptyCorpus { path: PathBuf },
    #[error("malformed level file '{}': {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },
    #[error("no levels loaded from file '{}'", path.display())]
    NoLevels { path: PathBuf },
    #[error("no more files to load")]
    Exhausted,
    #[error("n_levels_to_load={cap} is not divisible by worker_count={worker_count}")]
    CapNotDivisible { cap: usize, worker_count: usize },
    #[error("worker_id={worker_id} is out of range for worker_count={worker_count}")]
    InvalidWorker {
        worker_id: usize,
        worker_count: usize,
    },
}

/// How a [`LevelLoader`] walks the corpus.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Take files in sorted order instead of drawing them at random.
    pub load_sequentially: bool,
    /// Total rooms to serve across all workers before looping around.
    pub n_levels_to_load: Option<usize>,
    pub worker_id: usize,
    pub worker_count: usize,
    pub verbose: u8,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            load_sequentially: false,
            n_levels_to_load: None,
            worker_id: 0,
            worker_count: 1,
            verbose: 0,
        }
    }
}

/// A room handed out by the loader, with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedLevel {
    pub room: Room,
    /// Index into the sorted corpus file list.
    pub file_index: usize,
    /// Position of the room in its file as written.
    pub room_index: usize,
}

/// Lists the level files under `path`.
///
/// A file is returned as is; a directory yields every regular file inside it, sorted
/// by file name.
pub fn discover_level_files(path: &Path) -> Result<Vec<PathBuf>, LevelError> {
    if !path.exists() {
        return Err(LevelError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let io_err = |source: std::io::Error| LevelError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_file() {
            files.push(entry.path());
        }
    }
    if files.is_empty() {
        return Err(LevelError::EmptyCorpus {
            path: path.to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Streams rooms from a corpus of level files, one file in memory at a time.
///
/// Several loaders may share one file list; each worker strides through the common
/// room stream by `worker_count` starting at `worker_id`, so workers with the same
/// options and an identically seeded generator never serve the same room.
#[derive(Debug)]
pub struct LevelLoader {
    files: Arc<[PathBuf]>,
    levels: Vec<(usize, Room)>,
    loaded_file: usize,
    next_file: usize,
    cursor: usize,
    levels_served: usize,
    options: LoaderOptions,
}

impl LevelLoader {
    /// Discovers the corpus under `path` and creates a loader over it.
    pub fn new(path: impl AsRef<Path>, options: LoaderOptions) -> Result<Self, LevelError> {
        let files = discover_level_files(path.as_ref())?;
        Self::with_files(files.into(), options)
    }

    /// Creates a loader over an already discovered (possibly shared) file list.
    pub fn with_files(files: Arc<[PathBuf]>, options: LoaderOptions) -> Result<Self, LevelError> {
        let LoaderOptions {
            worker_id,
            worker_count,
            n_levels_to_load,
            ..
        } = options;
        if worker_count == 0 || worker_id >= worker_count {
            return Err(LevelError::InvalidWorker {
                worker_id,
                worker_count,
            });
        }
        if let Some(cap) = n_levels_to_load {
            if cap % worker_count != 0 {
                return Err(LevelError::CapNotDivisible { cap, worker_count });
            }
        }
        if files.is_empty() {
            return Err(LevelError::Exhausted);
        }

        Ok(Self {
            files,
            levels: Vec::new(),
            loaded_file: 0,
            next_file: 0,
            cursor: worker_id,
            levels_served: 0,
            options,
        })
    }

    /// The corpus file list, sorted by file name.
    pub fn files(&self) -> &Arc<[PathBuf]> {
        &self.files
    }

    /// Rooms served by this worker since construction or the last loop-around.
    pub fn levels_served(&self) -> usize {
        self.levels_served
    }

    /// Returns the next room of this worker's share of the stream.
    pub fn get_level<R: Rng>(&mut self, rng: &mut R) -> Result<LoadedLevel, LevelError> {
        if let Some(cap) = self.options.n_levels_to_load {
            if self.levels_served >= cap / self.options.worker_count {
                tracing::debug!(
                    worker_id = self.options.worker_id,
                    served = self.levels_served,
                    "served all requested levels, looping around"
                );
                self.levels_served = 0;
                self.next_file = 0;
                self.cursor = self.options.worker_id;
                self.levels.clear();
            }
        }

        while self.cursor >= self.levels.len() {
            self.cursor -= self.levels.len();
            self.load_next_file(rng)?;
        }

        let (room_index, room) = &self.levels[self.cursor];
        let level = LoadedLevel {
            room: room.clone(),
            file_index: self.loaded_file,
            room_index: *room_index,
        };
        self.cursor += self.options.worker_count;
        self.levels_served += 1;
        Ok(level)
    }

    fn load_next_file<R: Rng>(&mut self, rng: &mut R) -> Result<(), LevelError> {
        let file_index = if self.options.load_sequentially {
            if self.next_file >= self.files.len() {
                if self.options.n_levels_to_load.is_none() {
                    return Err(LevelError::Exhausted);
                }
                self.next_file = 0;
            }
            self.next_file += 1;
            self.next_file - 1
        } else {
            rng.random_range(0..self.files.len())
        };

        let path = &self.files[file_index];
        let text = fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.clone(),
            source,
        })?;
        let rooms = parse_rooms(&text).map_err(|source| LevelError::Parse {
            path: path.clone(),
            source,
        })?;
        if rooms.is_empty() {
            return Err(LevelError::NoLevels { path: path.clone() });
        }

        self.levels = rooms.into_iter().enumerate().collect();
        if !self.options.load_sequentially {
            self.levels.shuffle(rng);
        }
        self.loaded_file = file_index;

        if self.options.verbose >= 1 {
            tracing::info!("Loaded {} levels from {}", self.levels.len(), path.display());
            if self.options.verbose >= 2 {
                for (index, room) in self.levels.iter().take(2) {
                    tracing::info!("room {index}:\n{room}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;
    use rand::{SeedableRng, rngs::StdRng};
    use tempfile::TempDir;

    /// A 7x7 room whose player sits on interior cell `n`, so rooms are tellable apart.
    fn numbered_room(n: usize) -> String {
        let mut rows = vec!["#######".to_string()];
        for y in 0..5 {
            let mut row = String::from("#");
            for x in 0..5 {
                row.push(if y * 5 + x == n { '@' } else { ' ' });
            }
            row.push('#');
            rows.push(row);
        }
        rows.push("#######".to_string());
        rows.join("\n")
    }

    fn room_number(room: &Room) -> usize {
        let Position { x, y } = room.player().unwrap();
        (y - 1) * 5 + (x - 1)
    }

    fn write_file(dir: &TempDir, name: &str, rooms: impl IntoIterator<Item = usize>) -> PathBuf {
        let text: Vec<String> = rooms
            .into_iter()
            .enumerate()
            .map(|(i, n)| format!("; {i}\n{}\n", numbered_room(n)))
            .collect();
        let path = dir.path().join(name);
        fs::write(&path, text.join("\n")).unwrap();
        path
    }

    #[test]
    fn cap_loops_back_to_first_room() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "000.txt", [0, 1]);
        let options = LoaderOptions {
            load_sequentially: true,
            n_levels_to_load: Some(2),
            ..LoaderOptions::default()
        };
        let mut loader = LevelLoader::new(&path, options).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let served: Vec<usize> = (0..3)
            .map(|_| room_number(&loader.get_level(&mut rng).unwrap().room))
            .collect();
        assert_eq!(served, [0, 1, 0]);
    }

    #[test]
    fn sequential_without_cap_is_exhausted() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "000.txt", [0, 1]);
        let options = LoaderOptions {
            load_sequentially: true,
            ..LoaderOptions::default()
        };
        let mut loader = LevelLoader::new(&path, options).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        loader.get_level(&mut rng).unwrap();
        loader.get_level(&mut rng).unwrap();
        assert!(matches!(
            loader.get_level(&mut rng),
            Err(LevelError::Exhausted)
        ));
    }

    #[test]
    fn directory_files_are_taken_in_name_order() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "b.txt", [2, 3]);
        write_file(&dir, "a.txt", [0, 1]);
        fs::create_dir(dir.path().join("nested")).unwrap();

        let options = LoaderOptions {
            load_sequentially: true,
            ..LoaderOptions::default()
        };
        let mut loader = LevelLoader::new(dir.path(), options).unwrap();
        assert_eq!(loader.files().len(), 2);
        let mut rng = StdRng::seed_from_u64(0);
        let served: Vec<(usize, usize, usize)> = (0..4)
            .map(|_| {
                let level = loader.get_level(&mut rng).unwrap();
                (room_number(&level.room), level.file_index, level.room_index)
            })
            .collect();
        assert_eq!(served, [(0, 0, 0), (1, 0, 1), (2, 1, 0), (3, 1, 1)]);
    }

    #[test]
    fn stride_carries_remainder_into_next_file() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.txt", [0, 1, 2]);
        write_file(&dir, "b.txt", [3, 4, 5]);
        let options = LoaderOptions {
            load_sequentially: true,
            worker_id: 1,
            worker_count: 2,
            ..LoaderOptions::default()
        };
        let mut loader = LevelLoader::new(dir.path(), options).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let served: Vec<usize> = (0..3)
            .map(|_| room_number(&loader.get_level(&mut rng).unwrap().room))
            .collect();
        assert_eq!(served, [1, 3, 5]);
    }

    #[test]
    fn random_mode_is_reproducible_and_keeps_room_indices() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.txt", 0..6);
        write_file(&dir, "b.txt", 6..12);
        let draw = |seed| {
            let mut loader = LevelLoader::new(dir.path(), LoaderOptions::default()).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            (0..12)
                .map(|_| {
                    let level = loader.get_level(&mut rng).unwrap();
                    assert_eq!(room_number(&level.room), level.file_index * 6 + level.room_index);
                    room_number(&level.room)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
    }

    #[test]
    fn cap_must_divide_by_worker_count() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "000.txt", [0, 1]);
        let options = LoaderOptions {
            n_levels_to_load: Some(3),
            worker_count: 2,
            ..LoaderOptions::default()
        };
        assert!(matches!(
            LevelLoader::new(&path, options),
            Err(LevelError::CapNotDivisible {
                cap: 3,
                worker_count: 2
            })
        ));
    }

    #[test]
    fn worker_id_must_be_below_count() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "000.txt", [0]);
        let options = LoaderOptions {
            worker_id: 2,
            worker_count: 2,
            ..LoaderOptions::default()
        };
        assert!(matches!(
            LevelLoader::new(&path, options),
            Err(LevelError::InvalidWorker { .. })
        ));
    }

    #[test]
    fn missing_and_empty_corpora_fail() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            LevelLoader::new(dir.path().join("nope"), LoaderOptions::default()),
            Err(LevelError::NotFound { .. })
        ));
        assert!(matches!(
            LevelLoader::new(dir.path(), LoaderOptions::default()),
            Err(LevelError::EmptyCorpus { .. })
        ));
    }

    #[test]
    fn file_without_rooms_fails_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("000.txt");
        fs::write(&path, "; nothing here\n\n").unwrap();
        let mut loader = LevelLoader::new(&path, LoaderOptions::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            loader.get_level(&mut rng),
            Err(LevelError::NoLevels { .. })
        ));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "#####\n#@ #\n").unwrap();
        let mut loader = LevelLoader::new(&path, LoaderOptions::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = loader.get_level(&mut rng).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad.txt"), "{msg}");
        assert!(msg.contains("dim_room=5"), "{msg}");
    }
}
