use std::path::PathBuf;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    board::{Action, Board},
    level_loader::{LevelError, LevelLoader, LoaderOptions},
    room::{Room, RoomError},
};

/// Configuration of a live Sokoban environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SokobanConfig {
    pub dim_room: usize,
    /// A level file or a directory of level files.
    pub levels_dir: PathBuf,
    /// Bonus when the last box reaches a target.
    pub reward_finished: f32,
    /// Reward per box newly placed on a target (negative when one is pushed off).
    pub reward_box: f32,
    /// Reward added to every step.
    pub reward_step: f32,
    pub min_episode_steps: usize,
    pub max_episode_steps: usize,
    pub load_sequentially: bool,
    pub n_levels_to_load: Option<usize>,
    pub worker_id: usize,
    pub worker_count: usize,
    pub seed: u64,
    pub verbose: u8,
}

impl Default for SokobanConfig {
    fn default() -> Self {
        Self {
            dim_room: 10,
            levels_dir: PathBuf::from("levels"),
            reward_finished: 10.0,
            reward_box: 1.0,
            reward_step: -0.1,
            min_episode_steps: 120,
            max_episode_steps: 120,
            load_sequentially: false,
            n_levels_to_load: None,
            worker_id: 0,
            worker_count: 1,
            seed: 42,
            verbose: 0,
        }
    }
}

impl SokobanConfig {
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.dim_room == 0 {
            return Err(EnvError::InvalidConfig("dim_room must be positive".into()));
        }
        if self.min_episode_steps > self.max_episode_steps {
            return Err(EnvError::InvalidConfig(format!(
                "min_episode_steps={} exceeds max_episode_steps={}",
                self.min_episode_steps, self.max_episode_steps
            )));
        }
        Ok(())
    }

    fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            load_sequentially: self.load_sequentially,
            n_levels_to_load: self.n_levels_to_load,
            worker_id: self.worker_id,
            worker_count: self.worker_count,
            verbose: self.verbose,
        }
    }
}

/// Represents errors raised by the live environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("loaded level is {found}x{found}, expected dim_room={expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("action {0} is outside the action space 0..=8")]
    InvalidAction(i32),
}

/// A `(3, dim_room, dim_room)` RGB image of the room, channel-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    dim_room: usize,
    pixels: Vec<u8>,
}

impl Observation {
    fn render(room: &Room) -> Self {
        let tiles = room.tiles().as_slice();
        let mut pixels = vec![0u8; 3 * tiles.len()];
        for (channel, plane) in pixels.chunks_mut(tiles.len()).enumerate() {
            for (pixel, tile) in plane.iter_mut().zip(tiles) {
                *pixel = tile.color()[channel];
            }
        }
        Self {
            dim_room: room.dim(),
            pixels,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [3, self.dim_room, self.dim_room]
    }

    /// Value of `channel` at column `x`, row `y`.
    pub fn pixel(&self, channel: usize, x: usize, y: usize) -> u8 {
        let plane = self.dim_room * self.dim_room;
        self.pixels[channel * plane + y * self.dim_room + x]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.pixels
    }
}

/// Episode metadata emitted with every observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepInfo {
    /// Corpus file of the room being played.
    pub file_index: usize,
    /// Room index within that file.
    pub room_index: usize,
    pub elapsed_steps: usize,
    pub unmatched_boxes: usize,
}

/// Result of an environment step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observation of the episode now in progress (a fresh one after an episode end).
    pub observation: Observation,
    pub reward: f32,
    /// All boxes reached targets on this step.
    pub terminated: bool,
    /// The step budget ran out on this step without solving the room.
    pub truncated: bool,
    pub info: StepInfo,
}

/// A live Sokoban episode stream over a level corpus.
pub struct SokobanEnv {
    config: SokobanConfig,
    loader: LevelLoader,
    level_rng: StdRng,
    episode_rng: StdRng,
    board: Board,
    file_index: usize,
    room_index: usize,
    elapsed_steps: usize,
    episode_budget: usize,
    /// The episode drawn by `new` has not been stepped yet.
    untouched: bool,
}

impl SokobanEnv {
    /// Builds the environment and starts its first episode.
    ///
    /// The level generator is seeded with `seed` alone so that workers sharing a corpus
    /// draw the same file sequence; the episode-length generator also mixes in
    /// `worker_id`.
    pub fn new(config: SokobanConfig) -> Result<Self, EnvError> {
        config.validate()?;
        let mut loader = LevelLoader::new(&config.levels_dir, config.loader_options())?;
        let mut level_rng = StdRng::seed_from_u64(config.seed);
        let mut episode_rng =
            StdRng::seed_from_u64(config.seed.wrapping_add(config.worker_id as u64));

        let (board, file_index, room_index) =
            Self::draw_board(&config, &mut loader, &mut level_rng)?;
        let episode_budget =
            episode_rng.random_range(config.min_episode_steps..=config.max_episode_steps);

        Ok(Self {
            config,
            loader,
            level_rng,
            episode_rng,
            board,
            file_index,
            room_index,
            elapsed_steps: 0,
            episode_budget,
            untouched: true,
        })
    }

    fn draw_board(
        config: &SokobanConfig,
        loader: &mut LevelLoader,
        rng: &mut StdRng,
    ) -> Result<(Board, usize, usize), EnvError> {
        let level = loader.get_level(rng)?;
        if level.room.dim() != config.dim_room {
            return Err(EnvError::DimensionMismatch {
                expected: config.dim_room,
                found: level.room.dim(),
            });
        }
        Ok((Board::new(level.room)?, level.file_index, level.room_index))
    }

    pub fn config(&self) -> &SokobanConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Step budget sampled for the current episode.
    pub fn episode_budget(&self) -> usize {
        self.episode_budget
    }

    pub fn observation_shape(&self) -> [usize; 3] {
        [3, self.config.dim_room, self.config.dim_room]
    }

    /// Starts a new episode on the next room of the stream.
    ///
    /// Right after construction this reports the room `new` already drew instead of
    /// drawing another.
    pub fn reset(&mut self) -> Result<StepResult, EnvError> {
        if !std::mem::take(&mut self.untouched) {
            self.start_episode()?;
        }
        Ok(self.emit(0.0, false, false))
    }

    fn start_episode(&mut self) -> Result<(), EnvError> {
        let (board, file_index, room_index) =
            Self::draw_board(&self.config, &mut self.loader, &mut self.level_rng)?;
        self.board = board;
        self.file_index = file_index;
        self.room_index = room_index;
        self.elapsed_steps = 0;
        self.episode_budget = self
            .episode_rng
            .random_range(self.config.min_episode_steps..=self.config.max_episode_steps);
        if self.config.verbose >= 2 {
            tracing::debug!(
                file_index,
                room_index,
                budget = self.episode_budget,
                "episode started"
            );
        }
        Ok(())
    }

    /// Steps with a raw action index.
    ///
    /// A negative index re-emits the current observation without consuming a step.
    pub fn step_index(&mut self, action: i32) -> Result<StepResult, EnvError> {
        if action < 0 {
            return Ok(self.emit(0.0, false, false));
        }
        let parsed = usize::try_from(action)
            .ok()
            .and_then(Action::from_index)
            .ok_or(EnvError::InvalidAction(action))?;
        self.step(parsed)
    }

    /// Applies one action and ends the episode on success or budget exhaustion.
    ///
    /// `Noop` only earns the step reward: it consumes no step and never ends the
    /// episode. When the episode ends the next one is started before returning, so the
    /// observation and info already describe it; reward and flags describe this step.
    pub fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        self.untouched = false;
        if action == Action::Noop {
            return Ok(self.emit(self.config.reward_step, false, false));
        }
        let prev_unmatched = self.board.unmatched_boxes();
        self.board.apply(action);
        self.elapsed_steps += 1;

        let unmatched = self.board.unmatched_boxes();
        let terminated = unmatched == 0;
        let truncated = !terminated && self.elapsed_steps >= self.episode_budget;

        let matched_delta = prev_unmatched as f32 - unmatched as f32;
        let mut reward = self.config.reward_step + self.config.reward_box * matched_delta;
        if terminated {
            reward += self.config.reward_finished;
        }

        if terminated || truncated {
            tracing::trace!(
                terminated,
                steps = self.elapsed_steps,
                file_index = self.file_index,
                room_index = self.room_index,
                "episode ended"
            );
            self.start_episode()?;
        }
        Ok(self.emit(reward, terminated, truncated))
    }

    fn emit(&self, reward: f32, terminated: bool, truncated: bool) -> StepResult {
        StepResult {
            observation: Observation::render(self.board.room()),
            reward,
            terminated,
            truncated,
            info: StepInfo {
                file_index: self.file_index,
                room_index: self.room_index,
                elapsed_steps: self.elapsed_steps,
                unmatched_boxes: self.board.unmatched_boxes(),
            },
        }
    }
}
