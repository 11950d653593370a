use serde::{Deserialize, Serialize};

pub mod board;
pub mod environment;
pub mod level_loader;
pub mod map;
pub mod node;
pub mod room;
pub mod search;
pub mod solve_log;
pub mod solver;
pub mod tile;

/// Represents a 2D coordinate: `x` is the column, `y` the row (growing downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// The neighboring coordinate in `direction`, or `None` if it would underflow.
    ///
    /// Upper bounds are not checked here; that is the grid's job.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }

    /// Returns manhattan distance between two positions
    pub fn manhattan_distance(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Key for the canonical (row, then column) ordering of box lists.
    #[inline]
    pub fn row_major_key(&self) -> (usize, usize) {
        (self.y, self.x)
    }
}

/// One of the four grid directions.
///
/// The declaration order is the action-digit order used by the solver and its logs:
/// digit `d` corresponds to the environment's push action `d + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// `(dx, dy)` offset of a single step.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Direction::ALL.get(index).copied()
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_follows_delta() {
        let p = Position::new(3, 3);
        assert_eq!(p.step(Direction::Up), Some(Position::new(3, 2)));
        assert_eq!(p.step(Direction::Down), Some(Position::new(3, 4)));
        assert_eq!(p.step(Direction::Left), Some(Position::new(2, 3)));
        assert_eq!(p.step(Direction::Right), Some(Position::new(4, 3)));
    }

    #[test]
    fn step_off_the_top_left_is_none() {
        assert_eq!(Position::new(0, 5).step(Direction::Left), None);
        assert_eq!(Position::new(5, 0).step(Direction::Up), None);
    }

    #[test]
    fn direction_index_round_trips() {
        for d in Direction::ALL {
            assert_eq!(Direction::from_index(d.index()), Some(d));
        }
        assert_eq!(Direction::from_index(4), None);
    }
}
