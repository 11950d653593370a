use serde::{Deserialize, Serialize};

use crate::{
    Direction, Position,
    room::{Room, RoomError},
    tile::Tile,
};

/// Represents the discrete actions of the live game.
///
/// Indices follow the environment action space: `Noop = 0`, pushes `1..=4`, moves `5..=8`,
/// each direction group in [`Direction::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Noop,
    /// Step in a direction, pushing a box if one is immediately ahead.
    Push(Direction),
    /// Step in a direction without ever pushing.
    Move(Direction),
}

impl Action {
    pub const COUNT: usize = 9;

    pub fn from_index(index: usize) -> Option<Action> {
        match index {
            0 => Some(Action::Noop),
            1..=4 => Direction::from_index(index - 1).map(Action::Push),
            5..=8 => Direction::from_index(index - 5).map(Action::Move),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Action::Noop => 0,
            Action::Push(direction) => 1 + direction.index(),
            Action::Move(direction) => 5 + direction.index(),
        }
    }
}

/// A room being played: the working copy of the tiles plus the player and the
/// number of boxes still off target, both maintained incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    room: Room,
    player: Position,
    unmatched_boxes: usize,
}

impl Board {
    /// Scans `room` once for the player and the unmatched boxes.
    pub fn new(room: Room) -> Result<Self, RoomError> {
        let player = room.player().ok_or(RoomError::MissingPlayer)?;
        let unmatched_boxes = room.unmatched_boxes();
        Ok(Self {
            room,
            player,
            unmatched_boxes,
        })
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn unmatched_boxes(&self) -> usize {
        self.unmatched_boxes
    }

    pub fn is_solved(&self) -> bool {
        self.unmatched_boxes == 0
    }

    /// Applies one action. Returns whether the player moved.
    ///
    /// The "arena" is the player's cell and the two cells ahead of it. A box moves iff
    /// the action pushes, the middle cell holds a box and the far cell is free. The
    /// player moves iff the middle cell is free or its box just moved away.
    pub fn apply(&mut self, action: Action) -> bool {
        let (direction, pushing) = match action {
            Action::Noop => return false,
            Action::Push(direction) => (direction, true),
            Action::Move(direction) => (direction, false),
        };

        let middle_pos = self.room.tiles().neighbor(self.player, direction);
        let far_pos = middle_pos.and_then(|p| self.room.tiles().neighbor(p, direction));
        let here = self.room[self.player];
        let middle = self.room.tile_at(middle_pos);
        let far = self.room.tile_at(far_pos);

        let box_moves = pushing && middle.is_box() && far.is_free();
        let player_moves = middle.is_free() || box_moves;
        if !player_moves {
            return false;
        }
        // player_moves implies the middle cell is inside the room
        let Some(middle_pos) = middle_pos else {
            return false;
        };

        self.room[self.player] = if here.is_target() {
            Tile::Target
        } else {
            Tile::Empty
        };
        self.room[middle_pos] = if middle.is_target() {
            Tile::PlayerOnTarget
        } else {
            Tile::Player
        };

        if box_moves {
            if let Some(far_pos) = far_pos {
                // leaving a target unmatches the box, landing on one matches it
                if middle.is_target() {
                    self.unmatched_boxes += 1;
                }
                if far.is_target() {
                    self.unmatched_boxes -= 1;
                }
                self.room[far_pos] = if far.is_target() {
                    Tile::BoxOnTarget
                } else {
                    Tile::Box
                };
            }
        }

        self.player = middle_pos;
        true
    }
}
