use std::{
    fmt,
    ops::{Index, IndexMut},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Position, map::Grid, tile::Tile};

/// Errors in the text of a room.
///
/// Line numbers are 1-based and relative to the parsed text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line_number} '{line}' does not match dim_room={expected}")]
    IrregularLine {
        line_number: usize,
        line: String,
        expected: usize,
    },
    #[error("line {line_number} '{line}' does not start and end with '#'")]
    MissingBorder { line_number: usize, line: String },
    #[error("line {line_number} '{line}' has character '{ch}' which is not in the valid set '#@$.*+ '")]
    UnknownTile {
        line_number: usize,
        line: String,
        ch: char,
    },
    #[error("line {line_number} '{line}' holds a second player")]
    ExtraPlayer { line_number: usize, line: String },
    #[error("room starting at line {line_number} is not square: {cells} != {dim}x{dim}")]
    NotSquare {
        line_number: usize,
        cells: usize,
        dim: usize,
    },
    #[error("expected exactly one room, found {found}")]
    RoomCount { found: usize },
}

/// Errors in the content of an otherwise well-formed room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room has no player")]
    MissingPlayer,
}

/// One Sokoban puzzle: a square grid of tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    tiles: Grid<Tile>,
}

impl Room {
    /// Side length of the room.
    pub fn dim(&self) -> usize {
        self.tiles.width()
    }

    pub fn tiles(&self) -> &Grid<Tile> {
        &self.tiles
    }

    /// Tile at `pos`, with everything outside the room reading as a wall.
    pub fn tile_at(&self, pos: Option<Position>) -> Tile {
        pos.and_then(|p| self.tiles.get(p).copied()).unwrap_or(Tile::Wall)
    }

    /// First player tile in row-major order.
    pub fn player(&self) -> Option<Position> {
        self.tiles
            .enumerate()
            .find_map(|(pos, tile)| tile.is_player().then_some(pos))
    }

    /// Number of boxes not standing on a target.
    pub fn unmatched_boxes(&self) -> usize {
        self.tiles
            .as_slice()
            .iter()
            .filter(|t| **t == Tile::Box)
            .count()
    }
}

impl Index<Position> for Room {
    type Output = Tile;

    fn index(&self, index: Position) -> &Tile {
        &self.tiles[index]
    }
}

impl IndexMut<Position> for Room {
    fn index_mut(&mut self, index: Position) -> &mut Tile {
        &mut self.tiles[index]
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.tiles.rows() {
            let line: String = row.iter().map(|t| t.to_char()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl FromStr for Room {
    type Err = ParseError;

    /// Parses text holding exactly one room.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rooms = parse_rooms(s)?;
        if rooms.len() != 1 {
            return Err(ParseError::RoomCount { found: rooms.len() });
        }
        Ok(rooms.remove(0))
    }
}

fn add_line(cells: &mut Vec<Tile>, line_number: usize, line: &str) -> Result<(), ParseError> {
    if !line.starts_with('#') || !line.ends_with('#') {
        return Err(ParseError::MissingBorder {
            line_number,
            line: line.to_string(),
        });
    }
    for ch in line.chars() {
        let tile = Tile::from_char(ch).ok_or_else(|| ParseError::UnknownTile {
            line_number,
            line: line.to_string(),
            ch,
        })?;
        // cells holds the room so far, this line included
        if tile.is_player() && cells.iter().any(|t| t.is_player()) {
            return Err(ParseError::ExtraPlayer {
                line_number,
                line: line.to_string(),
            });
        }
        cells.push(tile);
    }
    Ok(())
}

/// Parses every room in a level text.
///
/// A room is a run of consecutive lines starting with `#`; any other line (blank,
/// `; 12` headers) separates rooms. The first line of a room fixes its width.
pub fn parse_rooms(text: &str) -> Result<Vec<Room>, ParseError> {
    let mut rooms = Vec::new();
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .peekable();

    while let Some((first_number, first)) = lines.next() {
        if !first.starts_with('#') {
            continue;
        }
        let dim = first.chars().count();
        let mut cells = Vec::with_capacity(dim * dim);
        add_line(&mut cells, first_number, first)?;

        while let Some(&(line_number, line)) = lines.peek() {
            if !line.starts_with('#') {
                break;
            }
            lines.next();
            if line.chars().count() != dim {
                return Err(ParseError::IrregularLine {
                    line_number,
                    line: line.to_string(),
                    expected: dim,
                });
            }
            add_line(&mut cells, line_number, line)?;
        }

        let cell_count = cells.len();
        let tiles = Grid::from_cells(dim, dim, cells).map_err(|_| ParseError::NotSquare {
            line_number: first_number,
            cells: cell_count,
            dim,
        })?;
        rooms.push(Room { tiles });
    }
    Ok(rooms)
}
