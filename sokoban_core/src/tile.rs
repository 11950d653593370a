use serde::{Deserialize, Serialize};

/// Represents the content of a single room cell.
///
/// The discriminants index [`TILE_COLORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    Wall = 0,
    Empty = 1,
    Target = 2,
    BoxOnTarget = 3,
    Box = 4,
    Player = 5,
    PlayerOnTarget = 6,
}

/// RGB color of each tile in observations, indexed by tile id.
pub const TILE_COLORS: [[u8; 3]; 7] = [
    [0, 0, 0],       // Wall
    [243, 248, 238], // Empty
    [254, 126, 125], // Target
    [254, 95, 56],   // BoxOnTarget
    [142, 121, 56],  // Box
    [160, 212, 56],  // Player
    [219, 212, 56],  // PlayerOnTarget
];

impl Tile {
    /// Parses a level-file character.
    pub fn from_char(c: char) -> Option<Tile> {
        match c {
            '#' => Some(Tile::Wall),
            ' ' => Some(Tile::Empty),
            '.' => Some(Tile::Target),
            '*' => Some(Tile::BoxOnTarget),
            '$' => Some(Tile::Box),
            '@' => Some(Tile::Player),
            '+' => Some(Tile::PlayerOnTarget),
            _ => None,
        }
    }

    /// The level-file character for this tile.
    pub fn to_char(self) -> char {
        match self {
            Tile::Wall => '#',
            Tile::Empty => ' ',
            Tile::Target => '.',
            Tile::BoxOnTarget => '*',
            Tile::Box => '$',
            Tile::Player => '@',
            Tile::PlayerOnTarget => '+',
        }
    }

    #[inline]
    pub fn is_box(self) -> bool {
        matches!(self, Tile::Box | Tile::BoxOnTarget)
    }

    #[inline]
    pub fn is_target(self) -> bool {
        matches!(self, Tile::Target | Tile::BoxOnTarget | Tile::PlayerOnTarget)
    }

    #[inline]
    pub fn is_player(self) -> bool {
        matches!(self, Tile::Player | Tile::PlayerOnTarget)
    }

    /// Cells a player can walk into, and a box can be pushed onto.
    #[inline]
    pub fn is_free(self) -> bool {
        matches!(self, Tile::Empty | Tile::Target)
    }

    pub fn color(self) -> [u8; 3] {
        TILE_COLORS[self as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Tile; 7] = [
        Tile::Wall,
        Tile::Empty,
        Tile::Target,
        Tile::BoxOnTarget,
        Tile::Box,
        Tile::Player,
        Tile::PlayerOnTarget,
    ];

    #[test]
    fn chars_round_trip() {
        for tile in ALL {
            assert_eq!(Tile::from_char(tile.to_char()), Some(tile));
        }
        assert_eq!(Tile::from_char('x'), None);
    }

    #[test]
    fn box_and_target_partitions() {
        let boxes: Vec<_> = ALL.iter().filter(|t| t.is_box()).collect();
        let targets: Vec<_> = ALL.iter().filter(|t| t.is_target()).collect();
        assert_eq!(boxes, [&Tile::BoxOnTarget, &Tile::Box]);
        assert_eq!(
            targets,
            [&Tile::Target, &Tile::BoxOnTarget, &Tile::PlayerOnTarget]
        );
    }

    #[test]
    fn colors_follow_ids() {
        assert_eq!(Tile::Wall.color(), [0, 0, 0]);
        assert_eq!(Tile::PlayerOnTarget.color(), [219, 212, 56]);
    }
}
