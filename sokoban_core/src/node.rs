use std::sync::Arc;

use crate::{
    Direction, Position,
    map::Grid,
    room::{Room, RoomError},
    search::SearchNode,
    tile::Tile,
};

/// Added to the estimate for a box stuck in a corner off target.
pub const DEADLOCK_PENALTY: u32 = 1_000_000;

/// Added to the estimate for a box against a single wall with no target along it.
pub const WALL_PENALTY: u32 = 2;

/// A search state: player position and box positions over a shared wall mask.
///
/// Boxes are kept sorted by (row, column) so equal states compare and hash equal no
/// matter which pushes produced them. A goal node stores the target cells in `boxes`.
#[derive(Debug, Clone)]
pub struct SokobanNode {
    player: Position,
    boxes: Vec<Position>,
    walls: Arc<Grid<bool>>,
    action: Option<Direction>,
    goal: bool,
}

impl SokobanNode {
    /// Builds a start node (`goal == false`) or a goal node from `room`.
    pub fn from_room(room: &Room, goal: bool) -> Result<Self, RoomError> {
        let walls = Arc::new(Grid::from_generator(room.dim(), room.dim(), |x, y| {
            room[Position::new(x, y)] == Tile::Wall
        }));
        Self::with_walls(room, goal, walls)
    }

    /// Start and goal nodes of `room`, sharing one wall mask.
    pub fn pair_from_room(room: &Room) -> Result<(Self, Self), RoomError> {
        let start = Self::from_room(room, false)?;
        let goal = Self::with_walls(room, true, Arc::clone(&start.walls))?;
        Ok((start, goal))
    }

    fn with_walls(room: &Room, goal: bool, walls: Arc<Grid<bool>>) -> Result<Self, RoomError> {
        let player = room.player().ok_or(RoomError::MissingPlayer)?;
        // row-major scan yields the canonical order directly
        let boxes = room
            .tiles()
            .enumerate()
            .filter(|(_, tile)| if goal { tile.is_target() } else { tile.is_box() })
            .map(|(pos, _)| pos)
            .collect();
        Ok(Self {
            player,
            boxes,
            walls,
            action: None,
            goal,
        })
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn boxes(&self) -> &[Position] {
        &self.boxes
    }

    /// Direction of the move that produced this node; `None` for a root.
    pub fn action(&self) -> Option<Direction> {
        self.action
    }

    /// Whether `boxes` holds target cells rather than boxes.
    pub fn is_goal_node(&self) -> bool {
        self.goal
    }

    pub fn dim_room(&self) -> usize {
        self.walls.width()
    }

    /// Out of bounds counts as wall.
    fn is_wall(&self, pos: Option<Position>) -> bool {
        pos.and_then(|p| self.walls.get(p).copied()).unwrap_or(true)
    }

    fn is_box(&self, pos: Position) -> bool {
        self.boxes.contains(&pos)
    }

    fn child(&self, direction: Direction) -> Option<SokobanNode> {
        let next = self.player.step(direction);
        if self.is_wall(next) {
            return None;
        }
        let next = next?;

        let mut boxes = self.boxes.clone();
        if let Some(i) = boxes.iter().position(|b| *b == next) {
            let far = next.step(direction);
            if self.is_wall(far) {
                return None;
            }
            let far = far?;
            if self.is_box(far) {
                return None;
            }
            boxes[i] = far;
            // a horizontal push keeps the box in its row, so only vertical ones reorder
            if direction.is_vertical() {
                boxes.sort_by_key(Position::row_major_key);
            }
        }

        Some(SokobanNode {
            player: next,
            boxes,
            walls: Arc::clone(&self.walls),
            action: Some(direction),
            goal: self.goal,
        })
    }

    fn box_penalty(&self, pos: Position, targets: &[Position]) -> u32 {
        let wall = |d: Direction| self.is_wall(pos.step(d));
        let (up, down, left, right) = (
            wall(Direction::Up),
            wall(Direction::Down),
            wall(Direction::Left),
            wall(Direction::Right),
        );

        let on_target = targets.contains(&pos);
        if !on_target && (up || down) && (left || right) {
            return DEADLOCK_PENALTY;
        }

        let wall_count = [up, down, left, right].into_iter().filter(|w| *w).count();
        if wall_count != 1 {
            return 0;
        }
        let target_along_wall = if left || right {
            targets.iter().any(|t| t.x == pos.x)
        } else {
            targets.iter().any(|t| t.y == pos.y)
        };
        if target_along_wall { 0 } else { WALL_PENALTY }
    }
}

impl SearchNode for SokobanNode {
    /// Sum of each box's distance to its nearest target, plus deadlock penalties.
    ///
    /// The penalties make this inadmissible, so solutions are not guaranteed to be
    /// shortest.
    fn goal_distance_estimate(&self, goal: &Self) -> u32 {
        let targets = &goal.boxes;
        self.boxes.iter().fold(0u32, |h, b| {
            let distance = targets
                .iter()
                .map(|t| b.manhattan_distance(t) as u32)
                .min()
                .unwrap_or(DEADLOCK_PENALTY);
            h.saturating_add(distance)
                .saturating_add(self.box_penalty(*b, targets))
        })
    }

    fn is_goal(&self, goal: &Self) -> bool {
        self.boxes.iter().all(|b| goal.boxes.contains(b))
    }

    fn successors(&self, parent: Option<&Self>) -> Vec<Self> {
        Direction::ALL
            .into_iter()
            .filter_map(|d| self.child(d))
            .filter(|child| parent.is_none_or(|p| !child.is_same_state(p)))
            .collect()
    }

    fn cost(&self, _successor: &Self) -> u32 {
        1
    }

    fn is_same_state(&self, other: &Self) -> bool {
        self.player == other.player && self.boxes == other.boxes
    }

    fn state_hash(&self) -> u64 {
        let coords = [self.player.x, self.player.y]
            .into_iter()
            .chain(self.boxes.iter().flat_map(|b| [b.x, b.y]));
        coords.fold(0u64, |h, v| h.wrapping_mul(397) ^ v as u64)
    }

    fn is_valid_start(&self, goal: &Self) -> bool {
        !self.boxes.is_empty() && self.boxes.len() == goal.boxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(text: &str) -> (SokobanNode, SokobanNode) {
        let room: Room = text.parse().unwrap();
        SokobanNode::pair_from_room(&room).unwrap()
    }

    const OPEN: &str = "\
#######
#     #
# .$  #
#  @  #
#  $. #
#     #
#######";

    #[test]
    fn boxes_are_canonical_and_walls_shared() {
        let (start, goal) = pair(OPEN);
        assert_eq!(start.boxes(), [Position::new(3, 2), Position::new(3, 4)]);
        assert_eq!(goal.boxes(), [Position::new(2, 2), Position::new(4, 4)]);
        assert!(Arc::ptr_eq(&start.walls, &goal.walls));
        assert_eq!(start.dim_room(), 7);
        assert_eq!(start.action(), None);
        assert!(!start.is_goal_node());
        assert!(goal.is_goal_node());
    }

    fn walk(node: &SokobanNode, moves: &[Direction]) -> SokobanNode {
        let mut node = node.clone();
        for d in moves {
            node = node.child(*d).unwrap();
        }
        node
    }

    #[test]
    fn push_order_does_not_change_the_state() {
        use Direction::{Down, Left, Right, Up};

        let (start, _) = pair(
            "\
#######
#     #
#     #
# $ $ #
#  @  #
#     #
#######",
        );
        // left box first, then right box
        let left_first = walk(&start, &[Left, Up, Down, Right, Right, Up, Down]);

        // right box first: its push lifts it above the left box and reorders the list
        let right_pushed = walk(&start, &[Right, Up]);
        assert_eq!(right_pushed.boxes(), [Position::new(4, 2), Position::new(2, 3)]);
        let right_first = walk(&right_pushed, &[Down, Left, Left, Up, Down, Right, Right]);

        assert_eq!(left_first.boxes(), [Position::new(2, 2), Position::new(4, 2)]);
        assert_eq!(left_first.player(), Position::new(4, 4));
        assert!(left_first.is_same_state(&right_first));
        assert_eq!(left_first.state_hash(), right_first.state_hash());

        assert!(!left_first.is_same_state(&start));
        assert_ne!(left_first.state_hash(), start.state_hash());
    }

    #[test]
    fn step_away_and_back_is_the_same_state() {
        let (start, _) = pair(OPEN);
        let back = start
            .child(Direction::Left)
            .and_then(|n| n.child(Direction::Right))
            .unwrap();
        assert_eq!(back.action(), Some(Direction::Right));
        assert!(start.is_same_state(&back));
        assert_eq!(start.state_hash(), back.state_hash());
    }

    #[test]
    fn vertical_push_resorts_boxes() {
        let (start, _) = pair(
            "\
#######
#     #
#  $  #
# $@  #
#     #
#     #
#######",
        );
        assert_eq!(start.boxes(), [Position::new(3, 2), Position::new(2, 3)]);
        let pushed = start.child(Direction::Left).unwrap();
        assert_eq!(pushed.boxes(), [Position::new(3, 2), Position::new(1, 3)]);

        // push the upper box down past the other's row
        let (start, _) = pair(
            "\
#######
#  @  #
#  $  #
# $   #
#     #
#     #
#######",
        );
        let child = start
            .child(Direction::Down)
            .unwrap()
            .child(Direction::Down)
            .unwrap();
        assert_eq!(child.boxes(), [Position::new(2, 3), Position::new(3, 4)]);
        let mut resorted = child.boxes().to_vec();
        resorted.sort_by_key(Position::row_major_key);
        assert_eq!(child.boxes(), resorted.as_slice());
    }

    #[test]
    fn blocked_pushes_yield_no_successor() {
        let (start, _) = pair(
            "\
######
#@$$ #
#$   #
##   #
#    #
######",
        );
        // right: box behind box; down: box against wall; up and left: walls
        assert!(start.successors(None).is_empty());
        assert_eq!(start.boxes().len(), 3);
    }

    #[test]
    fn successors_follow_direction_order_and_skip_parent() {
        let (start, _) = pair(OPEN);
        let children = start.successors(None);
        let actions: Vec<_> = children.iter().filter_map(|c| c.action()).collect();
        assert_eq!(actions, Direction::ALL);

        let left = &children[2];
        let back = left.successors(Some(&start));
        assert!(back.iter().all(|c| !c.is_same_state(&start)));
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn estimate_is_zero_only_when_solved() {
        let (start, goal) = pair(OPEN);
        assert!(!start.is_goal(&goal));
        assert_eq!(start.goal_distance_estimate(&goal), 2);

        // walk around the lower box and push it right onto its target
        let half = start
            .child(Direction::Left)
            .and_then(|n| n.child(Direction::Down))
            .and_then(|n| n.child(Direction::Right))
            .unwrap();
        assert_eq!(half.boxes(), [Position::new(3, 2), Position::new(4, 4)]);
        assert!(!half.is_goal(&goal));
        assert_eq!(half.goal_distance_estimate(&goal), 1);

        let (done, goal) = pair("#####\n#@* #\n#   #\n# * #\n#####");
        assert!(done.is_goal(&goal));
        assert_eq!(done.goal_distance_estimate(&goal), 0);
    }

    #[test]
    fn corner_box_is_a_deadlock() {
        let (start, goal) = pair("#####\n#$ .#\n#   #\n#  @#\n#####");
        assert_eq!(
            start.goal_distance_estimate(&goal),
            2u32.saturating_add(DEADLOCK_PENALTY)
        );
    }

    #[test]
    fn wall_without_target_along_it_is_penalised() {
        // box against the top wall, target in another row and column
        let (start, goal) = pair("######\n# $  #\n#    #\n#   .#\n#@   #\n######");
        assert_eq!(start.goal_distance_estimate(&goal), 4 + WALL_PENALTY);

        // target in the same row as the box along the top wall
        let (start, goal) = pair("######\n# $ .#\n#    #\n#    #\n#@   #\n######");
        assert_eq!(start.goal_distance_estimate(&goal), 2);
    }

    #[test]
    fn start_validity_needs_matching_boxes_and_targets() {
        let (start, goal) = pair(OPEN);
        assert!(start.is_valid_start(&goal));

        let (start, goal) = pair("#####\n#@$ #\n#  .#\n# . #\n#####");
        assert!(!start.is_valid_start(&goal));

        let (start, goal) = pair("#####\n#@  #\n#   #\n#   #\n#####");
        assert!(!start.is_valid_start(&goal));
    }

    #[test]
    fn missing_player_is_an_error() {
        let room: Room = "#####\n# $.#\n#   #\n#   #\n#####".parse().unwrap();
        assert_eq!(
            SokobanNode::pair_from_room(&room).unwrap_err(),
            RoomError::MissingPlayer
        );
    }
}
