use crate::{
    Direction, Position,
    node::SokobanNode,
    room::{Room, RoomError},
    search::{AStarSearch, SearchState},
};

/// Result of running the search on one room to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    pub state: SearchState,
    /// Moves from the start to the goal; empty unless the search succeeded.
    pub actions: Vec<Direction>,
    /// Number of `search_step` calls made.
    pub search_steps: usize,
    /// Whether every recorded move agrees with the player positions along the path.
    pub consistent: bool,
}

impl SolveOutcome {
    pub fn is_solved(&self) -> bool {
        self.state == SearchState::Succeeded
    }

    /// Moves as action digits, one per move (`Direction::index`).
    pub fn action_digits(&self) -> String {
        self.actions
            .iter()
            .filter_map(|d| char::from_digit(d.index() as u32, 10))
            .collect()
    }
}

/// Searches `room` with at most `max_nodes` nodes alive.
pub fn solve_room(room: &Room, max_nodes: usize) -> Result<SolveOutcome, RoomError> {
    let (start, goal) = SokobanNode::pair_from_room(room)?;
    let mut search = AStarSearch::new(max_nodes);
    search.set_start_and_goal_states(start, goal);

    // every call counts, including the one that reports an invalid start
    let mut search_steps = 0;
    let state = loop {
        let state = search.search_step();
        search_steps += 1;
        if state != SearchState::Searching {
            break state;
        }
    };

    let mut actions = Vec::new();
    let mut consistent = true;
    if state == SearchState::Succeeded {
        let mut previous: Option<Position> = None;
        for node in search.solution() {
            match (previous, node.action()) {
                (Some(prev), Some(action)) => {
                    consistent &= prev.step(action) == Some(node.player());
                    actions.push(action);
                }
                (Some(_), None) => consistent = false,
                (None, _) => {}
            }
            previous = Some(node.player());
        }
    }
    tracing::debug!(
        state = %state,
        search_steps,
        nodes = search.allocated_nodes(),
        moves = actions.len(),
        "search finished"
    );
    search.free_solution_nodes();

    Ok(SolveOutcome {
        state,
        actions,
        search_steps,
        consistent,
    })
}
