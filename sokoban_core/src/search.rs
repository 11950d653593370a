//! Stepwise best-first (A*) search over caller-defined nodes.
//!
//! The driver owns every node it creates in an arena; nodes refer to their parent
//! through the arena index, never by pointer. One call to [`AStarSearch::search_step`]
//! expands at most one node, so callers can bound work or abandon a search between
//! steps.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    fmt,
};

/// Algorithmic hooks a node type provides to [`AStarSearch`].
pub trait SearchNode: Sized {
    /// Estimated remaining cost from `self` to `goal`.
    fn goal_distance_estimate(&self, goal: &Self) -> u32;

    fn is_goal(&self, goal: &Self) -> bool;

    /// Children of `self`, in the order they should be explored.
    ///
    /// `parent` is the node `self` was reached from, if any.
    fn successors(&self, parent: Option<&Self>) -> Vec<Self>;

    /// Cost of the edge from `self` to `successor`.
    fn cost(&self, successor: &Self) -> u32;

    fn is_same_state(&self, other: &Self) -> bool;

    /// Hash consistent with [`SearchNode::is_same_state`].
    fn state_hash(&self) -> u64;

    /// Whether a search from `self` towards `goal` is well posed.
    fn is_valid_start(&self, _goal: &Self) -> bool {
        true
    }
}

/// Represents the state of a search after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    NotInitialised,
    Searching,
    Succeeded,
    Failed,
    OutOfMemory,
    Invalid,
}

impl SearchState {
    /// Label used in solve logs.
    pub fn label(self) -> &'static str {
        match self {
            SearchState::NotInitialised => "SEARCH_STATE_NOT_INITIALISED",
            SearchState::Searching => "SEARCH_STATE_SEARCHING",
            SearchState::Succeeded => "SEARCH_STATE_SUCCEEDED",
            SearchState::Failed => "SEARCH_STATE_FAILED",
            SearchState::OutOfMemory => "SEARCH_STATE_OUT_OF_MEMORY",
            SearchState::Invalid => "SEARCH_STATE_INVALID",
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Index of a node in the driver's arena.
pub type NodeId = usize;

#[derive(Debug)]
struct Entry<N> {
    node: N,
    parent: Option<NodeId>,
    g: u32,
    f: u32,
    closed: bool,
}

// For priority queue
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct OpenItem {
    f: u32,
    order: u64,
    id: NodeId,
}

impl Ord for OpenItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior; earlier insertions win ties
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for OpenItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* search driver with a node budget.
#[derive(Debug)]
pub struct AStarSearch<N> {
    max_nodes: usize,
    nodes: Vec<Entry<N>>,
    open: BinaryHeap<OpenItem>,
    by_hash: HashMap<u64, Vec<NodeId>>,
    goal: Option<N>,
    solution: Vec<NodeId>,
    state: SearchState,
    steps: usize,
    order: u64,
    cancel_requested: bool,
}

impl<N> AStarSearch<N> {
    /// Creates a driver that gives up with [`SearchState::OutOfMemory`] once it would
    /// hold more than `max_nodes` nodes.
    pub fn new(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            nodes: Vec::new(),
            open: BinaryHeap::new(),
            by_hash: HashMap::new(),
            goal: None,
            solution: Vec::new(),
            state: SearchState::NotInitialised,
            steps: 0,
            order: 0,
            cancel_requested: false,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Number of `search_step` calls that expanded or tried to expand a node.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn allocated_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Makes the next step end the search as [`SearchState::Failed`].
    pub fn cancel_search(&mut self) {
        self.cancel_requested = true;
    }

    /// Nodes from the start to the goal, both included, after a successful search.
    pub fn solution(&self) -> impl Iterator<Item = &N> {
        self.solution.iter().map(|&id| &self.nodes[id].node)
    }

    /// Releases every node of the finished search and returns to `NotInitialised`.
    pub fn free_solution_nodes(&mut self) {
        self.nodes.clear();
        self.open.clear();
        self.by_hash.clear();
        self.solution.clear();
        self.goal = None;
        self.state = SearchState::NotInitialised;
        self.steps = 0;
        self.order = 0;
        self.cancel_requested = false;
    }

    fn push_open(&mut self, id: NodeId) {
        let f = self.nodes[id].f;
        self.open.push(OpenItem {
            f,
            order: self.order,
            id,
        });
        self.order += 1;
    }

    fn pop_open(&mut self) -> Option<NodeId> {
        while let Some(item) = self.open.pop() {
            let entry = &self.nodes[item.id];
            // stale heap items are left behind when a node is reopened or closed
            if !entry.closed && entry.f == item.f {
                return Some(item.id);
            }
        }
        None
    }
}

impl<N: SearchNode> AStarSearch<N> {
    /// Clears any previous search and seeds the open list with `start`.
    pub fn set_start_and_goal_states(&mut self, start: N, goal: N) {
        self.free_solution_nodes();
        if !start.is_valid_start(&goal) {
            self.state = SearchState::Invalid;
            return;
        }
        let h = start.goal_distance_estimate(&goal);
        self.by_hash.entry(start.state_hash()).or_default().push(0);
        self.nodes.push(Entry {
            node: start,
            parent: None,
            g: 0,
            f: h,
            closed: false,
        });
        self.push_open(0);
        self.goal = Some(goal);
        self.state = SearchState::Searching;
    }

    fn find(&self, node: &N) -> Option<NodeId> {
        self.by_hash
            .get(&node.state_hash())?
            .iter()
            .copied()
            .find(|&id| self.nodes[id].node.is_same_state(node))
    }

    /// Expands the best open node.
    pub fn search_step(&mut self) -> SearchState {
        if self.state != SearchState::Searching {
            return self.state;
        }
        self.steps += 1;
        if self.cancel_requested {
            self.state = SearchState::Failed;
            return self.state;
        }
        let Some(current) = self.pop_open() else {
            self.state = SearchState::Failed;
            return self.state;
        };
        self.nodes[current].closed = true;
        let Some(goal) = self.goal.as_ref() else {
            self.state = SearchState::NotInitialised;
            return self.state;
        };

        let entry = &self.nodes[current];
        if entry.node.is_goal(goal) {
            let mut path = vec![current];
            let mut cursor = entry.parent;
            while let Some(id) = cursor {
                path.push(id);
                cursor = self.nodes[id].parent;
            }
            path.reverse();
            self.solution = path;
            self.state = SearchState::Succeeded;
            return self.state;
        }

        let parent = entry.parent.map(|id| &self.nodes[id].node);
        let g = entry.g;
        let children: Vec<(N, u32, u32)> = entry
            .node
            .successors(parent)
            .into_iter()
            .map(|child| {
                let child_g = g.saturating_add(entry.node.cost(&child));
                let child_f = child_g.saturating_add(child.goal_distance_estimate(goal));
                (child, child_g, child_f)
            })
            .collect();

        for (child, child_g, child_f) in children {
            match self.find(&child) {
                Some(existing) if self.nodes[existing].g <= child_g => continue,
                Some(existing) => {
                    let entry = &mut self.nodes[existing];
                    entry.node = child;
                    entry.parent = Some(current);
                    entry.g = child_g;
                    entry.f = child_f;
                    entry.closed = false;
                    self.push_open(existing);
                }
                None => {
                    if self.nodes.len() >= self.max_nodes {
                        self.state = SearchState::OutOfMemory;
                        return self.state;
                    }
                    let id = self.nodes.len();
                    self.by_hash.entry(child.state_hash()).or_default().push(id);
                    self.nodes.push(Entry {
                        node: child,
                        parent: Some(current),
                        g: child_g,
                        f: child_f,
                        closed: false,
                    });
                    self.push_open(id);
                }
            }
        }
        self.state
    }
}
