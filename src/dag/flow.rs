//! FlowGraph - adjacency structure built from workflow edges
//!
//! Performance optimizations:
//! - Arc<str> for zero-cost cloning of node IDs
//! - FxHashMap for faster hashing (non-crypto, ~2x faster)
//! - SmallVec for stack-allocated small dependency lists (0-4 items)
//!
//! Cycle diagnostics use the DFS three-color algorithm.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ast::WorkflowGraph;

/// Stack-allocated deps: most nodes have 0-4 neighbours
pub type DepVec = SmallVec<[Arc<str>; 4]>;

/// Graph of node dependencies built from edges
pub struct FlowGraph {
    /// node_id -> successor node_ids, in edge declaration order
    adjacency: FxHashMap<Arc<str>, DepVec>,
    /// node_id -> predecessor node_ids
    predecessors: FxHashMap<Arc<str>, DepVec>,
    /// All node IDs in declaration order
    node_ids: Vec<Arc<str>>,
    node_set: FxHashSet<Arc<str>>,
}

impl FlowGraph {
    pub fn from_graph(graph: &WorkflowGraph) -> Self {
        let capacity = graph.nodes.len();
        let mut adjacency: FxHashMap<Arc<str>, DepVec> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut predecessors: FxHashMap<Arc<str>, DepVec> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut node_ids: Vec<Arc<str>> = Vec::with_capacity(capacity);
        let mut node_set: FxHashSet<Arc<str>> =
            FxHashSet::with_capacity_and_hasher(capacity, Default::default());

        for node in &graph.nodes {
            let id: Arc<str> = Arc::from(node.id());
            node_ids.push(Arc::clone(&id));
            node_set.insert(Arc::clone(&id));
            adjacency.insert(Arc::clone(&id), DepVec::new());
            predecessors.insert(id, DepVec::new());
        }

        for edge in &graph.edges {
            // Edges to undeclared nodes are rejected at load time; ignore them here
            let (Some(src), Some(tgt)) = (
                node_set.get(edge.source.as_str()).cloned(),
                node_set.get(edge.target.as_str()).cloned(),
            ) else {
                continue;
            };

            adjacency
                .entry(Arc::clone(&src))
                .or_default()
                .push(Arc::clone(&tgt));
            predecessors.entry(tgt).or_default().push(src);
        }

        Self {
            adjacency,
            predecessors,
            node_ids,
            node_set,
        }
    }

    /// All node ids in declaration order
    pub fn node_ids(&self) -> &[Arc<str>] {
        &self.node_ids
    }

    /// Get dependencies of a node
    #[inline]
    pub fn get_dependencies(&self, node_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.predecessors
            .get(node_id)
            .map_or(EMPTY, SmallVec::as_slice)
    }

    /// Get successors of a node
    #[inline]
    pub fn get_successors(&self, node_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.adjacency
            .get(node_id)
            .map_or(EMPTY, SmallVec::as_slice)
    }

    #[inline]
    pub fn contains(&self, node_id: &str) -> bool {
        self.node_set.contains(node_id)
    }

    /// Every node reachable from `start`, `start` included (BFS)
    pub fn reachable_from(&self, start: &str) -> FxHashSet<Arc<str>> {
        let mut visited: FxHashSet<Arc<str>> = FxHashSet::default();
        let Some(start) = self.node_set.get(start) else {
            return visited;
        };

        let mut queue: VecDeque<&Arc<str>> = VecDeque::new();
        visited.insert(Arc::clone(start));
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for neighbor in self.get_successors(current) {
                if visited.insert(Arc::clone(neighbor)) {
                    queue.push_back(neighbor);
                }
            }
        }

        visited
    }

    /// Find one cycle reachable from `candidates`, as "a → b → a".
    ///
    /// Uses the three-color algorithm:
    /// - White: unvisited
    /// - Gray: currently in DFS stack
    /// - Black: fully processed
    ///
    /// A cycle is found when the DFS meets a Gray node.
    pub fn find_cycle(&self, candidates: &[Arc<str>]) -> Option<String> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs(
            node: &Arc<str>,
            adjacency: &FxHashMap<Arc<str>, DepVec>,
            colors: &mut FxHashMap<Arc<str>, Color>,
            stack: &mut Vec<Arc<str>>,
        ) -> Option<String> {
            colors.insert(Arc::clone(node), Color::Gray);
            stack.push(Arc::clone(node));

            if let Some(neighbors) = adjacency.get(node) {
                for neighbor in neighbors {
                    match colors.get(neighbor).copied().unwrap_or(Color::White) {
                        Color::Gray => {
                            // Gray means the neighbor is on the current stack
                            let cycle_start = stack
                                .iter()
                                .position(|x| x == neighbor)
                                .unwrap_or(0);
                            let cycle: Vec<&str> =
                                stack[cycle_start..].iter().map(|s| s.as_ref()).collect();
                            return Some(format!("{} → {}", cycle.join(" → "), neighbor));
                        }
                        Color::White => {
                            if let Some(cycle) = dfs(neighbor, adjacency, colors, stack) {
                                return Some(cycle);
                            }
                        }
                        Color::Black => {}
                    }
                }
            }

            stack.pop();
            colors.insert(Arc::clone(node), Color::Black);
            None
        }

        let mut colors: FxHashMap<Arc<str>, Color> = FxHashMap::default();
        let mut stack: Vec<Arc<str>> = Vec::new();

        for id in candidates {
            if colors.get(id).copied().unwrap_or(Color::White) == Color::White {
                if let Some(cycle) = dfs(id, &self.adjacency, &mut colors, &mut stack) {
                    return Some(cycle);
                }
            }
        }

        None
    }
}
