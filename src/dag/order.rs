//! Execution order - Kahn's algorithm over a FlowGraph
//!
//! The ready queue is FIFO and seeded in node declaration order, so the
//! resulting order is deterministic for a given graph. A graph whose nodes
//! cannot all be ordered contains a cycle; no partial order is returned.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::ast::WorkflowGraph;
use crate::error::{RelayError, Result};

use super::flow::FlowGraph;

/// Compute a topological execution order for `graph`.
///
/// Without `start`, every node with in-degree 0 seeds the queue (orphans
/// included). With `start`, only `start` seeds it and the order covers the
/// nodes reachable from it whose dependencies are all reachable too. A node
/// that also waits on something outside that scope could never become
/// ready, so it is left out together with its descendants.
pub fn execution_order(graph: &WorkflowGraph, start: Option<&str>) -> Result<Vec<Arc<str>>> {
    FlowGraph::from_graph(graph).execution_order(start)
}

impl FlowGraph {
    pub fn execution_order(&self, start: Option<&str>) -> Result<Vec<Arc<str>>> {
        let scope: Option<FxHashSet<Arc<str>>> = match start {
            Some(id) if !self.contains(id) => {
                return Err(RelayError::UnknownNodeReference {
                    node_id: id.to_string(),
                    context: "start node".to_string(),
                });
            }
            Some(id) => Some(self.runnable_from(id)),
            None => None,
        };
        let in_scope = |id: &str| scope.as_ref().is_none_or(|s| s.contains(id));

        let scoped: Vec<&Arc<str>> = self
            .node_ids()
            .iter()
            .filter(|id| in_scope(id))
            .collect();

        let mut in_degree: FxHashMap<&str, usize> = scoped
            .iter()
            .map(|id| {
                let deg = self
                    .get_dependencies(id)
                    .iter()
                    .filter(|dep| in_scope(dep))
                    .count();
                (id.as_ref(), deg)
            })
            .collect();

        let mut queue: VecDeque<&Arc<str>> = VecDeque::new();
        match start {
            Some(id) => {
                // A start node with an in-scope predecessor sits on a cycle
                if in_degree.get(id).copied().unwrap_or(0) > 0 {
                    return Err(self.cycle_error(&scoped));
                }
                queue.extend(scoped.iter().copied().filter(|n| n.as_ref() == id));
            }
            None => {
                queue.extend(
                    scoped
                        .iter()
                        .copied()
                        .filter(|n| in_degree.get(n.as_ref()) == Some(&0)),
                );
            }
        }

        let mut order: Vec<Arc<str>> = Vec::with_capacity(scoped.len());
        while let Some(node) = queue.pop_front() {
            order.push(Arc::clone(node));

            for succ in self.get_successors(node) {
                if let Some(deg) = in_degree.get_mut(succ.as_ref()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(succ);
                    }
                }
            }
        }

        if order.len() < scoped.len() {
            let visited: FxHashSet<&str> = order.iter().map(|id| id.as_ref()).collect();
            let remaining: Vec<&Arc<str>> = scoped
                .into_iter()
                .filter(|id| !visited.contains(id.as_ref()))
                .collect();
            return Err(self.cycle_error(&remaining));
        }

        debug!(nodes = order.len(), "computed execution order");
        Ok(order)
    }

    /// Nodes reachable from `start` minus those blocked by a dependency
    /// outside the reachable set, and everything downstream of them.
    /// Predecessors of `start` itself are ignored: it is the entry point.
    fn runnable_from(&self, start: &str) -> FxHashSet<Arc<str>> {
        let reachable = self.reachable_from(start);

        let mut blocked: FxHashSet<Arc<str>> = FxHashSet::default();
        for id in &reachable {
            if id.as_ref() == start || blocked.contains(id) {
                continue;
            }
            let waits_outside = self
                .get_dependencies(id)
                .iter()
                .any(|dep| !reachable.contains(dep));
            if waits_outside {
                blocked.extend(self.reachable_from(id));
            }
        }

        if !blocked.is_empty() {
            let mut dropped: Vec<&str> = blocked.iter().map(|id| id.as_ref()).collect();
            dropped.sort_unstable();
            warn!(start, dropped = %dropped.join(", "), "nodes depend on work outside the start node's scope");
        }

        reachable
            .into_iter()
            .filter(|id| id.as_ref() == start || !blocked.contains(id))
            .collect()
    }

    fn cycle_error(&self, candidates: &[&Arc<str>]) -> RelayError {
        let owned: Vec<Arc<str>> = candidates.iter().map(|id| Arc::clone(id)).collect();
        let cycle = self.find_cycle(&owned).unwrap_or_else(|| {
            let ids: Vec<&str> = owned.iter().map(|id| id.as_ref()).collect();
            format!("unresolved nodes: {}", ids.join(", "))
        });
        RelayError::CycleDetected { cycle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(yaml: &str, start: Option<&str>) -> Result<Vec<String>> {
        let graph = WorkflowGraph::from_yaml(yaml).unwrap();
        execution_order(&graph, start).map(|ids| ids.iter().map(|s| s.to_string()).collect())
    }

    // ═══════════════════════════════════════════════════════════════
    // ORDERING
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_linear_chain() {
        let yaml = r#"
nodes:
  - {kind: terminal, id: c}
  - {kind: work, id: b, template: B}
  - {kind: start, id: a}
edges:
  - {source: a, target: b}
  - {source: b, target: c}
"#;
        assert_eq!(order(yaml, None).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_roots_in_declaration_order() {
        let yaml = r#"
nodes:
  - {kind: work, id: z, template: Z}
  - {kind: work, id: y, template: Y}
  - {kind: work, id: x, template: X}
edges:
  - {source: z, target: x}
"#;
        // z and y are roots (declaration order), x follows z
        assert_eq!(order(yaml, None).unwrap(), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_diamond_fifo() {
        let yaml = r#"
nodes:
  - {kind: start, id: a}
  - {kind: work, id: b, template: B}
  - {kind: work, id: c, template: C}
  - {kind: terminal, id: d}
edges:
  - {source: a, target: b}
  - {source: a, target: c}
  - {source: b, target: d}
  - {source: c, target: d}
"#;
        assert_eq!(order(yaml, None).unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_duplicate_edges_still_ordered() {
        let yaml = r#"
nodes:
  - {kind: start, id: a}
  - {kind: work, id: b, template: B}
edges:
  - {source: a, target: b}
  - {source: a, target: b}
"#;
        assert_eq!(order(yaml, None).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_start_node_limits_scope() {
        let yaml = r#"
nodes:
  - {kind: start, id: s1}
  - {kind: start, id: s2}
  - {kind: work, id: a, template: A}
  - {kind: work, id: b, template: B}
edges:
  - {source: s1, target: a}
  - {source: s2, target: b}
  - {source: s2, target: a}
"#;
        assert_eq!(order(yaml, Some("s2")).unwrap(), vec!["s2", "b"]);
        assert_eq!(order(yaml, Some("s1")).unwrap(), vec!["s1"]);
    }

    #[test]
    fn test_start_node_excludes_nodes_waiting_outside_scope() {
        let yaml = r#"
nodes:
  - {kind: start, id: s1}
  - {kind: start, id: s2}
  - {kind: work, id: a, template: A}
  - {kind: work, id: b, template: B}
  - {kind: work, id: c, template: C}
edges:
  - {source: s1, target: a}
  - {source: s2, target: a}
  - {source: a, target: b}
  - {source: s1, target: c}
"#;
        // a waits on s2, which never runs from s1; b is downstream of a
        assert_eq!(order(yaml, Some("s1")).unwrap(), vec!["s1", "c"]);
    }

    #[test]
    fn test_start_node_predecessors_ignored() {
        let yaml = r#"
nodes:
  - {kind: work, id: a, template: A}
  - {kind: work, id: b, template: B}
  - {kind: work, id: c, template: C}
edges:
  - {source: a, target: b}
  - {source: b, target: c}
"#;
        assert_eq!(order(yaml, Some("b")).unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_unknown_start_node() {
        let yaml = "nodes:\n  - {kind: start, id: s}\n";
        let err = order(yaml, Some("ghost")).unwrap_err();
        assert_eq!(err.code(), "RELAY-004");
    }

    // ═══════════════════════════════════════════════════════════════
    // CYCLES
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_cycle_reported() {
        let yaml = r#"
nodes:
  - {kind: start, id: s}
  - {kind: work, id: a, template: A}
  - {kind: work, id: b, template: B}
edges:
  - {source: s, target: a}
  - {source: a, target: b}
  - {source: b, target: a}
"#;
        let err = order(yaml, None).unwrap_err();
        assert_eq!(err.code(), "RELAY-010");
        assert!(err.to_string().contains("a → b → a"));
    }

    #[test]
    fn test_cycle_without_roots() {
        let yaml = r#"
nodes:
  - {kind: work, id: a, template: A}
  - {kind: work, id: b, template: B}
edges:
  - {source: a, target: b}
  - {source: b, target: a}
"#;
        assert!(order(yaml, None).is_err());
    }

    #[test]
    fn test_cycle_through_start_node() {
        let yaml = r#"
nodes:
  - {kind: work, id: a, template: A}
  - {kind: work, id: b, template: B}
edges:
  - {source: a, target: b}
  - {source: b, target: a}
"#;
        let err = order(yaml, Some("a")).unwrap_err();
        assert_eq!(err.code(), "RELAY-010");
    }
}
