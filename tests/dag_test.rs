//! DAG ordering tests
//!
//! Property tests over random acyclic graphs plus a few fixed shapes.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use dagrelay::ast::{Edge, MarkerNode, TaskNode, WorkNode, WorkflowGraph};
use dagrelay::dag::{execution_order, FlowGraph};
use dagrelay::error::RelayError;

fn work(id: &str) -> TaskNode {
    TaskNode::Work(WorkNode::new(id, "t"))
}

fn graph(ids: &[&str], edges: &[(&str, &str)]) -> WorkflowGraph {
    let nodes = ids.iter().map(|id| work(id)).collect();
    let edges = edges.iter().map(|(s, t)| Edge::new(*s, *t)).collect();
    WorkflowGraph::new(nodes, edges).unwrap()
}

fn order_of(graph: &WorkflowGraph, start: Option<&str>) -> Vec<String> {
    execution_order(graph, start)
        .unwrap()
        .iter()
        .map(|id| id.to_string())
        .collect()
}

/// Random DAG: edges always point from a lower to a higher index,
/// nodes are declared in reverse so declaration order is no hint
fn arb_dag() -> impl Strategy<Value = (usize, BTreeSet<(usize, usize)>)> {
    (2usize..12).prop_flat_map(|n| {
        let pairs = proptest::collection::vec((0..n, 0..n), 0..n * 2);
        (Just(n), pairs).prop_map(|(n, pairs)| {
            let edges = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect();
            (n, edges)
        })
    })
}

fn build(n: usize, edges: &BTreeSet<(usize, usize)>) -> WorkflowGraph {
    let nodes = (0..n).rev().map(|i| work(&format!("n{i}"))).collect();
    let edges = edges
        .iter()
        .map(|(a, b)| Edge::new(format!("n{a}"), format!("n{b}")))
        .collect();
    WorkflowGraph::new(nodes, edges).unwrap()
}

proptest! {
    #[test]
    fn every_node_runs_exactly_once((n, edges) in arb_dag()) {
        let graph = build(n, &edges);
        let order = order_of(&graph, None);

        prop_assert_eq!(order.len(), n);
        let unique: BTreeSet<&String> = order.iter().collect();
        prop_assert_eq!(unique.len(), n);
    }

    #[test]
    fn dependencies_come_first((n, edges) in arb_dag()) {
        let graph = build(n, &edges);
        let order = order_of(&graph, None);
        let position = |id: &str| order.iter().position(|o| o == id).unwrap();

        for (a, b) in &edges {
            let source = position(&format!("n{a}"));
            let target = position(&format!("n{b}"));
            prop_assert!(source < target, "n{} ran after n{}", a, b);
        }
    }

    #[test]
    fn closing_a_chain_is_a_cycle(n in 2usize..10) {
        let nodes = (0..n).map(|i| work(&format!("n{i}"))).collect();
        let mut edges: Vec<Edge> = (1..n)
            .map(|i| Edge::new(format!("n{}", i - 1), format!("n{i}")))
            .collect();
        edges.push(Edge::new(format!("n{}", n - 1), "n0"));
        let graph = WorkflowGraph::new(nodes, edges).unwrap();

        let err = execution_order(&graph, None).unwrap_err();
        let is_cycle = matches!(err, RelayError::CycleDetected { .. });
        prop_assert!(is_cycle, "expected a cycle error, got {}", err);
    }

    #[test]
    fn ordering_is_deterministic((n, edges) in arb_dag()) {
        let graph = build(n, &edges);
        prop_assert_eq!(order_of(&graph, None), order_of(&graph, None));
    }
}

#[test]
fn diamond_joins_after_both_branches() {
    let g = graph(
        &["a", "b", "c", "d"],
        &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
    );
    let order = order_of(&g, None);
    assert_eq!(order.first().map(String::as_str), Some("a"));
    assert_eq!(order.last().map(String::as_str), Some("d"));
}

#[test]
fn independent_nodes_keep_declaration_order() {
    let g = graph(&["z", "y", "x"], &[]);
    assert_eq!(order_of(&g, None), vec!["z", "y", "x"]);
}

#[test]
fn start_node_scopes_to_reachable() {
    let g = graph(
        &["a", "b", "c", "d", "side"],
        &[("a", "b"), ("b", "c"), ("c", "d")],
    );
    assert_eq!(order_of(&g, Some("b")), vec!["b", "c", "d"]);
}

#[test]
fn start_node_never_runs_a_node_before_its_dependencies() {
    let g = graph(
        &["a", "b", "c", "d", "side"],
        &[("a", "b"), ("b", "c"), ("side", "c"), ("c", "d"), ("b", "d")],
    );
    // c waits on `side`, which is unreachable from b; d is downstream of c
    assert_eq!(order_of(&g, Some("b")), vec!["b"]);
}

#[test]
fn unknown_start_node_is_fatal() {
    let g = graph(&["a"], &[]);
    let err = execution_order(&g, Some("ghost")).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn self_loop_is_a_cycle() {
    let g = graph(&["a", "b"], &[("a", "b"), ("b", "b")]);
    let err = execution_order(&g, None).unwrap_err();
    assert_eq!(err.code(), "RELAY-010");
}

#[test]
fn flow_graph_from_yaml() {
    let yaml = r#"
nodes:
  - kind: start
    id: s
  - kind: work
    id: w
    provider: p
    template: "{{input}}"
  - kind: terminal
    id: t
edges:
  - { source: s, target: w }
  - { source: w, target: t }
"#;
    let g = WorkflowGraph::from_yaml(yaml).unwrap();
    let flow = FlowGraph::from_graph(&g);

    assert!(flow.reachable_from("s").contains("t"));
    assert!(!flow.reachable_from("t").contains("s"));
    assert_eq!(flow.get_dependencies("w").len(), 1);
    assert_eq!(order_of(&g, None), vec!["s", "w", "t"]);
    assert!(matches!(g.node("s"), Some(TaskNode::Start(MarkerNode { .. }))));
}
