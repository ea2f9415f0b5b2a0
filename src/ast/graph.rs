//! WorkflowGraph - nodes + edges, validated at load time
//!
//! The graph is immutable for the duration of a run. Validation covers the
//! structural invariants that do not need ordering: unique ids, edges that
//! reference declared nodes, and a non-empty node set. Cycles are reported by
//! the `dag` module when an execution order is computed.

use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

use super::node::TaskNode;

/// Directed dependency: `target` runs after `source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<TaskNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// Build and validate a graph
    pub fn new(nodes: Vec<TaskNode>, edges: Vec<Edge>) -> Result<Self> {
        let graph = Self {
            name: None,
            nodes,
            edges,
        };
        graph.validate()?;
        Ok(graph)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let graph: Self = serde_yaml::from_str(yaml).map_err(|e| RelayError::ParseError {
            details: e.to_string(),
        })?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let graph: Self = serde_json::from_str(json).map_err(|e| RelayError::ParseError {
            details: e.to_string(),
        })?;
        graph.validate()?;
        Ok(graph)
    }

    /// Load from a `.yaml`, `.yml` or `.json` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RelayError::GraphNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(RelayError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }

    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(RelayError::EmptyGraph);
        }

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for node in &self.nodes {
            if !seen.insert(node.id()) {
                return Err(RelayError::DuplicateNodeId {
                    id: node.id().to_string(),
                });
            }
        }

        for edge in &self.edges {
            for (end, id) in [("source", &edge.source), ("target", &edge.target)] {
                if !seen.contains(id.as_str()) {
                    return Err(RelayError::UnknownNodeReference {
                        node_id: id.clone(),
                        context: format!("edge {} ({} → {})", end, edge.source, edge.target),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{MarkerNode, NodeKind, WorkNode};
    use std::io::Write;
    use tempfile::Builder;

    const CHAIN: &str = r#"
name: chain
nodes:
  - kind: start
    id: s
  - kind: work
    id: a
    provider: p1
    template: "{{input}}"
  - kind: terminal
    id: end
edges:
  - source: s
    target: a
  - source: a
    target: end
"#;

    #[test]
    fn test_from_yaml_chain() {
        let graph = WorkflowGraph::from_yaml(CHAIN).unwrap();
        assert_eq!(graph.name.as_deref(), Some("chain"));
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.node("a").unwrap().kind(), NodeKind::Work);
        assert!(!graph.contains("zzz"));
    }

    #[test]
    fn test_from_json_chain() {
        let json = r#"{
            "nodes": [
                {"kind": "start", "id": "s"},
                {"kind": "work", "id": "a", "template": "hi", "outputType": "markdown"}
            ],
            "edges": [{"source": "s", "target": "a"}]
        }"#;
        let graph = WorkflowGraph::from_json(json).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let nodes = vec![
            TaskNode::Start(MarkerNode::new("x")),
            TaskNode::Work(WorkNode::new("x", "t")),
        ];
        let err = WorkflowGraph::new(nodes, vec![]).unwrap_err();
        assert!(err.to_string().contains("RELAY-003"));
    }

    #[test]
    fn test_unknown_edge_target_rejected() {
        let nodes = vec![TaskNode::Start(MarkerNode::new("s"))];
        let err = WorkflowGraph::new(nodes, vec![Edge::new("s", "ghost")]).unwrap_err();
        assert!(err.to_string().contains("RELAY-004"));
        assert!(err.to_string().contains("ghost"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_graph_rejected() {
        let err = WorkflowGraph::new(vec![], vec![]).unwrap_err();
        assert_eq!(err.code(), "RELAY-005");
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = WorkflowGraph::from_yaml("nodes: [ {kind: work").unwrap_err();
        assert_eq!(err.code(), "RELAY-001");
    }

    #[test]
    fn test_from_path_by_extension() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "{}", CHAIN).unwrap();
        let graph = WorkflowGraph::from_path(file.path()).unwrap();
        assert_eq!(graph.len(), 3);

        let txt = Builder::new().suffix(".txt").tempfile().unwrap();
        let err = WorkflowGraph::from_path(txt.path()).unwrap_err();
        assert_eq!(err.code(), "RELAY-006");

        let err = WorkflowGraph::from_path("/definitely/not/here.yaml").unwrap_err();
        assert_eq!(err.code(), "RELAY-002");
    }
}
