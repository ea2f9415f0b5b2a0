//! Per-run execution state and the report handed back to callers

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::event::{EventKind, EventLog};
use crate::store::{OutputMap, OutputStore};

use super::state::NodeRunState;
use super::validate::ValidationResult;

/// One provider round-trip of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub node_id: Arc<str>,
    /// 1-based
    pub attempt: u32,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

/// Mutable state owned by exactly one run
///
/// Outputs are cleared at construction: nothing leaks between runs.
#[derive(Debug)]
pub struct ExecutionContext {
    pub input: String,
    pub outputs: OutputStore,
    pub history: Vec<AttemptRecord>,
    states: FxHashMap<Arc<str>, NodeRunState>,
    events: EventLog,
}

impl ExecutionContext {
    pub fn new(input: impl Into<String>, nodes: &[Arc<str>], events: EventLog) -> Self {
        Self {
            input: input.into(),
            outputs: OutputStore::new(),
            history: Vec::new(),
            states: nodes
                .iter()
                .map(|id| (Arc::clone(id), NodeRunState::Idle))
                .collect(),
            events,
        }
    }

    pub fn state(&self, node_id: &str) -> NodeRunState {
        self.states.get(node_id).copied().unwrap_or_default()
    }

    /// Move a node to `to`, emitting `NodeStateChanged`
    pub fn transition(&mut self, node_id: &Arc<str>, to: NodeRunState) {
        let from = self.state(node_id);
        if !from.can_transition_to(to) {
            warn!(node_id = %node_id, %from, %to, "unexpected node state transition");
        }
        self.states.insert(Arc::clone(node_id), to);
        self.events.emit(EventKind::NodeStateChanged {
            node_id: Arc::clone(node_id),
            from,
            to,
        });
    }

    /// Store a node's outputs for downstream resolution
    pub fn record_outputs(&self, node_id: &Arc<str>, outputs: OutputMap) {
        self.outputs.record(Arc::clone(node_id), outputs);
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Count of nodes per terminal state: (success, error, skipped)
    pub fn tally(&self) -> (usize, usize, usize) {
        self.states.values().fold((0, 0, 0), |(s, e, k), state| match state {
            NodeRunState::Success => (s + 1, e, k),
            NodeRunState::Error => (s, e + 1, k),
            NodeRunState::Skipped => (s, e, k + 1),
            _ => (s, e, k),
        })
    }
}

/// Final per-node outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: Arc<str>,
    pub label: String,
    pub status: NodeRunState,
    /// Prompt of the first attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_prompt: Option<String>,
    /// Raw response of the last attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Value recorded for downstream nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_output: Option<Value>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeResult {
    pub fn new(node_id: Arc<str>, label: impl Into<String>) -> Self {
        Self {
            node_id,
            label: label.into(),
            status: NodeRunState::Idle,
            resolved_prompt: None,
            response: None,
            extracted_output: None,
            attempts: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Cancelled,
}

/// Aggregate entry for display: one per executed work node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub label: String,
    pub response: Option<String>,
    pub output: Value,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub nodes: Vec<NodeResult>,
    pub results: Vec<ResultEntry>,
    pub history: Vec<AttemptRecord>,
    /// `{node_id: {output_name: value}}` in production order
    pub outputs: Value,
    #[serde(skip)]
    pub events: EventLog,
}

impl RunReport {
    pub fn node(&self, node_id: &str) -> Option<&NodeResult> {
        self.nodes.iter().find(|n| &*n.node_id == node_id)
    }

    /// Recorded outputs of one node
    pub fn output_of(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    /// Attempts made by one node, oldest first
    pub fn attempts_of(&self, node_id: &str) -> Vec<&AttemptRecord> {
        self.history
            .iter()
            .filter(|a| &*a.node_id == node_id)
            .collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }
}
