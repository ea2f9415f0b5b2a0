//! EventLog - append-only record of one run
//!
//! Complements `tracing`: logs go to the subscriber, events stay with the
//! run report so callers can inspect exactly what happened to each node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::NodeRunState;

/// Single event in a run's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since run start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All event types
///
/// Uses Arc<str> for node_id fields to share ids with the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        run_id: String,
        node_count: usize,
        start_node: Option<Arc<str>>,
    },
    RunCompleted {
        run_id: String,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        total_duration_ms: u64,
    },
    RunCancelled {
        run_id: String,
        /// Node that was in progress when cancellation arrived
        interrupted: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    NodeStateChanged {
        node_id: Arc<str>,
        from: NodeRunState,
        to: NodeRunState,
    },
    PromptResolved {
        node_id: Arc<str>,
        attempt: u32,
        template: String,
        prompt: String,
    },
    ValidationFailed {
        node_id: Arc<str>,
        attempt: u32,
        errors: Vec<String>,
    },
    NodeFinished {
        node_id: Arc<str>,
        state: NodeRunState,
        attempts: u32,
        output: Arc<Value>,
    },

    // ═══════════════════════════════════════════
    // PROVIDER LEVEL
    // ═══════════════════════════════════════════
    ProviderInvoked {
        node_id: Arc<str>,
        provider_id: String,
        attempt: u32,
        timeout_ms: u64,
    },
    ProviderResponded {
        node_id: Arc<str>,
        provider_id: String,
        attempt: u32,
        response_len: usize,
        duration_ms: u64,
    },
    ProviderFailed {
        node_id: Arc<str>,
        provider_id: String,
        attempt: u32,
        error: String,
    },
}

impl EventKind {
    /// Node id if event is node-related
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStateChanged { node_id, .. }
            | Self::PromptResolved { node_id, .. }
            | Self::ValidationFailed { node_id, .. }
            | Self::NodeFinished { node_id, .. }
            | Self::ProviderInvoked { node_id, .. }
            | Self::ProviderResponded { node_id, .. }
            | Self::ProviderFailed { node_id, .. } => Some(node_id),
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunCancelled { .. } => None,
        }
    }

    pub fn is_run_event(&self) -> bool {
        matches!(
            self,
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunCancelled { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at run start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    /// Events for one node, in emission order
    pub fn filter_node(&self, node_id: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.node_id() == Some(node_id))
                .cloned()
                .collect()
        })
    }

    pub fn run_events(&self) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.is_run_event())
                .cloned()
                .collect()
        })
    }

    /// State transitions of one node, oldest first
    pub fn transitions(&self, node_id: &str) -> Vec<NodeRunState> {
        self.with_events(|events| {
            events
                .iter()
                .filter_map(|e| match &e.kind {
                    EventKind::NodeStateChanged { node_id: id, to, .. } if &**id == node_id => {
                        Some(*to)
                    }
                    _ => None,
                })
                .collect()
        })
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
