// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! DagRelay Error Types with Error Codes
//!
//! Error code ranges:
//! - RELAY-000-009: Graph loading errors
//! - RELAY-010-019: DAG errors
//! - RELAY-020-029: reserved for binding (placeholder resolution never fails)
//! - RELAY-030-039: Remote invocation / transport errors
//! - RELAY-040-049: Validation errors
//! - RELAY-050-059: Run control errors
//! - RELAY-060-069: Configuration / IO errors
//!
//! Every variant maps onto one [`ErrorCategory`]. Only `Configuration` errors
//! abort a run; everything else is recorded as node data by the runner.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Coarse error taxonomy used by the runner to decide what is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad graph or bad configuration. Fatal, surfaced before dispatch.
    Configuration,
    /// No provider bound or available for a node. Node is skipped.
    MissingCapability,
    /// Timeout, closed channel, provider-reported error.
    Transport,
    /// Output did not satisfy its contract.
    Validation,
    /// Run lifecycle misuse (overlapping runs).
    Run,
}

#[derive(Error, Debug, Diagnostic)]
pub enum RelayError {
    // ═══════════════════════════════════════════
    // GRAPH LOADING ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[RELAY-001] Failed to parse workflow graph: {details}")]
    #[diagnostic(
        code(dagrelay::parse_error),
        help("Check YAML/JSON syntax and that every node has a 'kind'")
    )]
    ParseError { details: String },

    #[error("[RELAY-002] Workflow graph file not found: {path}")]
    #[diagnostic(code(dagrelay::graph_not_found), help("Check the file path exists"))]
    GraphNotFound { path: String },

    #[error("[RELAY-003] Duplicate node id '{id}'")]
    #[diagnostic(code(dagrelay::duplicate_node))]
    DuplicateNodeId { id: String },

    #[error("[RELAY-004] Unknown node '{node_id}' referenced by {context}")]
    #[diagnostic(code(dagrelay::unknown_node))]
    UnknownNodeReference { node_id: String, context: String },

    #[error("[RELAY-005] Workflow graph has no nodes")]
    #[diagnostic(code(dagrelay::empty_graph))]
    EmptyGraph,

    #[error("[RELAY-006] Unsupported graph file format: {path}")]
    #[diagnostic(code(dagrelay::unsupported_format))]
    UnsupportedFormat { path: String },

    // ═══════════════════════════════════════════
    // DAG ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[RELAY-010] Cycle detected in workflow graph: {cycle}")]
    #[diagnostic(code(dagrelay::cycle_detected))]
    CycleDetected { cycle: String },

    // ═══════════════════════════════════════════
    // REMOTE ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[RELAY-030] Provider '{provider_id}' did not respond within {timeout_ms}ms")]
    #[diagnostic(code(dagrelay::timeout))]
    Timeout { provider_id: String, timeout_ms: u64 },

    #[error("[RELAY-031] Duplex channel closed")]
    #[diagnostic(code(dagrelay::channel_closed))]
    ChannelClosed,

    #[error("[RELAY-032] Provider '{provider_id}' reported an error: {message}")]
    #[diagnostic(code(dagrelay::provider_error))]
    ProviderError {
        provider_id: String,
        message: String,
    },

    #[error("[RELAY-033] Failed to send request: {reason}")]
    #[diagnostic(code(dagrelay::send_failed))]
    SendFailed { reason: String },

    #[error("[RELAY-034] No capability provider available for node '{node_id}'")]
    #[diagnostic(code(dagrelay::provider_unavailable))]
    ProviderUnavailable {
        node_id: String,
        provider_id: Option<String>,
    },

    #[error("[RELAY-035] Invocation {correlation_id} was cancelled")]
    #[diagnostic(code(dagrelay::invocation_cancelled))]
    InvocationCancelled { correlation_id: String },

    #[error("[RELAY-036] Malformed message on duplex channel: {details}")]
    #[diagnostic(code(dagrelay::protocol_error))]
    Protocol { details: String },

    // ═══════════════════════════════════════════
    // VALIDATION ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[RELAY-040] Output of node '{node_id}' failed validation after {attempts} attempt(s): {}", .errors.join("; "))]
    #[diagnostic(code(dagrelay::validation_failed))]
    ValidationFailed {
        node_id: String,
        attempts: u32,
        errors: Vec<String>,
    },

    // ═══════════════════════════════════════════
    // RUN CONTROL ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[RELAY-050] A run is already in progress for this graph")]
    #[diagnostic(code(dagrelay::run_in_progress))]
    RunInProgress,

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[RELAY-060] Configuration error: {reason}")]
    #[diagnostic(code(dagrelay::config_error))]
    ConfigError { reason: String },

    #[error("[RELAY-061] IO error: {0}")]
    #[diagnostic(code(dagrelay::io_error))]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Stable error code (e.g. "RELAY-010")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "RELAY-001",
            Self::GraphNotFound { .. } => "RELAY-002",
            Self::DuplicateNodeId { .. } => "RELAY-003",
            Self::UnknownNodeReference { .. } => "RELAY-004",
            Self::EmptyGraph => "RELAY-005",
            Self::UnsupportedFormat { .. } => "RELAY-006",
            Self::CycleDetected { .. } => "RELAY-010",
            Self::Timeout { .. } => "RELAY-030",
            Self::ChannelClosed => "RELAY-031",
            Self::ProviderError { .. } => "RELAY-032",
            Self::SendFailed { .. } => "RELAY-033",
            Self::ProviderUnavailable { .. } => "RELAY-034",
            Self::InvocationCancelled { .. } => "RELAY-035",
            Self::Protocol { .. } => "RELAY-036",
            Self::ValidationFailed { .. } => "RELAY-040",
            Self::RunInProgress => "RELAY-050",
            Self::ConfigError { .. } => "RELAY-060",
            Self::Io(_) => "RELAY-061",
        }
    }

    /// Map this error onto the engine's failure taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ParseError { .. }
            | Self::GraphNotFound { .. }
            | Self::DuplicateNodeId { .. }
            | Self::UnknownNodeReference { .. }
            | Self::EmptyGraph
            | Self::UnsupportedFormat { .. }
            | Self::CycleDetected { .. }
            | Self::ConfigError { .. }
            | Self::Io(_) => ErrorCategory::Configuration,
            Self::ProviderUnavailable { .. } => ErrorCategory::MissingCapability,
            Self::Timeout { .. }
            | Self::ChannelClosed
            | Self::ProviderError { .. }
            | Self::SendFailed { .. }
            | Self::InvocationCancelled { .. }
            | Self::Protocol { .. } => ErrorCategory::Transport,
            Self::ValidationFailed { .. } => ErrorCategory::Validation,
            Self::RunInProgress => ErrorCategory::Run,
        }
    }

    /// Whether a run must stop before dispatching anything.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Text recorded as a node's `error` output when this error ends a node.
    ///
    /// Timeouts record the bare sentinel `Timeout` so downstream templates
    /// see a stable value.
    pub fn node_output_text(&self) -> String {
        match self {
            Self::Timeout { .. } => "Timeout".to_string(),
            Self::ChannelClosed => "Channel closed".to_string(),
            Self::ProviderError { message, .. } => message.clone(),
            Self::SendFailed { reason } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl FixSuggestion for RelayError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Self::ParseError { .. } => Some("Check the graph file against the documented node shapes"),
            Self::GraphNotFound { .. } => Some("Pass the path of an existing .yaml or .json graph"),
            Self::DuplicateNodeId { .. } => Some("Give every node a unique 'id'"),
            Self::UnknownNodeReference { .. } => {
                Some("Point edges and --start at ids declared under 'nodes'")
            }
            Self::EmptyGraph => Some("Add at least one node to the graph"),
            Self::UnsupportedFormat { .. } => Some("Use a .yaml, .yml or .json file"),
            Self::CycleDetected { .. } => Some("Remove one edge of the reported cycle"),
            Self::Timeout { .. } => Some("Raise timeout_ms or check the provider is responsive"),
            Self::ChannelClosed => Some("Check the duplex endpoint is still running"),
            Self::ProviderError { .. } => None,
            Self::SendFailed { .. } => Some("Check the duplex endpoint accepts connections"),
            Self::ProviderUnavailable { .. } => {
                Some("Bind a provider to the node and register it as available")
            }
            Self::InvocationCancelled { .. } => None,
            Self::Protocol { .. } => Some("Send one JSON message per line"),
            Self::ValidationFailed { .. } => {
                Some("Tighten the node template so the provider returns the declared format")
            }
            Self::RunInProgress => Some("Wait for the current run to finish"),
            Self::ConfigError { .. } => Some("Check ~/.config/dagrelay/config.toml"),
            Self::Io(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_code_and_display() {
        let err = RelayError::CycleDetected {
            cycle: "a → b → a".to_string(),
        };
        assert_eq!(err.code(), "RELAY-010");
        assert!(err.to_string().contains("[RELAY-010]"));
        assert!(err.to_string().contains("a → b → a"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_timeout_node_output_is_sentinel() {
        let err = RelayError::Timeout {
            provider_id: "p1".to_string(),
            timeout_ms: 50,
        };
        assert_eq!(err.node_output_text(), "Timeout");
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_provider_error_output_is_message() {
        let err = RelayError::ProviderError {
            provider_id: "p1".to_string(),
            message: "model overloaded".to_string(),
        };
        assert_eq!(err.node_output_text(), "model overloaded");
        assert!(err.fix_suggestion().is_none());
    }

    #[test]
    fn test_missing_capability_category() {
        let err = RelayError::ProviderUnavailable {
            node_id: "n1".to_string(),
            provider_id: None,
        };
        assert_eq!(err.category(), ErrorCategory::MissingCapability);
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn test_validation_failed_joins_errors() {
        let err = RelayError::ValidationFailed {
            node_id: "n1".to_string(),
            attempts: 3,
            errors: vec!["a".to_string(), "b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("a; b"));
    }

    #[test]
    fn test_codes_avoid_reserved_binding_range() {
        let samples = [
            RelayError::EmptyGraph,
            RelayError::CycleDetected { cycle: String::new() },
            RelayError::ChannelClosed,
            RelayError::RunInProgress,
            RelayError::ConfigError { reason: String::new() },
        ];
        for err in samples {
            let n: u32 = err.code()["RELAY-".len()..].parse().unwrap();
            assert!(!(20..30).contains(&n), "{} is in the binding range", err.code());
        }
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RelayError = io.into();
        assert_eq!(err.code(), "RELAY-061");
    }
}
