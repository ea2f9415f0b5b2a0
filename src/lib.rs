//! DagRelay - workflow DAG execution over a remote request/response channel
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/       YAML/JSON → Rust types (WorkflowGraph, TaskNode) │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  runtime/   Node execution (Runner, extract, validate)       │
//! │  dag/       DAG structure (FlowGraph, execution_order)       │
//! │  binding/   Variable resolution ({{name}} substitution)      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  remote/    Duplex channel (RemoteInvoker, transport)        │
//! │  store/     Produced outputs (OutputStore)                   │
//! │  event/     Run audit trail (EventLog, EventKind)            │
//! │  util/      Utilities (jsonpath, code fences)                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | Graph loading and load-time validation |
//! | [`runtime`] | Per-node state machine, bounded validation retries |
//! | [`dag`] | Kahn ordering with cycle diagnostics |
//! | [`binding`] | Placeholder resolution with upstream fallback |
//! | [`remote`] | Correlated request/response with timeout |
//! | [`store`] | Production-ordered node outputs |
//! | [`event`] | Event log for audit trail |
//! | [`util`] | JSONPath walker, fence helpers |
//! | [`error`] | Error types with fix suggestions |
//! | [`config`] | TOML configuration with env overrides |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL - YAML/JSON → Rust types
// ═══════════════════════════════════════════════════════════════
pub mod ast;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - Execution logic
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod dag;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Transport, storage, events
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod remote;
pub mod store;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use error::{ErrorCategory, FixSuggestion, RelayError, Result};

pub use config::RelayConfig;

pub use ast::{Edge, TaskNode, WorkNode, WorkflowGraph};

pub use dag::execution_order;

pub use binding::substitute;

pub use runtime::{
    build_retry_prompt, extract, validate, NodeRunState, RunReport, RunSettings, RunStatus, Runner,
    ValidationResult,
};

pub use remote::{connect_stream, connect_tcp, Connection, ProviderRegistry, RemoteInvoker, StaticRegistry};

pub use event::{Event, EventKind, EventLog};
