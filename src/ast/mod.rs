//! AST Module - Workflow graph domain model
//!
//! Contains the types a workflow graph is made of:
//! - `node`: TaskNode variants (start / work / terminal) and their contracts
//! - `graph`: WorkflowGraph (nodes + edges) with load-time validation
//!
//! This module represents the "what" - static structure.
//! For execution, see the `runtime` module.

mod graph;
mod node;

pub use graph::{Edge, WorkflowGraph};
pub use node::{
    Extraction, ExtractionMode, MarkerNode, NodeKind, OutputSchema, OutputType, TaskNode,
    VariableBinding, WorkNode, DEFAULT_OUTPUT_NAME,
};
