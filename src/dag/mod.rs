//! DAG Module - dependency structure and execution order
//!
//! Contains the DAG representation and ordering:
//! - `flow`: FlowGraph built from a WorkflowGraph's edges
//! - `order`: topological execution order (Kahn, FIFO, stable tie-break)
//!
//! FlowGraph is immutable after construction.

mod flow;
mod order;

pub use flow::{DepVec, FlowGraph};
pub use order::execution_order;
