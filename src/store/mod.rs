//! Store Module - produced node outputs
//!
//! - `outputs`: ordered, shared record of what each node produced

mod outputs;

pub use outputs::{resolve_qualified, OutputMap, OutputStore, ProducedEntry};
