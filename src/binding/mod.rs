//! Binding Module - prompt variable resolution
//!
//! A work node's template carries `{{name}}` placeholders. Each one is
//! resolved independently, first match wins:
//!
//! ```text
//! {{input}}                      → run input
//! static / input binding         → fixed value / run input
//! exact output key               → most recent producer with that key
//! qualified {{node.key.path}}    → that node's output, walked by path
//! any upstream output            → most recent producer's first value
//! nothing produced yet           → run input
//! ```
//!
//! Resolution never fails: an unknown name still yields text.

mod template;

pub use template::{extract_refs, resolve_variable, substitute, INPUT_VAR};
