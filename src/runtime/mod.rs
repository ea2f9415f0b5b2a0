//! Runtime Module - node execution
//!
//! - `extract`: raw response → stored value
//! - `validate`: output type contracts and retry prompts
//! - `state`: node lifecycle
//! - `context`: per-run state and reports
//! - `runner`: the orchestrating state machine

mod context;
mod extract;
mod runner;
mod state;
mod validate;

pub use context::{AttemptRecord, ExecutionContext, NodeResult, ResultEntry, RunReport, RunStatus};
pub use extract::{extract, extract_with};
pub use runner::{RunSettings, Runner, ERROR_OUTPUT_KEY};
pub use state::NodeRunState;
pub use validate::{
    build_retry_prompt, validate, ValidationResult, DEFAULT_RETRY_OUTPUT_LIMIT, EMPTY_OUTPUT_ERROR,
    LONG_CODE_THRESHOLD,
};
