//! Utility modules
//!
//! - `jsonpath`: minimal dot-path walker over JSON values
//! - `fence`: markdown code-fence detection

pub mod fence;
pub mod jsonpath;

pub use fence::{first_fenced_block, strip_code_fence, FencedBlock};
