//! Node run states
//!
//! ```text
//! idle → waiting → running → (retrying ⇄ running)* → success | error
//!           └──────────────→ skipped
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunState {
    #[default]
    Idle,
    Waiting,
    Running,
    Retrying,
    Success,
    Error,
    Skipped,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Skipped)
    }

    /// Whether `self → next` is an edge of the lifecycle
    pub fn can_transition_to(self, next: Self) -> bool {
        use NodeRunState::*;
        matches!(
            (self, next),
            (Idle, Waiting)
                | (Waiting, Running)
                | (Waiting, Skipped)
                | (Running, Retrying)
                | (Running, Success)
                | (Running, Error)
                | (Retrying, Running)
        )
    }
}

impl fmt::Display for NodeRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::Error => "error",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}
