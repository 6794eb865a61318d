//! Lifecycle of a single pipeline run.
//!
//! ```text
//! Validating ─► Executing(0) ─► … ─► Executing(n-1) ─► Completed
//!     │               │
//!     ▼               ├─► Failed
//!  Rejected           └─► Cancelled
//! ```
//!
//! There is no retry edge: every terminal state is final.

use std::fmt;

use tracing::debug;

/// Where a run is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Checking plugin and tool names.
    Validating,
    /// Validation failed; nothing ran.
    Rejected,
    /// About to run, or running, the step at this index.
    Executing(usize),
    /// Every step succeeded.
    Completed,
    /// A tool failed or broke its contract.
    Failed,
    /// Stopped by a cancellation signal or deadline.
    Cancelled,
}

impl PipelineState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Validating, Self::Rejected | Self::Executing(0)) => true,
            (Self::Executing(k), Self::Executing(j)) => j == k + 1,
            (Self::Executing(_), Self::Completed | Self::Failed | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => f.write_str("validating"),
            Self::Rejected => f.write_str("rejected"),
            Self::Executing(step) => write!(f, "executing({step})"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Tracks the current [`PipelineState`] and logs every transition.
#[derive(Debug)]
pub struct StateMachine {
    state: PipelineState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Start in [`PipelineState::Validating`].
    pub fn new() -> Self {
        Self {
            state: PipelineState::Validating,
        }
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to `next`.
    pub fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal pipeline transition {} -> {next}",
            self.state
        );
        debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }
}
