//! Waiter state machine.

use serde::{Deserialize, Serialize};

use super::notification::TaskOutcome;

/// Per-task state.
///
/// State transitions:
/// - Pending -> Fulfilled (via `resolve`)
/// - Pending -> TimedOut (via `expire`)
///
/// Both terminal states are final; a second transition attempt is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaiterState {
    Pending,
    Fulfilled,
    TimedOut,
}

/// The single value delivered through a waiter's completion slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Resolved(TaskOutcome),
    Expired,
}

impl Completion {
    /// Terminal state this completion corresponds to.
    pub fn state(&self) -> WaiterState {
        match self {
            Completion::Resolved(_) => WaiterState::Fulfilled,
            Completion::Expired => WaiterState::TimedOut,
        }
    }
}
