//! Node state definitions.

use std::fmt;

use serde::Serialize;

/// Node operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Node is built but the ticker is not running yet.
    Starting,
    /// Ticker running, ledger accepting operations.
    Running,
    /// Refusing new operations, draining in-flight ones.
    ShuttingDown,
    /// Node is stopped.
    Stopped,
}

impl NodeState {
    /// Check if the node is accepting new operations.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, NodeState::Running)
    }

    /// Check if the node is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Stopped)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Starting => "starting",
            NodeState::Running => "running",
            NodeState::ShuttingDown => "shutting_down",
            NodeState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
