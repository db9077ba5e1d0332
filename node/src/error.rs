//! Node error types.

use fxwallet_common::{Classify, ErrorKind};
use thiserror::Error;

use crate::state::NodeState;

/// Errors from node lifecycle operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested transition is not valid from the current state.
    #[error("cannot {action} node in state {state}")]
    InvalidState { state: NodeState, action: &'static str },
}

impl Classify for NodeError {
    fn kind(&self) -> ErrorKind {
        match self {
            NodeError::InvalidConfig(_) => ErrorKind::Validation,
            NodeError::InvalidState { .. } => ErrorKind::Unavailable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            NodeError::InvalidConfig(_) => "INVALID_CONFIG",
            NodeError::InvalidState { .. } => "INVALID_NODE_STATE",
        }
    }
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
