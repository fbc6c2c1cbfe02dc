//! Error types for the MAPE-K loop.

use autoheal_remediation::RemediationError;
use thiserror::Error;

use crate::state::LoopState;

/// Loop error type.
#[derive(Debug, Error)]
pub enum LoopError {
    /// A monitor, analyzer or planner failed. Isolated to its phase.
    #[error("{phase} handler '{handler}' failed: {reason}")]
    HandlerFailure {
        phase: LoopState,
        handler: String,
        reason: String,
    },

    /// The periodic loop is already running.
    #[error("loop already running")]
    AlreadyRunning,

    /// The periodic loop is not running.
    #[error("loop not running")]
    NotRunning,

    #[error("remediation error: {0}")]
    Remediation(#[from] RemediationError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for loop operations.
pub type LoopResult<T> = Result<T, LoopError>;
