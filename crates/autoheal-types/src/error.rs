//! Error type returned by user-supplied handlers.

use thiserror::Error;

/// Errors a monitor, analyzer, planner or executor handler may return.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler ran but could not do its job.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler rejected its input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing system could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Result type for handler invocations.
pub type HandlerResult<T> = Result<T, HandlerError>;
