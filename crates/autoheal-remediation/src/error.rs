//! Error types for the remediation engine.

use autoheal_types::{ActionId, JobId, JobStatus, RemediationStrategy};
use thiserror::Error;

/// Errors raised while executing remediation jobs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemediationError {
    /// No executor is bound to the action's strategy.
    #[error("no handler found for strategy {strategy}")]
    NoHandlerFound { strategy: RemediationStrategy },

    /// The executor did not return within the action timeout.
    #[error("timeout: action {action_id} exceeded {timeout_secs}s")]
    ExecutionTimeout {
        action_id: ActionId,
        timeout_secs: u64,
    },

    /// The executor returned an error (or panicked).
    #[error("execution failed for action {action_id}: {reason}")]
    ExecutionFailure { action_id: ActionId, reason: String },

    /// The plan was held for approval instead of being executed.
    #[error("approval required for {0}")]
    ApprovalRequired(JobId),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// The job is not in a state that allows the requested operation.
    #[error("job {job_id} is {status}")]
    InvalidJobState { job_id: JobId, status: JobStatus },
}

impl RemediationError {
    /// Whether this error came from running an action (as opposed to job bookkeeping).
    pub fn is_action_failure(&self) -> bool {
        matches!(
            self,
            Self::NoHandlerFound { .. } | Self::ExecutionTimeout { .. } | Self::ExecutionFailure { .. }
        )
    }
}

/// Result type for remediation operations.
pub type RemediationResult<T> = Result<T, RemediationError>;
