//! Remediation jobs and their terminal results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{RemediationAction, RemediationPlan};
use crate::ids::{AnomalyId, JobId, PlanId};

// ── Job Status ──────────────────────────────────────────────────────

/// Lifecycle status of a remediation job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created but not yet running. Jobs for plans that require approval
    /// stay here until approved.
    Pending,
    InProgress,
    Completed,
    /// An action failed or timed out; remaining actions were not run.
    Failed,
    /// Reserved for external compensation workflows that unwind a whole
    /// job; the engine itself only compensates the failing action and
    /// reports `Failed`.
    RolledBack,
}

impl JobStatus {
    /// Whether the job has finished running.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::RolledBack)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

// ── Execution Result ────────────────────────────────────────────────

/// Terminal summary of one job run. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: PlanId,
    pub success: bool,
    pub actions_completed: usize,
    pub actions_total: usize,
    pub duration_ms: u64,
    /// Error of the failing action, if any.
    pub error: Option<String>,
    /// Whether a compensating action was invoked.
    #[serde(default)]
    pub rollback_attempted: bool,
    /// Failure of the compensating action, recorded but never raised.
    #[serde(default)]
    pub rollback_error: Option<String>,
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.success { "success" } else { "failed" };
        write!(
            f,
            "{} {}/{} actions in {}ms",
            status, self.actions_completed, self.actions_total, self.duration_ms
        )
    }
}

// ── Remediation Job ─────────────────────────────────────────────────

/// One execution of a [`RemediationPlan`], owned by the remediation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemediationJob {
    pub id: JobId,
    /// The anomaly this job remediates.
    pub issue_id: AnomalyId,
    pub plan_id: PlanId,
    /// Copy of the plan's actions, in execution order.
    pub actions: Vec<RemediationAction>,
    pub status: JobStatus,
    pub requires_approval: bool,
    /// Number of actions that succeeded before the job stopped.
    pub actions_completed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<ExecutionResult>,
}

impl RemediationJob {
    /// Create a pending job from a plan.
    pub fn from_plan(plan: &RemediationPlan) -> Self {
        Self {
            id: JobId::new(),
            issue_id: plan.anomaly_id.clone(),
            plan_id: plan.id.clone(),
            actions: plan.actions.clone(),
            status: JobStatus::Pending,
            requires_approval: plan.requires_approval,
            actions_completed: 0,
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    pub fn actions_total(&self) -> usize {
        self.actions.len()
    }

    /// Whether the job finished with every action succeeding.
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

impl std::fmt::Display for RemediationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Job({}, {}, {}/{})",
            self.id,
            self.status,
            self.actions_completed,
            self.actions_total()
        )
    }
}
