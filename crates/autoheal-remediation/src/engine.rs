//! Remediation engine: turns a plan into a job and runs it.
//!
//! Actions run strictly in order. The first failing action (handler error,
//! panic, timeout or missing handler) stops the job: its compensating
//! action, if any, is invoked once and best-effort, and the job is marked
//! `Failed`. Actions that already succeeded are not unwound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use autoheal_types::{
    ActionId, CompensatingAction, ExecutionResult, JobId, JobStatus, Parameters,
    RemediationAction, RemediationJob, RemediationPlan, RemediationStrategy,
};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{RemediationError, RemediationResult};
use crate::executor::{ActionExecutor, ExecutorRegistry};
use crate::jobs::JobRegistry;

/// Executes remediation jobs against registered executor handlers.
pub struct RemediationEngine {
    config: EngineConfig,
    executors: ExecutorRegistry,
    jobs: JobRegistry,
}

impl RemediationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let jobs = JobRegistry::new(config.max_retained_jobs);
        Self {
            config,
            executors: ExecutorRegistry::new(),
            jobs,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bind an executor to a strategy, replacing any previous binding.
    pub fn register_executor(
        &self,
        strategy: RemediationStrategy,
        executor: Arc<dyn ActionExecutor>,
    ) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.register(strategy, executor)
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    pub fn get_job(&self, id: &JobId) -> Option<RemediationJob> {
        self.jobs.get(id)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Vec<RemediationJob> {
        self.jobs.list(status)
    }

    /// Register a pending job for a plan that needs approval. No executor is
    /// invoked; [`approve`](Self::approve) runs it later.
    pub fn hold_for_approval(&self, plan: &RemediationPlan) -> RemediationJob {
        let job = RemediationJob::from_plan(plan);
        info!(
            job_id = %job.id,
            plan_id = %plan.id,
            anomaly_id = %plan.anomaly_id,
            "Plan requires approval, holding job"
        );
        self.jobs.upsert(job.clone());
        job
    }

    /// Create a job for `plan` and run it.
    ///
    /// Plans that require approval are held instead and reported as
    /// [`RemediationError::ApprovalRequired`].
    pub async fn execute_plan(&self, plan: &RemediationPlan) -> RemediationResult<RemediationJob> {
        if plan.requires_approval {
            let job = self.hold_for_approval(plan);
            return Err(RemediationError::ApprovalRequired(job.id));
        }
        self.execute(RemediationJob::from_plan(plan)).await
    }

    /// Run a held job after external approval.
    ///
    /// The job is claimed before anything runs, so concurrent approvals of
    /// the same job execute it at most once.
    pub async fn approve(&self, job_id: &JobId) -> RemediationResult<RemediationJob> {
        let job = self.jobs.claim_for_approval(job_id)?;
        info!(job_id = %job_id, "Job approved");
        Ok(self.run(job).await)
    }

    /// Run a pending job to completion and return it.
    ///
    /// Action failures do not surface as `Err`: they end the job with
    /// status `Failed` and are described in `job.result`. `Err` is only
    /// returned when the job is not pending.
    pub async fn execute(&self, job: RemediationJob) -> RemediationResult<RemediationJob> {
        if job.status != JobStatus::Pending {
            return Err(RemediationError::InvalidJobState {
                job_id: job.id,
                status: job.status,
            });
        }
        Ok(self.run(job).await)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, actions = job.actions.len()))]
    async fn run(&self, mut job: RemediationJob) -> RemediationJob {
        let clock = Instant::now();
        job.status = JobStatus::InProgress;
        job.started_at.get_or_insert_with(Utc::now);
        job.actions_completed = 0;
        self.jobs.upsert(job.clone());

        info!(job_id = %job.id, issue_id = %job.issue_id, "Starting remediation job");

        let mut failure = None;
        let mut rollback_attempted = false;
        let mut rollback_error = None;

        for (index, action) in job.actions.iter().enumerate() {
            debug!(job_id = %job.id, index, action = %action, "Running action");

            match self.run_action(action).await {
                Ok(_) => job.actions_completed += 1,
                Err(e) => {
                    warn!(job_id = %job.id, index, action = %action, error = %e, "Action failed");

                    if let Some(rollback) = &action.rollback_action {
                        rollback_attempted = true;
                        if let Err(rb) = self.compensate(rollback).await {
                            warn!(job_id = %job.id, error = %rb, "Compensating action failed");
                            rollback_error = Some(rb.to_string());
                        }
                    }

                    failure = Some(e);
                    break;
                }
            }
        }

        job.status = if failure.is_none() {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        job.completed_at = Some(Utc::now());
        job.result = Some(ExecutionResult {
            plan_id: job.plan_id.clone(),
            success: failure.is_none(),
            actions_completed: job.actions_completed,
            actions_total: job.actions_total(),
            duration_ms: clock.elapsed().as_millis() as u64,
            error: failure.map(|e| e.to_string()),
            rollback_attempted,
            rollback_error,
        });
        self.jobs.upsert(job.clone());

        info!(
            job_id = %job.id,
            status = %job.status,
            completed = job.actions_completed,
            total = job.actions_total(),
            "Remediation job finished"
        );

        job
    }

    async fn run_action(&self, action: &RemediationAction) -> RemediationResult<Parameters> {
        let timeout = action.effective_timeout(self.config.default_action_timeout());
        self.invoke(
            &action.id,
            action.strategy,
            &action.target,
            &action.parameters,
            timeout,
        )
        .await
    }

    /// Single attempt, never retried.
    async fn compensate(&self, rollback: &CompensatingAction) -> RemediationResult<Parameters> {
        info!(
            action_id = %rollback.id,
            strategy = %rollback.strategy,
            target = %rollback.target,
            "Invoking compensating action"
        );
        let timeout = rollback.effective_timeout(self.config.default_action_timeout());
        self.invoke(
            &rollback.id,
            rollback.strategy,
            &rollback.target,
            &rollback.parameters,
            timeout,
        )
        .await
    }

    /// Invoke the handler bound to `strategy` on its own task, bounded by
    /// `timeout`. The task is aborted when the timeout fires.
    async fn invoke(
        &self,
        action_id: &ActionId,
        strategy: RemediationStrategy,
        target: &str,
        parameters: &Parameters,
        timeout: Duration,
    ) -> RemediationResult<Parameters> {
        let executor = self
            .executors
            .get(strategy)
            .ok_or(RemediationError::NoHandlerFound { strategy })?;

        let target = target.to_string();
        let parameters = parameters.clone();
        let mut handle =
            tokio::spawn(async move { executor.execute(&target, &parameters).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(RemediationError::ExecutionFailure {
                action_id: action_id.clone(),
                reason: e.to_string(),
            }),
            Ok(Err(join_error)) => Err(RemediationError::ExecutionFailure {
                action_id: action_id.clone(),
                reason: format!("executor task aborted: {}", join_error),
            }),
            Err(_) => {
                handle.abort();
                Err(RemediationError::ExecutionTimeout {
                    action_id: action_id.clone(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }
}

impl Default for RemediationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
