//! Logs loop events as they are broadcast.

use autoheal_loop::LoopEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

/// Log events until the loop is dropped. Returns the number of events seen.
pub async fn report(mut events: broadcast::Receiver<LoopEvent>) -> u64 {
    let mut seen = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                seen += 1;
                log_event(&event);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event reporter lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    seen
}

fn log_event(event: &LoopEvent) {
    match event {
        LoopEvent::PlanSkipped {
            plan_id, job_id, ..
        } => {
            warn!(plan_id = %plan_id, job_id = %job_id, "Remediation awaiting approval");
        }
        LoopEvent::JobFinished { job, .. } => match &job.result {
            Some(result) if result.success => {
                info!(job_id = %job.id, result = %result, "Remediation succeeded");
            }
            Some(result) => warn!(
                job_id = %job.id,
                error = result.error.as_deref().unwrap_or("unknown"),
                rolled_back = result.rollback_attempted,
                "Remediation failed"
            ),
            None => warn!(job_id = %job.id, "Remediation finished without a result"),
        },
        LoopEvent::CycleCompleted(record) if record.remediated() => {
            info!(cycle = %record, "Remediation cycle finished");
        }
        _ => {}
    }
}
