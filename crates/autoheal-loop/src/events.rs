//! Events broadcast by the loop.

use autoheal_types::{Anomaly, JobId, PlanId, RemediationJob};

use crate::state::{CycleId, CycleRecord, LoopState};

/// Events emitted while the loop runs. Subscribe with `MapeKLoop::subscribe`.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// The state machine moved.
    StateChanged {
        cycle_id: CycleId,
        from: LoopState,
        to: LoopState,
    },

    /// A monitor, analyzer or planner failed; the cycle continued.
    HandlerFailed {
        cycle_id: CycleId,
        phase: LoopState,
        handler: String,
        reason: String,
    },

    AnomalyDetected {
        cycle_id: CycleId,
        anomaly: Box<Anomaly>,
    },

    /// A plan required approval and was held as a pending job.
    PlanSkipped {
        cycle_id: CycleId,
        plan_id: PlanId,
        job_id: JobId,
    },

    /// A remediation job reached a terminal state.
    JobFinished {
        cycle_id: CycleId,
        job: Box<RemediationJob>,
    },

    CycleCompleted(Box<CycleRecord>),
}
