//! Loop states, cycle records and status snapshots.

use autoheal_types::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Loop State ──────────────────────────────────────────────────────

/// States of the MAPE-K state machine.
///
/// A cycle always follows
/// `Idle → Monitoring → Analyzing → (Idle | Planning → Executing → Learning → Idle)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    #[default]
    Idle,
    Monitoring,
    Analyzing,
    Planning,
    Executing,
    Learning,
}

impl LoopState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Idle, Monitoring)
                | (Monitoring, Analyzing)
                | (Analyzing, Idle)
                | (Analyzing, Planning)
                | (Planning, Executing)
                | (Executing, Learning)
                | (Learning, Idle)
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Analyzing => write!(f, "analyzing"),
            Self::Planning => write!(f, "planning"),
            Self::Executing => write!(f, "executing"),
            Self::Learning => write!(f, "learning"),
        }
    }
}

// ── Cycle Record ────────────────────────────────────────────────────

autoheal_types::string_id!(
    /// Unique identifier for one loop cycle.
    CycleId,
    "cycle"
);

/// What happened during one cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CycleRecord {
    pub id: CycleId,
    /// Every state visited, starting and ending with `Idle`.
    pub states: Vec<LoopState>,
    pub metrics_collected: usize,
    pub anomalies_detected: usize,
    pub plans_produced: usize,
    /// Plans held for approval instead of being executed.
    pub plans_skipped: usize,
    /// Jobs executed this cycle.
    pub jobs: Vec<JobId>,
    /// Pending jobs created for plans requiring approval.
    pub held_jobs: Vec<JobId>,
    pub jobs_failed: usize,
    pub knowledge_recorded: usize,
    pub handler_failures: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CycleRecord {
    pub(crate) fn begin() -> Self {
        Self {
            id: CycleId::new(),
            states: vec![LoopState::Idle],
            metrics_collected: 0,
            anomalies_detected: 0,
            plans_produced: 0,
            plans_skipped: 0,
            jobs: Vec::new(),
            held_jobs: Vec::new(),
            jobs_failed: 0,
            knowledge_recorded: 0,
            handler_failures: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the cycle went past analysis.
    pub fn remediated(&self) -> bool {
        self.states.contains(&LoopState::Planning)
    }
}

impl std::fmt::Display for CycleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cycle({}, metrics={}, anomalies={}, jobs={}, skipped={})",
            self.id,
            self.metrics_collected,
            self.anomalies_detected,
            self.jobs.len(),
            self.plans_skipped
        )
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Snapshot returned by `get_state()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStatus {
    pub state: LoopState,
    pub knowledge_entries: usize,
    pub monitors: usize,
    pub analyzers: usize,
    pub planners: usize,
    pub executors: usize,
}

/// Running totals across all cycles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub cycles: u64,
    pub anomalies: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub plans_skipped: u64,
    pub handler_failures: u64,
}

impl LoopStats {
    pub(crate) fn absorb(&mut self, record: &CycleRecord) {
        self.cycles += 1;
        self.anomalies += record.anomalies_detected as u64;
        self.jobs_failed += record.jobs_failed as u64;
        self.jobs_completed += (record.jobs.len() - record.jobs_failed) as u64;
        self.plans_skipped += record.plans_skipped as u64;
        self.handler_failures += record.handler_failures as u64;
    }
}
