//! # Autoheal Types - Shared Data Model
//!
//! Plain data records passed between the MAPE-K loop, its pluggable
//! handlers and the remediation engine.
//!
//! - [`SystemMetric`]: a single observation produced by a monitor
//! - [`Anomaly`]: a detected problem, produced by an analyzer
//! - [`RemediationPlan`] / [`RemediationAction`]: what a planner wants done
//! - [`RemediationJob`] / [`ExecutionResult`]: what the engine actually did
//! - [`KnowledgeEntry`]: one learned outcome kept by the knowledge store
//!
//! All records are value objects: they are cloned across task boundaries
//! and never mutated after being handed to another phase.

#![deny(unsafe_code)]

pub mod action;
pub mod error;
pub mod ids;
pub mod job;
pub mod knowledge;
pub mod metric;

// ── Re-exports ──────────────────────────────────────────────────────

pub use action::{
    CompensatingAction, Parameters, RemediationAction, RemediationPlan, RemediationStrategy,
    RiskLevel,
};
pub use error::{HandlerError, HandlerResult};
pub use ids::{ActionId, AnomalyId, JobId, PlanId};
pub use job::{ExecutionResult, JobStatus, RemediationJob};
pub use knowledge::KnowledgeEntry;
pub use metric::{Anomaly, Severity, SystemMetric};

#[doc(hidden)]
pub mod __private {
    pub use uuid;
}
