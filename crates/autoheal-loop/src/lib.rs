//! # Autoheal Loop - Autonomic MAPE-K Control
//!
//! A [`MapeKLoop`] periodically collects metrics from registered
//! [`Monitor`]s, hands them to [`Analyzer`]s, asks [`Planner`]s for a
//! remediation plan per anomaly, runs the plans on its
//! [`RemediationEngine`](autoheal_remediation::RemediationEngine) and
//! records every outcome in a bounded [`KnowledgeStore`].
//!
//! ```text
//! Idle → Monitoring → Analyzing ─┬─→ Idle                  (no anomalies)
//!                                └─→ Planning → Executing → Learning → Idle
//! ```
//!
//! ## Guarantees
//!
//! - handler failures (errors and panics) stay inside their phase
//! - planners are asked in registration order; the first plan wins
//! - plans requiring approval are held as pending jobs and never executed
//! - jobs of one cycle run concurrently; actions of one job run in order
//! - a cycle never starts before the previous one has finished learning
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use autoheal_loop::{
//!     ActionTemplate, FnMonitor, LoopConfig, MapeKLoop, RulePlanner, ThresholdAnalyzer,
//!     ThresholdRule,
//! };
//! use autoheal_remediation::NoOpExecutor;
//! use autoheal_types::{RemediationStrategy, Severity, SystemMetric};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mapek = Arc::new(MapeKLoop::new(LoopConfig::default())?);
//!
//! mapek.register_monitor(Arc::new(FnMonitor::new("cpu", || async {
//!     Ok(vec![SystemMetric::new("cpu_usage", 95.0, "percent")])
//! })));
//! mapek.register_analyzer(Arc::new(ThresholdAnalyzer::new(vec![
//!     ThresholdRule::above("cpu_usage", 80.0, "high_cpu", Severity::Warning),
//! ])));
//! mapek.register_planner(Arc::new(RulePlanner::new("web").with_rule(
//!     "high_cpu",
//!     vec![ActionTemplate::new(RemediationStrategy::Restart).with_timeout_secs(10)],
//! )));
//! mapek.register_executor(RemediationStrategy::Restart, Arc::new(NoOpExecutor));
//!
//! let handle = mapek.start()?;
//! // ...
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod builtin;
pub mod config;
pub mod control_loop;
pub mod error;
pub mod events;
pub mod handlers;
pub mod knowledge;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use builtin::{ActionTemplate, Comparison, RulePlanner, ThresholdAnalyzer, ThresholdRule};
pub use config::LoopConfig;
pub use control_loop::{LoopHandle, MapeKLoop};
pub use error::{LoopError, LoopResult};
pub use events::LoopEvent;
pub use handlers::{
    Analyzer, FnAnalyzer, FnMonitor, FnPlanner, HandlerRegistry, Monitor, Planner,
};
pub use knowledge::{entries_for, success_rate, KnowledgeStore};
pub use state::{CycleId, CycleRecord, LoopState, LoopStats, LoopStatus};
