//! # Autoheal Remediation - Executing Corrective Actions
//!
//! The [`RemediationEngine`] turns a [`RemediationPlan`](autoheal_types::RemediationPlan)
//! into a [`RemediationJob`](autoheal_types::RemediationJob) and runs it:
//!
//! - actions run strictly in plan order
//! - every action is bounded by its own timeout (default 60s)
//! - the first failure aborts the job (fail-fast)
//! - the failing action's compensating action runs once, best-effort
//!
//! This is single-action compensation, not a saga: actions that already
//! succeeded are left as they are unless the planner attached their own
//! compensation. Nothing here is retried.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use autoheal_remediation::{EngineConfig, NoOpExecutor, RemediationEngine};
//! use autoheal_types::{AnomalyId, RemediationAction, RemediationPlan, RemediationStrategy};
//!
//! # async fn example() {
//! let engine = RemediationEngine::new(EngineConfig::default());
//! engine.register_executor(RemediationStrategy::Restart, Arc::new(NoOpExecutor));
//!
//! let plan = RemediationPlan::new(
//!     AnomalyId::new(),
//!     vec![RemediationAction::new(RemediationStrategy::Restart, "web-1").with_timeout_secs(10)],
//! );
//! let job = engine.execute_plan(&plan).await.unwrap();
//! println!("{}", job);
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod jobs;

pub use config::EngineConfig;
pub use engine::RemediationEngine;
pub use error::{RemediationError, RemediationResult};
pub use executor::{ActionExecutor, ExecutorRegistry, FnExecutor, NoOpExecutor};
pub use jobs::JobRegistry;
