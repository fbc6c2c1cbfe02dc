//! Pluggable monitor, analyzer and planner handlers.
//!
//! Any number of each may be registered. Handlers are invoked on their
//! own tasks, so an error or a panic in one never reaches the others.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use autoheal_types::{Anomaly, HandlerResult, KnowledgeEntry, RemediationPlan, SystemMetric};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::info;

// ── Handler Traits ──────────────────────────────────────────────────

/// Collects metrics from the managed system.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn collect(&self) -> HandlerResult<Vec<SystemMetric>>;

    fn name(&self) -> &str {
        "monitor"
    }
}

/// Turns the merged metrics of one cycle into anomalies.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, metrics: &[SystemMetric]) -> HandlerResult<Vec<Anomaly>>;

    fn name(&self) -> &str {
        "analyzer"
    }
}

/// Proposes a plan for one anomaly, or `None` to defer to the next planner.
#[async_trait]
pub trait Planner: Send + Sync {
    /// `knowledge` is a read-only snapshot of the knowledge store.
    async fn plan(
        &self,
        anomaly: &Anomaly,
        knowledge: &[KnowledgeEntry],
    ) -> HandlerResult<Option<RemediationPlan>>;

    fn name(&self) -> &str {
        "planner"
    }
}

// ── Closure Adapters ────────────────────────────────────────────────

type MonitorFn = dyn Fn() -> BoxFuture<'static, HandlerResult<Vec<SystemMetric>>> + Send + Sync;
type AnalyzerFn =
    dyn Fn(Vec<SystemMetric>) -> BoxFuture<'static, HandlerResult<Vec<Anomaly>>> + Send + Sync;
type PlannerFn = dyn Fn(
        Anomaly,
        Vec<KnowledgeEntry>,
    ) -> BoxFuture<'static, HandlerResult<Option<RemediationPlan>>>
    + Send
    + Sync;

/// Monitor backed by an async closure.
pub struct FnMonitor {
    name: String,
    f: Box<MonitorFn>,
}

impl FnMonitor {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Vec<SystemMetric>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move || Box::pin(f())),
        }
    }
}

#[async_trait]
impl Monitor for FnMonitor {
    async fn collect(&self) -> HandlerResult<Vec<SystemMetric>> {
        (self.f)().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Analyzer backed by an async closure receiving a copy of the metrics.
pub struct FnAnalyzer {
    name: String,
    f: Box<AnalyzerFn>,
}

impl FnAnalyzer {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<SystemMetric>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Vec<Anomaly>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |metrics| Box::pin(f(metrics))),
        }
    }
}

#[async_trait]
impl Analyzer for FnAnalyzer {
    async fn analyze(&self, metrics: &[SystemMetric]) -> HandlerResult<Vec<Anomaly>> {
        (self.f)(metrics.to_vec()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Planner backed by an async closure receiving copies of its inputs.
pub struct FnPlanner {
    name: String,
    f: Box<PlannerFn>,
}

impl FnPlanner {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Anomaly, Vec<KnowledgeEntry>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<RemediationPlan>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |anomaly, knowledge| Box::pin(f(anomaly, knowledge))),
        }
    }
}

#[async_trait]
impl Planner for FnPlanner {
    async fn plan(
        &self,
        anomaly: &Anomaly,
        knowledge: &[KnowledgeEntry],
    ) -> HandlerResult<Option<RemediationPlan>> {
        (self.f)(anomaly.clone(), knowledge.to_vec()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Registered monitors, analyzers and planners, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    monitors: RwLock<Vec<Arc<dyn Monitor>>>,
    analyzers: RwLock<Vec<Arc<dyn Analyzer>>>,
    planners: RwLock<Vec<Arc<dyn Planner>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_monitor(&self, monitor: Arc<dyn Monitor>) {
        info!(monitor = monitor.name(), "Registering monitor");
        self.monitors.write().push(monitor);
    }

    pub fn register_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        info!(analyzer = analyzer.name(), "Registering analyzer");
        self.analyzers.write().push(analyzer);
    }

    pub fn register_planner(&self, planner: Arc<dyn Planner>) {
        info!(planner = planner.name(), "Registering planner");
        self.planners.write().push(planner);
    }

    pub fn monitors(&self) -> Vec<Arc<dyn Monitor>> {
        self.monitors.read().clone()
    }

    pub fn analyzers(&self) -> Vec<Arc<dyn Analyzer>> {
        self.analyzers.read().clone()
    }

    pub fn planners(&self) -> Vec<Arc<dyn Planner>> {
        self.planners.read().clone()
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.read().len()
    }

    pub fn analyzer_count(&self) -> usize {
        self.analyzers.read().len()
    }

    pub fn planner_count(&self) -> usize {
        self.planners.read().len()
    }
}
