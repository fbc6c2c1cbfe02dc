//! The MAPE-K loop: Monitor → Analyze → Plan → Execute → Learn.
//!
//! Each cycle walks the state machine
//! `Idle → Monitoring → Analyzing → (Idle | Planning → Executing → Learning → Idle)`.
//! Handlers of one phase run concurrently on their own tasks; a handler
//! that errors or panics is logged, reported as [`LoopEvent::HandlerFailed`]
//! and otherwise ignored. Cycles never overlap: the periodic task and
//! [`MapeKLoop::run_cycle`] callers share one guard.

use std::collections::VecDeque;
use std::sync::Arc;

use autoheal_remediation::{ActionExecutor, RemediationEngine};
use autoheal_types::{
    Anomaly, HandlerResult, JobId, JobStatus, KnowledgeEntry, RemediationJob, RemediationPlan,
    RemediationStrategy, SystemMetric,
};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::LoopConfig;
use crate::error::{LoopError, LoopResult};
use crate::events::LoopEvent;
use crate::handlers::{Analyzer, HandlerRegistry, Monitor, Planner};
use crate::knowledge::KnowledgeStore;
use crate::state::{CycleRecord, LoopState, LoopStats, LoopStatus};

/// A plan produced for one anomaly of the current cycle.
struct Planned {
    anomaly: Anomaly,
    plan: RemediationPlan,
}

/// A finished job together with what it was planned for.
struct Outcome {
    anomaly: Anomaly,
    plan: RemediationPlan,
    job: RemediationJob,
}

/// A handler failure collected off-task, reported by the loop.
struct Failure {
    handler: String,
    reason: String,
}

/// Autonomic control loop owning its handlers, knowledge and remediation engine.
pub struct MapeKLoop {
    config: LoopConfig,
    handlers: HandlerRegistry,
    engine: Arc<RemediationEngine>,
    knowledge: RwLock<KnowledgeStore>,
    state: RwLock<LoopState>,
    cycle_guard: tokio::sync::Mutex<()>,
    history: Mutex<VecDeque<CycleRecord>>,
    stats: Mutex<LoopStats>,
    event_tx: broadcast::Sender<LoopEvent>,
    /// Trigger channel of the running periodic task, `None` when stopped.
    control: Mutex<Option<mpsc::Sender<()>>>,
}

impl MapeKLoop {
    pub fn new(config: LoopConfig) -> LoopResult<Self> {
        config.validate()?;

        let engine = Arc::new(RemediationEngine::new(config.engine_config()));
        let (event_tx, _) = broadcast::channel(config.event_buffer);

        Ok(Self {
            knowledge: RwLock::new(KnowledgeStore::new(config.max_knowledge_entries)),
            history: Mutex::new(VecDeque::with_capacity(config.max_cycle_history.min(1024))),
            config,
            handlers: HandlerRegistry::new(),
            engine,
            state: RwLock::new(LoopState::Idle),
            cycle_guard: tokio::sync::Mutex::new(()),
            stats: Mutex::new(LoopStats::default()),
            event_tx,
            control: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    // ── Registration ────────────────────────────────────────────────

    pub fn register_monitor(&self, monitor: Arc<dyn Monitor>) {
        self.handlers.register_monitor(monitor);
    }

    pub fn register_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        self.handlers.register_analyzer(analyzer);
    }

    pub fn register_planner(&self, planner: Arc<dyn Planner>) {
        self.handlers.register_planner(planner);
    }

    /// Bind the executor for `strategy`, replacing any previous one.
    pub fn register_executor(
        &self,
        strategy: RemediationStrategy,
        executor: Arc<dyn ActionExecutor>,
    ) {
        if self.engine.register_executor(strategy, executor).is_some() {
            debug!(strategy = %strategy, "Replaced existing executor");
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.event_tx.subscribe()
    }

    pub fn get_state(&self) -> LoopStatus {
        LoopStatus {
            state: *self.state.read(),
            knowledge_entries: self.knowledge.read().len(),
            monitors: self.handlers.monitor_count(),
            analyzers: self.handlers.analyzer_count(),
            planners: self.handlers.planner_count(),
            executors: self.engine.executors().len(),
        }
    }

    pub fn get_job(&self, id: &JobId) -> Option<RemediationJob> {
        self.engine.get_job(id)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Vec<RemediationJob> {
        self.engine.list_jobs(status)
    }

    /// Run a job held for approval. Its outcome is not written to knowledge.
    pub async fn approve(&self, job_id: &JobId) -> LoopResult<RemediationJob> {
        Ok(self.engine.approve(job_id).await?)
    }

    /// Copy of the knowledge store, oldest entry first.
    pub fn knowledge_snapshot(&self) -> Vec<KnowledgeEntry> {
        self.knowledge.read().snapshot()
    }

    /// Most recent cycle records, oldest first.
    pub fn cycle_history(&self) -> Vec<CycleRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats.lock().clone()
    }

    pub fn engine(&self) -> &Arc<RemediationEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.control.lock().is_some()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Spawn the periodic loop. The first cycle starts immediately.
    ///
    /// Dropping the returned handle stops the loop the same way
    /// [`LoopHandle::stop`] does, without waiting for it.
    pub fn start(self: &Arc<Self>) -> LoopResult<LoopHandle> {
        let mut control = self.control.lock();
        if control.is_some() {
            return Err(LoopError::AlreadyRunning);
        }

        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        *control = Some(trigger_tx);
        drop(control);

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = interval(this.config.cycle_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                interval_secs = this.config.cycle_interval_secs,
                "MAPE-K loop started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        this.run_cycle().await;
                    }
                    Some(()) = trigger_rx.recv() => {
                        debug!("Running triggered cycle");
                        this.run_cycle().await;
                    }
                }
            }

            *this.control.lock() = None;
            info!("MAPE-K loop stopped");
        });

        Ok(LoopHandle {
            shutdown: shutdown_tx,
            task,
        })
    }

    /// Ask the running loop to start a cycle now. At most one request is queued.
    pub fn trigger(&self) -> LoopResult<()> {
        let control = self.control.lock();
        let tx = control.as_ref().ok_or(LoopError::NotRunning)?;
        if let Err(mpsc::error::TrySendError::Full(())) = tx.try_send(()) {
            debug!("Cycle already queued");
        }
        Ok(())
    }

    // ── Cycle ───────────────────────────────────────────────────────

    /// Run one complete cycle, waiting for any in-flight cycle first.
    #[instrument(skip(self), fields(cycle_id = tracing::field::Empty))]
    pub async fn run_cycle(&self) -> CycleRecord {
        let _guard = self.cycle_guard.lock().await;

        let mut record = CycleRecord::begin();
        tracing::Span::current().record("cycle_id", tracing::field::display(&record.id));

        self.transition(&mut record, LoopState::Monitoring);
        let metrics = self.monitor(&mut record).await;

        self.transition(&mut record, LoopState::Analyzing);
        let anomalies = self.analyze(&mut record, metrics).await;

        if anomalies.is_empty() {
            self.transition(&mut record, LoopState::Idle);
            return self.finish(record);
        }

        self.transition(&mut record, LoopState::Planning);
        let planned = self.plan(&mut record, anomalies).await;

        self.transition(&mut record, LoopState::Executing);
        let outcomes = self.execute(&mut record, planned).await;

        self.transition(&mut record, LoopState::Learning);
        self.learn(&mut record, &outcomes);

        self.transition(&mut record, LoopState::Idle);
        self.finish(record)
    }

    async fn monitor(&self, record: &mut CycleRecord) -> Vec<SystemMetric> {
        let monitors = self.handlers.monitors();
        let names: Vec<String> = monitors.iter().map(|m| m.name().to_string()).collect();
        let tasks = monitors
            .into_iter()
            .map(|monitor| tokio::spawn(async move { monitor.collect().await }));
        let results = join_all(tasks).await;

        let mut metrics = Vec::new();
        for (name, joined) in names.into_iter().zip(results) {
            match settle(joined) {
                Ok(collected) => {
                    debug!(monitor = %name, count = collected.len(), "Monitor collected metrics");
                    metrics.extend(collected);
                }
                Err(reason) => self.handler_failed(record, LoopState::Monitoring, name, reason),
            }
        }

        record.metrics_collected = metrics.len();
        metrics
    }

    async fn analyze(&self, record: &mut CycleRecord, metrics: Vec<SystemMetric>) -> Vec<Anomaly> {
        let metrics = Arc::new(metrics);
        let analyzers = self.handlers.analyzers();
        let names: Vec<String> = analyzers.iter().map(|a| a.name().to_string()).collect();
        let tasks = analyzers.into_iter().map(|analyzer| {
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move { analyzer.analyze(&metrics).await })
        });
        let results = join_all(tasks).await;

        let mut anomalies = Vec::new();
        for (name, joined) in names.into_iter().zip(results) {
            let detected = match settle(joined) {
                Ok(detected) => detected,
                Err(reason) => {
                    self.handler_failed(record, LoopState::Analyzing, name, reason);
                    continue;
                }
            };

            for anomaly in detected {
                // Anomalies may only cite metrics collected in this cycle.
                let foreign = anomaly
                    .metrics
                    .iter()
                    .find(|m| !metrics.iter().any(|c| c.same_reading(m)));
                if let Some(foreign) = foreign {
                    let reason = format!(
                        "anomaly {} cites metric '{}' not collected this cycle",
                        anomaly.id, foreign.name
                    );
                    self.handler_failed(record, LoopState::Analyzing, name.clone(), reason);
                    continue;
                }

                info!(
                    anomaly_id = %anomaly.id,
                    anomaly_type = %anomaly.anomaly_type,
                    severity = %anomaly.severity,
                    analyzer = %name,
                    "Anomaly detected"
                );
                self.emit(LoopEvent::AnomalyDetected {
                    cycle_id: record.id.clone(),
                    anomaly: Box::new(anomaly.clone()),
                });
                anomalies.push(anomaly);
            }
        }

        record.anomalies_detected = anomalies.len();
        anomalies
    }

    async fn plan(&self, record: &mut CycleRecord, anomalies: Vec<Anomaly>) -> Vec<Planned> {
        let planners = self.handlers.planners();
        let knowledge = Arc::new(self.knowledge.read().snapshot());

        let tasks = anomalies.into_iter().map(|anomaly| {
            let planners = planners.clone();
            let knowledge = Arc::clone(&knowledge);
            async move {
                let (plan, failures) = dispatch_planners(&anomaly, planners, knowledge).await;
                (anomaly, plan, failures)
            }
        });

        let mut planned = Vec::new();
        for (anomaly, plan, failures) in join_all(tasks).await {
            for failure in failures {
                self.handler_failed(record, LoopState::Planning, failure.handler, failure.reason);
            }
            match plan {
                Some(plan) => planned.push(Planned { anomaly, plan }),
                None => debug!(anomaly_id = %anomaly.id, "No planner produced a plan"),
            }
        }

        record.plans_produced = planned.len();
        planned
    }

    async fn execute(&self, record: &mut CycleRecord, planned: Vec<Planned>) -> Vec<Outcome> {
        let mut running = Vec::new();

        for Planned { anomaly, plan } in planned {
            if plan.requires_approval {
                let job = self.engine.hold_for_approval(&plan);
                record.plans_skipped += 1;
                record.held_jobs.push(job.id.clone());
                self.emit(LoopEvent::PlanSkipped {
                    cycle_id: record.id.clone(),
                    plan_id: plan.id.clone(),
                    job_id: job.id,
                });
                continue;
            }

            let engine = Arc::clone(&self.engine);
            let submitted = plan.clone();
            let handle = tokio::spawn(async move { engine.execute_plan(&submitted).await });
            running.push((anomaly, plan, handle));
        }

        let (meta, handles): (Vec<_>, Vec<_>) = running
            .into_iter()
            .map(|(anomaly, plan, handle)| ((anomaly, plan), handle))
            .unzip();
        let results = join_all(handles).await;

        let mut outcomes = Vec::new();
        for ((anomaly, plan), joined) in meta.into_iter().zip(results) {
            let job = match joined {
                Ok(Ok(job)) => job,
                Ok(Err(e)) => {
                    warn!(plan_id = %plan.id, error = %e, "Plan was not executed");
                    continue;
                }
                Err(e) => {
                    warn!(plan_id = %plan.id, error = %e, "Remediation task aborted");
                    continue;
                }
            };

            record.jobs.push(job.id.clone());
            if !job.succeeded() {
                record.jobs_failed += 1;
            }
            self.emit(LoopEvent::JobFinished {
                cycle_id: record.id.clone(),
                job: Box::new(job.clone()),
            });
            outcomes.push(Outcome { anomaly, plan, job });
        }

        outcomes
    }

    fn learn(&self, record: &mut CycleRecord, outcomes: &[Outcome]) {
        let mut knowledge = self.knowledge.write();
        for outcome in outcomes {
            if let Some(result) = &outcome.job.result {
                knowledge.append(KnowledgeEntry::record(&outcome.anomaly, &outcome.plan, result));
                record.knowledge_recorded += 1;
            }
        }
        debug!(
            recorded = record.knowledge_recorded,
            total = knowledge.len(),
            "Knowledge updated"
        );
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn transition(&self, record: &mut CycleRecord, to: LoopState) {
        let from = std::mem::replace(&mut *self.state.write(), to);
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");

        record.states.push(to);
        info!(cycle_id = %record.id, from = %from, to = %to, "Loop state changed");
        self.emit(LoopEvent::StateChanged {
            cycle_id: record.id.clone(),
            from,
            to,
        });
    }

    fn handler_failed(
        &self,
        record: &mut CycleRecord,
        phase: LoopState,
        handler: String,
        reason: String,
    ) {
        let error = LoopError::HandlerFailure {
            phase,
            handler: handler.clone(),
            reason: reason.clone(),
        };
        warn!(cycle_id = %record.id, error = %error, "Handler failure isolated");

        record.handler_failures += 1;
        self.emit(LoopEvent::HandlerFailed {
            cycle_id: record.id.clone(),
            phase,
            handler,
            reason,
        });
    }

    fn finish(&self, mut record: CycleRecord) -> CycleRecord {
        record.completed_at = Some(Utc::now());
        info!(
            cycle_id = %record.id,
            metrics = record.metrics_collected,
            anomalies = record.anomalies_detected,
            jobs = record.jobs.len(),
            failed = record.jobs_failed,
            skipped = record.plans_skipped,
            "Cycle completed"
        );

        self.stats.lock().absorb(&record);
        {
            let mut history = self.history.lock();
            history.push_back(record.clone());
            while history.len() > self.config.max_cycle_history {
                history.pop_front();
            }
        }

        self.emit(LoopEvent::CycleCompleted(Box::new(record.clone())));
        record
    }

    fn emit(&self, event: LoopEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

/// Ask planners in registration order until one returns a plan for `anomaly`.
#[instrument(skip_all, fields(anomaly_id = %anomaly.id, planners = planners.len()))]
async fn dispatch_planners(
    anomaly: &Anomaly,
    planners: Vec<Arc<dyn Planner>>,
    knowledge: Arc<Vec<KnowledgeEntry>>,
) -> (Option<RemediationPlan>, Vec<Failure>) {
    let mut failures = Vec::new();

    for planner in planners {
        let name = planner.name().to_string();
        let owned = anomaly.clone();
        let knowledge = Arc::clone(&knowledge);
        let joined = tokio::spawn(async move { planner.plan(&owned, &knowledge).await }).await;

        match settle(joined) {
            Ok(Some(plan)) if plan.anomaly_id == anomaly.id => {
                debug!(planner = %name, plan_id = %plan.id, "Plan selected");
                return (Some(plan), failures);
            }
            Ok(Some(plan)) => failures.push(Failure {
                handler: name,
                reason: format!(
                    "plan {} targets anomaly {}, expected {}",
                    plan.id, plan.anomaly_id, anomaly.id
                ),
            }),
            Ok(None) => debug!(planner = %name, "Planner deferred"),
            Err(reason) => failures.push(Failure {
                handler: name,
                reason,
            }),
        }
    }

    (None, failures)
}

/// Flatten a spawned handler call into its value or a failure reason.
fn settle<T>(joined: Result<HandlerResult<T>, JoinError>) -> Result<T, String> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err("handler panicked".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

// ── Loop Handle ─────────────────────────────────────────────────────

/// Handle to the periodic loop task returned by [`MapeKLoop::start`].
pub struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Request a graceful stop and wait for the in-flight cycle to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "MAPE-K loop task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl std::fmt::Debug for MapeKLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapeKLoop")
            .field("state", &*self.state.read())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
