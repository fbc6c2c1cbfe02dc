//! Simulated fleet: a random CPU monitor and logging executors.
//!
//! Stands in for real probes and real side effects so the loop can be
//! watched end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autoheal_loop::{
    ActionTemplate, MapeKLoop, Monitor, RulePlanner, ThresholdAnalyzer, ThresholdRule,
};
use autoheal_remediation::ActionExecutor;
use autoheal_types::{
    HandlerError, HandlerResult, Parameters, RemediationStrategy, Severity, SystemMetric,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::SimulationConfig;

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Reports one `cpu_usage` metric per target, occasionally spiking.
pub struct SimulatedCpuMonitor {
    targets: Vec<String>,
    baseline: f64,
    spike_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedCpuMonitor {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            targets: config.targets.clone(),
            baseline: config.cpu_baseline,
            spike_probability: config.spike_probability,
            rng: Mutex::new(rng_from(config.seed)),
        }
    }

    fn sample(&self) -> Vec<SystemMetric> {
        let mut rng = self.rng.lock();
        self.targets
            .iter()
            .map(|target| {
                let value = if rng.gen_bool(self.spike_probability) {
                    rng.gen_range(85.0..100.0)
                } else {
                    (self.baseline + rng.gen_range(-10.0..10.0)).clamp(0.0, 100.0)
                };
                SystemMetric::new("cpu_usage", value, "percent").with_label("target", target)
            })
            .collect()
    }
}

#[async_trait]
impl Monitor for SimulatedCpuMonitor {
    async fn collect(&self) -> HandlerResult<Vec<SystemMetric>> {
        let metrics = self.sample();
        for metric in &metrics {
            debug!(metric = %metric, target = ?metric.label("target"), "Sampled");
        }
        Ok(metrics)
    }

    fn name(&self) -> &str {
        "simulated-cpu"
    }
}

/// Executor that logs the action, waits, and sometimes fails.
pub struct LoggingExecutor {
    strategy: RemediationStrategy,
    name: String,
    latency: Duration,
    failure_rate: f64,
    rng: Mutex<StdRng>,
}

impl LoggingExecutor {
    pub fn new(strategy: RemediationStrategy, config: &SimulationConfig) -> Self {
        Self {
            strategy,
            name: format!("logging-{}", strategy),
            latency: Duration::from_millis(config.executor_latency_ms),
            failure_rate: config.executor_failure_rate,
            rng: Mutex::new(rng_from(config.seed)),
        }
    }
}

#[async_trait]
impl ActionExecutor for LoggingExecutor {
    async fn execute(&self, target: &str, parameters: &Parameters) -> HandlerResult<Parameters> {
        info!(
            strategy = %self.strategy,
            target = %target,
            parameters = ?parameters,
            "Executing simulated remediation"
        );
        tokio::time::sleep(self.latency).await;

        let failed = self.rng.lock().gen_bool(self.failure_rate);
        if failed {
            return Err(HandlerError::failed(format!(
                "simulated {} of {} failed",
                self.strategy, target
            )));
        }

        let mut result = Parameters::new();
        result.insert("strategy".into(), serde_json::json!(self.strategy.to_string()));
        result.insert("target".into(), serde_json::json!(target));
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Register the simulated monitor, the reference analyzer and planner, and
/// one logging executor per strategy.
pub fn install(mapek: &MapeKLoop, config: &SimulationConfig) {
    mapek.register_monitor(Arc::new(SimulatedCpuMonitor::new(config)));

    mapek.register_analyzer(Arc::new(ThresholdAnalyzer::new(vec![
        ThresholdRule::above("cpu_usage", config.cpu_threshold, "high_cpu", Severity::Warning),
        ThresholdRule::above(
            "cpu_usage",
            config.saturation_threshold,
            "cpu_saturation",
            Severity::Critical,
        ),
    ])));

    let mut planner = RulePlanner::new("fleet")
        .with_rule(
            "high_cpu",
            vec![
                ActionTemplate::new(RemediationStrategy::Restart).with_timeout_secs(30),
                ActionTemplate::new(RemediationStrategy::Scale)
                    .with_timeout_secs(60)
                    .with_parameter("replicas", serde_json::json!(2)),
            ],
        )
        .with_rule(
            "cpu_saturation",
            vec![
                ActionTemplate::new(RemediationStrategy::Failover)
                    .with_timeout_secs(120)
                    .with_rollback(RemediationStrategy::Rollback),
                ActionTemplate::new(RemediationStrategy::Isolate).with_timeout_secs(30),
            ],
        );
    if config.approve_critical {
        planner = planner.require_approval_at(Severity::Critical);
    }
    mapek.register_planner(Arc::new(planner));

    for strategy in RemediationStrategy::all() {
        mapek.register_executor(*strategy, Arc::new(LoggingExecutor::new(*strategy, config)));
    }
}
