//! Failures stay where they happen: in one handler or in one job.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use autoheal_loop::{
    ActionTemplate, FnAnalyzer, FnMonitor, LoopConfig, LoopEvent, LoopState, MapeKLoop,
    RulePlanner, ThresholdAnalyzer, ThresholdRule,
};
use autoheal_remediation::{FnExecutor, NoOpExecutor};
use autoheal_types::{
    HandlerError, JobId, JobStatus, Parameters, RemediationStrategy, Severity, SystemMetric,
};

fn threshold_analyzer() -> Arc<ThresholdAnalyzer> {
    Arc::new(ThresholdAnalyzer::new(vec![ThresholdRule::above(
        "cpu_usage",
        80.0,
        "high_cpu",
        Severity::Warning,
    )]))
}

fn restart_planner() -> Arc<RulePlanner> {
    Arc::new(RulePlanner::new("unknown").with_rule(
        "high_cpu",
        vec![ActionTemplate::new(RemediationStrategy::Restart).with_timeout_secs(10)],
    ))
}

#[tokio::test]
async fn failing_job_does_not_affect_sibling() {
    let mapek = MapeKLoop::new(LoopConfig::default()).unwrap();
    mapek.register_monitor(Arc::new(FnMonitor::new("fleet", || async {
        Ok(vec![
            SystemMetric::new("cpu_usage", 91.0, "percent").with_label("target", "web"),
            SystemMetric::new("cpu_usage", 97.0, "percent").with_label("target", "db"),
        ])
    })));
    mapek.register_analyzer(threshold_analyzer());
    mapek.register_planner(restart_planner());

    let restarted = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = Arc::clone(&restarted);
    mapek.register_executor(
        RemediationStrategy::Restart,
        Arc::new(FnExecutor::new("restart", move |target: String, _| {
            seen.lock().push(target.clone());
            async move {
                if target == "db" {
                    Err(HandlerError::failed("db refused to restart"))
                } else {
                    Ok(Parameters::new())
                }
            }
        })),
    );

    let record = mapek.run_cycle().await;
    assert_eq!(record.anomalies_detected, 2);
    assert_eq!(record.jobs.len(), 2);
    assert_eq!(record.jobs_failed, 1);

    let jobs: Vec<_> = record
        .jobs
        .iter()
        .map(|id| mapek.get_job(id).unwrap())
        .collect();
    let web = jobs.iter().find(|j| j.actions[0].target == "web").unwrap();
    let db = jobs.iter().find(|j| j.actions[0].target == "db").unwrap();

    assert_eq!(web.status, JobStatus::Completed);
    assert_eq!(db.status, JobStatus::Failed);
    assert!(db
        .result
        .as_ref()
        .and_then(|r| r.error.as_deref())
        .unwrap()
        .contains("db refused to restart"));

    let mut targets = restarted.lock().clone();
    targets.sort();
    assert_eq!(targets, vec!["db", "web"]);

    let knowledge = mapek.knowledge_snapshot();
    assert_eq!(knowledge.len(), 2);
    assert_eq!(knowledge.iter().filter(|e| e.success).count(), 1);
}

#[tokio::test]
async fn handler_failures_are_isolated_per_phase() {
    let mapek = MapeKLoop::new(LoopConfig::default()).unwrap();
    let mut events = mapek.subscribe();

    mapek.register_monitor(Arc::new(FnMonitor::new("down", || async {
        Err(HandlerError::Unavailable("probe endpoint".into()))
    })));
    mapek.register_monitor(Arc::new(FnMonitor::new("buggy", || async {
        let metrics: Vec<SystemMetric> = Vec::new();
        if metrics.is_empty() {
            panic!("monitor bug");
        }
        Ok(metrics)
    })));
    mapek.register_monitor(Arc::new(FnMonitor::new("cpu", || async {
        Ok(vec![SystemMetric::new("cpu_usage", 95.0, "percent")])
    })));
    mapek.register_analyzer(Arc::new(FnAnalyzer::new("broken", |_| async {
        Err(HandlerError::InvalidInput("unexpected unit".into()))
    })));
    mapek.register_analyzer(threshold_analyzer());
    mapek.register_planner(restart_planner());
    mapek.register_executor(RemediationStrategy::Restart, Arc::new(NoOpExecutor));

    let record = mapek.run_cycle().await;
    assert_eq!(record.metrics_collected, 1);
    assert_eq!(record.anomalies_detected, 1);
    assert_eq!(record.handler_failures, 3);
    assert_eq!(record.jobs.len(), 1);
    assert_eq!(record.states.last(), Some(&LoopState::Idle));

    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let LoopEvent::HandlerFailed { phase, handler, .. } = event {
            failed.push((phase, handler));
        }
    }
    failed.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        failed,
        vec![
            (LoopState::Analyzing, "broken".to_string()),
            (LoopState::Monitoring, "buggy".to_string()),
            (LoopState::Monitoring, "down".to_string()),
        ]
    );
    assert_eq!(mapek.stats().handler_failures, 3);
}

#[tokio::test]
async fn missing_executor_fails_only_its_job() {
    let mapek = MapeKLoop::new(LoopConfig::default()).unwrap();
    mapek.register_monitor(Arc::new(FnMonitor::new("fleet", || async {
        Ok(vec![
            SystemMetric::new("cpu_usage", 91.0, "percent").with_label("target", "web"),
            SystemMetric::new("memory_usage", 99.0, "percent").with_label("target", "cache"),
        ])
    })));
    mapek.register_analyzer(Arc::new(ThresholdAnalyzer::new(vec![
        ThresholdRule::above("cpu_usage", 80.0, "high_cpu", Severity::Warning),
        ThresholdRule::above("memory_usage", 90.0, "memory_pressure", Severity::Error),
    ])));
    mapek.register_planner(Arc::new(
        RulePlanner::new("unknown")
            .with_rule(
                "high_cpu",
                vec![ActionTemplate::new(RemediationStrategy::Restart)],
            )
            .with_rule(
                "memory_pressure",
                vec![ActionTemplate::new(RemediationStrategy::Scale)],
            ),
    ));
    let restarts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&restarts);
    mapek.register_executor(
        RemediationStrategy::Restart,
        Arc::new(FnExecutor::new("restart", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Parameters::new()) }
        })),
    );

    let record = mapek.run_cycle().await;
    assert_eq!(record.jobs.len(), 2);
    assert_eq!(record.jobs_failed, 1);
    assert_eq!(restarts.load(Ordering::SeqCst), 1);

    let failed = mapek.list_jobs(Some(JobStatus::Failed));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].actions[0].strategy, RemediationStrategy::Scale);
    assert!(failed[0]
        .result
        .as_ref()
        .and_then(|r| r.error.as_deref())
        .unwrap()
        .contains("no handler found"));
}

#[tokio::test]
async fn rule_planner_learns_across_cycles() {
    let mapek = MapeKLoop::new(LoopConfig::default()).unwrap();
    mapek.register_monitor(Arc::new(FnMonitor::new("cpu", || async {
        Ok(vec![SystemMetric::new("cpu_usage", 95.0, "percent")])
    })));
    mapek.register_analyzer(threshold_analyzer());
    mapek.register_planner(Arc::new(RulePlanner::new("web").with_rule(
        "high_cpu",
        vec![
            ActionTemplate::new(RemediationStrategy::Restart),
            ActionTemplate::new(RemediationStrategy::Scale),
        ],
    )));
    mapek.register_executor(
        RemediationStrategy::Restart,
        Arc::new(FnExecutor::new("restart", |_, _| async {
            Err(HandlerError::failed("still hot"))
        })),
    );
    mapek.register_executor(RemediationStrategy::Scale, Arc::new(NoOpExecutor));

    // Restart is tried first and fails; scale is then preferred as untried.
    let first = mapek.run_cycle().await;
    let second = mapek.run_cycle().await;
    let third = mapek.run_cycle().await;

    let strategy = |id: &JobId| mapek.get_job(id).unwrap().actions[0].strategy;
    assert_eq!(strategy(&first.jobs[0]), RemediationStrategy::Restart);
    assert_eq!(strategy(&second.jobs[0]), RemediationStrategy::Scale);
    assert_eq!(strategy(&third.jobs[0]), RemediationStrategy::Scale);
}
