//! End-to-end cycles through the loop and the remediation engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autoheal_loop::{
    FnAnalyzer, FnMonitor, FnPlanner, LoopConfig, LoopState, MapeKLoop, ThresholdAnalyzer,
    ThresholdRule,
};
use autoheal_remediation::FnExecutor;
use autoheal_types::{
    Anomaly, CompensatingAction, JobStatus, Parameters, RemediationAction, RemediationPlan,
    RemediationStrategy, Severity, SystemMetric,
};

/// Loop with a cpu monitor reporting 95%, a threshold analyzer at 80% and
/// a planner restarting `web` with a 10s timeout.
fn high_cpu_loop(config: LoopConfig, with_rollback: bool) -> MapeKLoop {
    let mapek = MapeKLoop::new(config).unwrap();

    mapek.register_monitor(Arc::new(FnMonitor::new("cpu", || async {
        Ok(vec![SystemMetric::new("cpu_usage", 95.0, "percent")])
    })));
    mapek.register_analyzer(Arc::new(ThresholdAnalyzer::new(vec![ThresholdRule::above(
        "cpu_usage",
        80.0,
        "high_cpu",
        Severity::Warning,
    )])));
    mapek.register_planner(Arc::new(FnPlanner::new(
        "restart",
        move |anomaly: Anomaly, _| async move {
            let mut action =
                RemediationAction::new(RemediationStrategy::Restart, "web").with_timeout_secs(10);
            if with_rollback {
                action = action
                    .with_rollback(CompensatingAction::new(RemediationStrategy::Rollback, "web"));
            }
            Ok(Some(RemediationPlan::new(anomaly.id.clone(), vec![action])))
        },
    )));

    mapek
}

fn sleeping_executor(name: &str, sleep: Duration, calls: Arc<AtomicUsize>) -> Arc<FnExecutor> {
    Arc::new(FnExecutor::new(name, move |_, _| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(sleep).await;
            Ok(Parameters::new())
        }
    }))
}

#[tokio::test(start_paused = true)]
async fn scenario_a_restart_completes() {
    let mapek = high_cpu_loop(LoopConfig::default(), false);
    let restarts = Arc::new(AtomicUsize::new(0));
    mapek.register_executor(
        RemediationStrategy::Restart,
        sleeping_executor("restart", Duration::from_secs(2), Arc::clone(&restarts)),
    );

    let record = mapek.run_cycle().await;
    assert_eq!(record.anomalies_detected, 1);
    assert_eq!(record.jobs.len(), 1);

    let job = mapek.get_job(&record.jobs[0]).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.actions_completed, 1);
    assert_eq!(job.actions_total(), 1);
    assert!(job.result.as_ref().unwrap().success);
    assert_eq!(restarts.load(Ordering::SeqCst), 1);

    let knowledge = mapek.knowledge_snapshot();
    assert_eq!(knowledge.len(), 1);
    assert_eq!(knowledge[0].anomaly_type, "high_cpu");
    assert_eq!(knowledge[0].severity, Severity::Warning);
    assert_eq!(knowledge[0].plan_actions, vec![RemediationStrategy::Restart]);
    assert!(knowledge[0].success);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_timeout_fails_and_rolls_back_once() {
    let mapek = high_cpu_loop(LoopConfig::default(), true);
    let restarts = Arc::new(AtomicUsize::new(0));
    let rollbacks = Arc::new(AtomicUsize::new(0));
    mapek.register_executor(
        RemediationStrategy::Restart,
        sleeping_executor("restart", Duration::from_secs(15), Arc::clone(&restarts)),
    );
    mapek.register_executor(
        RemediationStrategy::Rollback,
        sleeping_executor("rollback", Duration::ZERO, Arc::clone(&rollbacks)),
    );

    let record = mapek.run_cycle().await;
    let job = mapek.get_job(&record.jobs[0]).unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.actions_completed, 0);
    let result = job.result.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("timeout"));
    assert!(result.rollback_attempted);
    assert_eq!(result.rollback_error, None);
    assert_eq!(restarts.load(Ordering::SeqCst), 1);
    assert_eq!(rollbacks.load(Ordering::SeqCst), 1);

    assert_eq!(record.jobs_failed, 1);
    let knowledge = mapek.knowledge_snapshot();
    assert_eq!(knowledge.len(), 1);
    assert!(!knowledge[0].success);
}

#[tokio::test]
async fn scenario_c_knowledge_keeps_last_entries() {
    let config = LoopConfig {
        max_knowledge_entries: 3,
        ..LoopConfig::default()
    };
    let mapek = MapeKLoop::new(config).unwrap();

    // Each cycle reports a distinct incident; the third one fails to remediate.
    let seq = Arc::new(AtomicUsize::new(0));
    mapek.register_monitor(Arc::new(FnMonitor::new("seq", move || {
        let n = seq.fetch_add(1, Ordering::SeqCst);
        async move {
            Ok(vec![
                SystemMetric::new("cpu_usage", 95.0, "percent").with_label("seq", n.to_string())
            ])
        }
    })));
    mapek.register_analyzer(Arc::new(FnAnalyzer::new(
        "incident",
        |metrics: Vec<SystemMetric>| async move {
            Ok(metrics
                .into_iter()
                .map(|m| {
                    let kind = format!("incident-{}", m.label("seq").unwrap_or_default());
                    Anomaly::new(kind, Severity::Warning, "numbered").with_metrics(vec![m])
                })
                .collect())
        },
    )));
    mapek.register_planner(Arc::new(FnPlanner::new(
        "restart",
        |anomaly: Anomaly, _| async move {
            let strategy = if anomaly.anomaly_type == "incident-2" {
                RemediationStrategy::Patch
            } else {
                RemediationStrategy::Restart
            };
            Ok(Some(RemediationPlan::new(
                anomaly.id.clone(),
                vec![RemediationAction::new(strategy, "web")],
            )))
        },
    )));
    mapek.register_executor(
        RemediationStrategy::Restart,
        sleeping_executor("restart", Duration::ZERO, Arc::new(AtomicUsize::new(0))),
    );

    let mut cycles = Vec::new();
    for _ in 0..4 {
        cycles.push(mapek.run_cycle().await);
        assert!(mapek.get_state().knowledge_entries <= 3);
    }

    let knowledge = mapek.knowledge_snapshot();
    let kinds: Vec<&str> = knowledge.iter().map(|k| k.anomaly_type.as_str()).collect();
    assert_eq!(kinds, vec!["incident-1", "incident-2", "incident-3"]);

    // Entries line up, oldest first, with the jobs of cycles 2 to 4.
    for (entry, cycle) in knowledge.iter().zip(&cycles[1..]) {
        assert_eq!(cycle.jobs.len(), 1);
        let job = mapek.get_job(&cycle.jobs[0]).unwrap();
        assert_eq!(entry.success, job.result.as_ref().unwrap().success);
        assert_eq!(entry.plan_actions, vec![job.actions[0].strategy]);
        assert!(entry.timestamp >= cycle.started_at);
    }
    assert_eq!(
        knowledge.iter().map(|k| k.success).collect::<Vec<_>>(),
        vec![true, false, true]
    );
}

#[tokio::test]
async fn every_cycle_records_a_legal_state_sequence() {
    let mapek = high_cpu_loop(LoopConfig::default(), false);
    mapek.register_executor(
        RemediationStrategy::Restart,
        sleeping_executor("restart", Duration::ZERO, Arc::new(AtomicUsize::new(0))),
    );

    mapek.run_cycle().await;
    let quiet = MapeKLoop::new(LoopConfig::default()).unwrap();
    quiet.run_cycle().await;

    let full = vec![
        LoopState::Idle,
        LoopState::Monitoring,
        LoopState::Analyzing,
        LoopState::Planning,
        LoopState::Executing,
        LoopState::Learning,
        LoopState::Idle,
    ];
    let short = vec![
        LoopState::Idle,
        LoopState::Monitoring,
        LoopState::Analyzing,
        LoopState::Idle,
    ];

    for record in mapek.cycle_history().iter().chain(quiet.cycle_history().iter()) {
        assert!(record.states == full || record.states == short);
        assert!(record.states.windows(2).all(|w| w[0].can_transition_to(w[1])));
    }
    assert_eq!(mapek.cycle_history()[0].states, full);
    assert_eq!(quiet.cycle_history()[0].states, short);
}

#[tokio::test]
async fn approval_required_plan_is_held() {
    let mapek = MapeKLoop::new(LoopConfig::default()).unwrap();
    mapek.register_monitor(Arc::new(FnMonitor::new("cpu", || async {
        Ok(vec![SystemMetric::new("cpu_usage", 99.0, "percent")])
    })));
    mapek.register_analyzer(Arc::new(ThresholdAnalyzer::new(vec![ThresholdRule::above(
        "cpu_usage",
        80.0,
        "high_cpu",
        Severity::Critical,
    )])));
    mapek.register_planner(Arc::new(FnPlanner::new(
        "failover",
        |anomaly: Anomaly, _| async move {
            Ok(Some(
                RemediationPlan::new(
                    anomaly.id.clone(),
                    vec![RemediationAction::new(RemediationStrategy::Failover, "db")],
                )
                .requiring_approval(),
            ))
        },
    )));
    let calls = Arc::new(AtomicUsize::new(0));
    mapek.register_executor(
        RemediationStrategy::Failover,
        sleeping_executor("failover", Duration::ZERO, Arc::clone(&calls)),
    );

    let record = mapek.run_cycle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(record.plans_skipped, 1);
    assert!(record.jobs.is_empty());
    assert!(mapek.knowledge_snapshot().is_empty());

    let pending = mapek.list_jobs(Some(JobStatus::Pending));
    assert_eq!(pending.len(), 1);
    assert!(pending[0].requires_approval);
    assert_eq!(pending[0].id, record.held_jobs[0]);

    let job = mapek.approve(&pending[0].id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(mapek.approve(&job.id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_cycle_finish() {
    let mapek = Arc::new(high_cpu_loop(LoopConfig::default(), false));
    mapek.register_executor(
        RemediationStrategy::Restart,
        sleeping_executor("restart", Duration::from_secs(5), Arc::new(AtomicUsize::new(0))),
    );

    let handle = mapek.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mapek.get_state().state, LoopState::Executing);

    handle.stop().await;

    assert!(!mapek.is_running());
    assert_eq!(mapek.get_state().state, LoopState::Idle);
    let stats = mapek.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.jobs_completed, 1);
    assert_eq!(mapek.list_jobs(Some(JobStatus::Completed)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cycles_never_overlap() {
    let mapek = Arc::new(high_cpu_loop(LoopConfig::default(), false));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        mapek.register_executor(
            RemediationStrategy::Restart,
            Arc::new(FnExecutor::new("restart", move |_, _| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(Parameters::new())
                }
            })),
        );
    }

    let (first, second) = tokio::join!(mapek.run_cycle(), mapek.run_cycle());
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(first.jobs.len(), 1);
    assert_eq!(second.jobs.len(), 1);
    assert_eq!(mapek.stats().cycles, 2);
}
