//! Rule-based planner that learns from the knowledge snapshot.

use async_trait::async_trait;
use autoheal_types::{
    Anomaly, CompensatingAction, HandlerResult, KnowledgeEntry, Parameters, RemediationAction,
    RemediationPlan, RemediationStrategy, RiskLevel, Severity,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::handlers::Planner;
use crate::knowledge::success_rate;

/// Score given to a strategy with no history for the anomaly type.
const UNTRIED_PRIOR: f64 = 0.5;

/// A candidate action for an anomaly type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub strategy: RemediationStrategy,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub parameters: Parameters,
    /// Strategy of the compensating action, run against the same target.
    #[serde(default)]
    pub rollback: Option<RemediationStrategy>,
}

impl ActionTemplate {
    pub fn new(strategy: RemediationStrategy) -> Self {
        Self {
            strategy,
            timeout_secs: None,
            parameters: Parameters::new(),
            rollback: None,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_rollback(mut self, strategy: RemediationStrategy) -> Self {
        self.rollback = Some(strategy);
        self
    }

    fn instantiate(&self, target: &str) -> RemediationAction {
        let mut action = RemediationAction::new(self.strategy, target);
        action.parameters = self.parameters.clone();
        action.timeout_secs = self.timeout_secs;
        if let Some(rollback) = self.rollback {
            action = action.with_rollback(CompensatingAction::new(rollback, target));
        }
        action
    }
}

/// Maps anomaly types to candidate actions.
///
/// For each anomaly the candidate with the highest historical success rate
/// wins; untried strategies score 0.5 and ties go to the earlier candidate.
/// Anomalies without a rule are left to the next planner.
#[derive(Clone, Debug)]
pub struct RulePlanner {
    rules: Vec<(String, Vec<ActionTemplate>)>,
    default_target: String,
    approval_severity: Option<Severity>,
}

impl RulePlanner {
    /// `default_target` is used when the anomaly's metrics carry no `target` label.
    pub fn new(default_target: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_target: default_target.into(),
            approval_severity: None,
        }
    }

    pub fn with_rule(
        mut self,
        anomaly_type: impl Into<String>,
        candidates: Vec<ActionTemplate>,
    ) -> Self {
        self.rules.push((anomaly_type.into(), candidates));
        self
    }

    /// Plans for anomalies at or above `severity` require approval.
    pub fn require_approval_at(mut self, severity: Severity) -> Self {
        self.approval_severity = Some(severity);
        self
    }

    fn candidates(&self, anomaly_type: &str) -> Option<&[ActionTemplate]> {
        self.rules
            .iter()
            .find(|(t, _)| t == anomaly_type)
            .map(|(_, c)| c.as_slice())
    }

    fn choose<'a>(
        &self,
        anomaly_type: &str,
        candidates: &'a [ActionTemplate],
        knowledge: &[KnowledgeEntry],
    ) -> Option<&'a ActionTemplate> {
        let mut best: Option<(&ActionTemplate, f64)> = None;
        for candidate in candidates {
            let score = success_rate(knowledge, anomaly_type, candidate.strategy)
                .unwrap_or(UNTRIED_PRIOR);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        best.map(|(c, _)| c)
    }
}

fn risk_for(severity: Severity) -> RiskLevel {
    match severity {
        Severity::Info | Severity::Warning => RiskLevel::Low,
        Severity::Error => RiskLevel::Medium,
        Severity::Critical => RiskLevel::High,
    }
}

#[async_trait]
impl Planner for RulePlanner {
    async fn plan(
        &self,
        anomaly: &Anomaly,
        knowledge: &[KnowledgeEntry],
    ) -> HandlerResult<Option<RemediationPlan>> {
        let Some(candidates) = self.candidates(&anomaly.anomaly_type) else {
            return Ok(None);
        };
        let Some(template) = self.choose(&anomaly.anomaly_type, candidates, knowledge) else {
            return Ok(None);
        };

        let target = anomaly.target().unwrap_or(&self.default_target);
        debug!(
            anomaly = %anomaly,
            strategy = %template.strategy,
            target = %target,
            "Selected remediation strategy"
        );

        let mut plan = RemediationPlan::new(anomaly.id.clone(), vec![template.instantiate(target)])
            .with_risk(risk_for(anomaly.severity));
        if self
            .approval_severity
            .map_or(false, |threshold| anomaly.severity >= threshold)
        {
            plan = plan.requiring_approval();
        }

        Ok(Some(plan))
    }

    fn name(&self) -> &str {
        "rules"
    }
}
