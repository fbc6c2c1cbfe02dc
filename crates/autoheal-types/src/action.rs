//! Remediation actions and the plans that group them.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, AnomalyId, PlanId};

/// Parameters passed to an executor handler, and the result map it returns.
pub type Parameters = HashMap<String, serde_json::Value>;

/// Fallback used when estimating plan duration for actions without a timeout.
const ESTIMATE_DEFAULT_TIMEOUT_SECS: u64 = 60;

// ── Strategy ────────────────────────────────────────────────────────

/// The kind of corrective action. Each strategy is bound to at most one
/// executor handler in the remediation engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemediationStrategy {
    Restart,
    Rollback,
    Scale,
    Failover,
    Patch,
    Isolate,
}

impl RemediationStrategy {
    pub fn all() -> &'static [RemediationStrategy] {
        &[
            Self::Restart,
            Self::Rollback,
            Self::Scale,
            Self::Failover,
            Self::Patch,
            Self::Isolate,
        ]
    }
}

impl std::fmt::Display for RemediationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restart => write!(f, "restart"),
            Self::Rollback => write!(f, "rollback"),
            Self::Scale => write!(f, "scale"),
            Self::Failover => write!(f, "failover"),
            Self::Patch => write!(f, "patch"),
            Self::Isolate => write!(f, "isolate"),
        }
    }
}

impl std::str::FromStr for RemediationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "restart" => Ok(Self::Restart),
            "rollback" => Ok(Self::Rollback),
            "scale" => Ok(Self::Scale),
            "failover" => Ok(Self::Failover),
            "patch" => Ok(Self::Patch),
            "isolate" => Ok(Self::Isolate),
            other => Err(format!("unknown remediation strategy: {}", other)),
        }
    }
}

// ── Compensating Action ─────────────────────────────────────────────

/// An action that undoes the effect of a failed [`RemediationAction`].
///
/// It has no `rollback_action` of its own: compensation is one level deep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompensatingAction {
    pub id: ActionId,
    pub strategy: RemediationStrategy,
    pub target: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Per-action timeout in seconds; `None` uses the engine default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CompensatingAction {
    pub fn new(strategy: RemediationStrategy, target: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(),
            strategy,
            target: target.into(),
            parameters: Parameters::new(),
            timeout_secs: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Resolve the timeout against the engine default.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

// ── Remediation Action ──────────────────────────────────────────────

/// One corrective step against a target in the managed system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: ActionId,
    pub strategy: RemediationStrategy,
    /// What the action operates on (service name, host, deployment...).
    pub target: String,
    #[serde(default)]
    pub parameters: Parameters,
    /// Per-action timeout in seconds; `None` uses the engine default (60s).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Invoked once, best-effort, if this action fails or times out.
    #[serde(default)]
    pub rollback_action: Option<Box<CompensatingAction>>,
}

impl RemediationAction {
    pub fn new(strategy: RemediationStrategy, target: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(),
            strategy,
            target: target.into(),
            parameters: Parameters::new(),
            timeout_secs: None,
            rollback_action: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Attach a compensating action.
    pub fn with_rollback(mut self, rollback: CompensatingAction) -> Self {
        self.rollback_action = Some(Box::new(rollback));
        self
    }

    /// Resolve the timeout against the engine default.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

impl std::fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.strategy, self.target)
    }
}

// ── Plan ────────────────────────────────────────────────────────────

/// Risk classification attached by the planner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Ordered list of actions a planner proposes for one anomaly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub id: PlanId,
    pub anomaly_id: AnomalyId,
    /// Executed strictly in this order.
    pub actions: Vec<RemediationAction>,
    pub estimated_duration_secs: u64,
    pub risk_level: RiskLevel,
    /// Plans requiring approval are never executed by the loop.
    pub requires_approval: bool,
}

impl RemediationPlan {
    /// Create a low-risk plan that does not require approval. The duration
    /// estimate is the sum of the action timeouts.
    pub fn new(anomaly_id: AnomalyId, actions: Vec<RemediationAction>) -> Self {
        let estimated_duration_secs = actions
            .iter()
            .map(|a| a.timeout_secs.unwrap_or(ESTIMATE_DEFAULT_TIMEOUT_SECS))
            .sum();
        Self {
            id: PlanId::new(),
            anomaly_id,
            actions,
            estimated_duration_secs,
            risk_level: RiskLevel::Low,
            requires_approval: false,
        }
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Strategies used by this plan, in action order.
    pub fn strategies(&self) -> Vec<RemediationStrategy> {
        self.actions.iter().map(|a| a.strategy).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_through_str() {
        for strategy in RemediationStrategy::all() {
            let parsed: RemediationStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, *strategy);
        }
        assert!("reboot".parse::<RemediationStrategy>().is_err());
    }

    #[test]
    fn effective_timeout_falls_back_to_default() {
        let default = Duration::from_secs(60);
        let action = RemediationAction::new(RemediationStrategy::Restart, "web-1");
        assert_eq!(action.effective_timeout(default), default);

        let action = action.with_timeout_secs(10);
        assert_eq!(action.effective_timeout(default), Duration::from_secs(10));
    }

    #[test]
    fn rollback_is_attached() {
        let action = RemediationAction::new(RemediationStrategy::Patch, "db")
            .with_rollback(CompensatingAction::new(RemediationStrategy::Rollback, "db"));
        let rollback = action.rollback_action.as_ref().unwrap();
        assert_eq!(rollback.strategy, RemediationStrategy::Rollback);
    }

    #[test]
    fn plan_estimate_sums_timeouts() {
        let plan = RemediationPlan::new(
            AnomalyId::new(),
            vec![
                RemediationAction::new(RemediationStrategy::Restart, "a").with_timeout_secs(10),
                RemediationAction::new(RemediationStrategy::Scale, "a"),
            ],
        );
        assert_eq!(plan.estimated_duration_secs, 70);
        assert!(!plan.requires_approval);
        assert_eq!(
            plan.strategies(),
            vec![RemediationStrategy::Restart, RemediationStrategy::Scale]
        );
    }

    #[test]
    fn plan_builders() {
        let plan = RemediationPlan::new(AnomalyId::new(), Vec::new())
            .with_risk(RiskLevel::High)
            .requiring_approval();
        assert_eq!(plan.risk_level, RiskLevel::High);
        assert!(plan.requires_approval);
    }
}
