//! Learned outcomes recorded after each executed plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{RemediationPlan, RemediationStrategy};
use crate::job::ExecutionResult;
use crate::metric::{Anomaly, Severity};

/// One (anomaly, plan, result) outcome. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub anomaly_type: String,
    pub severity: Severity,
    /// Strategies of the executed plan, in action order.
    pub plan_actions: Vec<RemediationStrategy>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn record(anomaly: &Anomaly, plan: &RemediationPlan, result: &ExecutionResult) -> Self {
        Self {
            anomaly_type: anomaly.anomaly_type.clone(),
            severity: anomaly.severity,
            plan_actions: plan.strategies(),
            success: result.success,
            timestamp: Utc::now(),
        }
    }

    /// Whether the plan that produced this entry used `strategy`.
    pub fn used(&self, strategy: RemediationStrategy) -> bool {
        self.plan_actions.contains(&strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RemediationAction;

    #[test]
    fn record_copies_outcome() {
        let anomaly = Anomaly::new("high_cpu", Severity::Warning, "hot");
        let plan = RemediationPlan::new(
            anomaly.id.clone(),
            vec![RemediationAction::new(RemediationStrategy::Restart, "web-1")],
        );
        let result = ExecutionResult {
            plan_id: plan.id.clone(),
            success: true,
            actions_completed: 1,
            actions_total: 1,
            duration_ms: 5,
            error: None,
            rollback_attempted: false,
            rollback_error: None,
        };

        let entry = KnowledgeEntry::record(&anomaly, &plan, &result);
        assert_eq!(entry.anomaly_type, "high_cpu");
        assert!(entry.success);
        assert!(entry.used(RemediationStrategy::Restart));
        assert!(!entry.used(RemediationStrategy::Scale));
    }
}
