//! Static threshold analyzer.

use async_trait::async_trait;
use autoheal_types::{Anomaly, HandlerResult, Severity, SystemMetric};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::handlers::Analyzer;

/// Direction in which a threshold is breached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    #[default]
    Above,
    Below,
}

/// One rule: `metric` crossing `threshold` yields an anomaly of `anomaly_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub metric: String,
    pub threshold: f64,
    #[serde(default)]
    pub comparison: Comparison,
    pub anomaly_type: String,
    pub severity: Severity,
}

impl ThresholdRule {
    pub fn above(
        metric: impl Into<String>,
        threshold: f64,
        anomaly_type: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            metric: metric.into(),
            threshold,
            comparison: Comparison::Above,
            anomaly_type: anomaly_type.into(),
            severity,
        }
    }

    pub fn below(
        metric: impl Into<String>,
        threshold: f64,
        anomaly_type: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            comparison: Comparison::Below,
            ..Self::above(metric, threshold, anomaly_type, severity)
        }
    }

    fn breached_by(&self, metric: &SystemMetric) -> bool {
        metric.name == self.metric
            && match self.comparison {
                Comparison::Above => metric.value > self.threshold,
                Comparison::Below => metric.value < self.threshold,
            }
    }
}

/// Emits one anomaly per (rule, breaching metric) pair.
#[derive(Clone, Debug, Default)]
pub struct ThresholdAnalyzer {
    rules: Vec<ThresholdRule>,
}

impl ThresholdAnalyzer {
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: ThresholdRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }
}

#[async_trait]
impl Analyzer for ThresholdAnalyzer {
    async fn analyze(&self, metrics: &[SystemMetric]) -> HandlerResult<Vec<Anomaly>> {
        let mut anomalies = Vec::new();

        for rule in &self.rules {
            for metric in metrics.iter().filter(|m| rule.breached_by(m)) {
                let direction = match rule.comparison {
                    Comparison::Above => "above",
                    Comparison::Below => "below",
                };
                debug!(metric = %metric, threshold = rule.threshold, "Threshold breached");
                anomalies.push(
                    Anomaly::new(
                        rule.anomaly_type.clone(),
                        rule.severity,
                        format!("{} is {} threshold {}", metric, direction, rule.threshold),
                    )
                    .with_metrics(vec![metric.clone()]),
                );
            }
        }

        Ok(anomalies)
    }

    fn name(&self) -> &str {
        "threshold"
    }
}
