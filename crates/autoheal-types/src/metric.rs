//! Metrics produced by monitors and anomalies produced by analyzers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AnomalyId;

// ── System Metric ───────────────────────────────────────────────────

/// A single observation of the managed system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemMetric {
    /// Metric name, e.g. `cpu_usage`.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Unit of `value`, e.g. `percent`.
    pub unit: String,
    /// When the observation was taken.
    pub timestamp: DateTime<Utc>,
    /// Free-form labels (host, service, region...).
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl SystemMetric {
    /// Create a metric stamped with the current time.
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            labels: HashMap::new(),
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Whether `other` is the same observation as `self`.
    ///
    /// Values are compared bitwise, so a `NaN` reading matches itself.
    pub fn same_reading(&self, other: &SystemMetric) -> bool {
        self.name == other.name
            && self.unit == other.unit
            && self.timestamp == other.timestamp
            && self.value.to_bits() == other.value.to_bits()
            && self.labels == other.labels
    }
}

impl std::fmt::Display for SystemMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}{}", self.name, self.value, self.unit)
    }
}

// ── Severity ────────────────────────────────────────────────────────

/// Severity of an anomaly, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ]
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ── Anomaly ─────────────────────────────────────────────────────────

/// A problem detected by an analyzer during one cycle.
///
/// The metrics carried here are copies of metrics collected in the same
/// cycle; an anomaly is never mutated after the analyzer returns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: AnomalyId,
    /// Anomaly type, e.g. `high_cpu`. Planners and the knowledge store key on it.
    #[serde(rename = "type")]
    pub anomaly_type: String,
    pub severity: Severity,
    pub description: String,
    /// Evidence: the metrics that triggered detection.
    #[serde(default)]
    pub metrics: Vec<SystemMetric>,
    pub detected_at: DateTime<Utc>,
}

impl Anomaly {
    pub fn new(
        anomaly_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: AnomalyId::new(),
            anomaly_type: anomaly_type.into(),
            severity,
            description: description.into(),
            metrics: Vec::new(),
            detected_at: Utc::now(),
        }
    }

    /// Attach the metrics that triggered detection.
    pub fn with_metrics(mut self, metrics: Vec<SystemMetric>) -> Self {
        self.metrics = metrics;
        self
    }

    /// First `target` label found on the evidence metrics, if any.
    pub fn target(&self) -> Option<&str> {
        self.metrics.iter().find_map(|m| m.label("target"))
    }
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.anomaly_type, self.id)
    }
}
