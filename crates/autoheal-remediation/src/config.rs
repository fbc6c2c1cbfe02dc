//! Configuration for the remediation engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Remediation engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout applied to actions that do not carry their own.
    #[serde(default = "default_action_timeout_secs")]
    pub default_action_timeout_secs: u64,

    /// Jobs beyond this count are evicted oldest-first: terminal jobs before
    /// jobs held for approval. Running jobs are never evicted.
    #[serde(default = "default_max_retained_jobs")]
    pub max_retained_jobs: usize,
}

impl EngineConfig {
    pub fn default_action_timeout(&self) -> Duration {
        Duration::from_secs(self.default_action_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_action_timeout_secs: default_action_timeout_secs(),
            max_retained_jobs: default_max_retained_jobs(),
        }
    }
}

fn default_action_timeout_secs() -> u64 {
    60
}

fn default_max_retained_jobs() -> usize {
    10_000
}
