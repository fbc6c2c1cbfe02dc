//! Configuration for the MAPE-K loop.

use std::time::Duration;

use autoheal_remediation::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{LoopError, LoopResult};

/// Loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Seconds between the start of two periodic cycles.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,

    /// Knowledge store capacity; oldest entries are evicted first.
    #[serde(default = "default_max_knowledge_entries")]
    pub max_knowledge_entries: usize,

    /// Timeout for actions that do not carry their own.
    #[serde(default = "default_action_timeout_secs")]
    pub default_action_timeout_secs: u64,

    /// Number of cycle records kept for inspection.
    #[serde(default = "default_max_cycle_history")]
    pub max_cycle_history: usize,

    /// Jobs retained for `get_job`/`list_jobs`, held jobs included.
    #[serde(default = "default_max_retained_jobs")]
    pub max_retained_jobs: usize,

    /// Capacity of the event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl LoopConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// Configuration handed to the remediation engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_action_timeout_secs: self.default_action_timeout_secs,
            max_retained_jobs: self.max_retained_jobs,
        }
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> LoopResult<()> {
        if self.cycle_interval_secs == 0 {
            return Err(LoopError::Configuration(
                "cycle_interval_secs must be greater than zero".into(),
            ));
        }
        if self.max_knowledge_entries == 0 {
            return Err(LoopError::Configuration(
                "max_knowledge_entries must be greater than zero".into(),
            ));
        }
        if self.default_action_timeout_secs == 0 {
            return Err(LoopError::Configuration(
                "default_action_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(LoopError::Configuration(
                "event_buffer must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            max_knowledge_entries: default_max_knowledge_entries(),
            default_action_timeout_secs: default_action_timeout_secs(),
            max_cycle_history: default_max_cycle_history(),
            max_retained_jobs: default_max_retained_jobs(),
            event_buffer: default_event_buffer(),
        }
    }
}

// Default value helpers
fn default_cycle_interval_secs() -> u64 {
    10
}

fn default_max_knowledge_entries() -> usize {
    1000
}

fn default_action_timeout_secs() -> u64 {
    60
}

fn default_max_cycle_history() -> usize {
    100
}

fn default_max_retained_jobs() -> usize {
    10_000
}

fn default_event_buffer() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoopConfig::default();
        assert_eq!(config.cycle_interval(), Duration::from_secs(10));
        assert_eq!(config.max_knowledge_entries, 1000);
        assert_eq!(config.default_action_timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_derived() {
        let config = LoopConfig {
            default_action_timeout_secs: 5,
            ..LoopConfig::default()
        };
        assert_eq!(config.engine_config().default_action_timeout_secs, 5);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = LoopConfig {
            cycle_interval_secs: 0,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            max_knowledge_entries: 0,
            ..LoopConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_knowledge_entries"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LoopConfig = serde_json::from_str(r#"{"max_knowledge_entries": 3}"#).unwrap();
        assert_eq!(config.max_knowledge_entries, 3);
        assert_eq!(config.cycle_interval_secs, 10);
    }
}
