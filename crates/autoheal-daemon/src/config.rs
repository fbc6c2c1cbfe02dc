//! Configuration for autohealed

use autoheal_loop::LoopConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// MAPE-K loop and remediation engine settings
    #[serde(default)]
    pub engine: LoopConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulated fleet
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Simulated CPU monitor and executor behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Services reported by the monitor, one `cpu_usage` metric each
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Typical CPU usage in percent
    #[serde(default = "default_cpu_baseline")]
    pub cpu_baseline: f64,

    /// Chance per target and cycle of a CPU spike
    #[serde(default = "default_spike_probability")]
    pub spike_probability: f64,

    /// CPU usage above which `high_cpu` is raised
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// CPU usage above which `cpu_saturation` is raised
    #[serde(default = "default_saturation_threshold")]
    pub saturation_threshold: f64,

    /// Hold saturation plans for approval instead of failing over
    #[serde(default = "default_true")]
    pub approve_critical: bool,

    /// Simulated executor latency in milliseconds
    #[serde(default = "default_executor_latency_ms")]
    pub executor_latency_ms: u64,

    /// Chance that a simulated executor fails
    #[serde(default = "default_executor_failure_rate")]
    pub executor_failure_rate: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            cpu_baseline: default_cpu_baseline(),
            spike_probability: default_spike_probability(),
            cpu_threshold: default_cpu_threshold(),
            saturation_threshold: default_saturation_threshold(),
            approve_critical: true,
            executor_latency_ms: default_executor_latency_ms(),
            executor_failure_rate: default_executor_failure_rate(),
            seed: None,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_targets() -> Vec<String> {
    vec!["web".to_string(), "api".to_string(), "db".to_string()]
}

fn default_cpu_baseline() -> f64 {
    45.0
}

fn default_spike_probability() -> f64 {
    0.2
}

fn default_cpu_threshold() -> f64 {
    80.0
}

fn default_saturation_threshold() -> f64 {
    95.0
}

fn default_executor_latency_ms() -> u64 {
    500
}

fn default_executor_failure_rate() -> f64 {
    0.1
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `AUTOHEAL_` environment variables (`AUTOHEAL_ENGINE__CYCLE_INTERVAL_SECS=5`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with AUTOHEAL_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("AUTOHEAL")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("simulation.targets")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> DaemonResult<()> {
        self.engine.validate()?;

        let sim = &self.simulation;
        if sim.targets.is_empty() {
            return Err(DaemonError::Config(
                "simulation.targets must not be empty".into(),
            ));
        }
        for (name, p) in [
            ("spike_probability", sim.spike_probability),
            ("executor_failure_rate", sim.executor_failure_rate),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DaemonError::Config(format!(
                    "simulation.{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if sim.saturation_threshold < sim.cpu_threshold {
            return Err(DaemonError::Config(
                "simulation.saturation_threshold must not be below cpu_threshold".into(),
            ));
        }
        Ok(())
    }
}
