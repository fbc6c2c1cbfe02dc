//! Autoheal daemon library
//!
//! Components behind the `autohealed` binary:
//! - configuration loading
//! - a simulated fleet (monitor and executors)
//! - loop event reporting

pub mod config;
pub mod error;
pub mod reporter;
pub mod simulation;

pub use config::{DaemonConfig, LoggingConfig, SimulationConfig};
pub use error::{DaemonError, DaemonResult};
