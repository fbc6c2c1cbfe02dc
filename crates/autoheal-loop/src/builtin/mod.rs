//! Reference handlers.
//!
//! - [`ThresholdAnalyzer`]: flags metrics crossing static thresholds
//! - [`RulePlanner`]: maps anomaly types to candidate actions and picks the
//!   one with the best track record in the knowledge snapshot

mod rules;
mod threshold;

pub use rules::{ActionTemplate, RulePlanner};
pub use threshold::{Comparison, ThresholdAnalyzer, ThresholdRule};
