//! Identifiers for anomalies, actions, plans and jobs.

/// Define a UUID-backed string identifier whose `Display` is `prefix:uuid`.
///
/// Invoking crates need `serde` as a dependency for the derives.
#[macro_export]
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self($crate::__private::uuid::Uuid::new_v4().to_string())
            }

            /// Wrap an externally assigned identifier.
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a detected anomaly.
    AnomalyId,
    "anomaly"
);
string_id!(
    /// Unique identifier for a remediation action.
    ActionId,
    "action"
);
string_id!(
    /// Unique identifier for a remediation plan.
    PlanId,
    "plan"
);
string_id!(
    /// Unique identifier for a remediation job.
    JobId,
    "job"
);
