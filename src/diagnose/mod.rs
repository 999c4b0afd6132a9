//! Per-cluster diagnostic checks.
//!
//! - `health`: mesh daemon sets, deployments and pods are running
//! - `cidrs`: advertised endpoints do not overlap
//!
//! Each check returns a finished [`Check`](crate::report::Check); the
//! orchestrator decides how the results combine.

pub mod cidrs;
pub mod health;

pub use cidrs::check_overlapping_cidrs;
pub use health::check_pods;

use crate::cluster::DEFAULT_OPERATOR_NAMESPACE;

/// Containers restarting this often are reported as warnings
pub const DEFAULT_RESTART_WARNING_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthOptions {
    pub operator_namespace: String,
    pub restart_warning_threshold: u32,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            restart_warning_threshold: DEFAULT_RESTART_WARNING_THRESHOLD,
        }
    }
}
