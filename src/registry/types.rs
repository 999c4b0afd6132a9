//! Registry data model.

use serde::{Deserialize, Serialize};

/// Name of the registry record in each mesh namespace
pub const REGISTRY_RECORD_NAME: &str = "globalnet-info";

/// Label attached to the registry record
pub const REGISTRY_COMPONENT_LABEL: (&str, &str) = ("component", "mesh-globalnet");

/// Default global CIDR range the mesh carves cluster ranges from
pub const DEFAULT_GLOBAL_CIDR_RANGE: &str = "242.0.0.0/8";

/// Default number of global addresses per cluster
pub const DEFAULT_CLUSTER_SIZE: u64 = 65536;

/// Global CIDRs claimed by one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAllocation {
    pub cluster_id: String,
    #[serde(rename = "global_cidr", default)]
    pub global_cidrs: Vec<String>,
}

impl ClusterAllocation {
    pub fn new(cluster_id: &str, global_cidrs: Vec<String>) -> Self {
        Self { cluster_id: cluster_id.to_string(), global_cidrs }
    }
}

/// Mesh-wide allocation state, one per mesh namespace.
///
/// `allocations` is ordered by first appearance of each cluster and never
/// holds two entries with the same cluster ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRegistry {
    pub enabled: bool,
    pub default_cidr_range: String,
    pub default_cluster_size: u64,
    pub allocations: Vec<ClusterAllocation>,
}

impl NetworkRegistry {
    /// A registry tracking global ranges carved from `cidr_range`
    pub fn globalnet(cidr_range: &str, cluster_size: u64) -> Self {
        Self {
            enabled: true,
            default_cidr_range: cidr_range.to_string(),
            default_cluster_size: cluster_size,
            allocations: Vec::new(),
        }
    }

    /// A registry with global range allocation switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            default_cidr_range: String::new(),
            default_cluster_size: 0,
            allocations: Vec::new(),
        }
    }

    pub fn allocation(&self, cluster_id: &str) -> Option<&ClusterAllocation> {
        self.allocations.iter().find(|a| a.cluster_id == cluster_id)
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = &str> {
        self.allocations.iter().map(|a| a.cluster_id.as_str())
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::globalnet(DEFAULT_GLOBAL_CIDR_RANGE, DEFAULT_CLUSTER_SIZE)
    }
}
