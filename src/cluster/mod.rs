//! Cluster API capabilities.
//!
//! Diagnostics only need a handful of read-only queries against each member
//! cluster. They are split into small traits so checks can depend on just
//! what they use, and so tests can supply fakes:
//!
//! - [`MeshResourceSource`]: the cluster's mesh configuration resource
//! - [`EndpointLister`]: endpoint advertisements visible from the cluster
//! - [`WorkloadInspector`]: daemon set, deployment and pod status
//!
//! A [`ClusterConnector`] turns a context name into a connected cluster.
//! Failing to connect is fatal for a diagnostic run; failing a query is
//! reported against that cluster only.

pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ip::EndpointRecord;

pub use snapshot::{ClusterSnapshot, SnapshotConnector};

/// Default namespace the mesh operator and its components run in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "mesh-operator";

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("no cluster context named {context:?} (looked for {path})")]
    ContextNotFound { context: String, path: PathBuf },

    #[error("failed to parse cluster snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to read cluster snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind} {name:?} not found in namespace {namespace:?}")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
}

fn default_operator_namespace() -> String {
    DEFAULT_OPERATOR_NAMESPACE.to_string()
}

/// The mesh configuration resource of one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub cluster_id: String,
    /// Namespace holding the cluster's endpoint advertisements
    #[serde(default = "default_operator_namespace")]
    pub namespace: String,
    /// The cluster's global CIDR; set only when globalnet is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_cidr: Option<String>,
    #[serde(default)]
    pub service_discovery_enabled: bool,
}

impl MeshConfig {
    pub fn globalnet_enabled(&self) -> bool {
        self.global_cidr.as_deref().is_some_and(|cidr| !cidr.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSetStatus {
    pub desired_number_scheduled: u32,
    pub current_number_scheduled: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    /// Desired replicas; unset means 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub available_replicas: u32,
}

impl DeploymentStatus {
    pub fn desired_replicas(&self) -> u32 {
        self.replicas.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub restart_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatus {
    pub name: String,
    pub phase: PodPhase,
    #[serde(default)]
    pub containers: Vec<ContainerStatus>,
}

/// Can look up the cluster's mesh configuration resource
pub trait MeshResourceSource {
    /// `Ok(None)` when the mesh is not deployed in this cluster
    fn mesh_config(&self) -> Result<Option<MeshConfig>, ClusterError>;
}

/// Can list endpoint advertisements
pub trait EndpointLister {
    fn list_endpoints(&self, namespace: &str) -> Result<Vec<EndpointRecord>, ClusterError>;
}

/// Can report workload status
pub trait WorkloadInspector {
    fn daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSetStatus, ClusterError>;
    fn deployment(&self, namespace: &str, name: &str) -> Result<DeploymentStatus, ClusterError>;
    fn pods(&self, namespace: &str) -> Result<Vec<PodStatus>, ClusterError>;
}

/// Everything a deployment diagnosis queries
pub trait ClusterApi: MeshResourceSource + EndpointLister + WorkloadInspector {}

impl<T: MeshResourceSource + EndpointLister + WorkloadInspector> ClusterApi for T {}

/// Resolves context names to connected clusters
pub trait ClusterConnector {
    type Cluster: ClusterApi + Send;

    fn connect(&self, context: &str) -> Result<Self::Cluster, ClusterError>;
}
