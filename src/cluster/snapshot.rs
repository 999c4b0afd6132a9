//! YAML cluster snapshots.
//!
//! A snapshot captures what diagnostics can observe in one cluster. The
//! command line tool reads one snapshot per context from a directory:
//!
//! ```yaml
//! mesh:
//!   cluster_id: east
//!   global_cidr: 242.0.0.0/16
//!   service_discovery_enabled: true
//! endpoints:
//!   - cluster_id: east
//!     name: east-gateway
//!     subnets: ["10.0.0.0/16", "10.96.0.0/12"]
//! daemon_sets:
//!   mesh-gateway: { desired_number_scheduled: 1, current_number_scheduled: 1 }
//! deployments:
//!   mesh-lighthouse-agent: { replicas: 1, available_replicas: 1 }
//! pods:
//!   - name: mesh-gateway-x7k2p
//!     phase: Running
//!     containers: [{ name: gateway, restart_count: 0 }]
//! ```
//!
//! Snapshots are scoped to a single namespace, so namespace arguments only
//! appear in error messages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    ClusterConnector, ClusterError, DaemonSetStatus, DeploymentStatus, EndpointLister, MeshConfig,
    MeshResourceSource, PodStatus, WorkloadInspector,
};
use crate::ip::EndpointRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshConfig>,
    #[serde(default)]
    pub endpoints: Vec<EndpointRecord>,
    #[serde(default)]
    pub daemon_sets: BTreeMap<String, DaemonSetStatus>,
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentStatus>,
    #[serde(default)]
    pub pods: Vec<PodStatus>,
}

impl ClusterSnapshot {
    pub fn load(path: &Path) -> Result<Self, ClusterError> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ClusterError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl MeshResourceSource for ClusterSnapshot {
    fn mesh_config(&self) -> Result<Option<MeshConfig>, ClusterError> {
        Ok(self.mesh.clone())
    }
}

impl EndpointLister for ClusterSnapshot {
    fn list_endpoints(&self, _namespace: &str) -> Result<Vec<EndpointRecord>, ClusterError> {
        Ok(self.endpoints.clone())
    }
}

impl WorkloadInspector for ClusterSnapshot {
    fn daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSetStatus, ClusterError> {
        self.daemon_sets.get(name).copied().ok_or_else(|| ClusterError::NotFound {
            kind: "DaemonSet",
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    fn deployment(&self, namespace: &str, name: &str) -> Result<DeploymentStatus, ClusterError> {
        self.deployments.get(name).copied().ok_or_else(|| ClusterError::NotFound {
            kind: "Deployment",
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    fn pods(&self, _namespace: &str) -> Result<Vec<PodStatus>, ClusterError> {
        Ok(self.pods.clone())
    }
}

/// Resolves a context name to `<dir>/<context>.yaml`
#[derive(Debug, Clone)]
pub struct SnapshotConnector {
    dir: PathBuf,
}

impl SnapshotConnector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, context: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", context))
    }
}

impl ClusterConnector for SnapshotConnector {
    type Cluster = ClusterSnapshot;

    fn connect(&self, context: &str) -> Result<ClusterSnapshot, ClusterError> {
        let path = self.snapshot_path(context);
        if context.contains(['/', '\\']) || !path.is_file() {
            return Err(ClusterError::ContextNotFound { context: context.to_string(), path });
        }

        log::debug!("Loading snapshot for context {:?} from {}", context, path.display());
        ClusterSnapshot::load(&path)
    }
}
