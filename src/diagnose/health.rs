//! Deployment health checks.
//!
//! Verifies that the mesh components in one cluster are scheduled and
//! running. The first failing component ends the check; restart counts at
//! or above the threshold are warnings only.

use super::HealthOptions;
use crate::cluster::{MeshConfig, PodPhase, WorkloadInspector};
use crate::report::Check;

pub const GATEWAY_DAEMONSET: &str = "mesh-gateway";
pub const ROUTE_AGENT_DAEMONSET: &str = "mesh-routeagent";
pub const GLOBALNET_DAEMONSET: &str = "mesh-globalnet";
pub const LIGHTHOUSE_AGENT_DEPLOYMENT: &str = "mesh-lighthouse-agent";
pub const LIGHTHOUSE_COREDNS_DEPLOYMENT: &str = "mesh-lighthouse-coredns";

/// Check the mesh workloads of one cluster
pub fn check_pods(
    cluster: &impl WorkloadInspector,
    context: &str,
    mesh: &MeshConfig,
    options: &HealthOptions,
) -> Check {
    let mut check = Check::new(format!("Checking mesh pods in {:?}", context));
    let namespace = options.operator_namespace.as_str();

    let mut daemon_sets = vec![GATEWAY_DAEMONSET, ROUTE_AGENT_DAEMONSET];
    if mesh.globalnet_enabled() {
        daemon_sets.push(GLOBALNET_DAEMONSET);
    }

    let mut deployments = Vec::new();
    if mesh.service_discovery_enabled {
        deployments.push(LIGHTHOUSE_AGENT_DEPLOYMENT);
        deployments.push(LIGHTHOUSE_COREDNS_DEPLOYMENT);
    }

    let healthy = daemon_sets
        .iter()
        .all(|name| check_daemon_set(cluster, namespace, name, &mut check))
        && deployments
            .iter()
            .all(|name| check_deployment(cluster, namespace, name, &mut check))
        && check_pods_status(cluster, namespace, options.restart_warning_threshold, &mut check);

    if healthy {
        check.success("All mesh pods are up and running");
    }
    check
}

fn check_daemon_set(cluster: &impl WorkloadInspector, namespace: &str, name: &str, check: &mut Check) -> bool {
    let status = match cluster.daemon_set(namespace, name) {
        Ok(status) => status,
        Err(e) => {
            check.failure(format!("Error obtaining DaemonSet {:?}: {}", name, e));
            return false;
        }
    };

    if status.current_number_scheduled != status.desired_number_scheduled {
        check.failure(format!(
            "The desired number of running pods for DaemonSet {:?} ({}) does not match the actual number ({})",
            name, status.desired_number_scheduled, status.current_number_scheduled
        ));
        return false;
    }

    true
}

fn check_deployment(cluster: &impl WorkloadInspector, namespace: &str, name: &str, check: &mut Check) -> bool {
    let status = match cluster.deployment(namespace, name) {
        Ok(status) => status,
        Err(e) => {
            check.failure(format!("Error obtaining Deployment {:?}: {}", name, e));
            return false;
        }
    };

    if status.available_replicas != status.desired_replicas() {
        check.failure(format!(
            "The desired number of replicas for Deployment {:?} ({}) does not match the actual number running ({})",
            name,
            status.desired_replicas(),
            status.available_replicas
        ));
        return false;
    }

    true
}

fn check_pods_status(
    cluster: &impl WorkloadInspector,
    namespace: &str,
    restart_warning_threshold: u32,
    check: &mut Check,
) -> bool {
    let pods = match cluster.pods(namespace) {
        Ok(pods) => pods,
        Err(e) => {
            check.failure(format!("Error obtaining Pods list: {}", e));
            return false;
        }
    };

    for pod in &pods {
        if pod.phase != PodPhase::Running {
            check.failure(format!("Pod {:?} is not running. (current state is {:?})", pod.name, pod.phase));
            return false;
        }

        for container in &pod.containers {
            if container.restart_count >= restart_warning_threshold {
                check.warning(format!("Pod {:?} has restarted {} times", pod.name, container.restart_count));
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterSnapshot, ContainerStatus, DaemonSetStatus, DeploymentStatus, PodStatus};
    use crate::report::Severity;

    fn options() -> HealthOptions {
        HealthOptions::default()
    }

    fn mesh() -> MeshConfig {
        serde_yaml::from_str("cluster_id: east\n").unwrap()
    }

    fn healthy_cluster() -> ClusterSnapshot {
        let mut cluster = ClusterSnapshot::default();
        for name in [GATEWAY_DAEMONSET, ROUTE_AGENT_DAEMONSET, GLOBALNET_DAEMONSET] {
            cluster.daemon_sets.insert(
                name.to_string(),
                DaemonSetStatus { desired_number_scheduled: 3, current_number_scheduled: 3 },
            );
        }
        for name in [LIGHTHOUSE_AGENT_DEPLOYMENT, LIGHTHOUSE_COREDNS_DEPLOYMENT] {
            cluster.deployments.insert(
                name.to_string(),
                DeploymentStatus { replicas: None, available_replicas: 1 },
            );
        }
        cluster.pods.push(PodStatus {
            name: "mesh-gateway-abc".to_string(),
            phase: PodPhase::Running,
            containers: vec![ContainerStatus { name: "gateway".to_string(), restart_count: 0 }],
        });
        cluster
    }

    #[test]
    fn test_healthy_cluster_passes() {
        let check = check_pods(&healthy_cluster(), "east", &mesh(), &options());
        assert!(check.passed());
        assert!(check.issues.is_empty());
        assert_eq!(check.successes, vec!["All mesh pods are up and running".to_string()]);
    }

    #[test]
    fn test_daemon_set_mismatch_fails() {
        let mut cluster = healthy_cluster();
        cluster.daemon_sets.insert(
            ROUTE_AGENT_DAEMONSET.to_string(),
            DaemonSetStatus { desired_number_scheduled: 3, current_number_scheduled: 2 },
        );
        let check = check_pods(&cluster, "east", &mesh(), &options());
        assert!(!check.passed());
        assert_eq!(check.issues.len(), 1);
        assert!(check.issues[0].message.contains("mesh-routeagent"));
        assert!(check.successes.is_empty());
    }

    #[test]
    fn test_optional_components_checked_only_when_enabled() {
        let mut cluster = healthy_cluster();
        cluster.daemon_sets.remove(GLOBALNET_DAEMONSET);
        cluster.deployments.clear();
        assert!(check_pods(&cluster, "east", &mesh(), &options()).passed());

        let mut with_features = mesh();
        with_features.global_cidr = Some("242.0.0.0/16".to_string());
        let check = check_pods(&cluster, "east", &with_features, &options());
        assert!(!check.passed());
        assert!(check.issues[0].message.contains("mesh-globalnet"));

        let mut with_discovery = mesh();
        with_discovery.service_discovery_enabled = true;
        let check = check_pods(&cluster, "east", &with_discovery, &options());
        assert!(check.issues[0].message.contains("mesh-lighthouse-agent"));
    }

    #[test]
    fn test_deployment_replica_mismatch() {
        let mut cluster = healthy_cluster();
        cluster.deployments.insert(
            LIGHTHOUSE_COREDNS_DEPLOYMENT.to_string(),
            DeploymentStatus { replicas: Some(2), available_replicas: 1 },
        );
        let mut discovery = mesh();
        discovery.service_discovery_enabled = true;

        let check = check_pods(&cluster, "east", &discovery, &options());
        assert!(!check.passed());
        assert!(check.issues[0].message.contains("(2) does not match the actual number running (1)"));
    }

    #[test]
    fn test_pod_not_running_fails() {
        let mut cluster = healthy_cluster();
        cluster.pods.push(PodStatus {
            name: "mesh-routeagent-xyz".to_string(),
            phase: PodPhase::Pending,
            containers: Vec::new(),
        });
        let check = check_pods(&cluster, "east", &mesh(), &options());
        assert!(!check.passed());
        assert!(check.issues[0].message.contains("is not running"));
    }

    #[test]
    fn test_restarts_are_warnings() {
        let mut cluster = healthy_cluster();
        cluster.pods[0].containers[0].restart_count = 5;
        let check = check_pods(&cluster, "east", &mesh(), &options());
        assert!(check.passed());
        assert_eq!(check.issues.len(), 1);
        assert_eq!(check.issues[0].severity, Severity::Warning);
        assert_eq!(check.issues[0].message, "Pod \"mesh-gateway-abc\" has restarted 5 times");
    }
}
