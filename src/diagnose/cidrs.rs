//! Overlapping CIDR check for one cluster context.

use crate::cluster::{EndpointLister, MeshConfig};
use crate::ip::{detect_overlaps, success_message};
use crate::report::Check;

/// List the endpoints visible from a cluster and check them for conflicts
pub fn check_overlapping_cidrs(cluster: &impl EndpointLister, mesh: &MeshConfig) -> Check {
    let globalnet = mesh.globalnet_enabled();
    let mut check = if globalnet {
        Check::new("Globalnet deployment detected, checking if globalnet CIDRs overlap")
    } else {
        Check::new("Non-Globalnet deployment detected, checking if cluster CIDRs overlap")
    };

    let endpoints = match cluster.list_endpoints(&mesh.namespace) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            check.failure(format!(
                "Error listing the endpoints in cluster {:?}: {}",
                mesh.cluster_id, e
            ));
            return check;
        }
    };

    let overlaps = detect_overlaps(&endpoints);
    check.extend(overlaps.issues());

    if overlaps.ok() {
        check.success(success_message(globalnet));
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterError;
    use crate::ip::EndpointRecord;

    struct Endpoints(Result<Vec<EndpointRecord>, String>);

    impl EndpointLister for Endpoints {
        fn list_endpoints(&self, namespace: &str) -> Result<Vec<EndpointRecord>, ClusterError> {
            self.0.clone().map_err(|name| ClusterError::NotFound {
                kind: "EndpointList",
                namespace: namespace.to_string(),
                name,
            })
        }
    }

    fn mesh(global_cidr: Option<&str>) -> MeshConfig {
        MeshConfig {
            cluster_id: "east".to_string(),
            namespace: "mesh-operator".to_string(),
            global_cidr: global_cidr.map(str::to_string),
            service_discovery_enabled: false,
        }
    }

    #[test]
    fn test_clean_globalnet_run() {
        let cluster = Endpoints(Ok(vec![
            EndpointRecord::new("east", "east-gw", &["242.0.0.0/16"]),
            EndpointRecord::new("west", "west-gw", &["242.1.0.0/16"]),
        ]));
        let check = check_overlapping_cidrs(&cluster, &mesh(Some("242.0.0.0/16")));
        assert!(check.passed());
        assert_eq!(check.successes, vec!["Clusters do not have overlapping globalnet CIDRs".to_string()]);
    }

    #[test]
    fn test_clean_plain_run() {
        let check = check_overlapping_cidrs(&Endpoints(Ok(Vec::new())), &mesh(None));
        assert!(check.passed());
        assert_eq!(check.successes, vec!["Clusters do not have overlapping CIDRs".to_string()]);
    }

    #[test]
    fn test_overlaps_fail_the_check() {
        let cluster = Endpoints(Ok(vec![
            EndpointRecord::new("east", "east-gw", &["10.0.0.0/16"]),
            EndpointRecord::new("west", "west-gw", &["10.0.128.0/17"]),
        ]));
        let check = check_overlapping_cidrs(&cluster, &mesh(None));
        assert!(!check.passed());
        assert!(check.successes.is_empty());
        assert_eq!(
            check.issues[0].message,
            "CIDR \"10.0.128.0/17\" in cluster \"west\" overlaps with cluster \"east\" (CIDRs: [10.0.0.0/16])"
        );
    }

    #[test]
    fn test_listing_error_is_a_failure() {
        let check = check_overlapping_cidrs(&Endpoints(Err("endpoints".to_string())), &mesh(None));
        assert!(!check.passed());
        assert!(check.issues[0].message.starts_with("Error listing the endpoints in cluster \"east\""));
    }
}
