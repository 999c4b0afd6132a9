//! Deployment diagnosis orchestrator.
//!
//! Drives the per-cluster checks across every requested cluster context and
//! folds their findings into one [`Report`].
//!
//! Failure tiers:
//! - connecting to a context fails the whole run before any check starts
//! - everything else is reported against the cluster it concerns, and the
//!   remaining clusters are still diagnosed
//!
//! The run succeeds only if every context passes both its health check and
//! its overlap check. Both checks always run, and a failing context never
//! stops the following ones.

use rayon::prelude::*;

use crate::cluster::{ClusterApi, ClusterConnector, ClusterError};
use crate::diagnose::{check_overlapping_cidrs, check_pods, HealthOptions};
use crate::report::{Check, Report};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnoseOptions {
    pub health: HealthOptions,
    /// Contexts diagnosed concurrently; 0 or 1 runs them one at a time
    pub jobs: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnoseError {
    #[error("failed to connect to cluster context {context:?}: {source}")]
    Connect { context: String, source: ClusterError },

    #[error("failed to configure worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Outcome of diagnosing one cluster context
#[derive(Debug, Clone)]
pub struct ClusterDiagnosis {
    pub context: String,
    pub report: Report,
    pub success: bool,
}

/// Outcome of a full diagnostic run
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub clusters: Vec<ClusterDiagnosis>,
    pub report: Report,
    pub success: bool,
}

/// Diagnose the mesh deployment across `contexts`.
///
/// Results are reported in context order regardless of `options.jobs`.
pub fn validate_deployment<C: ClusterConnector>(
    connector: &C,
    contexts: &[String],
    options: &DiagnoseOptions,
) -> Result<Diagnosis, DiagnoseError> {
    let mut clusters = Vec::with_capacity(contexts.len());
    for context in contexts {
        let cluster = connector.connect(context).map_err(|source| DiagnoseError::Connect {
            context: context.clone(),
            source,
        })?;
        clusters.push((context.clone(), cluster));
    }

    let results: Vec<ClusterDiagnosis> = if options.jobs > 1 && clusters.len() > 1 {
        log::debug!("Diagnosing {} contexts with {} workers", clusters.len(), options.jobs);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(options.jobs).build()?;
        pool.install(|| {
            clusters
                .into_par_iter()
                .map(|(context, cluster)| diagnose_cluster(&context, &cluster, &options.health))
                .collect()
        })
    } else {
        clusters
            .iter()
            .map(|(context, cluster)| diagnose_cluster(context, cluster, &options.health))
            .collect()
    };

    let mut report = Report::new();
    let mut success = true;
    for result in &results {
        report.merge(result.report.clone());
        success &= result.success;
    }

    log::info!(
        "Diagnosed {} contexts: {} ({} failures, {} warnings)",
        results.len(),
        if success { "passed" } else { "failed" },
        report.failure_count(),
        report.warning_count()
    );

    Ok(Diagnosis { clusters: results, report, success })
}

/// Diagnose one connected cluster
pub fn diagnose_cluster(context: &str, cluster: &impl ClusterApi, health: &HealthOptions) -> ClusterDiagnosis {
    let mut report = Report::new();
    let mut lookup = Check::new(format!("Retrieving mesh resource from {:?}", context));

    let mesh = match cluster.mesh_config() {
        Ok(Some(mesh)) => mesh,
        Ok(None) => {
            lookup.warning(format!(
                "No mesh resource found in {:?}; the mesh is not deployed there",
                context
            ));
            report.record(lookup);
            return ClusterDiagnosis { context: context.to_string(), report, success: true };
        }
        Err(e) => {
            lookup.failure(format!("Error retrieving mesh resource from {:?}: {}", context, e));
            report.record(lookup);
            return ClusterDiagnosis { context: context.to_string(), report, success: false };
        }
    };

    lookup.success(format!("Found mesh resource for cluster {:?}", mesh.cluster_id));
    report.record(lookup);

    let pods = check_pods(cluster, context, &mesh, health);
    let cidrs = check_overlapping_cidrs(cluster, &mesh);
    let success = pods.passed() && cidrs.passed();
    report.record(pods);
    report.record(cidrs);

    ClusterDiagnosis { context: context.to_string(), report, success }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{
        ClusterSnapshot, DaemonSetStatus, DeploymentStatus, EndpointLister, MeshConfig, MeshResourceSource,
        PodStatus, WorkloadInspector,
    };
    use crate::diagnose::health::{GATEWAY_DAEMONSET, ROUTE_AGENT_DAEMONSET};
    use crate::ip::EndpointRecord;
    use crate::report::Severity;
    use std::collections::HashMap;

    struct FakeConnector {
        clusters: HashMap<String, ClusterSnapshot>,
    }

    impl ClusterConnector for FakeConnector {
        type Cluster = ClusterSnapshot;

        fn connect(&self, context: &str) -> Result<ClusterSnapshot, ClusterError> {
            self.clusters.get(context).cloned().ok_or_else(|| ClusterError::ContextNotFound {
                context: context.to_string(),
                path: context.into(),
            })
        }
    }

    /// A cluster whose API server rejects mesh resource lookups
    struct Unreachable;

    impl MeshResourceSource for Unreachable {
        fn mesh_config(&self) -> Result<Option<MeshConfig>, ClusterError> {
            Err(ClusterError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused")))
        }
    }

    impl EndpointLister for Unreachable {
        fn list_endpoints(&self, _namespace: &str) -> Result<Vec<EndpointRecord>, ClusterError> {
            unreachable!("endpoints are never listed without a mesh resource")
        }
    }

    impl WorkloadInspector for Unreachable {
        fn daemon_set(&self, _: &str, _: &str) -> Result<DaemonSetStatus, ClusterError> {
            unreachable!()
        }

        fn deployment(&self, _: &str, _: &str) -> Result<DeploymentStatus, ClusterError> {
            unreachable!()
        }

        fn pods(&self, _: &str) -> Result<Vec<PodStatus>, ClusterError> {
            unreachable!()
        }
    }

    fn cluster(id: &str, endpoints: Vec<EndpointRecord>) -> ClusterSnapshot {
        let mut snapshot = ClusterSnapshot {
            mesh: Some(serde_yaml::from_str(&format!("cluster_id: {}\n", id)).unwrap()),
            endpoints,
            ..Default::default()
        };
        for name in [GATEWAY_DAEMONSET, ROUTE_AGENT_DAEMONSET] {
            snapshot.daemon_sets.insert(
                name.to_string(),
                DaemonSetStatus { desired_number_scheduled: 1, current_number_scheduled: 1 },
            );
        }
        snapshot
    }

    fn endpoints() -> Vec<EndpointRecord> {
        vec![
            EndpointRecord::new("east", "east-gw", &["10.0.0.0/16"]),
            EndpointRecord::new("west", "west-gw", &["10.1.0.0/16"]),
        ]
    }

    fn contexts(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_all_contexts_pass() {
        let connector = FakeConnector {
            clusters: HashMap::from([
                ("east".to_string(), cluster("east", endpoints())),
                ("west".to_string(), cluster("west", endpoints())),
            ]),
        };
        let diagnosis = validate_deployment(&connector, &contexts(&["east", "west"]), &DiagnoseOptions::default()).unwrap();
        assert!(diagnosis.success);
        assert_eq!(diagnosis.report.failure_count(), 0);
        assert_eq!(diagnosis.report.checks.len(), 6);
    }

    #[test]
    fn test_missing_mesh_resource_is_a_warning() {
        let connector = FakeConnector {
            clusters: HashMap::from([("bare".to_string(), ClusterSnapshot::default())]),
        };
        let diagnosis = validate_deployment(&connector, &contexts(&["bare"]), &DiagnoseOptions::default()).unwrap();
        assert!(diagnosis.success);
        let issues: Vec<_> = diagnosis.report.issues().collect();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_failing_context_does_not_stop_the_run() {
        let overlapping = vec![
            EndpointRecord::new("east", "east-gw", &["10.0.0.0/16"]),
            EndpointRecord::new("west", "west-gw", &["10.0.0.0/24"]),
        ];
        let mut unhealthy = cluster("west", endpoints());
        unhealthy.daemon_sets.clear();

        let connector = FakeConnector {
            clusters: HashMap::from([
                ("east".to_string(), cluster("east", overlapping)),
                ("west".to_string(), unhealthy),
                ("north".to_string(), cluster("north", endpoints())),
            ]),
        };
        let diagnosis =
            validate_deployment(&connector, &contexts(&["east", "west", "north"]), &DiagnoseOptions::default()).unwrap();

        assert!(!diagnosis.success);
        let outcomes: Vec<(&str, bool)> = diagnosis
            .clusters
            .iter()
            .map(|c| (c.context.as_str(), c.success))
            .collect();
        assert_eq!(outcomes, vec![("east", false), ("west", false), ("north", true)]);
    }

    #[test]
    fn test_health_failure_still_runs_overlap_check() {
        let mut unhealthy = cluster("east", endpoints());
        unhealthy.daemon_sets.clear();

        let result = diagnose_cluster("east", &unhealthy, &HealthOptions::default());
        assert!(!result.success);
        let titles: Vec<&str> = result.report.checks.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles.len(), 3);
        assert!(titles[2].contains("checking if cluster CIDRs overlap"));
        assert!(result.report.checks[2].passed());
    }

    #[test]
    fn test_unreachable_cluster_fails_only_itself() {
        let result = diagnose_cluster("broken", &Unreachable, &HealthOptions::default());
        assert!(!result.success);
        assert_eq!(result.report.failure_count(), 1);
    }

    #[test]
    fn test_unknown_context_is_fatal() {
        let connector = FakeConnector { clusters: HashMap::new() };
        let err = validate_deployment(&connector, &contexts(&["nowhere"]), &DiagnoseOptions::default()).unwrap_err();
        assert!(matches!(err, DiagnoseError::Connect { .. }));
    }

    #[test]
    fn test_parallel_run_keeps_context_order() {
        let names = ["c0", "c1", "c2", "c3", "c4", "c5"];
        let connector = FakeConnector {
            clusters: names
                .iter()
                .map(|n| (n.to_string(), cluster(n, endpoints())))
                .collect(),
        };
        let options = DiagnoseOptions { jobs: 3, ..Default::default() };
        let diagnosis = validate_deployment(&connector, &contexts(&names), &options).unwrap();

        assert!(diagnosis.success);
        let order: Vec<&str> = diagnosis.clusters.iter().map(|c| c.context.as_str()).collect();
        assert_eq!(order, names.to_vec());
    }

    #[test]
    fn test_empty_context_list() {
        let connector = FakeConnector { clusters: HashMap::new() };
        let diagnosis = validate_deployment(&connector, &[], &DiagnoseOptions::default()).unwrap();
        assert!(diagnosis.success);
        assert!(diagnosis.report.checks.is_empty());
    }
}
