//! Cross-cluster CIDR overlap detection.
//!
//! Every cluster in the mesh advertises one or more endpoints, each carrying
//! the subnets that cluster exports. Routing across the mesh is only
//! unambiguous when no two clusters advertise intersecting subnets, and when
//! each cluster advertises exactly one endpoint.
//!
//! [`detect_overlaps`] evaluates every unordered pair of endpoints exactly
//! once and collects every conflict it finds; it never stops at the first.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::report::Issue;
use crate::utils::ip_utils::parse_cidr;

/// A cluster's advertised endpoint, as discovered on one validation run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub cluster_id: String,
    pub name: String,
    #[serde(default)]
    pub subnets: Vec<String>,
}

impl EndpointRecord {
    pub fn new(cluster_id: &str, name: &str, subnets: &[&str]) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            name: name.to_string(),
            subnets: subnets.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.cluster_id
            .cmp(&other.cluster_id)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.subnets.cmp(&other.subnets))
    }
}

/// A single conflict found between advertised endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conflict {
    /// Two endpoints claim the same cluster ID
    DuplicateCluster {
        cluster_id: String,
        first_endpoint: String,
        second_endpoint: String,
    },
    /// `subnet` of `cluster_id` intersects one of `other_subnets` of `other_cluster_id`
    Overlap {
        subnet: String,
        cluster_id: String,
        other_cluster_id: String,
        other_subnets: Vec<String>,
    },
    /// An advertised subnet is not a valid CIDR
    InvalidCidr {
        cluster_id: String,
        endpoint: String,
        reason: String,
    },
}

impl Conflict {
    /// Every conflict is a failure-severity issue
    pub fn to_issue(&self) -> Issue {
        Issue::failure(self.to_string())
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::DuplicateCluster { cluster_id, first_endpoint, second_endpoint } => write!(
                f,
                "Found multiple endpoints ({:?} and {:?}) in cluster {:?}",
                first_endpoint, second_endpoint, cluster_id
            ),
            Conflict::Overlap { subnet, cluster_id, other_cluster_id, other_subnets } => write!(
                f,
                "CIDR {:?} in cluster {:?} overlaps with cluster {:?} (CIDRs: [{}])",
                subnet,
                cluster_id,
                other_cluster_id,
                other_subnets.join(", ")
            ),
            Conflict::InvalidCidr { cluster_id, endpoint, reason } => write!(
                f,
                "Error parsing CIDR of endpoint {:?} in cluster {:?}: {}",
                endpoint, cluster_id, reason
            ),
        }
    }
}

/// Outcome of an overlap detection run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapReport {
    pub conflicts: Vec<Conflict>,
    pub pairs_evaluated: usize,
}

impl OverlapReport {
    /// True when no conflict was found
    pub fn ok(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.conflicts.iter().map(Conflict::to_issue).collect()
    }
}

/// Success message for a clean run, worded for the allocation mode
pub fn success_message(globalnet_enabled: bool) -> &'static str {
    if globalnet_enabled {
        "Clusters do not have overlapping globalnet CIDRs"
    } else {
        "Clusters do not have overlapping CIDRs"
    }
}

/// Check whether two prefixes share at least one address.
///
/// Prefixes intersect iff one contains the other's network address; this
/// holds for any pair of prefix lengths. Different address families never
/// intersect.
pub fn cidrs_intersect(a: &IpNet, b: &IpNet) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

struct ParsedEndpoint<'a> {
    record: &'a EndpointRecord,
    nets: Vec<(&'a str, IpNet)>,
}

/// Evaluate all pairwise conflicts among `endpoints`.
///
/// Each unordered pair is evaluated once. Within a pair the endpoints are
/// put in canonical order (cluster ID, then name) so the conflicts reported
/// for a pair do not depend on input order. Subnets that fail to parse are
/// reported once per endpoint and excluded from comparison.
pub fn detect_overlaps(endpoints: &[EndpointRecord]) -> OverlapReport {
    let mut report = OverlapReport::default();

    let parsed: Vec<ParsedEndpoint<'_>> = endpoints
        .iter()
        .map(|record| parse_endpoint(record, &mut report.conflicts))
        .collect();

    for (i, first) in parsed.iter().enumerate() {
        for second in &parsed[i + 1..] {
            report.pairs_evaluated += 1;
            let (source, dest) = match first.record.canonical_cmp(second.record) {
                Ordering::Greater => (second, first),
                _ => (first, second),
            };
            evaluate_pair(source, dest, &mut report.conflicts);
        }
    }

    log::debug!(
        "Evaluated {} endpoint pairs across {} endpoints, {} conflicts",
        report.pairs_evaluated,
        endpoints.len(),
        report.conflicts.len()
    );

    report
}

fn parse_endpoint<'a>(record: &'a EndpointRecord, conflicts: &mut Vec<Conflict>) -> ParsedEndpoint<'a> {
    let mut nets = Vec::with_capacity(record.subnets.len());
    for subnet in &record.subnets {
        match parse_cidr(subnet) {
            Ok(net) => nets.push((subnet.as_str(), net)),
            Err(reason) => {
                log::warn!("Endpoint {} in cluster {} advertises {}", record.name, record.cluster_id, reason);
                conflicts.push(Conflict::InvalidCidr {
                    cluster_id: record.cluster_id.clone(),
                    endpoint: record.name.clone(),
                    reason,
                });
            }
        }
    }
    ParsedEndpoint { record, nets }
}

fn evaluate_pair(source: &ParsedEndpoint<'_>, dest: &ParsedEndpoint<'_>, conflicts: &mut Vec<Conflict>) {
    // Multiple endpoints per cluster are not supported; their subnets are
    // expected to match, so comparing them would only add noise.
    if source.record.cluster_id == dest.record.cluster_id {
        conflicts.push(Conflict::DuplicateCluster {
            cluster_id: source.record.cluster_id.clone(),
            first_endpoint: source.record.name.clone(),
            second_endpoint: dest.record.name.clone(),
        });
        return;
    }

    for (subnet, net) in &dest.nets {
        if source.nets.iter().any(|(_, other)| cidrs_intersect(net, other)) {
            conflicts.push(Conflict::Overlap {
                subnet: subnet.to_string(),
                cluster_id: dest.record.cluster_id.clone(),
                other_cluster_id: source.record.cluster_id.clone(),
                other_subnets: source.record.subnets.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(cidr: &str) -> IpNet {
        parse_cidr(cidr).unwrap()
    }

    #[test]
    fn test_cidrs_intersect_ipv4() {
        assert!(!cidrs_intersect(&net("10.0.0.0/24"), &net("10.1.0.0/24")));
        assert!(cidrs_intersect(&net("10.0.0.0/16"), &net("10.0.1.0/24")));
        assert!(cidrs_intersect(&net("10.0.1.0/24"), &net("10.0.0.0/16")));
        assert!(cidrs_intersect(&net("10.0.0.0/24"), &net("10.0.0.0/24")));
        assert!(!cidrs_intersect(&net("10.0.0.0/25"), &net("10.0.0.128/25")));
        assert!(cidrs_intersect(&net("0.0.0.0/0"), &net("192.168.1.1/32")));
    }

    #[test]
    fn test_cidrs_intersect_ipv6() {
        assert!(cidrs_intersect(&net("fd00::/8"), &net("fd12:3456::/32")));
        assert!(!cidrs_intersect(&net("fd00::/16"), &net("fd01::/16")));
        assert!(cidrs_intersect(&net("2001:db8::/127"), &net("2001:db8::1/128")));
    }

    #[test]
    fn test_cidrs_intersect_mixed_families() {
        assert!(!cidrs_intersect(&net("0.0.0.0/0"), &net("::/0")));
        assert!(!cidrs_intersect(&net("::ffff:10.0.0.0/104"), &net("10.0.0.0/8")));
    }

    #[test]
    fn test_empty_input() {
        let report = detect_overlaps(&[]);
        assert!(report.ok());
        assert!(report.conflicts.is_empty());
        assert_eq!(report.pairs_evaluated, 0);
    }

    #[test]
    fn test_single_endpoint() {
        let report = detect_overlaps(&[EndpointRecord::new("a", "ep-a", &["10.0.0.0/8"])]);
        assert!(report.ok());
        assert_eq!(report.pairs_evaluated, 0);
    }

    #[test]
    fn test_disjoint_clusters() {
        let endpoints = vec![
            EndpointRecord::new("a", "ep-a", &["10.0.0.0/24"]),
            EndpointRecord::new("b", "ep-b", &["10.1.0.0/24"]),
        ];
        let report = detect_overlaps(&endpoints);
        assert!(report.ok());
        assert_eq!(report.pairs_evaluated, 1);
    }

    #[test]
    fn test_contained_subnet_overlaps() {
        let endpoints = vec![
            EndpointRecord::new("a", "ep-a", &["10.0.0.0/16"]),
            EndpointRecord::new("b", "ep-b", &["10.0.1.0/24"]),
        ];
        let report = detect_overlaps(&endpoints);
        assert!(!report.ok());
        assert_eq!(
            report.conflicts,
            vec![Conflict::Overlap {
                subnet: "10.0.1.0/24".to_string(),
                cluster_id: "b".to_string(),
                other_cluster_id: "a".to_string(),
                other_subnets: vec!["10.0.0.0/16".to_string()],
            }]
        );
    }

    #[test]
    fn test_duplicate_cluster_ignores_subnets() {
        let endpoints = vec![
            EndpointRecord::new("a", "ep-1", &["10.0.0.0/24"]),
            EndpointRecord::new("a", "ep-2", &["192.168.0.0/24"]),
        ];
        let report = detect_overlaps(&endpoints);
        assert_eq!(
            report.conflicts,
            vec![Conflict::DuplicateCluster {
                cluster_id: "a".to_string(),
                first_endpoint: "ep-1".to_string(),
                second_endpoint: "ep-2".to_string(),
            }]
        );

        let overlapping = vec![
            EndpointRecord::new("a", "ep-1", &["10.0.0.0/24"]),
            EndpointRecord::new("a", "ep-2", &["10.0.0.0/24"]),
        ];
        let report = detect_overlaps(&overlapping);
        assert_eq!(report.conflicts.len(), 1);
        assert!(matches!(report.conflicts[0], Conflict::DuplicateCluster { .. }));
    }

    #[test]
    fn test_symmetry() {
        let a = EndpointRecord::new("a", "ep-a", &["10.0.0.0/16", "fd00::/64"]);
        let b = EndpointRecord::new("b", "ep-b", &["10.0.5.0/24", "fd00::/48"]);

        let forward = detect_overlaps(&[a.clone(), b.clone()]);
        let reverse = detect_overlaps(&[b, a]);
        assert_eq!(forward, reverse);
        assert_eq!(forward.conflicts.len(), 2);
    }

    #[test]
    fn test_duplicate_symmetry() {
        let first = EndpointRecord::new("a", "ep-1", &[]);
        let second = EndpointRecord::new("a", "ep-2", &[]);
        assert_eq!(
            detect_overlaps(&[first.clone(), second.clone()]),
            detect_overlaps(&[second, first])
        );
    }

    #[test]
    fn test_triple_duplicate_evaluates_each_pair_once() {
        let endpoints = vec![
            EndpointRecord::new("a", "ep-1", &["10.0.0.0/24"]),
            EndpointRecord::new("a", "ep-2", &["10.0.0.0/24"]),
            EndpointRecord::new("a", "ep-3", &["10.0.0.0/24"]),
        ];
        let report = detect_overlaps(&endpoints);
        assert_eq!(report.pairs_evaluated, 3);
        assert_eq!(report.conflicts.len(), 3);
        assert!(report
            .conflicts
            .iter()
            .all(|c| matches!(c, Conflict::DuplicateCluster { .. })));
    }

    #[test]
    fn test_three_cluster_scenario() {
        let endpoints = vec![
            EndpointRecord::new("cluster-a", "ep-a", &["10.0.0.0/24"]),
            EndpointRecord::new("cluster-b", "ep-b", &["10.0.0.0/25"]),
            EndpointRecord::new("cluster-c", "ep-c", &["10.1.0.0/24"]),
        ];
        let report = detect_overlaps(&endpoints);
        assert_eq!(report.pairs_evaluated, 3);
        assert_eq!(report.conflicts.len(), 1);
        match &report.conflicts[0] {
            Conflict::Overlap { cluster_id, other_cluster_id, .. } => {
                assert_eq!(cluster_id, "cluster-b");
                assert_eq!(other_cluster_id, "cluster-a");
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
    }

    #[test]
    fn test_every_overlapping_subnet_reported() {
        let endpoints = vec![
            EndpointRecord::new("a", "ep-a", &["10.0.0.0/8"]),
            EndpointRecord::new("b", "ep-b", &["10.1.0.0/16", "172.16.0.0/12", "10.2.0.0/16"]),
        ];
        let report = detect_overlaps(&endpoints);
        let subnets: Vec<&str> = report
            .conflicts
            .iter()
            .filter_map(|c| match c {
                Conflict::Overlap { subnet, .. } => Some(subnet.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(subnets, vec!["10.1.0.0/16", "10.2.0.0/16"]);
    }

    #[test]
    fn test_invalid_cidr_reported_once_and_detection_continues() {
        let endpoints = vec![
            EndpointRecord::new("a", "ep-a", &["bogus", "10.0.0.0/24"]),
            EndpointRecord::new("b", "ep-b", &["10.0.0.0/24"]),
            EndpointRecord::new("c", "ep-c", &["10.9.0.0/24"]),
        ];
        let report = detect_overlaps(&endpoints);
        let invalid = report
            .conflicts
            .iter()
            .filter(|c| matches!(c, Conflict::InvalidCidr { .. }))
            .count();
        let overlaps = report
            .conflicts
            .iter()
            .filter(|c| matches!(c, Conflict::Overlap { .. }))
            .count();
        assert_eq!(invalid, 1);
        assert_eq!(overlaps, 1);
    }

    #[test]
    fn test_issue_messages() {
        let conflict = Conflict::DuplicateCluster {
            cluster_id: "a".to_string(),
            first_endpoint: "ep-1".to_string(),
            second_endpoint: "ep-2".to_string(),
        };
        let issue = conflict.to_issue();
        assert!(issue.is_failure());
        assert_eq!(issue.message, "Found multiple endpoints (\"ep-1\" and \"ep-2\") in cluster \"a\"");
    }

    #[test]
    fn test_success_message() {
        assert_eq!(success_message(true), "Clusters do not have overlapping globalnet CIDRs");
        assert_eq!(success_message(false), "Clusters do not have overlapping CIDRs");
    }
}
