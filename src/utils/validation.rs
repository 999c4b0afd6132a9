//! Input validation utilities.
//!
//! Cluster IDs and CIDR lists arrive from the command line, configuration
//! files, and cluster snapshots. Everything written to the registry goes
//! through these checks first.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::ip_utils::parse_cidr;

/// Maximum length of a DNS-1123 label
pub const MAX_CLUSTER_ID_LEN: usize = 63;

static CLUSTER_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("Invalid cluster ID regex")
});

/// Validate a cluster ID
///
/// Cluster IDs become part of resource names in every member cluster, so
/// they must be DNS-1123 labels: lowercase alphanumerics and `-`, starting
/// and ending with an alphanumeric, at most 63 characters.
///
/// # Examples
/// ```
/// use meshctl::utils::validation::validate_cluster_id;
///
/// assert!(validate_cluster_id("east-1").is_ok());
/// assert!(validate_cluster_id("East_1").is_err());
/// assert!(validate_cluster_id("").is_err());
/// ```
pub fn validate_cluster_id(cluster_id: &str) -> Result<(), String> {
    if cluster_id.is_empty() {
        return Err("cluster ID cannot be empty".to_string());
    }

    if cluster_id.len() > MAX_CLUSTER_ID_LEN {
        return Err(format!(
            "cluster ID '{}' is longer than {} characters",
            cluster_id, MAX_CLUSTER_ID_LEN
        ));
    }

    if !CLUSTER_ID_PATTERN.is_match(cluster_id) {
        return Err(format!(
            "cluster ID '{}' must consist of lowercase alphanumerics or '-', \
            and start and end with an alphanumeric",
            cluster_id
        ));
    }

    Ok(())
}

/// Validate a list of CIDRs and reduce it to a set.
///
/// Each entry is trimmed and must parse as an IPv4 or IPv6 prefix. Exact
/// duplicates are dropped; the first occurrence keeps its position.
///
/// # Returns
/// * `Ok(Vec<String>)` with the de-duplicated CIDRs
/// * `Err(String)` naming the first invalid entry
pub fn validate_cidr_set(cidrs: &[String]) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(cidrs.len());

    for cidr in cidrs {
        let trimmed = cidr.trim();
        parse_cidr(trimmed)?;
        if seen.insert(trimmed.to_string()) {
            result.push(trimmed.to_string());
        }
    }

    Ok(result)
}
