//! Allocation updates.

use super::types::{ClusterAllocation, NetworkRegistry};
use super::RegistryError;
use crate::utils::validation::{validate_cidr_set, validate_cluster_id};

/// Record `cidrs` as the global CIDRs of `cluster_id`, returning the new registry.
///
/// An existing entry for the cluster keeps its position and has its CIDRs
/// replaced; a new cluster is appended after every cluster already present.
/// Applying the same upsert twice yields the same registry.
///
/// The cluster ID must be a DNS-1123 label and every CIDR a valid IPv4 or
/// IPv6 prefix. Repeated CIDRs are collapsed, keeping first occurrence order.
pub fn upsert(
    registry: &NetworkRegistry,
    cluster_id: &str,
    cidrs: &[String],
) -> Result<NetworkRegistry, RegistryError> {
    validate_cluster_id(cluster_id).map_err(RegistryError::InvalidClusterId)?;
    let cidrs = validate_cidr_set(cidrs).map_err(RegistryError::InvalidCidr)?;

    let mut updated = registry.clone();
    match updated.allocations.iter_mut().find(|a| a.cluster_id == cluster_id) {
        Some(existing) => {
            log::debug!(
                "Replacing global CIDRs of cluster {}: {:?} -> {:?}",
                cluster_id,
                existing.global_cidrs,
                cidrs
            );
            existing.global_cidrs = cidrs;
        }
        None => {
            log::debug!("Adding cluster {} with global CIDRs {:?}", cluster_id, cidrs);
            updated.allocations.push(ClusterAllocation::new(cluster_id, cidrs));
        }
    }

    Ok(updated)
}
