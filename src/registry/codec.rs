//! Registry record codec.
//!
//! The backing record only holds flat string fields, so the registry is
//! spread over four of them:
//!
//! | field                  | content                                          |
//! |------------------------|--------------------------------------------------|
//! | `globalnetEnabled`     | `"true"` or `"false"`                            |
//! | `clusterinfo`          | JSON array of `{cluster_id, global_cidr[]}`      |
//! | `globalnetCidrRange`   | JSON string literal, e.g. `"\"242.0.0.0/8\""`    |
//! | `globalnetClusterSize` | decimal                                          |
//!
//! All four are always written. When decoding records written by other
//! tools, a missing `globalnetEnabled` means disabled, a missing
//! `clusterinfo` is an empty list, and a missing range or size decodes to
//! an empty string or zero.
//!
//! Both directions reject allocation lists that break registry invariants
//! (duplicate cluster IDs, invalid CIDRs); a corrupt list is never merged
//! and never written.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::{BTreeMap, HashSet};

use super::types::{ClusterAllocation, NetworkRegistry, REGISTRY_COMPONENT_LABEL, REGISTRY_RECORD_NAME};
use crate::store::Record;
use crate::utils::ip_utils::parse_cidr;

pub const GLOBALNET_STATUS_KEY: &str = "globalnetEnabled";
pub const CLUSTER_INFO_KEY: &str = "clusterinfo";
pub const GLOBALNET_CIDR_RANGE_KEY: &str = "globalnetCidrRange";
pub const GLOBALNET_CLUSTER_SIZE_KEY: &str = "globalnetClusterSize";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("field {field} has invalid boolean value {value:?}")]
    InvalidBool { field: &'static str, value: String },

    #[error("field {field} has invalid numeric value {value:?}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("field {field} is not valid JSON: {source}")]
    Json {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("allocation list contains cluster {0:?} more than once")]
    DuplicateCluster(String),

    #[error("allocation for cluster {cluster_id:?} holds an invalid CIDR: {reason}")]
    InvalidCidr { cluster_id: String, reason: String },
}

/// Encode a registry into flat string fields.
///
/// Fails on allocation lists that `decode` would reject, so a registry that
/// cannot be read back is never written.
pub fn encode(registry: &NetworkRegistry) -> Result<BTreeMap<String, String>, CodecError> {
    check_allocations(&registry.allocations)?;

    let cluster_info = encode_cluster_info(&registry.allocations)?;
    let cidr_range = serde_json::to_string(&registry.default_cidr_range)
        .map_err(|source| CodecError::Json { field: GLOBALNET_CIDR_RANGE_KEY, source })?;

    let mut data = BTreeMap::new();
    data.insert(GLOBALNET_STATUS_KEY.to_string(), registry.enabled.to_string());
    data.insert(CLUSTER_INFO_KEY.to_string(), cluster_info);
    data.insert(GLOBALNET_CIDR_RANGE_KEY.to_string(), cidr_range);
    data.insert(
        GLOBALNET_CLUSTER_SIZE_KEY.to_string(),
        registry.default_cluster_size.to_string(),
    );
    Ok(data)
}

/// Decode a registry from flat string fields
pub fn decode(data: &BTreeMap<String, String>) -> Result<NetworkRegistry, CodecError> {
    let enabled = match data.get(GLOBALNET_STATUS_KEY).map(String::as_str) {
        None => false,
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            return Err(CodecError::InvalidBool {
                field: GLOBALNET_STATUS_KEY,
                value: other.to_string(),
            })
        }
    };

    let allocations: Vec<ClusterAllocation> = match data.get(CLUSTER_INFO_KEY) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|source| CodecError::Json { field: CLUSTER_INFO_KEY, source })?,
        None => Vec::new(),
    };
    check_allocations(&allocations)?;

    let default_cidr_range = match data.get(GLOBALNET_CIDR_RANGE_KEY) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|source| CodecError::Json { field: GLOBALNET_CIDR_RANGE_KEY, source })?,
        None => String::new(),
    };

    let default_cluster_size = match data.get(GLOBALNET_CLUSTER_SIZE_KEY) {
        Some(raw) => raw.trim().parse().map_err(|source| CodecError::InvalidNumber {
            field: GLOBALNET_CLUSTER_SIZE_KEY,
            value: raw.clone(),
            source,
        })?,
        None => 0,
    };

    Ok(NetworkRegistry {
        enabled,
        default_cidr_range,
        default_cluster_size,
        allocations,
    })
}

/// Pretty-printed with tab indentation, the layout other mesh tooling writes
fn encode_cluster_info(allocations: &[ClusterAllocation]) -> Result<String, CodecError> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    allocations
        .serialize(&mut serializer)
        .map_err(|source| CodecError::Json { field: CLUSTER_INFO_KEY, source })?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn check_allocations(allocations: &[ClusterAllocation]) -> Result<(), CodecError> {
    let mut seen = HashSet::new();
    for allocation in allocations {
        if !seen.insert(allocation.cluster_id.as_str()) {
            return Err(CodecError::DuplicateCluster(allocation.cluster_id.clone()));
        }
        for cidr in &allocation.global_cidrs {
            parse_cidr(cidr).map_err(|reason| CodecError::InvalidCidr {
                cluster_id: allocation.cluster_id.clone(),
                reason,
            })?;
        }
    }
    Ok(())
}

/// Build the full registry record
pub fn to_record(registry: &NetworkRegistry) -> Result<Record, CodecError> {
    let (label_key, label_value) = REGISTRY_COMPONENT_LABEL;
    let mut record = Record::new(REGISTRY_RECORD_NAME).with_label(label_key, label_value);
    record.data = encode(registry)?;
    Ok(record)
}

pub fn from_record(record: &Record) -> Result<NetworkRegistry, CodecError> {
    decode(&record.data)
}
