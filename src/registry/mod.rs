//! # Global CIDR Registry
//!
//! Each mesh namespace holds one shared registry record listing the global
//! CIDRs claimed by every cluster that has joined the mesh, together with
//! the mesh-wide defaults new clusters draw from.
//!
//! ## Components
//!
//! - `types`: the in-memory model (`NetworkRegistry`, `ClusterAllocation`)
//! - `codec`: conversion between the model and the record's flat string fields
//! - `updater`: the pure `upsert` merge applied on every cluster join
//! - `store`: reading, creating and replacing the record through a `RecordStore`
//!
//! ## Record Layout
//!
//! ```text
//! globalnetEnabled:      "true"
//! globalnetCidrRange:    "\"242.0.0.0/8\""
//! globalnetClusterSize:  "65536"
//! clusterinfo: |
//!   [
//!     { "cluster_id": "east", "global_cidr": ["242.0.0.0/16"] },
//!     { "cluster_id": "west", "global_cidr": ["242.1.0.0/16"] }
//!   ]
//! ```
//!
//! ## Invariants
//!
//! - every CIDR is a valid IPv4 or IPv6 prefix
//! - no two allocations share a cluster ID
//! - allocations keep the order in which clusters first joined
//! - `codec::decode(codec::encode(r)) == r`

pub mod codec;
pub mod store;
pub mod types;
pub mod updater;

pub use codec::CodecError;
pub use store::{RegistryStore, RetryPolicy, VersionedRegistry};
pub use types::{ClusterAllocation, NetworkRegistry};
pub use updater::upsert;

use crate::store::StoreError;

/// Errors returned by registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no registry found in namespace {namespace}")]
    NotFound { namespace: String },

    #[error("registry storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("registry record is corrupt: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid cluster ID: {0}")]
    InvalidClusterId(String),

    #[error("invalid global CIDR: {0}")]
    InvalidCidr(String),

    #[error("registry in namespace {namespace} kept changing; gave up after {attempts} attempts")]
    ConflictRetriesExhausted { namespace: String, attempts: u32 },
}
