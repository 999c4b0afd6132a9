//! # meshctl - Global CIDR registry and overlap diagnostics for network meshes
//!
//! This library keeps track of the global address ranges claimed by the
//! clusters of a multi-cluster network mesh, and checks that the subnets
//! those clusters advertise never overlap.
//!
//! ## Overview
//!
//! Every cluster joining the mesh claims one or more global CIDRs. The
//! claims are kept in a single shared registry record per mesh namespace.
//! Routing between clusters breaks as soon as two clusters advertise
//! intersecting subnets, so diagnostics compare the endpoint advertisements
//! visible from each cluster pair by pair.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `store`: versioned record storage (in-memory and file-backed)
//! - `registry`: registry model, record codec, allocation upsert, persistence
//! - `ip`: pairwise CIDR overlap detection
//! - `cluster`: capability traits over a cluster's API, YAML snapshot backend
//! - `diagnose`: per-cluster health and overlap checks
//! - `orchestrator`: runs the checks across cluster contexts
//! - `report`: accumulated warnings and failures
//! - `psk`: IPsec pre-shared key generation
//! - `config` / `config_loader`: YAML configuration
//! - `utils`: CIDR parsing and input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use meshctl::registry::{NetworkRegistry, RegistryStore};
//! use meshctl::store::MemoryRecordStore;
//!
//! let registry = RegistryStore::new(MemoryRecordStore::new());
//! registry.create_if_absent("mesh-broker", &NetworkRegistry::default())?;
//!
//! let joined = registry.join_cluster("mesh-broker", "east", &["242.0.0.0/16".to_string()])?;
//! assert_eq!(joined.allocation("east").unwrap().global_cidrs, vec!["242.0.0.0/16"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ```rust
//! use meshctl::ip::{detect_overlaps, EndpointRecord};
//!
//! let report = detect_overlaps(&[
//!     EndpointRecord::new("east", "east-gw", &["10.0.0.0/16"]),
//!     EndpointRecord::new("west", "west-gw", &["10.0.1.0/24"]),
//! ]);
//! assert!(!report.ok());
//! ```
//!
//! ## Error Handling
//!
//! Library operations return typed errors (`thiserror`) per concern. The
//! `meshctl` binary wraps them with `color_eyre` for reporting.

pub mod cluster;
pub mod config;
pub mod config_loader;
pub mod diagnose;
pub mod ip;
pub mod orchestrator;
pub mod psk;
pub mod registry;
pub mod report;
pub mod store;
pub mod utils;
