//! Address range analysis.
//!
//! This module detects conflicts between the subnets clusters advertise to
//! the mesh: overlapping ranges, invalid prefixes, and clusters advertising
//! more than one endpoint.

pub mod overlap;

// Re-export commonly used types
pub use overlap::{cidrs_intersect, detect_overlaps, success_message, Conflict, EndpointRecord, OverlapReport};
