//! Versioned record storage.
//!
//! The mesh keeps shared state in small namespaced records whose fields are
//! flat strings (plus an optional map of raw bytes for secrets). This module
//! defines the narrow capability the rest of the crate needs from such a
//! store, and two implementations:
//!
//! - [`MemoryRecordStore`]: process-local, used by tests
//! - [`FileRecordStore`]: one JSON file per record under a state directory
//!
//! Every stored record carries a version that increases on each replace.
//! [`RecordStore::replace`] accepts an optional expected version; when given,
//! the replace only succeeds if the stored version still matches.

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

/// Errors returned by record stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("record {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("record {namespace}/{name} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        namespace: String,
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A named record with flat string fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, Vec<u8>>,
}

impl Record {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}

/// A record as held by a store, with its current version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub version: u64,
    pub record: Record,
}

/// Capability required from a record store
pub trait RecordStore {
    /// Get a record, or `None` if it does not exist
    fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Create a record at version 1. Fails with `AlreadyExists` if present.
    fn create(&self, namespace: &str, record: &Record) -> Result<StoredRecord, StoreError>;

    /// Replace a record wholesale and bump its version.
    ///
    /// With `expected_version`, fails with `Conflict` if the stored version
    /// differs. Fails with `NotFound` if the record does not exist.
    fn replace(
        &self,
        namespace: &str,
        record: &Record,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord, StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError> {
        (**self).get(namespace, name)
    }

    fn create(&self, namespace: &str, record: &Record) -> Result<StoredRecord, StoreError> {
        (**self).create(namespace, record)
    }

    fn replace(
        &self,
        namespace: &str,
        record: &Record,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord, StoreError> {
        (**self).replace(namespace, record, expected_version)
    }
}

pub(crate) fn check_version(
    namespace: &str,
    name: &str,
    expected_version: Option<u64>,
    actual: u64,
) -> Result<(), StoreError> {
    match expected_version {
        Some(expected) if expected != actual => Err(StoreError::Conflict {
            namespace: namespace.to_string(),
            name: name.to_string(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}
