//! Registry persistence.
//!
//! [`RegistryStore`] reads and writes the single registry record of a mesh
//! namespace through any [`RecordStore`].
//!
//! [`RegistryStore::persist`] is a plain wholesale replace: two writers that
//! read, merge and persist at the same time lose one of their updates.
//! [`RegistryStore::join_cluster`] is the safe path for cluster joins; it
//! replaces only if the record is unchanged since it was read, and re-reads
//! and re-merges on conflict.

use std::thread;
use std::time::Duration;

use super::codec::{from_record, to_record};
use super::types::{NetworkRegistry, REGISTRY_RECORD_NAME};
use super::updater::upsert;
use super::RegistryError;
use crate::store::{RecordStore, StoreError};

/// Default number of compare-and-swap attempts for a cluster join
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between compare-and-swap attempts
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// How a conflicting cluster join is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, backoff: DEFAULT_RETRY_BACKOFF }
    }
}

/// A registry together with the record version it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRegistry {
    pub registry: NetworkRegistry,
    pub version: u64,
}

pub struct RegistryStore<S: RecordStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: RecordStore> RegistryStore<S> {
    pub fn new(store: S) -> Self {
        Self { store, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create the registry with `initial` unless one already exists.
    ///
    /// Returns the stored registry, which is the existing one, untouched,
    /// when it was already present. Losing a creation race to another
    /// writer is not an error.
    pub fn create_if_absent(
        &self,
        namespace: &str,
        initial: &NetworkRegistry,
    ) -> Result<NetworkRegistry, RegistryError> {
        if let Some(existing) = self.store.get(namespace, REGISTRY_RECORD_NAME)? {
            log::info!("Registry already exists in namespace {}", namespace);
            return Ok(from_record(&existing.record)?);
        }

        let record = to_record(initial)?;
        match self.store.create(namespace, &record) {
            Ok(_) => {
                log::info!(
                    "Created registry in namespace {} (globalnet enabled: {})",
                    namespace,
                    initial.enabled
                );
                Ok(initial.clone())
            }
            Err(StoreError::AlreadyExists { .. }) => {
                log::info!("Registry in namespace {} was created concurrently", namespace);
                self.fetch(namespace)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the registry; `NotFound` if it was never created
    pub fn fetch(&self, namespace: &str) -> Result<NetworkRegistry, RegistryError> {
        Ok(self.fetch_versioned(namespace)?.registry)
    }

    pub fn fetch_versioned(&self, namespace: &str) -> Result<VersionedRegistry, RegistryError> {
        let stored = self
            .store
            .get(namespace, REGISTRY_RECORD_NAME)?
            .ok_or_else(|| RegistryError::NotFound { namespace: namespace.to_string() })?;

        Ok(VersionedRegistry {
            registry: from_record(&stored.record)?,
            version: stored.version,
        })
    }

    /// Replace the stored registry wholesale, without any version check
    pub fn persist(&self, namespace: &str, registry: &NetworkRegistry) -> Result<(), RegistryError> {
        let record = to_record(registry)?;
        self.store
            .replace(namespace, &record, None)
            .map_err(|e| not_found_or(namespace, e))?;
        Ok(())
    }

    /// Replace the stored registry only if it is still at `version`.
    ///
    /// Returns the new version. Fails with `RegistryError::Storage` wrapping
    /// `StoreError::Conflict` if another writer got there first.
    pub fn persist_if_unchanged(
        &self,
        namespace: &str,
        registry: &NetworkRegistry,
        version: u64,
    ) -> Result<u64, RegistryError> {
        let record = to_record(registry)?;
        let stored = self
            .store
            .replace(namespace, &record, Some(version))
            .map_err(|e| not_found_or(namespace, e))?;
        Ok(stored.version)
    }

    /// Record a cluster's global CIDRs: fetch, upsert, compare-and-swap.
    ///
    /// Conflicting writes are retried from a fresh read according to the
    /// retry policy. Returns the registry as persisted.
    pub fn join_cluster(
        &self,
        namespace: &str,
        cluster_id: &str,
        cidrs: &[String],
    ) -> Result<NetworkRegistry, RegistryError> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.fetch_versioned(namespace)?;
            let updated = upsert(&current.registry, cluster_id, cidrs)?;

            if updated == current.registry {
                log::info!("Cluster {} already holds {:?}; registry unchanged", cluster_id, cidrs);
                return Ok(updated);
            }

            match self.persist_if_unchanged(namespace, &updated, current.version) {
                Ok(version) => {
                    log::info!(
                        "Recorded global CIDRs {:?} for cluster {} (registry version {})",
                        cidrs,
                        cluster_id,
                        version
                    );
                    return Ok(updated);
                }
                Err(RegistryError::Storage(StoreError::Conflict { .. })) => {
                    log::warn!(
                        "Registry in namespace {} changed while joining cluster {} (attempt {}/{})",
                        namespace,
                        cluster_id,
                        attempt,
                        attempts
                    );
                    if attempt < attempts && !self.retry.backoff.is_zero() {
                        thread::sleep(self.retry.backoff);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(RegistryError::ConflictRetriesExhausted {
            namespace: namespace.to_string(),
            attempts,
        })
    }
}

fn not_found_or(namespace: &str, error: StoreError) -> RegistryError {
    match error {
        StoreError::NotFound { .. } => RegistryError::NotFound { namespace: namespace.to_string() },
        other => RegistryError::Storage(other),
    }
}
