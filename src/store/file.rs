//! File-backed record store.
//!
//! Layout under the state directory:
//!
//! ```text
//! <root>/
//! \-- <namespace>/
//!     |-- <name>.json     # StoredRecord, pretty-printed
//!     \-- <name>.lock     # present only while a writer holds the record
//! ```
//!
//! Writers take the lock file with an exclusive create, write the new
//! content to a temporary file and rename it into place, so readers never
//! observe a partially written record.
//!
//! A lock file left behind by a writer that died is taken over once it is
//! older than [`STALE_LOCK_AGE`]. Until then writers wait and eventually
//! fail with an error naming the lock file; deleting that file by hand is
//! safe when no other meshctl process is running.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::{check_version, Record, RecordStore, StoreError, StoredRecord};

const LOCK_ATTEMPTS: u32 = 50;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Lock files older than this belong to a writer that is gone
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

/// Removes the lock file when dropped
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release record lock {}: {}", self.path.display(), e);
        }
    }
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        check_path_component(namespace)?;
        Ok(self.root.join(namespace))
    }

    fn record_path(&self, namespace: &str, name: &str) -> Result<PathBuf, StoreError> {
        check_path_component(name)?;
        Ok(self.namespace_dir(namespace)?.join(format!("{}.json", name)))
    }

    fn lock(&self, namespace: &str, name: &str) -> Result<LockGuard, StoreError> {
        let dir = self.namespace_dir(namespace)?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.lock", name));

        for attempt in 1..=LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(LockGuard { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        log::warn!("Removing stale lock {} (older than {:?})", path.display(), STALE_LOCK_AGE);
                        match fs::remove_file(&path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    log::debug!("Record {}/{} is locked (attempt {}/{})", namespace, name, attempt, LOCK_ATTEMPTS);
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Io(io::Error::new(
            ErrorKind::WouldBlock,
            format!(
                "timed out waiting for lock {}; remove it if no other meshctl process is running",
                path.display()
            ),
        )))
    }

    fn read(&self, path: &Path) -> Result<Option<StoredRecord>, StoreError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, stored: &StoredRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(stored)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

fn check_path_component(component: &str) -> Result<(), StoreError> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\'])
    {
        return Err(StoreError::Io(io::Error::new(
            ErrorKind::InvalidInput,
            format!("'{}' is not a valid namespace or record name", component),
        )));
    }
    Ok(())
}

impl RecordStore for FileRecordStore {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError> {
        let path = self.record_path(namespace, name)?;
        self.read(&path)
    }

    fn create(&self, namespace: &str, record: &Record) -> Result<StoredRecord, StoreError> {
        let path = self.record_path(namespace, &record.name)?;
        let _guard = self.lock(namespace, &record.name)?;

        if path.exists() {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                name: record.name.clone(),
            });
        }

        let stored = StoredRecord { version: 1, record: record.clone() };
        self.write(&path, &stored)?;
        log::debug!("Created record {}", path.display());
        Ok(stored)
    }

    fn replace(
        &self,
        namespace: &str,
        record: &Record,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord, StoreError> {
        let path = self.record_path(namespace, &record.name)?;
        let _guard = self.lock(namespace, &record.name)?;

        let current = self.read(&path)?.ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_string(),
            name: record.name.clone(),
        })?;
        check_version(namespace, &record.name, expected_version, current.version)?;

        let stored = StoredRecord { version: current.version + 1, record: record.clone() };
        self.write(&path, &stored)?;
        log::debug!("Replaced record {} (version {})", path.display(), stored.version);
        Ok(stored)
    }
}
