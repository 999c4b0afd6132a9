//! In-memory record store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{check_version, Record, RecordStore, StoreError, StoredRecord};

type Key = (String, String);

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<Key, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, StoredRecord>> {
        // A panic while holding the lock cannot leave a half-written record
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.lock().get(&(namespace.to_string(), name.to_string())).cloned())
    }

    fn create(&self, namespace: &str, record: &Record) -> Result<StoredRecord, StoreError> {
        let mut records = self.lock();
        let key = (namespace.to_string(), record.name.clone());
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: namespace.to_string(),
                name: record.name.clone(),
            });
        }

        let stored = StoredRecord { version: 1, record: record.clone() };
        records.insert(key, stored.clone());
        Ok(stored)
    }

    fn replace(
        &self,
        namespace: &str,
        record: &Record,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord, StoreError> {
        let mut records = self.lock();
        let key = (namespace.to_string(), record.name.clone());
        let current = records.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            namespace: namespace.to_string(),
            name: record.name.clone(),
        })?;

        check_version(namespace, &record.name, expected_version, current.version)?;

        current.version += 1;
        current.record = record.clone();
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_get() {
        let store = MemoryRecordStore::new();
        let mut record = Record::new("cfg");
        record.data.insert("k".to_string(), "v".to_string());

        let stored = store.create("ns", &record).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.get("ns", "cfg").unwrap().unwrap().record, record);
        assert!(store.get("other", "cfg").unwrap().is_none());
    }

    #[test]
    fn test_create_twice_fails() {
        let store = MemoryRecordStore::new();
        store.create("ns", &Record::new("cfg")).unwrap();
        let err = store.create("ns", &Record::new("cfg")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_bumps_version_and_checks_expected() {
        let store = MemoryRecordStore::new();
        store.create("ns", &Record::new("cfg")).unwrap();

        let stored = store.replace("ns", &Record::new("cfg"), Some(1)).unwrap();
        assert_eq!(stored.version, 2);

        let err = store.replace("ns", &Record::new("cfg"), Some(1)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, actual: 2, .. }));

        let stored = store.replace("ns", &Record::new("cfg"), None).unwrap();
        assert_eq!(stored.version, 3);
    }

    #[test]
    fn test_replace_missing() {
        let store = MemoryRecordStore::new();
        let err = store.replace("ns", &Record::new("cfg"), None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
