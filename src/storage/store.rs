//! Key-value storage interface and implementations
//!
//! This module defines the interface the rating core uses to persist user
//! records, with an in-memory implementation and a mock for testing.

use crate::error::{RatingError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Trait for key-value storage operations
///
/// Absence is `Ok(None)`, never an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a record
    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>>;

    /// Write or replace a record
    async fn put(&self, store: &str, value: Value, key: &str) -> Result<()>;

    /// Remove a record; removing a missing record is not an error
    async fn delete(&self, store: &str, key: &str) -> Result<()>;
}

type StoreMap = HashMap<(String, String), Value>;

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<StoreMap>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all stores
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>> {
        let records = self
            .records
            .read()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })?;

        Ok(records.get(&(store.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, store: &str, value: Value, key: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;

        records.insert((store.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RatingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })?;

        records.remove(&(store.to_string(), key.to_string()));
        Ok(())
    }
}

/// A write observed by [`MockStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Put { store: String, key: String },
    Delete { store: String, key: String },
}

/// Mock store for testing: records writes and can be told to fail
#[derive(Debug, Default)]
pub struct MockStore {
    inner: InMemoryStore,
    calls: RwLock<Vec<StoreCall>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_store: RwLock<Option<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `put`/`delete` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `put`/`delete` against one store fail
    pub fn set_failing_store(&self, store: Option<&str>) {
        if let Ok(mut failing) = self.failing_store.write() {
            *failing = store.map(str::to_string);
        }
    }

    /// Get all writes made (for testing)
    pub fn get_calls(&self) -> Vec<StoreCall> {
        self.calls
            .read()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of `put` calls made against a store
    pub fn put_count(&self, store: &str) -> usize {
        self.get_calls()
            .iter()
            .filter(|call| matches!(call, StoreCall::Put { store: s, .. } if s == store))
            .count()
    }

    /// Clear recorded calls (for testing)
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.write() {
            calls.clear();
        }
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(call);
        }
    }

    fn check_writes(&self, store: &str) -> Result<()> {
        let store_failing = self
            .failing_store
            .read()
            .map(|failing| failing.as_deref() == Some(store))
            .unwrap_or(false);
        if store_failing || self.fail_writes.load(Ordering::SeqCst) {
            return Err(RatingError::StorageFailed {
                message: "simulated write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RatingError::StorageFailed {
                message: "simulated read failure".to_string(),
            }
            .into());
        }
        self.inner.get(store, key).await
    }

    async fn put(&self, store: &str, value: Value, key: &str) -> Result<()> {
        self.check_writes(store)?;
        self.record(StoreCall::Put {
            store: store.to_string(),
            key: key.to_string(),
        });
        self.inner.put(store, value, key).await
    }

    async fn delete(&self, store: &str, key: &str) -> Result<()> {
        self.check_writes(store)?;
        self.record(StoreCall::Delete {
            store: store.to_string(),
            key: key.to_string(),
        });
        self.inner.delete(store, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_store_basic_operations() {
        let store = InMemoryStore::new();

        // Initially no record
        assert!(store.get("ratings", "alice|ratings").await.unwrap().is_none());

        store
            .put("ratings", json!({"rating": 1500}), "alice|ratings")
            .await
            .unwrap();

        let value = store.get("ratings", "alice|ratings").await.unwrap().unwrap();
        assert_eq!(value["rating"], 1500);
        assert_eq!(store.len(), 1);

        // Same key in another store is a different record
        assert!(store
            .get("calibration", "alice|ratings")
            .await
            .unwrap()
            .is_none());

        store.delete("ratings", "alice|ratings").await.unwrap();
        assert!(store.is_empty());

        // Deleting a missing record is fine
        store.delete("ratings", "alice|ratings").await.unwrap();
    }

    #[tokio::test]
    async fn test_mock_store_records_writes() {
        let store = MockStore::new();
        store.put("ratings", json!(1), "a|ratings").await.unwrap();
        store.delete("sessions", "a|session").await.unwrap();

        let calls = store.get_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(store.put_count("ratings"), 1);
        assert_eq!(
            calls[1],
            StoreCall::Delete {
                store: "sessions".to_string(),
                key: "a|session".to_string()
            }
        );

        store.clear_calls();
        assert!(store.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_store_failures() {
        let store = MockStore::new();
        store.put("ratings", json!(1), "a|ratings").await.unwrap();

        store.set_fail_writes(true);
        assert!(store.put("ratings", json!(2), "a|ratings").await.is_err());
        assert!(store.delete("ratings", "a|ratings").await.is_err());

        store.set_fail_reads(true);
        let err = store.get("ratings", "a|ratings").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RatingError>(),
            Some(RatingError::StorageFailed { .. })
        ));

        store.set_fail_reads(false);
        let value = store.get("ratings", "a|ratings").await.unwrap().unwrap();
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn test_mock_store_single_failing_store() {
        let store = MockStore::new();
        store.set_failing_store(Some("sessions"));

        assert!(store.delete("sessions", "a|session").await.is_err());
        assert!(store.put("sessions", json!(1), "a|session").await.is_err());
        store.put("ratings", json!(1), "a|ratings").await.unwrap();

        store.set_failing_store(None);
        store.delete("sessions", "a|session").await.unwrap();
    }
}
