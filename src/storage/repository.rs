//! Typed access to per-user records over a key-value store

use crate::error::{RatingError, Result};
use crate::storage::keys::StorageKey;
use crate::storage::store::KeyValueStore;
use crate::types::{CalibrationState, UserRatings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// JSON-backed repository for ratings, calibration state and solve sessions
#[derive(Clone)]
pub struct RatingRepository {
    store: Arc<dyn KeyValueStore>,
}

impl RatingRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load and decode a record; `None` when absent
    pub async fn load<T: DeserializeOwned>(&self, key: &StorageKey) -> Result<Option<T>> {
        let Some(value) = self.store.get(key.store(), &key.key()).await? else {
            return Ok(None);
        };

        let record = serde_json::from_value(value).map_err(|e| RatingError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    /// Encode and write a record, replacing any previous value
    pub async fn save<T: Serialize + Sync>(&self, key: &StorageKey, record: &T) -> Result<()> {
        let value = serde_json::to_value(record).map_err(|e| RatingError::InternalError {
            message: format!("Failed to encode {}: {}", key, e),
        })?;
        self.store.put(key.store(), value, &key.key()).await?;
        debug!("Saved {}", key);
        Ok(())
    }

    pub async fn remove(&self, key: &StorageKey) -> Result<()> {
        self.store.delete(key.store(), &key.key()).await?;
        debug!("Removed {}", key);
        Ok(())
    }

    pub async fn load_ratings(&self, username: &str) -> Result<Option<UserRatings>> {
        self.load(&StorageKey::Ratings(username.to_string())).await
    }

    pub async fn save_ratings(&self, username: &str, ratings: &UserRatings) -> Result<()> {
        self.save(&StorageKey::Ratings(username.to_string()), ratings)
            .await
    }

    pub async fn load_calibration(&self, username: &str) -> Result<Option<CalibrationState>> {
        self.load(&StorageKey::Calibration(username.to_string()))
            .await
    }

    pub async fn save_calibration(&self, state: &CalibrationState) -> Result<()> {
        self.save(&StorageKey::Calibration(state.username.clone()), state)
            .await
    }

    pub async fn clear_calibration(&self, username: &str) -> Result<()> {
        self.remove(&StorageKey::Calibration(username.to_string()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::{InMemoryStore, MockStore};
    use crate::types::UserRating;
    use serde_json::json;

    #[tokio::test]
    async fn test_ratings_round_trip_through_store() {
        let store = Arc::new(InMemoryStore::new());
        let repository = RatingRepository::new(store.clone());

        assert!(repository.load_ratings("alice").await.unwrap().is_none());

        let mut ratings = UserRatings::with_global(UserRating {
            rating: 1710.0,
            ..UserRating::default()
        });
        ratings
            .categories
            .insert("Graph".to_string(), UserRating::default());
        repository.save_ratings("alice", &ratings).await.unwrap();

        let loaded = repository.load_ratings("alice").await.unwrap().unwrap();
        assert_eq!(loaded, ratings);

        let raw = store.get("ratings", "alice|ratings").await.unwrap().unwrap();
        assert_eq!(raw["global"]["rating"], 1710.0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put("ratings", json!({"global": "nope"}), "bob|ratings")
            .await
            .unwrap();
        let repository = RatingRepository::new(store);

        let err = repository.load_ratings("bob").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RatingError>(),
            Some(RatingError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_storage_errors_propagate_unchanged() {
        let store = Arc::new(MockStore::new());
        store.set_fail_reads(true);
        let repository = RatingRepository::new(store);

        let err = repository.load_ratings("carol").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RatingError>(),
            Some(RatingError::StorageFailed { .. })
        ));
    }
}
