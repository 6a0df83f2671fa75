//! Storage collaborator interface
//!
//! The rating core persists nothing itself; it reads and writes whole user
//! records through a key-value store supplied by the caller.

pub mod keys;
pub mod repository;
pub mod store;

// Re-export commonly used types
pub use keys::{StorageKey, CALIBRATION_STORE, RATINGS_STORE, SESSION_STORE};
pub use repository::RatingRepository;
pub use store::{InMemoryStore, KeyValueStore, MockStore, StoreCall};
