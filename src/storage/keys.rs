//! Record keys understood by the storage collaborator

use std::fmt;

pub const RATINGS_STORE: &str = "ratings";
pub const CALIBRATION_STORE: &str = "calibration";
pub const SESSION_STORE: &str = "sessions";

/// Per-user record addressed in the key-value store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Ratings(String),
    Calibration(String),
    Session(String),
}

impl StorageKey {
    /// Store the record lives in
    pub fn store(&self) -> &'static str {
        match self {
            StorageKey::Ratings(_) => RATINGS_STORE,
            StorageKey::Calibration(_) => CALIBRATION_STORE,
            StorageKey::Session(_) => SESSION_STORE,
        }
    }

    /// Key of the form `<username>|<suffix>`
    pub fn key(&self) -> String {
        match self {
            StorageKey::Ratings(username) => format!("{}|ratings", username),
            StorageKey::Calibration(username) => format!("{}|calibration", username),
            StorageKey::Session(username) => format!("{}|session", username),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store(), self.key())
    }
}
