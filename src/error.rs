//! Error types for the rating service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the crate. Storage collaborators report their own failures; the core
//! propagates them unchanged with `?`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("Invalid rating input: {reason}")]
    InvalidInput { reason: String },

    #[error("Rating computation failed: {reason}")]
    ComputationFailed { reason: String },

    #[error("Storage operation failed: {message}")]
    StorageFailed { message: String },

    #[error("Stored record {key} is corrupt: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Calibration already complete for user: {username}")]
    CalibrationComplete { username: String },

    #[error("No calibration in progress for user: {username}")]
    NoCalibration { username: String },

    #[error("No active solve session for user: {username}")]
    NoActiveSession { username: String },

    #[error("Solve session already active for user: {username}")]
    SessionAlreadyActive { username: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
