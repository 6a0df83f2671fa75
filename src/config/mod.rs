//! Configuration management for the skillmeter service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values.

pub mod app;
pub mod calibration;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use calibration::{CalibrationConfig, CategoryConfig, HistoryConfig};
pub use rating::RatingConfig;
