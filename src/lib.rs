//! Skillmeter - Glicko-2 skill estimation for timed problem practice
//!
//! This crate rates users per skill category from historical solves, short
//! calibration sessions and timed solve sessions, with partial credit for
//! late solves and uncertainty that grows during inactivity.

pub mod calibration;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RatingError, Result};
pub use types::*;

// Re-export key components
pub use calibration::{CalibrationFlow, CalibrationService};
pub use catalog::{ProblemCatalog, ProblemRatingCache, StaticProblemCatalog};
pub use events::EventPublisher;
pub use rating::{Glicko2Engine, HistoricalEstimator, RatingSync};
pub use service::RatingService;
pub use session::SolveSessionManager;
pub use storage::{InMemoryStore, KeyValueStore, RatingRepository};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
