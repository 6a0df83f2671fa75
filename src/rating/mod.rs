//! Glicko-2 rating core
//!
//! This module provides the scale math, the single-problem update engine,
//! historical replay, and incremental sync of new solves.

pub mod engine;
pub mod fallback;
pub mod history;
pub mod math;
pub mod sync;

// Re-export commonly used types
pub use engine::{
    calculate_partial_credit, determine_time_limit, Glicko2Engine, DEFAULT_BASE_MINUTES,
    DEFAULT_PROBLEM_RATING,
};
pub use fallback::jittered_category_rating;
pub use history::HistoricalEstimator;
pub use sync::RatingSync;
