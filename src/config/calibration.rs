//! Calibration, history replay and category fallback configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Rules shared by every flow that derives per-category ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Tag that never gets its own rating
    pub reserved_tag: String,
    /// Category for problems with no tags
    pub default_tag: String,
    /// Half-width of the uniform jitter for under-sampled categories
    pub jitter: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    /// Added to the global RD for under-sampled categories
    pub fallback_rd_offset: f64,
    pub fallback_rd_floor: f64,
    pub fallback_rd_ceiling: f64,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            reserved_tag: "Random".to_string(),
            default_tag: "Array".to_string(),
            jitter: 50.0,
            min_rating: 800.0,
            max_rating: 3000.0,
            fallback_rd_offset: 50.0,
            fallback_rd_floor: 200.0,
            fallback_rd_ceiling: 350.0,
        }
    }
}

impl CategoryConfig {
    pub fn is_reserved(&self, tag: &str) -> bool {
        tag == self.reserved_tag
    }
}

/// Calibration session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub problem_count: usize,
    pub min_problem_rating: f64,
    pub max_problem_rating: f64,
    /// Target difficulties, visited in order, one problem each
    pub target_ratings: Vec<f64>,
    pub target_window: f64,
    /// Attempts a category needs before it is replayed independently
    pub min_category_attempts: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            problem_count: 8,
            min_problem_rating: 1100.0,
            max_problem_rating: 2300.0,
            target_ratings: vec![1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2200.0],
            target_window: 100.0,
            min_category_attempts: 2,
        }
    }
}

/// Historical backfill parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Rated solves a category needs before it is replayed independently
    pub min_category_solves: usize,
    /// Standard deviations subtracted from the mean problem rating
    pub conservative_factor: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_category_solves: 3,
            conservative_factor: 0.5,
        }
    }
}

/// Validate calibration-related configuration
pub fn validate_calibration(
    categories: &CategoryConfig,
    calibration: &CalibrationConfig,
    history: &HistoryConfig,
) -> Result<()> {
    if categories.jitter < 0.0 {
        return Err(anyhow!("Category jitter must be non-negative"));
    }
    if categories.min_rating >= categories.max_rating {
        return Err(anyhow!("Category rating bounds are inverted"));
    }
    if categories.fallback_rd_floor > categories.fallback_rd_ceiling {
        return Err(anyhow!("Category fallback deviation bounds are inverted"));
    }
    if calibration.problem_count == 0 {
        return Err(anyhow!("Calibration problem count must be greater than 0"));
    }
    if calibration.min_problem_rating > calibration.max_problem_rating {
        return Err(anyhow!("Calibration candidate window is inverted"));
    }
    if calibration.target_window < 0.0 {
        return Err(anyhow!("Calibration target window must be non-negative"));
    }
    if calibration.min_category_attempts == 0 {
        return Err(anyhow!("Category attempt threshold must be greater than 0"));
    }
    if history.min_category_solves == 0 {
        return Err(anyhow!("Category solve threshold must be greater than 0"));
    }
    if history.conservative_factor < 0.0 {
        return Err(anyhow!("Conservative factor must be non-negative"));
    }
    Ok(())
}
