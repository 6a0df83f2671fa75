//! Rating engine configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Glicko-2 parameters and the bounds applied to every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub default_rating: f64,
    pub default_rd: f64,
    pub default_volatility: f64,
    /// System constant constraining volatility change
    pub tau: f64,
    /// RD growth per elapsed rating period (`c`)
    pub decay_constant: f64,
    pub rating_period_days: u32,
    /// Deviation assumed for every problem
    pub problem_rd: f64,
    pub min_rating: f64,
    pub max_rating: f64,
    pub min_rd: f64,
    pub max_rd: f64,
    pub convergence_tolerance: f64,
    /// Safety bound on the volatility root-finder
    pub max_iterations: u32,
    pub base_time_limit_minutes: u32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            default_rating: 1500.0,
            default_rd: 350.0,
            default_volatility: 0.06,
            tau: 0.5,
            decay_constant: 50.0,
            rating_period_days: 365,
            problem_rd: 50.0,
            min_rating: 800.0,
            max_rating: 3500.0,
            min_rd: 30.0,
            max_rd: 350.0,
            convergence_tolerance: 1e-6,
            max_iterations: 100,
            base_time_limit_minutes: 20,
        }
    }
}

impl RatingConfig {
    /// Length of one rating period in milliseconds
    pub fn period_length_ms(&self) -> f64 {
        f64::from(self.rating_period_days) * 24.0 * 60.0 * 60.0 * 1000.0
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.tau <= 0.0 {
            return Err(anyhow!("Tau must be positive"));
        }
        if self.default_volatility <= 0.0 {
            return Err(anyhow!("Default volatility must be positive"));
        }
        if self.decay_constant < 0.0 {
            return Err(anyhow!("Decay constant must be non-negative"));
        }
        if self.rating_period_days == 0 {
            return Err(anyhow!("Rating period must be at least one day"));
        }
        if self.problem_rd <= 0.0 {
            return Err(anyhow!("Problem deviation must be positive"));
        }
        if self.min_rating >= self.max_rating {
            return Err(anyhow!(
                "Rating bounds are inverted: {} >= {}",
                self.min_rating,
                self.max_rating
            ));
        }
        if self.min_rd <= 0.0 || self.min_rd >= self.max_rd {
            return Err(anyhow!(
                "Invalid deviation bounds: [{}, {}]",
                self.min_rd,
                self.max_rd
            ));
        }
        if self.convergence_tolerance <= 0.0 {
            return Err(anyhow!("Convergence tolerance must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("Solver iteration bound must be greater than 0"));
        }
        if self.base_time_limit_minutes == 0 {
            return Err(anyhow!("Base time limit must be greater than 0"));
        }
        Ok(())
    }
}
