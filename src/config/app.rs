//! Main application configuration
//!
//! This module defines the primary configuration structures for the skillmeter
//! service, including TOML and environment variable loading and validation.

use crate::config::calibration::{
    validate_calibration, CalibrationConfig, CategoryConfig, HistoryConfig,
};
use crate::config::rating::RatingConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub rating: RatingConfig,
    pub categories: CategoryConfig,
    pub calibration: CalibrationConfig,
    pub history: HistoryConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "skillmeter".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing sections use defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }

        // Rating settings
        if let Ok(tau) = env::var("RATING_TAU") {
            self.rating.tau = tau
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_TAU value: {}", tau))?;
        }
        if let Ok(decay) = env::var("RATING_DECAY_CONSTANT") {
            self.rating.decay_constant = decay
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_DECAY_CONSTANT value: {}", decay))?;
        }
        if let Ok(iterations) = env::var("RATING_MAX_ITERATIONS") {
            self.rating.max_iterations = iterations
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_MAX_ITERATIONS value: {}", iterations))?;
        }
        if let Ok(minutes) = env::var("BASE_TIME_LIMIT_MINUTES") {
            self.rating.base_time_limit_minutes = minutes
                .parse()
                .map_err(|_| anyhow!("Invalid BASE_TIME_LIMIT_MINUTES value: {}", minutes))?;
        }

        // Calibration and history settings
        if let Ok(count) = env::var("CALIBRATION_PROBLEM_COUNT") {
            self.calibration.problem_count = count
                .parse()
                .map_err(|_| anyhow!("Invalid CALIBRATION_PROBLEM_COUNT value: {}", count))?;
        }
        if let Ok(min_solves) = env::var("HISTORY_MIN_CATEGORY_SOLVES") {
            self.history.min_category_solves = min_solves.parse().map_err(|_| {
                anyhow!("Invalid HISTORY_MIN_CATEGORY_SOLVES value: {}", min_solves)
            })?;
        }

        Ok(())
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    config.rating.validate()?;
    validate_calibration(&config.categories, &config.calibration, &config.history)?;

    Ok(())
}
