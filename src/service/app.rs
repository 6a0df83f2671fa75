//! Main application state and service coordination
//!
//! This module wires the rating engine, estimator, sync, calibration and
//! solve sessions over one set of collaborators and one configuration.

use crate::calibration::{CalibrationFlow, CalibrationService};
use crate::catalog::ProblemCatalog;
use crate::config::AppConfig;
use crate::error::Result;
use crate::events::EventPublisher;
use crate::metrics::MetricsCollector;
use crate::rating::{Glicko2Engine, HistoricalEstimator, RatingSync};
use crate::session::SolveSessionManager;
use crate::storage::{KeyValueStore, RatingRepository};
use crate::types::UserRatings;
use crate::utils::{Clock, SystemClock};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Collaborators the service is built over
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub catalog: Arc<dyn ProblemCatalog>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// Main application state containing all service components
pub struct RatingService {
    /// Application configuration
    config: AppConfig,

    engine: Glicko2Engine,
    repository: RatingRepository,
    catalog: Arc<dyn ProblemCatalog>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<MetricsCollector>,

    estimator: HistoricalEstimator,
    sync: Arc<RatingSync>,
    calibration: CalibrationService,
    sessions: SolveSessionManager,
}

impl RatingService {
    /// Initialize the service against the wall clock
    pub async fn new(
        config: AppConfig,
        collaborators: Collaborators,
    ) -> std::result::Result<Self, ServiceError> {
        Self::with_clock(config, collaborators, Arc::new(SystemClock)).await
    }

    /// Initialize the service with an injected clock
    pub async fn with_clock(
        config: AppConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ServiceError> {
        info!("Initializing {} rating service", config.service.name);

        let engine = Glicko2Engine::with_clock(config.rating.clone(), clock).map_err(|e| {
            ServiceError::Configuration {
                message: e.to_string(),
            }
        })?;

        let metrics =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let repository = RatingRepository::new(collaborators.store.clone());

        let estimator = HistoricalEstimator::new(
            engine.clone(),
            config.history.clone(),
            config.categories.clone(),
        )
        .with_metrics(metrics.clone());

        let sync = Arc::new(
            RatingSync::new(
                engine.clone(),
                config.categories.clone(),
                repository.clone(),
                collaborators.publisher.clone(),
            )
            .with_metrics(metrics.clone()),
        );

        let calibration = CalibrationService::new(
            CalibrationFlow::new(
                engine.clone(),
                config.calibration.clone(),
                config.categories.clone(),
            ),
            repository.clone(),
            collaborators.catalog.clone(),
            collaborators.publisher.clone(),
        )
        .with_metrics(metrics.clone());

        let sessions = SolveSessionManager::new(
            sync.clone(),
            repository.clone(),
            collaborators.publisher.clone(),
        )
        .with_metrics(metrics.clone());

        Ok(Self {
            config,
            engine,
            repository,
            catalog: collaborators.catalog,
            publisher: collaborators.publisher,
            metrics,
            estimator,
            sync,
            calibration,
            sessions,
        })
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Glicko2Engine {
        &self.engine
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn estimator(&self) -> &HistoricalEstimator {
        &self.estimator
    }

    pub fn sync(&self) -> Arc<RatingSync> {
        self.sync.clone()
    }

    pub fn calibration(&self) -> &CalibrationService {
        &self.calibration
    }

    pub fn sessions(&self) -> &SolveSessionManager {
        &self.sessions
    }

    /// Stored ratings for a user, if any
    pub async fn ratings(&self, username: &str) -> Result<Option<UserRatings>> {
        self.repository.load_ratings(username).await
    }

    /// Backfill a user's ratings from their catalog history
    pub async fn initialize_from_history<R: Rng + ?Sized>(
        &self,
        username: &str,
        rng: &mut R,
    ) -> Result<UserRatings> {
        self.estimator
            .initialize_ratings_from_history(
                username,
                self.catalog.as_ref(),
                &self.repository,
                self.publisher.as_ref(),
                rng,
            )
            .await
    }
}
