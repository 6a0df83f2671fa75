//! Persisted calibration lifecycle
//!
//! Wraps [`CalibrationFlow`] with the storage and catalog collaborators so a
//! calibration session survives between requests. Every step loads the
//! stored state, applies one transition and writes the result back.

use crate::calibration::flow::CalibrationFlow;
use crate::catalog::ProblemCatalog;
use crate::error::{RatingError, Result};
use crate::events::{notify_ratings_updated, EventPublisher};
use crate::metrics::MetricsCollector;
use crate::storage::RatingRepository;
use crate::types::{CalibrationState, Problem, RatingSource, RatingsUpdated, UserRatings};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// A freshly started calibration and the problems chosen for it
#[derive(Debug, Clone)]
pub struct CalibrationStart {
    pub state: CalibrationState,
    pub problems: Vec<Problem>,
}

/// Calibration sessions backed by the storage collaborator
pub struct CalibrationService {
    flow: CalibrationFlow,
    repository: RatingRepository,
    catalog: Arc<dyn ProblemCatalog>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CalibrationService {
    pub fn new(
        flow: CalibrationFlow,
        repository: RatingRepository,
        catalog: Arc<dyn ProblemCatalog>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            flow,
            repository,
            catalog,
            publisher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Begin a calibration, replacing any unfinished one
    pub async fn start<R: Rng + ?Sized>(
        &self,
        username: &str,
        rng: &mut R,
    ) -> Result<CalibrationStart> {
        let history = self.catalog.solve_history(username).await?;
        let problems = self.catalog.list_problems().await?;

        let solved: HashSet<String> = history
            .iter()
            .filter(|solve| solve.is_accepted())
            .map(|solve| solve.slug.clone())
            .collect();

        let selected = self.flow.select_problems(&problems, &solved, rng);
        if selected.len() < self.flow.config().problem_count {
            warn!(
                "Only {} calibration problems available for {}",
                selected.len(),
                username
            );
        }

        if self.repository.load_calibration(username).await?.is_some() {
            info!("Restarting unfinished calibration for {}", username);
        }

        let state = self.flow.initialize_calibration(username);
        self.repository.save_calibration(&state).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_calibration_started();
        }
        info!(
            "Started calibration for {} with {} problems",
            username,
            selected.len()
        );

        Ok(CalibrationStart {
            state,
            problems: selected,
        })
    }

    /// Stored calibration state, if any
    pub async fn current(&self, username: &str) -> Result<Option<CalibrationState>> {
        self.repository.load_calibration(username).await
    }

    /// Record one timed attempt against the running calibration
    pub async fn record_attempt(
        &self,
        username: &str,
        problem: &Problem,
        time_used: f64,
        completed: bool,
    ) -> Result<CalibrationState> {
        let state = self.load_state(username).await?;

        let attempt = self.flow.create_timed_attempt(problem, time_used, completed);
        let outcome = CalibrationFlow::attempt_outcome(&attempt);
        let next = self.flow.process_calibration_attempt(&state, attempt)?;
        self.repository.save_calibration(&next).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_calibration_attempt(outcome);
        }

        Ok(next)
    }

    /// Finalize, persist the ratings and discard the calibration record
    pub async fn finish<R: Rng + ?Sized>(
        &self,
        username: &str,
        rng: &mut R,
    ) -> Result<UserRatings> {
        let state = self.load_state(username).await?;

        let timer = self.metrics.as_ref().map(|m| m.start_timer());
        let finalized = self.flow.finalize_calibration(&state, rng)?;

        self.repository
            .save_ratings(username, &finalized.ratings)
            .await?;
        self.repository.clear_calibration(username).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_calibration_finalized();
            metrics.record_rating_updates(
                RatingSource::Calibration,
                finalized.state.attempts.len() as u64,
            );
            if let Some(timer) = timer {
                metrics.record_rating_calculation(RatingSource::Calibration, timer.stop());
            }
        }

        info!(
            "Finished calibration for {} after {} attempts: {:.0}±{:.0}",
            username,
            finalized.state.attempts.len(),
            finalized.ratings.global.rating,
            finalized.ratings.global.rd
        );

        notify_ratings_updated(
            self.publisher.as_ref(),
            RatingsUpdated {
                username: username.to_string(),
                global: finalized.ratings.global.clone(),
                category_count: finalized.ratings.categories.len(),
                source: RatingSource::Calibration,
                timestamp: self.flow.engine().now(),
            },
        )
        .await;

        Ok(finalized.ratings)
    }

    /// Drop an unfinished calibration without touching ratings
    pub async fn abandon(&self, username: &str) -> Result<()> {
        self.load_state(username).await?;
        self.repository.clear_calibration(username).await?;
        info!("Abandoned calibration for {}", username);
        Ok(())
    }

    async fn load_state(&self, username: &str) -> Result<CalibrationState> {
        self.repository
            .load_calibration(username)
            .await?
            .ok_or_else(|| {
                RatingError::NoCalibration {
                    username: username.to_string(),
                }
                .into()
            })
    }
}
