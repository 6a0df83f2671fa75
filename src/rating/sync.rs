//! Incremental rating sync for newly completed solves
//!
//! Each call loads the user's stored ratings, applies every solve to the
//! global rating and to each of the solve's categories, then persists once.
//! Nothing is written if any step fails.

use crate::config::CategoryConfig;
use crate::error::Result;
use crate::events::{notify_ratings_updated, EventPublisher};
use crate::metrics::MetricsCollector;
use crate::rating::engine::{calculate_partial_credit, Glicko2Engine};
use crate::storage::RatingRepository;
use crate::types::{Category, RatingSource, RatingsUpdated, Solve, UserRating, UserRatings};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome for an untimed solve that was not accepted
pub const UNTIMED_FAILURE_OUTCOME: f64 = 0.1;

/// Outcome for an untimed accepted solve
pub const UNTIMED_SUCCESS_OUTCOME: f64 = 1.0;

/// Applies completed solves to stored ratings
pub struct RatingSync {
    engine: Glicko2Engine,
    categories: CategoryConfig,
    repository: RatingRepository,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RatingSync {
    pub fn new(
        engine: Glicko2Engine,
        categories: CategoryConfig,
        repository: RatingRepository,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            engine,
            categories,
            repository,
            publisher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &Glicko2Engine {
        &self.engine
    }

    /// Outcome score for a solve: partial credit when timed, binary otherwise
    pub fn outcome_for(&self, solve: &Solve, problem_rating: f64) -> f64 {
        match solve.timed_seconds() {
            Some(time_used) => {
                let time_limit = self.engine.time_limit_for(Some(problem_rating));
                calculate_partial_credit(time_used, f64::from(time_limit), solve.is_accepted())
            }
            None if solve.is_accepted() => UNTIMED_SUCCESS_OUTCOME,
            None => UNTIMED_FAILURE_OUTCOME,
        }
    }

    /// Apply one solve and persist
    pub async fn apply_solve(&self, username: &str, solve: &Solve) -> Result<UserRatings> {
        self.apply_solves(username, std::slice::from_ref(solve)).await
    }

    /// Apply solves in the given order and persist once
    pub async fn apply_solves(&self, username: &str, solves: &[Solve]) -> Result<UserRatings> {
        let mut ratings = match self.repository.load_ratings(username).await? {
            Some(existing) => existing,
            None => {
                debug!("No stored ratings for {}, starting from defaults", username);
                UserRatings::with_global(self.engine.initialize_rating())
            }
        };

        let timer = self.metrics.as_ref().map(|m| m.start_timer());
        let mut applied = 0u64;

        for solve in solves {
            let Some(problem_rating) = solve.known_rating() else {
                debug!("Skipping {} for {}: no problem rating", solve.slug, username);
                if let Some(metrics) = &self.metrics {
                    metrics.record_skipped_solve();
                }
                continue;
            };

            let outcome = self.outcome_for(solve, problem_rating);
            ratings = self
                .apply_one(ratings, solve, problem_rating, outcome)
                .map_err(|e| {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_computation_failure();
                    }
                    e
                })?;
            applied += 1;
        }

        self.repository.save_ratings(username, &ratings).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_rating_updates(RatingSource::Sync, applied);
            if let Some(timer) = timer {
                metrics.record_rating_calculation(RatingSource::Sync, timer.stop());
            }
        }

        info!(
            "Synced {} of {} solves for {}: global {:.0}±{:.0}",
            applied,
            solves.len(),
            username,
            ratings.global.rating,
            ratings.global.rd
        );

        notify_ratings_updated(
            self.publisher.as_ref(),
            RatingsUpdated {
                username: username.to_string(),
                global: ratings.global.clone(),
                category_count: ratings.categories.len(),
                source: RatingSource::Sync,
                timestamp: self.engine.now(),
            },
        )
        .await;

        Ok(ratings)
    }

    /// Global update, then every category the solve is tagged with
    fn apply_one(
        &self,
        mut ratings: UserRatings,
        solve: &Solve,
        problem_rating: f64,
        outcome: f64,
    ) -> Result<UserRatings> {
        let previous_global = ratings.global.clone();
        ratings.global = self
            .engine
            .update_rating(&previous_global, problem_rating, outcome)?;

        if let Some(metrics) = &self.metrics {
            metrics.record_rating_delta(
                RatingSource::Sync,
                ratings.global.rating - previous_global.rating,
            );
        }

        let mut seen: Vec<&Category> = Vec::with_capacity(solve.tags.len());
        for tag in &solve.tags {
            if self.categories.is_reserved(tag) || seen.contains(&tag) {
                continue;
            }
            seen.push(tag);

            let current = match ratings.categories.get(tag) {
                Some(existing) => existing.clone(),
                None => self.seed_category(&previous_global),
            };
            let updated = self
                .engine
                .update_rating(&current, problem_rating, outcome)?;
            ratings.categories.insert(tag.clone(), updated);
        }

        Ok(ratings)
    }

    /// New category rating derived from the global rating
    fn seed_category(&self, global: &UserRating) -> UserRating {
        UserRating {
            rd: global.rd.max(self.categories.fallback_rd_floor),
            solve_count: 0,
            ..global.clone()
        }
    }
}
