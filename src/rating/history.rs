//! Rating backfill from historical solves
//!
//! Historical solve durations are not trustworthy, so each accepted solve only
//! says "the user could solve a problem near this difficulty". Every such
//! solve is replayed as a draw against the problem's rating, in chronological
//! order, starting from a conservative estimate.

use crate::catalog::{ProblemCatalog, ProblemRatingCache};
use crate::config::{CategoryConfig, HistoryConfig};
use crate::error::Result;
use crate::events::{notify_ratings_updated, EventPublisher};
use crate::metrics::MetricsCollector;
use crate::rating::engine::Glicko2Engine;
use crate::rating::fallback::jittered_category_rating;
use crate::storage::RatingRepository;
use crate::types::{
    Category, RatingSource, RatingsUpdated, Solve, UserRating, UserRatings,
};
use crate::utils::{mean, population_std_dev};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome assigned to every replayed historical solve
pub const TIE_OUTCOME: f64 = 0.5;

/// An accepted solve resolved against a known problem rating
#[derive(Debug, Clone)]
struct RatedSolve<'a> {
    solve: &'a Solve,
    problem_rating: f64,
}

/// Builds complete ratings from a user's history with no live interaction
#[derive(Clone)]
pub struct HistoricalEstimator {
    engine: Glicko2Engine,
    history: HistoryConfig,
    categories: CategoryConfig,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HistoricalEstimator {
    pub fn new(engine: Glicko2Engine, history: HistoryConfig, categories: CategoryConfig) -> Self {
        Self {
            engine,
            history,
            categories,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// `mean - factor * stddev` of the problem ratings, or the default rating
    pub fn conservative_estimate(&self, problem_ratings: &[f64]) -> f64 {
        if problem_ratings.is_empty() {
            return self.engine.config().default_rating;
        }
        mean(problem_ratings) - self.history.conservative_factor * population_std_dev(problem_ratings)
    }

    /// Estimate global and per-category ratings from a solve history.
    ///
    /// A problem's rating comes from `lookup` first and the solve's own
    /// rating second; solves with neither are ignored.
    pub fn estimate_ratings<R: Rng + ?Sized>(
        &self,
        solves: &[Solve],
        lookup: &ProblemRatingCache,
        rng: &mut R,
    ) -> Result<UserRatings> {
        let now = self.engine.now();

        let mut rated: Vec<RatedSolve<'_>> = solves
            .iter()
            .filter(|solve| solve.is_accepted())
            .filter_map(|solve| {
                lookup
                    .rating_for(&solve.slug)
                    .or_else(|| solve.known_rating())
                    .map(|problem_rating| RatedSolve {
                        solve,
                        problem_rating,
                    })
            })
            .collect();
        rated.sort_by_key(|r| r.solve.timestamp);

        let global = self.replay(&rated, now)?;
        debug!(
            "Replayed {} historical solves into global rating {:.0}±{:.0}",
            rated.len(),
            global.rating,
            global.rd
        );

        let mut by_category: BTreeMap<Category, Vec<RatedSolve<'_>>> = BTreeMap::new();
        for entry in &rated {
            let mut seen: Vec<&Category> = Vec::with_capacity(entry.solve.tags.len());
            for tag in &entry.solve.tags {
                if self.categories.is_reserved(tag) || seen.contains(&tag) {
                    continue;
                }
                seen.push(tag);
                by_category
                    .entry(tag.clone())
                    .or_default()
                    .push(entry.clone());
            }
        }

        let mut ratings = UserRatings::with_global(global);
        for (category, category_solves) in by_category {
            let rating = if category_solves.len() >= self.history.min_category_solves {
                self.replay(&category_solves, now)?
            } else {
                jittered_category_rating(
                    &ratings.global,
                    category_solves.len() as u32,
                    &self.categories,
                    rng,
                    now,
                )
            };
            ratings.categories.insert(category, rating);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_rating_updates(RatingSource::History, rated.len() as u64);
        }

        Ok(ratings)
    }

    /// Pull a user's history from the catalog, estimate, persist and notify
    pub async fn initialize_ratings_from_history<R: Rng + ?Sized>(
        &self,
        username: &str,
        catalog: &dyn ProblemCatalog,
        repository: &RatingRepository,
        publisher: &dyn EventPublisher,
        rng: &mut R,
    ) -> Result<UserRatings> {
        let solves = catalog.solve_history(username).await?;
        let problems = catalog.list_problems().await?;
        let lookup = ProblemRatingCache::from_problems(&problems);

        let timer = self.metrics.as_ref().map(|m| m.start_timer());
        let ratings = self.estimate_ratings(&solves, &lookup, rng)?;
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_rating_calculation(RatingSource::History, timer.stop());
        }

        repository.save_ratings(username, &ratings).await?;

        info!(
            "Initialized ratings for {} from {} solves: {:.0}±{:.0}, {} categories",
            username,
            solves.len(),
            ratings.global.rating,
            ratings.global.rd,
            ratings.categories.len()
        );

        notify_ratings_updated(
            publisher,
            RatingsUpdated {
                username: username.to_string(),
                global: ratings.global.clone(),
                category_count: ratings.categories.len(),
                source: RatingSource::History,
                timestamp: self.engine.now(),
            },
        )
        .await;

        Ok(ratings)
    }

    /// Conservative start, then every solve replayed as a tie
    fn replay(&self, solves: &[RatedSolve<'_>], now: DateTime<Utc>) -> Result<UserRating> {
        let problem_ratings: Vec<f64> = solves.iter().map(|s| s.problem_rating).collect();
        let config = self.engine.config();

        let mut current = UserRating {
            rating: self.conservative_estimate(&problem_ratings),
            rd: config.default_rd,
            volatility: config.default_volatility,
            last_updated: Some(now),
            solve_count: 0,
        };

        for entry in solves {
            current = match self
                .engine
                .update_rating_at(&current, entry.problem_rating, TIE_OUTCOME, now)
            {
                Ok(updated) => updated,
                Err(e) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_computation_failure();
                    }
                    return Err(e);
                }
            };
        }

        Ok(current)
    }
}
