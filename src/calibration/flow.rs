//! Calibration state machine
//!
//! A calibration session is InProgress while it accepts timed attempts and
//! becomes Complete once finalized into a full set of ratings.

use crate::calibration::selection::select_calibration_problems;
use crate::config::{CalibrationConfig, CategoryConfig};
use crate::error::{RatingError, Result};
use crate::rating::engine::{calculate_partial_credit, Glicko2Engine, DEFAULT_PROBLEM_RATING};
use crate::rating::fallback::jittered_category_rating;
use crate::types::{CalibrationState, Category, Problem, TimedSolveAttempt, UserRatings};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Result of finalizing a calibration session
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedCalibration {
    /// The terminal state, with `is_complete` set
    pub state: CalibrationState,
    pub ratings: UserRatings,
}

/// Pure calibration transitions over an engine
#[derive(Debug, Clone)]
pub struct CalibrationFlow {
    engine: Glicko2Engine,
    calibration: CalibrationConfig,
    categories: CategoryConfig,
}

impl CalibrationFlow {
    pub fn new(
        engine: Glicko2Engine,
        calibration: CalibrationConfig,
        categories: CategoryConfig,
    ) -> Self {
        Self {
            engine,
            calibration,
            categories,
        }
    }

    pub fn engine(&self) -> &Glicko2Engine {
        &self.engine
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.calibration
    }

    /// Fresh InProgress state with the default rating
    pub fn initialize_calibration(&self, username: &str) -> CalibrationState {
        CalibrationState {
            username: username.to_string(),
            started_at: self.engine.now(),
            attempts: Vec::new(),
            current_rating: self.engine.initialize_rating(),
            is_complete: false,
        }
    }

    /// Select the configured number of calibration problems
    pub fn select_problems<R: Rng + ?Sized>(
        &self,
        problems: &[Problem],
        solved_slugs: &HashSet<String>,
        rng: &mut R,
    ) -> Vec<Problem> {
        select_calibration_problems(
            problems,
            self.calibration.problem_count,
            solved_slugs,
            &self.calibration,
            rng,
        )
    }

    /// Build an attempt record for a problem the user just worked on
    pub fn create_timed_attempt(
        &self,
        problem: &Problem,
        time_used: f64,
        completed: bool,
    ) -> TimedSolveAttempt {
        let problem_rating = problem.rating.unwrap_or(DEFAULT_PROBLEM_RATING);
        let category = problem
            .primary_category()
            .cloned()
            .unwrap_or_else(|| self.categories.default_tag.clone());

        TimedSolveAttempt {
            slug: problem.slug.clone(),
            title: problem.title.clone(),
            problem_rating,
            category,
            time_limit: self.engine.time_limit_for(Some(problem_rating)),
            time_used,
            completed,
            timestamp: self.engine.now(),
        }
    }

    /// Partial-credit outcome for a recorded attempt
    pub fn attempt_outcome(attempt: &TimedSolveAttempt) -> f64 {
        calculate_partial_credit(
            attempt.time_used,
            f64::from(attempt.time_limit),
            attempt.completed,
        )
    }

    /// Append an attempt and move the running rating
    pub fn process_calibration_attempt(
        &self,
        state: &CalibrationState,
        attempt: TimedSolveAttempt,
    ) -> Result<CalibrationState> {
        if state.is_complete {
            return Err(RatingError::CalibrationComplete {
                username: state.username.clone(),
            }
            .into());
        }

        let outcome = Self::attempt_outcome(&attempt);
        let current_rating =
            self.engine
                .update_rating(&state.current_rating, attempt.problem_rating, outcome)?;

        debug!(
            "Calibration attempt {} for {}: outcome {:.2}, rating {:.0}±{:.0}",
            attempt.slug, state.username, outcome, current_rating.rating, current_rating.rd
        );

        let mut attempts = state.attempts.clone();
        attempts.push(attempt);

        Ok(CalibrationState {
            attempts,
            current_rating,
            ..state.clone()
        })
    }

    /// Turn a session into complete ratings; the state becomes terminal
    pub fn finalize_calibration<R: Rng + ?Sized>(
        &self,
        state: &CalibrationState,
        rng: &mut R,
    ) -> Result<FinalizedCalibration> {
        if state.is_complete {
            return Err(RatingError::CalibrationComplete {
                username: state.username.clone(),
            }
            .into());
        }

        let finished = CalibrationState {
            is_complete: true,
            ..state.clone()
        };

        if state.attempts.is_empty() {
            return Ok(FinalizedCalibration {
                state: finished,
                ratings: UserRatings::with_global(self.engine.initialize_rating()),
            });
        }

        let mut global = state.current_rating.clone();
        global.solve_count = state.attempts.len() as u32;

        let mut by_category: BTreeMap<&Category, Vec<&TimedSolveAttempt>> = BTreeMap::new();
        for attempt in &state.attempts {
            if self.categories.is_reserved(&attempt.category) {
                continue;
            }
            by_category.entry(&attempt.category).or_default().push(attempt);
        }

        let now = self.engine.now();
        let mut ratings = UserRatings::with_global(global);
        for (category, attempts) in by_category {
            let rating = if attempts.len() >= self.calibration.min_category_attempts {
                let mut replayed = self.engine.initialize_rating();
                for attempt in attempts {
                    replayed = self.engine.update_rating(
                        &replayed,
                        attempt.problem_rating,
                        Self::attempt_outcome(attempt),
                    )?;
                }
                replayed
            } else {
                jittered_category_rating(
                    &ratings.global,
                    attempts.len() as u32,
                    &self.categories,
                    rng,
                    now,
                )
            };
            ratings.categories.insert(category.clone(), rating);
        }

        Ok(FinalizedCalibration {
            state: finished,
            ratings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RatingConfig;
    use crate::types::UserRating;
    use crate::utils::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn frozen_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap()
    }

    fn create_test_flow() -> CalibrationFlow {
        let engine = Glicko2Engine::with_clock(
            RatingConfig::default(),
            Arc::new(FixedClock::new(frozen_now())),
        )
        .unwrap();
        CalibrationFlow::new(
            engine,
            CalibrationConfig::default(),
            CategoryConfig::default(),
        )
    }

    fn problem(slug: &str, rating: Option<f64>, tags: &[&str]) -> Problem {
        Problem {
            slug: slug.to_string(),
            title: slug.to_string(),
            difficulty: "Medium".to_string(),
            rating,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_paid: None,
            popularity: 0.5,
        }
    }

    #[test]
    fn test_initialize_calibration() {
        let flow = create_test_flow();
        let state = flow.initialize_calibration("alice");

        assert_eq!(state.username, "alice");
        assert_eq!(state.started_at, frozen_now());
        assert!(state.attempts.is_empty());
        assert!(!state.is_complete);
        assert_eq!(state.current_rating.rating, 1500.0);
        assert_eq!(state.current_rating.rd, 350.0);
    }

    #[test]
    fn test_create_timed_attempt_defaults() {
        let flow = create_test_flow();

        let tagged = flow.create_timed_attempt(
            &problem("lru", Some(1850.0), &["Design", "Hash Table"]),
            700.0,
            true,
        );
        assert_eq!(tagged.category, "Design");
        assert_eq!(tagged.problem_rating, 1850.0);
        assert_eq!(tagged.time_limit, 1200);
        assert_eq!(tagged.timestamp, frozen_now());

        let bare = flow.create_timed_attempt(&problem("mystery", None, &[]), 100.0, false);
        assert_eq!(bare.category, "Array");
        assert_eq!(bare.problem_rating, 1500.0);
        assert_eq!(bare.time_limit, 1200);
    }

    #[test]
    fn test_process_attempt_appends_and_updates() {
        let flow = create_test_flow();
        let state = flow.initialize_calibration("bob");
        let attempt = flow.create_timed_attempt(&problem("p", Some(1600.0), &["Graph"]), 500.0, true);

        let next = flow.process_calibration_attempt(&state, attempt.clone()).unwrap();
        assert_eq!(next.attempts, vec![attempt]);
        assert!(next.current_rating.rating > 1500.0);
        assert!(next.current_rating.rd < 350.0);
        assert_eq!(next.current_rating.solve_count, 1);

        // Input state is left as it was
        assert!(state.attempts.is_empty());
    }

    #[test]
    fn test_late_and_unfinished_attempts() {
        let flow = create_test_flow();
        let state = flow.initialize_calibration("carl");

        let late = flow.create_timed_attempt(&problem("p", Some(1500.0), &[]), 1800.0, true);
        let after_late = flow.process_calibration_attempt(&state, late).unwrap();
        // 0.65 against an equal rating is still a gain
        assert!(after_late.current_rating.rating > 1500.0);

        let failed = flow.create_timed_attempt(&problem("q", Some(1500.0), &[]), 300.0, false);
        let after_fail = flow.process_calibration_attempt(&state, failed).unwrap();
        assert!(after_fail.current_rating.rating < 1500.0);
    }

    #[test]
    fn test_finalize_without_attempts_gives_defaults() {
        let flow = create_test_flow();
        let state = flow.initialize_calibration("dana");
        let mut rng = StdRng::seed_from_u64(0);

        let finalized = flow.finalize_calibration(&state, &mut rng).unwrap();
        assert!(finalized.state.is_complete);
        assert_eq!(finalized.ratings.global.rating, 1500.0);
        assert_eq!(finalized.ratings.global.solve_count, 0);
        assert!(finalized.ratings.categories.is_empty());
    }

    #[test]
    fn test_finalize_groups_categories() {
        let flow = create_test_flow();
        let mut state = flow.initialize_calibration("eve");
        let attempts = [
            (problem("g2", Some(1800.0), &["Graph"]), 2000.0, true),
            (problem("g1", Some(1400.0), &["Graph"]), 400.0, true),
            (problem("t1", Some(1600.0), &["Tree"]), 900.0, true),
            (problem("r1", Some(1700.0), &["Random"]), 600.0, true),
        ];
        for (p, time_used, completed) in &attempts {
            let attempt = flow.create_timed_attempt(p, *time_used, *completed);
            state = flow.process_calibration_attempt(&state, attempt).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(9);
        let finalized = flow.finalize_calibration(&state, &mut rng).unwrap();
        let ratings = &finalized.ratings;

        assert_eq!(ratings.global.solve_count, 4);
        assert_eq!(ratings.global.rating, state.current_rating.rating);
        assert!(!ratings.categories.contains_key("Random"));

        // Two attempts: replayed from a fresh default, harder problem first as recorded
        let graph = &ratings.categories["Graph"];
        assert_eq!(graph.solve_count, 2);
        let engine = flow.engine();
        let expected = engine
            .update_rating(
                &engine.initialize_rating(),
                1800.0,
                calculate_partial_credit(2000.0, 1200.0, true),
            )
            .and_then(|r| engine.update_rating(&r, 1400.0, 1.0))
            .unwrap();
        assert_eq!(*graph, expected);

        // One attempt: jittered from global with a wider deviation
        let tree = &ratings.categories["Tree"];
        assert_eq!(tree.solve_count, 1);
        assert!((tree.rating - ratings.global.rating).abs() <= 50.0);
        assert!(tree.rd >= 200.0);
        assert_eq!(tree.rd, (ratings.global.rd + 50.0).max(200.0));
    }

    #[test]
    fn test_complete_state_rejects_further_transitions() {
        let flow = create_test_flow();
        let mut rng = StdRng::seed_from_u64(0);
        let state = flow.initialize_calibration("finn");
        let done = flow.finalize_calibration(&state, &mut rng).unwrap().state;

        let attempt = flow.create_timed_attempt(&problem("p", Some(1500.0), &[]), 100.0, true);
        let err = flow.process_calibration_attempt(&done, attempt).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RatingError>(),
            Some(RatingError::CalibrationComplete { .. })
        ));
        assert!(flow.finalize_calibration(&done, &mut rng).is_err());
    }

    #[test]
    fn test_jitter_respects_category_bounds() {
        let flow = create_test_flow();
        let state = CalibrationState {
            current_rating: UserRating {
                rating: 3400.0,
                rd: 60.0,
                last_updated: Some(frozen_now()),
                ..UserRating::default()
            },
            ..flow.initialize_calibration("gus")
        };
        let attempt = flow.create_timed_attempt(&problem("p", Some(2300.0), &["Math"]), 100.0, true);
        let state = flow.process_calibration_attempt(&state, attempt).unwrap();

        let finalized = flow
            .finalize_calibration(&state, &mut StdRng::seed_from_u64(4))
            .unwrap();
        let math = &finalized.ratings.categories["Math"];
        assert!(math.rating <= 3000.0);
        assert_eq!(math.rd, (finalized.ratings.global.rd + 50.0).max(200.0));
    }
}
