//! Glicko-2 rating engine
//!
//! This module provides the single-problem Glicko-2 update used by every flow,
//! together with inactivity decay, expected scores, and the time-based
//! partial-credit and time-limit policies.

use crate::config::RatingConfig;
use crate::error::{RatingError, Result};
use crate::rating::math::{
    expectation, from_glicko_scale, g, rd_from_glicko_scale, rd_to_glicko_scale,
    to_glicko_scale,
};
use crate::types::UserRating;
use crate::utils::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Base minutes used when no explicit time budget is configured
pub const DEFAULT_BASE_MINUTES: u32 = 20;

/// Rating assumed for problems without a catalog rating
pub const DEFAULT_PROBLEM_RATING: f64 = 1500.0;

/// Deviation handed out by the legacy placeholder for sparse histories
const PLACEHOLDER_RD_SPARSE: f64 = 250.0;
const PLACEHOLDER_RD_ESTABLISHED: f64 = 200.0;
const PLACEHOLDER_SOLVE_THRESHOLD: u32 = 10;

/// Graded outcome for a timed attempt.
///
/// Full credit within the limit, linear decay from 1.0 to 0.3 up to twice the
/// limit, nothing beyond that or when the attempt was not completed.
pub fn calculate_partial_credit(time_used: f64, time_limit: f64, completed: bool) -> f64 {
    if !completed || time_limit <= 0.0 {
        return 0.0;
    }

    let ratio = time_used / time_limit;
    if !ratio.is_finite() {
        return 0.0;
    }

    if ratio <= 1.0 {
        1.0
    } else if ratio <= 2.0 {
        1.0 - (ratio - 1.0) * 0.7
    } else {
        0.0
    }
}

/// Time budget in seconds for a problem.
///
/// The budget is flat; `problem_rating` does not scale it.
pub fn determine_time_limit(problem_rating: Option<f64>, base_minutes: u32) -> u32 {
    let _problem_rating = problem_rating.unwrap_or(DEFAULT_PROBLEM_RATING);
    base_minutes * 60
}

/// Glicko-2 engine bound to a configuration and a clock
#[derive(Clone)]
pub struct Glicko2Engine {
    config: RatingConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Glicko2Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Glicko2Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Glicko2Engine {
    /// Create an engine that reads the wall clock
    pub fn new(config: RatingConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine with an injected clock
    pub fn with_clock(config: RatingConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RatingError::ConfigurationError {
                message: e.to_string(),
            })?;

        Ok(Self { config, clock })
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Default rating stamped with the current time
    pub fn initialize_rating(&self) -> UserRating {
        UserRating {
            rating: self.config.default_rating,
            rd: self.config.default_rd,
            volatility: self.config.default_volatility,
            last_updated: Some(self.now()),
            solve_count: 0,
        }
    }

    /// Legacy non-replayed estimate kept for historical fallback paths
    pub fn create_placeholder_rating(&self, estimated_rating: f64, solve_count: u32) -> UserRating {
        let rd = if solve_count < PLACEHOLDER_SOLVE_THRESHOLD {
            PLACEHOLDER_RD_SPARSE
        } else {
            PLACEHOLDER_RD_ESTABLISHED
        };

        UserRating {
            rating: estimated_rating.round(),
            rd,
            volatility: self.config.default_volatility,
            last_updated: Some(self.now()),
            solve_count,
        }
    }

    /// Time budget in seconds using the configured base minutes
    pub fn time_limit_for(&self, problem_rating: Option<f64>) -> u32 {
        determine_time_limit(problem_rating, self.config.base_time_limit_minutes)
    }

    /// Grow the deviation for the rating periods elapsed since the last update
    pub fn apply_time_decay(&self, rating: &UserRating, now: DateTime<Utc>) -> UserRating {
        let Some(last_updated) = rating.last_updated else {
            return rating.clone();
        };

        let elapsed_ms = (now - last_updated).num_milliseconds().max(0) as f64;
        let elapsed_periods = elapsed_ms / self.config.period_length_ms();
        let c = self.config.decay_constant;
        let decayed_rd = (rating.rd * rating.rd + c * c * elapsed_periods)
            .sqrt()
            .min(self.config.max_rd);

        UserRating {
            rd: decayed_rd,
            last_updated: Some(now),
            ..rating.clone()
        }
    }

    /// Probability the user solves a problem of the given rating
    pub fn calculate_expected_score(&self, user_rating: &UserRating, problem_rating: f64) -> f64 {
        let mu = to_glicko_scale(user_rating.rating);
        let mu_j = to_glicko_scale(problem_rating);
        let phi_j = rd_to_glicko_scale(self.config.problem_rd);
        expectation(mu, mu_j, phi_j)
    }

    /// One Glicko-2 step against a problem, timed by the engine clock
    pub fn update_rating(
        &self,
        rating: &UserRating,
        problem_rating: f64,
        actual_outcome: f64,
    ) -> Result<UserRating> {
        self.update_rating_at(rating, problem_rating, actual_outcome, self.now())
    }

    /// One Glicko-2 step against a problem at an explicit instant
    pub fn update_rating_at(
        &self,
        rating: &UserRating,
        problem_rating: f64,
        actual_outcome: f64,
        now: DateTime<Utc>,
    ) -> Result<UserRating> {
        if !actual_outcome.is_finite() {
            return Err(RatingError::InvalidInput {
                reason: format!("outcome must be finite, got {}", actual_outcome),
            }
            .into());
        }
        if !problem_rating.is_finite() {
            return Err(RatingError::InvalidInput {
                reason: format!("problem rating must be finite, got {}", problem_rating),
            }
            .into());
        }

        let decayed = self.apply_time_decay(rating, now);

        let mu = to_glicko_scale(decayed.rating);
        let phi = rd_to_glicko_scale(decayed.rd);
        let sigma = decayed.volatility;
        let mu_j = to_glicko_scale(problem_rating);
        let phi_j = rd_to_glicko_scale(self.config.problem_rd);

        let g_j = g(phi_j);
        let expected = expectation(mu, mu_j, phi_j);
        let v = 1.0 / (g_j * g_j * expected * (1.0 - expected));
        if !v.is_finite() {
            return Err(RatingError::ComputationFailed {
                reason: format!(
                    "degenerate performance variance for rating {} vs problem {}",
                    decayed.rating, problem_rating
                ),
            }
            .into());
        }
        let delta = v * g_j * (actual_outcome - expected);

        let new_sigma = self.solve_volatility(delta, phi, v, sigma)?;

        let phi_star = (phi * phi + new_sigma * new_sigma).sqrt();
        let new_phi = 1.0 / (1.0 / (phi_star * phi_star) + 1.0 / v).sqrt();
        let new_mu = mu + new_phi * new_phi * g_j * (actual_outcome - expected);

        let new_rating = from_glicko_scale(new_mu)
            .clamp(self.config.min_rating, self.config.max_rating)
            .round();
        let new_rd = rd_from_glicko_scale(new_phi)
            .clamp(self.config.min_rd, self.config.max_rd)
            .round();

        debug!(
            "Rating update vs {:.0} (outcome {:.2}, expected {:.3}): {:.0}±{:.0} -> {:.0}±{:.0}",
            problem_rating, actual_outcome, expected, decayed.rating, decayed.rd, new_rating, new_rd
        );

        Ok(UserRating {
            rating: new_rating,
            rd: new_rd,
            volatility: new_sigma,
            last_updated: Some(now),
            solve_count: decayed.solve_count + 1,
        })
    }

    /// Illinois (regula falsi) solve for the new volatility
    fn solve_volatility(&self, delta: f64, phi: f64, v: f64, sigma: f64) -> Result<f64> {
        let tau = self.config.tau;
        let tolerance = self.config.convergence_tolerance;
        let max_iterations = self.config.max_iterations;

        let a = (sigma * sigma).ln();
        let phi_sq = phi * phi;
        let delta_sq = delta * delta;

        let f = |x: f64| {
            let ex = x.exp();
            let denom = phi_sq + v + ex;
            ex * (delta_sq - phi_sq - v - ex) / (2.0 * denom * denom) - (x - a) / (tau * tau)
        };

        let mut big_a = a;
        let mut big_b = if delta_sq > phi_sq + v {
            (delta_sq - phi_sq - v).ln()
        } else {
            let mut k = 1u32;
            while f(a - f64::from(k) * tau) < 0.0 {
                if k >= max_iterations {
                    return Err(RatingError::ComputationFailed {
                        reason: format!(
                            "volatility bracket not found within {} steps",
                            max_iterations
                        ),
                    }
                    .into());
                }
                k += 1;
            }
            a - f64::from(k) * tau
        };

        let mut f_a = f(big_a);
        let mut f_b = f(big_b);
        let mut iterations = 0u32;

        while (big_b - big_a).abs() > tolerance {
            if iterations >= max_iterations {
                return Err(RatingError::ComputationFailed {
                    reason: format!(
                        "volatility did not converge within {} iterations",
                        max_iterations
                    ),
                }
                .into());
            }
            iterations += 1;

            let big_c = big_a + (big_a - big_b) * f_a / (f_b - f_a);
            let f_c = f(big_c);

            if f_c * f_b <= 0.0 {
                big_a = big_b;
                f_a = f_b;
            } else {
                f_a /= 2.0;
            }

            big_b = big_c;
            f_b = f_c;
        }

        let new_sigma = (big_a / 2.0).exp();
        if !new_sigma.is_finite() || new_sigma <= 0.0 {
            return Err(RatingError::ComputationFailed {
                reason: format!("volatility solved to invalid value {}", new_sigma),
            }
            .into());
        }

        Ok(new_sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::FixedClock;
    use chrono::{Duration, TimeZone};
    use skillratings::glicko2::{glicko2, Glicko2Config, Glicko2Rating};
    use skillratings::Outcomes;

    fn frozen_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn create_test_engine() -> Glicko2Engine {
        Glicko2Engine::with_clock(
            RatingConfig::default(),
            Arc::new(FixedClock::new(frozen_now())),
        )
        .unwrap()
    }

    #[test]
    fn test_partial_credit_boundaries() {
        assert_eq!(calculate_partial_credit(1200.0, 1200.0, true), 1.0);
        assert_eq!(calculate_partial_credit(600.0, 1200.0, true), 1.0);
        assert!((calculate_partial_credit(1800.0, 1200.0, true) - 0.65).abs() < 1e-12);
        assert!((calculate_partial_credit(2400.0, 1200.0, true) - 0.3).abs() < 1e-12);
        assert_eq!(calculate_partial_credit(2401.0, 1200.0, true), 0.0);
        assert_eq!(calculate_partial_credit(3600.0, 1200.0, true), 0.0);
    }

    #[test]
    fn test_partial_credit_incomplete_or_invalid() {
        assert_eq!(calculate_partial_credit(10.0, 1200.0, false), 0.0);
        assert_eq!(calculate_partial_credit(0.0, 1200.0, false), 0.0);
        assert_eq!(calculate_partial_credit(100.0, 0.0, true), 0.0);
        assert_eq!(calculate_partial_credit(100.0, -5.0, true), 0.0);
        assert_eq!(calculate_partial_credit(f64::NAN, 1200.0, true), 0.0);
    }

    #[test]
    fn test_time_limit_is_flat() {
        assert_eq!(determine_time_limit(Some(2000.0), DEFAULT_BASE_MINUTES), 1200);
        assert_eq!(determine_time_limit(Some(900.0), DEFAULT_BASE_MINUTES), 1200);
        assert_eq!(determine_time_limit(None, DEFAULT_BASE_MINUTES), 1200);
        assert_eq!(determine_time_limit(Some(1500.0), 30), 1800);

        let engine = create_test_engine();
        assert_eq!(engine.time_limit_for(Some(2800.0)), 1200);
    }

    #[test]
    fn test_initialize_rating() {
        let engine = create_test_engine();
        let rating = engine.initialize_rating();
        assert_eq!(rating.rating, 1500.0);
        assert_eq!(rating.rd, 350.0);
        assert_eq!(rating.volatility, 0.06);
        assert_eq!(rating.solve_count, 0);
        assert_eq!(rating.last_updated, Some(frozen_now()));
    }

    #[test]
    fn test_placeholder_rating() {
        let engine = create_test_engine();

        let sparse = engine.create_placeholder_rating(1623.6, 4);
        assert_eq!(sparse.rating, 1624.0);
        assert_eq!(sparse.rd, 250.0);
        assert_eq!(sparse.solve_count, 4);

        let established = engine.create_placeholder_rating(1623.4, 10);
        assert_eq!(established.rating, 1623.0);
        assert_eq!(established.rd, 200.0);
        assert_eq!(established.volatility, 0.06);
    }

    #[test]
    fn test_time_decay_noop_without_timestamp() {
        let engine = create_test_engine();
        let rating = UserRating {
            rd: 80.0,
            ..UserRating::default()
        };
        let decayed = engine.apply_time_decay(&rating, frozen_now());
        assert_eq!(decayed, rating);
    }

    #[test]
    fn test_time_decay_grows_and_caps() {
        let engine = create_test_engine();
        let now = frozen_now();
        let rating = UserRating {
            rd: 80.0,
            last_updated: Some(now),
            ..UserRating::default()
        };

        let same_instant = engine.apply_time_decay(&rating, now);
        assert_eq!(same_instant.rd, 80.0);

        let one_year = engine.apply_time_decay(&rating, now + Duration::days(365));
        assert!((one_year.rd - (80.0f64 * 80.0 + 2500.0).sqrt()).abs() < 1e-9);
        assert_eq!(one_year.last_updated, Some(now + Duration::days(365)));

        let ten_years = engine.apply_time_decay(&rating, now + Duration::days(3650));
        assert!(ten_years.rd > one_year.rd);

        let forever = engine.apply_time_decay(&rating, now + Duration::days(365 * 200));
        assert_eq!(forever.rd, 350.0);
    }

    #[test]
    fn test_expected_score() {
        let engine = create_test_engine();
        let user = UserRating {
            rating: 1500.0,
            ..UserRating::default()
        };

        assert!((engine.calculate_expected_score(&user, 1500.0) - 0.5).abs() < 1e-12);
        assert!(engine.calculate_expected_score(&user, 1200.0) > 0.8);
        assert!(engine.calculate_expected_score(&user, 1900.0) < 0.15);
    }

    #[test]
    fn test_full_credit_raises_rating_and_narrows_rd() {
        let engine = create_test_engine();
        let initial = engine.initialize_rating();

        let updated = engine.update_rating(&initial, 1500.0, 1.0).unwrap();
        assert!(updated.rating > 1500.0);
        assert!(updated.rd < 350.0);
        assert_eq!(updated.solve_count, 1);
        assert_eq!(updated.rating, updated.rating.round());
        assert_eq!(updated.rd, updated.rd.round());
        assert_eq!(updated.last_updated, Some(frozen_now()));
    }

    #[test]
    fn test_failure_lowers_rating() {
        let engine = create_test_engine();
        let initial = engine.initialize_rating();

        let updated = engine.update_rating(&initial, 1500.0, 0.0).unwrap();
        assert!(updated.rating < 1500.0);
        assert!(updated.rd < 350.0);
    }

    #[test]
    fn test_tie_moves_toward_problem_rating() {
        let engine = create_test_engine();
        let initial = engine.initialize_rating();

        let vs_harder = engine.update_rating(&initial, 1900.0, 0.5).unwrap();
        assert!(vs_harder.rating > 1500.0);

        let vs_easier = engine.update_rating(&initial, 1100.0, 0.5).unwrap();
        assert!(vs_easier.rating < 1500.0);
    }

    #[test]
    fn test_update_is_deterministic_with_frozen_clock() {
        let engine = create_test_engine();
        let initial = UserRating {
            rating: 1620.0,
            rd: 140.0,
            volatility: 0.061,
            last_updated: Some(frozen_now() - Duration::days(40)),
            solve_count: 12,
        };

        let first = engine.update_rating(&initial, 1750.0, 0.65).unwrap();
        let second = engine.update_rating(&initial, 1750.0, 0.65).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_update_clamps_to_bounds() {
        let engine = create_test_engine();
        let top = UserRating {
            rating: 3500.0,
            rd: 30.0,
            last_updated: Some(frozen_now()),
            ..UserRating::default()
        };
        let updated = engine.update_rating(&top, 3400.0, 1.0).unwrap();
        assert!(updated.rating <= 3500.0);
        assert!(updated.rd >= 30.0);

        let bottom = UserRating {
            rating: 800.0,
            last_updated: Some(frozen_now()),
            ..UserRating::default()
        };
        let updated = engine.update_rating(&bottom, 1800.0, 0.0).unwrap();
        assert_eq!(updated.rating, 800.0);
        assert!(updated.rd <= 350.0);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let engine = create_test_engine();
        let initial = engine.initialize_rating();

        let err = engine.update_rating(&initial, 1500.0, f64::NAN).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RatingError>(),
            Some(RatingError::InvalidInput { .. })
        ));

        assert!(engine
            .update_rating(&initial, f64::INFINITY, 1.0)
            .is_err());
    }

    #[test]
    fn test_iteration_bound_surfaces_computation_fault() {
        let config = RatingConfig {
            max_iterations: 1,
            ..RatingConfig::default()
        };
        let engine =
            Glicko2Engine::with_clock(config, Arc::new(FixedClock::new(frozen_now()))).unwrap();
        let initial = engine.initialize_rating();

        let err = engine.update_rating(&initial, 1500.0, 1.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RatingError>(),
            Some(RatingError::ComputationFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RatingConfig {
            tau: -1.0,
            ..RatingConfig::default()
        };
        assert!(Glicko2Engine::new(config).is_err());
    }

    #[test]
    fn test_matches_reference_glicko2_step() {
        let engine = create_test_engine();
        let player = UserRating {
            rating: 1500.0,
            rd: 200.0,
            volatility: 0.06,
            last_updated: Some(frozen_now()),
            solve_count: 0,
        };
        let problem = Glicko2Rating {
            rating: 1600.0,
            deviation: 50.0,
            volatility: 0.06,
        };
        let config = Glicko2Config {
            tau: 0.5,
            convergence_tolerance: 0.000_001,
        };

        for (outcome, points) in [
            (Outcomes::WIN, 1.0),
            (Outcomes::DRAW, 0.5),
            (Outcomes::LOSS, 0.0),
        ] {
            let (reference, _) = glicko2(&player.clone().into(), &problem, &outcome, &config);
            let ours = engine.update_rating(&player, 1600.0, points).unwrap();

            assert!((ours.rating - reference.rating).abs() <= 1.0);
            assert!((ours.rd - reference.deviation).abs() <= 1.0);
            assert!((ours.volatility - reference.volatility).abs() < 1e-4);
        }
    }
}
