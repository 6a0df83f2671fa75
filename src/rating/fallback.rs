//! Ratings for categories with too little evidence to replay

use crate::config::CategoryConfig;
use crate::types::UserRating;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Global rating nudged by a uniform jitter, with deliberately wider deviation.
///
/// The rating is clamped to the category bounds and rounded; the deviation is
/// `global.rd + offset`, floored and capped.
pub fn jittered_category_rating<R: Rng + ?Sized>(
    global: &UserRating,
    solve_count: u32,
    config: &CategoryConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> UserRating {
    let jitter = if config.jitter > 0.0 {
        rng.gen_range(-config.jitter..=config.jitter)
    } else {
        0.0
    };

    UserRating {
        rating: (global.rating + jitter)
            .clamp(config.min_rating, config.max_rating)
            .round(),
        rd: (global.rd + config.fallback_rd_offset)
            .max(config.fallback_rd_floor)
            .min(config.fallback_rd_ceiling),
        volatility: global.volatility,
        last_updated: Some(now),
        solve_count,
    }
}
