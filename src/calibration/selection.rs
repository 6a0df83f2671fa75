//! Calibration problem selection
//!
//! Picks one problem per target difficulty band, spreading picks across
//! categories, then tops up by popularity and shuffles the result.

use crate::config::CalibrationConfig;
use crate::types::{Category, Problem};
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Select up to `count` calibration problems the user has not solved.
///
/// Returns fewer than `count` when candidates run out. The order of the
/// result is randomized so difficulty does not rise monotonically.
pub fn select_calibration_problems<R: Rng + ?Sized>(
    problems: &[Problem],
    count: usize,
    solved_slugs: &HashSet<String>,
    config: &CalibrationConfig,
    rng: &mut R,
) -> Vec<Problem> {
    let candidates: Vec<(&Problem, f64)> = problems
        .iter()
        .filter(|p| !solved_slugs.contains(&p.slug) && !p.is_paid())
        .filter_map(|p| {
            p.known_rating()
                .filter(|r| *r >= config.min_problem_rating && *r <= config.max_problem_rating)
                .map(|r| (p, r))
        })
        .collect();

    let mut selected: Vec<&Problem> = Vec::with_capacity(count);
    let mut used_slugs: HashSet<&str> = HashSet::new();
    let mut used_categories: HashSet<&Category> = HashSet::new();

    for target in &config.target_ratings {
        if selected.len() >= count {
            break;
        }

        let mut in_band: Vec<&Problem> = candidates
            .iter()
            .filter(|(p, r)| {
                !used_slugs.contains(p.slug.as_str()) && (r - target).abs() <= config.target_window
            })
            .map(|(p, _)| *p)
            .collect();

        let is_fresh = |p: &Problem| match p.primary_category() {
            Some(category) => !used_categories.contains(category),
            None => true,
        };
        in_band.sort_by(|a, b| {
            is_fresh(*b)
                .cmp(&is_fresh(*a))
                .then_with(|| by_popularity_desc(a, b))
        });

        match in_band.first().copied() {
            Some(pick) => {
                used_slugs.insert(pick.slug.as_str());
                if let Some(category) = pick.primary_category() {
                    used_categories.insert(category);
                }
                selected.push(pick);
            }
            None => debug!("No calibration candidate near {}", target),
        }
    }

    if selected.len() < count {
        let mut rest: Vec<&Problem> = candidates
            .iter()
            .map(|(p, _)| *p)
            .filter(|p| !used_slugs.contains(p.slug.as_str()))
            .collect();
        rest.sort_by(|a, b| by_popularity_desc(a, b));
        selected.extend(rest.into_iter().take(count - selected.len()));
    }

    let mut result: Vec<Problem> = selected.into_iter().cloned().collect();
    result.shuffle(rng);
    result
}

fn by_popularity_desc(a: &Problem, b: &Problem) -> Ordering {
    b.popularity
        .partial_cmp(&a.popularity)
        .unwrap_or(Ordering::Equal)
}
