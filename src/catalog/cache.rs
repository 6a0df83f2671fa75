//! Explicit problem-rating cache
//!
//! Owned by the calling layer and initialized on purpose; there is no
//! process-wide map behind it.

use crate::types::Problem;
use std::collections::HashMap;

/// Slug → rating lookup for problems with a known positive rating
#[derive(Debug, Clone, Default)]
pub struct ProblemRatingCache {
    ratings: HashMap<String, f64>,
}

impl ProblemRatingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from catalog records; unrated problems are left out
    pub fn from_problems(problems: &[Problem]) -> Self {
        let mut cache = Self::new();
        for problem in problems {
            if let Some(rating) = problem.known_rating() {
                cache.ratings.insert(problem.slug.clone(), rating);
            }
        }
        cache
    }

    /// Insert or replace one rating; non-positive ratings are ignored
    pub fn seed(&mut self, slug: impl Into<String>, rating: f64) {
        if rating.is_finite() && rating > 0.0 {
            self.ratings.insert(slug.into(), rating);
        }
    }

    /// Drop every cached rating
    pub fn reset(&mut self) {
        self.ratings.clear();
    }

    pub fn rating_for(&self, slug: &str) -> Option<f64> {
        self.ratings.get(slug).copied()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}
