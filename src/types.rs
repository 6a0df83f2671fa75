//! Common types used throughout the rating service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillratings::glicko2::Glicko2Rating;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tag-based skill dimension, e.g. "Array" or "Hash Table"
pub type Category = String;

/// Unique identifier for a timed solve session
pub type SessionId = Uuid;

/// Status string the catalog reports for a successful submission
pub const ACCEPTED_STATUS: &str = "Accepted";

/// Belief about one skill dimension (global or one category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRating {
    pub rating: f64,
    pub rd: f64,
    pub volatility: f64,
    /// `None` means the record has never been stamped; decay is skipped
    pub last_updated: Option<DateTime<Utc>>,
    pub solve_count: u32,
}

impl Default for UserRating {
    fn default() -> Self {
        Self {
            rating: 1500.0,
            rd: 350.0,
            volatility: 0.06,
            last_updated: None,
            solve_count: 0,
        }
    }
}

impl UserRating {
    /// 95% interval around the rating
    pub fn confidence_interval(&self) -> (f64, f64) {
        (self.rating - 1.96 * self.rd, self.rating + 1.96 * self.rd)
    }
}

impl From<UserRating> for Glicko2Rating {
    fn from(rating: UserRating) -> Self {
        Self {
            rating: rating.rating,
            deviation: rating.rd,
            volatility: rating.volatility,
        }
    }
}

impl From<Glicko2Rating> for UserRating {
    fn from(rating: Glicko2Rating) -> Self {
        Self {
            rating: rating.rating,
            rd: rating.deviation,
            volatility: rating.volatility,
            last_updated: None,
            solve_count: 0,
        }
    }
}

/// Global rating plus lazily populated per-category ratings for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRatings {
    pub global: UserRating,
    #[serde(default)]
    pub categories: BTreeMap<Category, UserRating>,
}

impl UserRatings {
    /// Create ratings with only a global entry
    pub fn with_global(global: UserRating) -> Self {
        Self {
            global,
            categories: BTreeMap::new(),
        }
    }

    /// Dedicated category rating, or the global rating when none exists yet
    pub fn category_or_global(&self, category: &str) -> &UserRating {
        self.categories.get(category).unwrap_or(&self.global)
    }
}

/// Reference data for one problem from the external catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub slug: String,
    pub title: String,
    pub difficulty: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub tags: Vec<Category>,
    #[serde(default)]
    pub is_paid: Option<bool>,
    #[serde(default)]
    pub popularity: f64,
}

impl Problem {
    /// The problem rating if it is known and positive
    pub fn known_rating(&self) -> Option<f64> {
        self.rating.filter(|r| r.is_finite() && *r > 0.0)
    }

    /// First tag, which doubles as the category for diversity and calibration
    pub fn primary_category(&self) -> Option<&Category> {
        self.tags.first()
    }

    pub fn is_paid(&self) -> bool {
        self.is_paid.unwrap_or(false)
    }
}

/// A historical attempt; append-only fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solve {
    pub slug: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub tags: Vec<Category>,
    /// Seconds spent, when the client timed the attempt
    #[serde(default)]
    pub time_used: Option<f64>,
}

impl Solve {
    pub fn is_accepted(&self) -> bool {
        self.status == ACCEPTED_STATUS
    }

    /// Difficulty anchor carried on the solve itself, if positive
    pub fn known_rating(&self) -> Option<f64> {
        self.rating.filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Elapsed time, if the solve was timed
    pub fn timed_seconds(&self) -> Option<f64> {
        self.time_used.filter(|t| t.is_finite() && *t > 0.0)
    }
}

/// One timed problem inside a calibration session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSolveAttempt {
    pub slug: String,
    pub title: String,
    pub problem_rating: f64,
    pub category: Category,
    /// Seconds
    pub time_limit: u32,
    /// Seconds
    pub time_used: f64,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Progress of a bounded calibration session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub username: String,
    pub started_at: DateTime<Utc>,
    pub attempts: Vec<TimedSolveAttempt>,
    pub current_rating: UserRating,
    pub is_complete: bool,
}

/// Which flow produced a rating change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingSource {
    Sync,
    Calibration,
    History,
}

impl RatingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingSource::Sync => "sync",
            RatingSource::Calibration => "calibration",
            RatingSource::History => "history",
        }
    }
}

impl std::fmt::Display for RatingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event emitted after a user's stored ratings change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingsUpdated {
    pub username: String,
    pub global: UserRating,
    pub category_count: usize,
    pub source: RatingSource,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a timed solve session begins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveSessionStarted {
    pub session_id: SessionId,
    pub username: String,
    pub slug: String,
    pub time_limit: u32,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a timed solve session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveSessionEnded {
    pub session_id: SessionId,
    pub username: String,
    pub slug: String,
    pub time_used: f64,
    pub completed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RatingEvent {
    RatingsUpdated(RatingsUpdated),
    SolveSessionStarted(SolveSessionStarted),
    SolveSessionEnded(SolveSessionEnded),
}

impl RatingEvent {
    /// Notification name as seen by presentation layers
    pub fn name(&self) -> &'static str {
        match self {
            RatingEvent::RatingsUpdated(_) => "RatingsUpdated",
            RatingEvent::SolveSessionStarted(_) => "SolveSessionStarted",
            RatingEvent::SolveSessionEnded(_) => "SolveSessionEnded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_rating() {
        let rating = UserRating::default();
        assert_eq!(rating.rating, 1500.0);
        assert_eq!(rating.rd, 350.0);
        assert_eq!(rating.volatility, 0.06);
        assert!(rating.last_updated.is_none());
        assert_eq!(rating.solve_count, 0);
    }

    #[test]
    fn test_category_falls_back_to_global() {
        let mut ratings = UserRatings::with_global(UserRating {
            rating: 1720.0,
            ..UserRating::default()
        });
        assert_eq!(ratings.category_or_global("Graph").rating, 1720.0);

        ratings.categories.insert(
            "Graph".to_string(),
            UserRating {
                rating: 1400.0,
                ..UserRating::default()
            },
        );
        assert_eq!(ratings.category_or_global("Graph").rating, 1400.0);
    }

    #[test]
    fn test_problem_known_rating() {
        let mut problem = Problem {
            slug: "two-sum".to_string(),
            title: "Two Sum".to_string(),
            difficulty: "Easy".to_string(),
            rating: Some(1200.0),
            tags: vec!["Array".to_string()],
            is_paid: None,
            popularity: 0.9,
        };
        assert_eq!(problem.known_rating(), Some(1200.0));
        assert!(!problem.is_paid());

        problem.rating = Some(0.0);
        assert_eq!(problem.known_rating(), None);
    }

    #[test]
    fn test_solve_deserializes_without_optional_fields() {
        let json = r#"{"slug":"two-sum","status":"Accepted","timestamp":"2024-01-01T00:00:00Z"}"#;
        let solve: Solve = serde_json::from_str(json).unwrap();
        assert!(solve.is_accepted());
        assert!(solve.known_rating().is_none());
        assert!(solve.timed_seconds().is_none());
        assert!(solve.tags.is_empty());
    }

    #[test]
    fn test_event_serialization_tagged() {
        let event = RatingEvent::RatingsUpdated(RatingsUpdated {
            username: "alice".to_string(),
            global: UserRating::default(),
            category_count: 0,
            source: RatingSource::Sync,
            timestamp: Utc::now(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RatingsUpdated");
        assert_eq!(event.name(), "RatingsUpdated");
    }

    #[test]
    fn test_glicko2_rating_conversion() {
        let rating = UserRating {
            rating: 1650.0,
            rd: 120.0,
            volatility: 0.059,
            last_updated: Some(Utc::now()),
            solve_count: 7,
        };
        let converted: Glicko2Rating = rating.into();
        assert_eq!(converted.rating, 1650.0);
        assert_eq!(converted.deviation, 120.0);

        let back: UserRating = converted.into();
        assert_eq!(back.rd, 120.0);
        assert_eq!(back.solve_count, 0);
    }
}
