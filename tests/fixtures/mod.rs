//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use skillmeter::catalog::{ProblemCatalog, StaticProblemCatalog};
use skillmeter::config::AppConfig;
use skillmeter::error::{RatingError, Result};
use skillmeter::events::MockEventPublisher;
use skillmeter::service::{Collaborators, RatingService};
use skillmeter::storage::MockStore;
use skillmeter::types::{Problem, Solve};
use skillmeter::utils::FixedClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const CATEGORIES: [&str; 5] = ["Array", "Graph", "Tree", "Dynamic Programming", "String"];

/// Instant every fixture clock starts at
pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
}

/// Forty problems spread across 1000-2950 and five categories
pub fn problem_set() -> Vec<Problem> {
    (0..40)
        .map(|i| Problem {
            slug: format!("problem-{}", i),
            title: format!("Problem {}", i),
            difficulty: match i % 3 {
                0 => "Easy",
                1 => "Medium",
                _ => "Hard",
            }
            .to_string(),
            rating: Some(1000.0 + 50.0 * i as f64),
            tags: vec![
                CATEGORIES[i % CATEGORIES.len()].to_string(),
                "Random".to_string(),
            ],
            is_paid: Some(i % 13 == 0),
            popularity: ((i * 7) % 40) as f64 / 40.0,
        })
        .collect()
}

/// An accepted, untimed solve `days_ago` days before the fixture clock
pub fn accepted(problem: &Problem, days_ago: i64) -> Solve {
    Solve {
        slug: problem.slug.clone(),
        status: "Accepted".to_string(),
        timestamp: fixture_now() - Duration::days(days_ago),
        rating: problem.rating,
        tags: problem.tags.clone(),
        time_used: None,
    }
}

/// Catalog that can be switched to fail every call
#[derive(Debug, Default)]
pub struct FlakyCatalog {
    inner: StaticProblemCatalog,
    failing: AtomicBool,
}

impl FlakyCatalog {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self {
            inner: StaticProblemCatalog::new(problems),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_history(&self, username: &str, solves: Vec<Solve>) {
        self.inner.set_history(username, solves).unwrap();
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RatingError::StorageFailed {
                message: "catalog unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl ProblemCatalog for FlakyCatalog {
    async fn get_problem(&self, slug: &str) -> Result<Option<Problem>> {
        self.check()?;
        self.inner.get_problem(slug).await
    }

    async fn list_problems(&self) -> Result<Vec<Problem>> {
        self.check()?;
        self.inner.list_problems().await
    }

    async fn solve_history(&self, username: &str) -> Result<Vec<Solve>> {
        self.check()?;
        self.inner.solve_history(username).await
    }
}

/// A fully wired service over mock collaborators
pub struct TestSystem {
    pub service: RatingService,
    pub store: Arc<MockStore>,
    pub catalog: Arc<FlakyCatalog>,
    pub publisher: Arc<MockEventPublisher>,
    pub clock: Arc<FixedClock>,
}

pub async fn create_test_system() -> TestSystem {
    let store = Arc::new(MockStore::new());
    let catalog = Arc::new(FlakyCatalog::new(problem_set()));
    let publisher = Arc::new(MockEventPublisher::new());
    let clock = Arc::new(FixedClock::new(fixture_now()));

    let service = RatingService::with_clock(
        AppConfig::default(),
        Collaborators {
            store: store.clone(),
            catalog: catalog.clone(),
            publisher: publisher.clone(),
        },
        clock.clone(),
    )
    .await
    .unwrap();

    TestSystem {
        service,
        store,
        catalog,
        publisher,
        clock,
    }
}
