//! Timed solve sessions
//!
//! A session starts when a user opens a problem and ends when they submit or
//! give up. Ending a session turns the elapsed time into a timed solve and
//! syncs it into the user's ratings.

use crate::error::{RatingError, Result};
use crate::events::{notify_session_ended, notify_session_started, EventPublisher};
use crate::metrics::MetricsCollector;
use crate::rating::sync::RatingSync;
use crate::storage::{RatingRepository, StorageKey};
use crate::types::{
    Category, Problem, SessionId, Solve, SolveSessionEnded, SolveSessionStarted, UserRatings,
    ACCEPTED_STATUS,
};
use crate::utils::generate_session_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Status recorded for a session that ended without a solve
pub const UNSOLVED_STATUS: &str = "Unsolved";

/// A user's in-flight timed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub username: String,
    pub slug: String,
    pub title: String,
    pub problem_rating: Option<f64>,
    pub tags: Vec<Category>,
    /// Seconds
    pub time_limit: u32,
    pub started_at: DateTime<Utc>,
}

impl ActiveSession {
    /// Seconds elapsed at `now`, never negative
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.started_at).num_milliseconds().max(0) as f64) / 1000.0
    }
}

/// Outcome of ending a session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: ActiveSession,
    pub time_used: f64,
    pub completed: bool,
    pub ratings: UserRatings,
}

/// One active session per user, persisted under `<username>|session`
pub struct SolveSessionManager {
    sync: Arc<RatingSync>,
    repository: RatingRepository,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SolveSessionManager {
    pub fn new(
        sync: Arc<RatingSync>,
        repository: RatingRepository,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            sync,
            repository,
            publisher,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn active_session(&self, username: &str) -> Result<Option<ActiveSession>> {
        self.repository.load(&session_key(username)).await
    }

    /// Open a session on a problem; a user can only have one at a time
    pub async fn start_session(&self, username: &str, problem: &Problem) -> Result<ActiveSession> {
        if self.active_session(username).await?.is_some() {
            return Err(RatingError::SessionAlreadyActive {
                username: username.to_string(),
            }
            .into());
        }

        let engine = self.sync.engine();
        let problem_rating = problem.known_rating();
        let session = ActiveSession {
            session_id: generate_session_id(),
            username: username.to_string(),
            slug: problem.slug.clone(),
            title: problem.title.clone(),
            problem_rating,
            tags: problem.tags.clone(),
            time_limit: engine.time_limit_for(problem_rating),
            started_at: engine.now(),
        };

        self.repository
            .save(&session_key(username), &session)
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_session_started();
        }
        info!(
            "Started session {} for {} on {} ({}s limit)",
            session.session_id, username, session.slug, session.time_limit
        );

        notify_session_started(
            self.publisher.as_ref(),
            SolveSessionStarted {
                session_id: session.session_id,
                username: username.to_string(),
                slug: session.slug.clone(),
                time_limit: session.time_limit,
                timestamp: session.started_at,
            },
        )
        .await;

        Ok(session)
    }

    /// Close the session, rate the attempt and clear the record
    pub async fn end_session(&self, username: &str, completed: bool) -> Result<SessionSummary> {
        let session = self.load_session(username).await?;
        let now = self.sync.engine().now();
        let time_used = session.elapsed_seconds(now);

        let solve = Solve {
            slug: session.slug.clone(),
            status: if completed {
                ACCEPTED_STATUS.to_string()
            } else {
                UNSOLVED_STATUS.to_string()
            },
            timestamp: now,
            rating: session.problem_rating,
            tags: session.tags.clone(),
            time_used: Some(time_used),
        };

        // Clear the session before rating so a failed clear never rates twice
        self.repository.remove(&session_key(username)).await?;
        let ratings = match self.sync.apply_solve(username, &solve).await {
            Ok(ratings) => ratings,
            Err(e) => {
                if let Err(restore) = self.repository.save(&session_key(username), &session).await
                {
                    warn!(
                        "Failed to restore session {} for {}: {}",
                        session.session_id, username, restore
                    );
                }
                return Err(e);
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_session_ended(completed);
        }
        info!(
            "Ended session {} for {} after {:.0}s (completed: {})",
            session.session_id, username, time_used, completed
        );

        self.notify_ended(&session, time_used, completed, now).await;

        Ok(SessionSummary {
            session,
            time_used,
            completed,
            ratings,
        })
    }

    /// Discard the session without touching ratings
    pub async fn cancel_session(&self, username: &str) -> Result<ActiveSession> {
        let session = self.load_session(username).await?;
        let now = self.sync.engine().now();
        self.repository.remove(&session_key(username)).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_session_ended(false);
        }
        info!("Cancelled session {} for {}", session.session_id, username);

        let time_used = session.elapsed_seconds(now);
        self.notify_ended(&session, time_used, false, now).await;

        Ok(session)
    }

    async fn load_session(&self, username: &str) -> Result<ActiveSession> {
        self.active_session(username).await?.ok_or_else(|| {
            RatingError::NoActiveSession {
                username: username.to_string(),
            }
            .into()
        })
    }

    async fn notify_ended(
        &self,
        session: &ActiveSession,
        time_used: f64,
        completed: bool,
        now: DateTime<Utc>,
    ) {
        notify_session_ended(
            self.publisher.as_ref(),
            SolveSessionEnded {
                session_id: session.session_id,
                username: session.username.clone(),
                slug: session.slug.clone(),
                time_used,
                completed,
                timestamp: now,
            },
        )
        .await;
    }
}

fn session_key(username: &str) -> StorageKey {
    StorageKey::Session(username.to_string())
}
