//! Event publisher for rating notifications
//!
//! Presentation layers subscribe to these notifications. Delivery is best
//! effort: callers go through the `notify_*` helpers, which never fail.

use crate::error::Result;
use crate::types::{RatingEvent, RatingsUpdated, SolveSessionEnded, SolveSessionStarted};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Trait for publishing rating events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a RatingsUpdated event
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()>;

    /// Publish a SolveSessionStarted event
    async fn publish_session_started(&self, event: SolveSessionStarted) -> Result<()>;

    /// Publish a SolveSessionEnded event
    async fn publish_session_ended(&self, event: SolveSessionEnded) -> Result<()>;
}

/// In-process fan-out over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<RatingEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RatingEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: RatingEvent) {
        let name = event.name();
        // No subscribers is not a failure
        match self.sender.send(event) {
            Ok(receivers) => debug!("Delivered {} to {} subscribers", name, receivers),
            Err(_) => debug!("Dropped {}: no subscribers", name),
        }
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()> {
        self.send(RatingEvent::RatingsUpdated(event));
        Ok(())
    }

    async fn publish_session_started(&self, event: SolveSessionStarted) -> Result<()> {
        self.send(RatingEvent::SolveSessionStarted(event));
        Ok(())
    }

    async fn publish_session_ended(&self, event: SolveSessionEnded) -> Result<()> {
        self.send(RatingEvent::SolveSessionEnded(event));
        Ok(())
    }
}

/// Writes every event to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()> {
        info!(
            username = %event.username,
            source = %event.source,
            rating = event.global.rating,
            rd = event.global.rd,
            categories = event.category_count,
            "ratings updated"
        );
        Ok(())
    }

    async fn publish_session_started(&self, event: SolveSessionStarted) -> Result<()> {
        info!(
            username = %event.username,
            session_id = %event.session_id,
            slug = %event.slug,
            time_limit = event.time_limit,
            "solve session started"
        );
        Ok(())
    }

    async fn publish_session_ended(&self, event: SolveSessionEnded) -> Result<()> {
        info!(
            username = %event.username,
            session_id = %event.session_id,
            slug = %event.slug,
            time_used = event.time_used,
            completed = event.completed,
            "solve session ended"
        );
        Ok(())
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<RatingEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish return an error
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<RatingEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events with a given name
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| event.name() == event_type)
            .count()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn push(&self, event: RatingEvent) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(anyhow::anyhow!("simulated publish failure"));
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_ratings_updated(&self, event: RatingsUpdated) -> Result<()> {
        self.push(RatingEvent::RatingsUpdated(event))
    }

    async fn publish_session_started(&self, event: SolveSessionStarted) -> Result<()> {
        self.push(RatingEvent::SolveSessionStarted(event))
    }

    async fn publish_session_ended(&self, event: SolveSessionEnded) -> Result<()> {
        self.push(RatingEvent::SolveSessionEnded(event))
    }
}

/// Publish a RatingsUpdated event, logging instead of failing
pub async fn notify_ratings_updated(publisher: &dyn EventPublisher, event: RatingsUpdated) {
    let username = event.username.clone();
    if let Err(e) = publisher.publish_ratings_updated(event).await {
        warn!("Failed to publish ratings update for {}: {}", username, e);
    }
}

/// Publish a SolveSessionStarted event, logging instead of failing
pub async fn notify_session_started(publisher: &dyn EventPublisher, event: SolveSessionStarted) {
    let session_id = event.session_id;
    if let Err(e) = publisher.publish_session_started(event).await {
        warn!("Failed to publish session start {}: {}", session_id, e);
    }
}

/// Publish a SolveSessionEnded event, logging instead of failing
pub async fn notify_session_ended(publisher: &dyn EventPublisher, event: SolveSessionEnded) {
    let session_id = event.session_id;
    if let Err(e) = publisher.publish_session_ended(event).await {
        warn!("Failed to publish session end {}: {}", session_id, e);
    }
}
