//! Observability boundary: named notifications for presentation layers

pub mod publisher;

// Re-export commonly used types
pub use publisher::{
    notify_ratings_updated, notify_session_ended, notify_session_started,
    BroadcastEventPublisher, EventPublisher, LoggingEventPublisher, MockEventPublisher,
};
