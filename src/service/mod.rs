//! Service layer for the skillmeter rating service
//!
//! This module contains the application state that wires every rating flow
//! over a shared set of collaborators.

pub mod app;

pub use app::{Collaborators, RatingService, ServiceError};
