//! Metrics for the skillmeter service
//!
//! This module provides Prometheus metrics for rating updates, calibration
//! and solve sessions.

pub mod collector;

pub use collector::{
    CalibrationMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, RatingMetrics,
    SessionMetrics,
};
