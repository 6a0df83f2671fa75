//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the rating flows using
//! Prometheus metrics.

use crate::types::RatingSource;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Rating update metrics
    rating_metrics: RatingMetrics,

    /// Calibration session metrics
    calibration_metrics: CalibrationMetrics,

    /// Timed solve session metrics
    session_metrics: SessionMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Rating update metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Rating updates applied, by source
    pub rating_updates_total: IntCounterVec,

    /// Solves skipped for lacking a difficulty anchor
    pub solves_skipped_total: IntCounter,

    /// Volatility solver failures
    pub computation_failures_total: IntCounter,

    /// Global rating change per applied solve
    pub rating_delta: HistogramVec,
}

/// Calibration session metrics
#[derive(Clone)]
pub struct CalibrationMetrics {
    pub sessions_started_total: IntCounter,

    pub attempts_total: IntCounter,

    pub sessions_finalized_total: IntCounter,

    /// Partial-credit outcome per attempt
    pub attempt_outcome: Histogram,
}

/// Timed solve session metrics
#[derive(Clone)]
pub struct SessionMetrics {
    pub sessions_started_total: IntCounter,

    /// Sessions ended, by completion status
    pub sessions_ended_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Rating computation time per flow invocation
    pub rating_calculation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let rating_metrics = RatingMetrics::new(&registry)?;
        let calibration_metrics = CalibrationMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            rating_metrics,
            calibration_metrics,
            session_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    pub fn calibration(&self) -> &CalibrationMetrics {
        &self.calibration_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record rating updates applied by a flow
    pub fn record_rating_updates(&self, source: RatingSource, count: u64) {
        self.rating_metrics
            .rating_updates_total
            .with_label_values(&[source.as_str()])
            .inc_by(count);
    }

    /// Record the change in global rating a flow persisted
    pub fn record_rating_delta(&self, source: RatingSource, delta: f64) {
        self.rating_metrics
            .rating_delta
            .with_label_values(&[source.as_str()])
            .observe(delta);
    }

    pub fn record_skipped_solve(&self) {
        self.rating_metrics.solves_skipped_total.inc();
    }

    pub fn record_computation_failure(&self) {
        self.rating_metrics.computation_failures_total.inc();
    }

    pub fn record_calibration_started(&self) {
        self.calibration_metrics.sessions_started_total.inc();
    }

    pub fn record_calibration_attempt(&self, outcome: f64) {
        self.calibration_metrics.attempts_total.inc();
        self.calibration_metrics.attempt_outcome.observe(outcome);
    }

    pub fn record_calibration_finalized(&self) {
        self.calibration_metrics.sessions_finalized_total.inc();
    }

    pub fn record_session_started(&self) {
        self.session_metrics.sessions_started_total.inc();
    }

    pub fn record_session_ended(&self, completed: bool) {
        let status = if completed { "completed" } else { "incomplete" };
        self.session_metrics
            .sessions_ended_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record rating calculation duration
    pub fn record_rating_calculation(&self, source: RatingSource, duration: Duration) {
        self.performance_metrics
            .rating_calculation_duration
            .with_label_values(&[source.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_updates_total = IntCounterVec::new(
            Opts::new("skillmeter_rating_updates_total", "Total rating updates"),
            &["source"],
        )?;
        registry.register(Box::new(rating_updates_total.clone()))?;

        let solves_skipped_total = IntCounter::new(
            "skillmeter_solves_skipped_total",
            "Solves skipped for lacking a problem rating",
        )?;
        registry.register(Box::new(solves_skipped_total.clone()))?;

        let computation_failures_total = IntCounter::new(
            "skillmeter_computation_failures_total",
            "Rating computations that failed to converge",
        )?;
        registry.register(Box::new(computation_failures_total.clone()))?;

        let rating_delta = HistogramVec::new(
            HistogramOpts::new(
                "skillmeter_rating_delta",
                "Change in global rating per applied solve",
            )
            .buckets(vec![
                -200.0, -100.0, -50.0, -20.0, 0.0, 20.0, 50.0, 100.0, 200.0,
            ]),
            &["source"],
        )?;
        registry.register(Box::new(rating_delta.clone()))?;

        Ok(Self {
            rating_updates_total,
            solves_skipped_total,
            computation_failures_total,
            rating_delta,
        })
    }
}

impl CalibrationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_started_total = IntCounter::new(
            "skillmeter_calibration_started_total",
            "Calibration sessions started",
        )?;
        registry.register(Box::new(sessions_started_total.clone()))?;

        let attempts_total = IntCounter::new(
            "skillmeter_calibration_attempts_total",
            "Calibration attempts processed",
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let sessions_finalized_total = IntCounter::new(
            "skillmeter_calibration_finalized_total",
            "Calibration sessions finalized",
        )?;
        registry.register(Box::new(sessions_finalized_total.clone()))?;

        let attempt_outcome = Histogram::with_opts(
            HistogramOpts::new(
                "skillmeter_calibration_attempt_outcome",
                "Partial credit earned per calibration attempt",
            )
            .buckets(vec![0.0, 0.3, 0.5, 0.65, 0.8, 1.0]),
        )?;
        registry.register(Box::new(attempt_outcome.clone()))?;

        Ok(Self {
            sessions_started_total,
            attempts_total,
            sessions_finalized_total,
            attempt_outcome,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_started_total = IntCounter::new(
            "skillmeter_solve_sessions_started_total",
            "Timed solve sessions started",
        )?;
        registry.register(Box::new(sessions_started_total.clone()))?;

        let sessions_ended_total = IntCounterVec::new(
            Opts::new(
                "skillmeter_solve_sessions_ended_total",
                "Timed solve sessions ended",
            ),
            &["status"],
        )?;
        registry.register(Box::new(sessions_ended_total.clone()))?;

        Ok(Self {
            sessions_started_total,
            sessions_ended_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_calculation_duration = HistogramVec::new(
            HistogramOpts::new(
                "skillmeter_rating_calculation_duration_seconds",
                "Rating calculation time",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]),
            &["source"],
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        Ok(Self {
            rating_calculation_duration,
        })
    }
}
