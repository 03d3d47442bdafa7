//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the runtime and the booking layer:
//! - Coordinator queues (depth, wait time, timeouts, cancellations, relocations)
//! - State store commits and conflicts
//! - Event bus publishes
//! - Retries
//! - Booking outcomes (admitted, conflicts, denials)
//!
//! # Example
//!
//! ```rust,no_run
//! use hotel_ops_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder with a render handle.
///
/// The address is where an HTTP scrape endpoint is expected to expose
/// [`render`](Self::render) output.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// The configured scrape address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (e.g., by another test) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(())
            },
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Coordinator
    describe_counter!("coordinator_operations_submitted_total", "Operations accepted into a key queue");
    describe_counter!("coordinator_queue_timeouts_total", "Operations dropped after exceeding the maximum queue wait");
    describe_counter!("coordinator_cancellations_total", "Operations cancelled while queued");
    describe_counter!("coordinator_panics_total", "Operations that panicked while running");
    describe_counter!("coordinator_relocations_total", "Lanes moved to another execution context");
    describe_histogram!("coordinator_queue_wait_duration_seconds", "Time operations spent queued before starting");
    describe_histogram!("coordinator_queue_depth", "Queue depth observed when an operation is enqueued");
    describe_gauge!("coordinator_active_lanes", "Resource keys that currently own a lane");

    // State store
    describe_counter!("state_store_commits_total", "Successful state store commits");
    describe_counter!("state_store_conflicts_total", "Commits rejected by a failed precondition");
    describe_histogram!("state_store_commit_duration_seconds", "Time taken to apply a commit");

    // Event bus
    describe_counter!("event_bus_messages_published_total", "Events published to the event bus");
    describe_counter!("event_bus_publish_errors_total", "Events the bus refused");

    // Retry
    describe_counter!("retry_attempts_total", "Retry attempts after a retryable failure");
    describe_counter!("retry_successes_total", "Operations that succeeded after at least one retry");
    describe_counter!("retry_exhausted_total", "Operations that failed after exhausting retries");

    // Booking
    describe_counter!("booking_admitted_total", "Reservation transitions committed, by action");
    describe_counter!("booking_conflicts_total", "Reservation requests rejected as overlapping");
    describe_counter!("booking_rejections_total", "Requests rejected, by error kind");
    describe_counter!("permission_checks_total", "Permission checks, by outcome");
}

/// Coordinator metrics recorder.
pub struct CoordinatorMetrics;

impl CoordinatorMetrics {
    /// Record an accepted submission.
    pub fn record_submitted() {
        counter!("coordinator_operations_submitted_total").increment(1);
    }

    /// Record the queue depth right after an enqueue.
    #[allow(clippy::cast_precision_loss)] // queue depths stay far below 2^52
    pub fn record_queue_depth(depth: usize) {
        histogram!("coordinator_queue_depth").record(depth as f64);
    }

    /// Record how long an operation waited before starting.
    pub fn record_wait(waited: Duration) {
        histogram!("coordinator_queue_wait_duration_seconds").record(waited.as_secs_f64());
    }

    /// Record a queue timeout.
    pub fn record_timeout() {
        counter!("coordinator_queue_timeouts_total").increment(1);
    }

    /// Record a cancellation.
    pub fn record_cancelled() {
        counter!("coordinator_cancellations_total").increment(1);
    }

    /// Record a contained panic.
    pub fn record_panic() {
        counter!("coordinator_panics_total").increment(1);
    }

    /// Record a lane relocation.
    pub fn record_relocation() {
        counter!("coordinator_relocations_total").increment(1);
    }

    /// Record the number of live lanes.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_active_lanes(lanes: usize) {
        gauge!("coordinator_active_lanes").set(lanes as f64);
    }
}

/// State store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record a successful commit.
    pub fn record_commit(writes: usize, duration: Duration) {
        counter!("state_store_commits_total").increment(1);
        histogram!("state_store_commit_duration_seconds").record(duration.as_secs_f64());
        tracing::trace!(writes, "Commit applied");
    }

    /// Record a commit rejected by a precondition.
    pub fn record_conflict() {
        counter!("state_store_conflicts_total").increment(1);
    }
}

/// Event bus metrics recorder.
pub struct EventBusMetrics;

impl EventBusMetrics {
    /// Record a message publish.
    pub fn record_publish() {
        counter!("event_bus_messages_published_total").increment(1);
    }

    /// Record a publish error.
    pub fn record_publish_error() {
        counter!("event_bus_publish_errors_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}

/// Booking metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a committed reservation transition.
    pub fn record_admitted(action: &'static str) {
        counter!("booking_admitted_total", "action" => action).increment(1);
    }

    /// Record an overlapping request.
    pub fn record_conflict() {
        counter!("booking_conflicts_total").increment(1);
    }

    /// Record a rejected request.
    pub fn record_rejection(kind: &'static str) {
        counter!("booking_rejections_total", "kind" => kind).increment(1);
    }

    /// Record a permission check outcome.
    pub fn record_permission_check(granted: bool) {
        let outcome = if granted { "granted" } else { "denied" };
        counter!("permission_checks_total", "outcome" => outcome).increment(1);
    }
}
