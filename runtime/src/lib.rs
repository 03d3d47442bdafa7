//! # Hotel Ops Runtime
//!
//! Runtime implementation for the hotel operations engine.
//!
//! This crate provides the imperative shell around the pure reducers in
//! `hotel-ops-core`: the machinery that decides *where* and *when* a
//! mutation runs, and the concrete backends it runs against.
//!
//! ## Core Components
//!
//! - **Coordinator**: Keyed mutual exclusion. One FIFO lane per resource key,
//!   drained by a single worker; unrelated keys proceed in parallel
//! - **State store**: [`InMemoryStateStore`], a linearizable implementation of
//!   [`StateStore`](hotel_ops_core::state_store::StateStore)
//! - **Event bus**: [`BroadcastEventBus`] for post-commit notifications
//! - **Effects**: [`effects::dispatch`] publishes reducer effects after commit
//! - **Retry / metrics / health**: operational plumbing shared by all layers
//!
//! ## Example
//!
//! ```ignore
//! use hotel_ops_runtime::{Coordinator, CoordinatorConfig};
//!
//! let coordinator: Coordinator<RoomKey> = Coordinator::new(CoordinatorConfig::default());
//!
//! // Runs after every earlier operation on the same key has finished
//! let outcome = coordinator
//!     .execute(room_key, move || async move { book(store, request).await })
//!     .await?;
//! ```

/// Keyed FIFO coordinator (per-key mutual exclusion)
pub mod coordinator;

/// Post-commit effect dispatch
pub mod effects;

/// Broadcast event bus
pub mod event_bus;

/// Health reporting
pub mod health;

/// In-memory linearizable state store
pub mod memory_store;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorStats, ExecutionContext, Ticket,
};
pub use error::CoordinatorError;
pub use event_bus::BroadcastEventBus;
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use memory_store::InMemoryStateStore;
pub use retry::RetryPolicy;

/// Error types for the coordinator
pub mod error {
    use std::time::Duration;
    use thiserror::Error;

    /// Errors that can occur while routing an operation through the coordinator
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum CoordinatorError {
        /// The operation waited in its key's queue longer than allowed.
        ///
        /// It was removed from the queue and never ran.
        #[error("Operation on '{key}' timed out after {waited:?} in queue")]
        QueueTimeout {
            /// Display form of the resource key
            key: String,
            /// How long the operation had been queued
            waited: Duration,
        },

        /// The caller cancelled the operation before it started.
        #[error("Operation cancelled before it started")]
        Cancelled,

        /// Coordinator is shutting down and not accepting new operations
        #[error("Coordinator is shutting down")]
        ShuttingDown,

        /// The operation panicked while running.
        ///
        /// The panic was contained; the key's lane keeps serving later operations.
        #[error("Operation panicked: {0}")]
        OperationPanicked(String),

        /// The worker owning the operation went away without reporting a result.
        #[error("Worker for '{0}' stopped before reporting a result")]
        WorkerLost(String),

        /// Shutdown timed out waiting for queued operations to drain
        #[error("Shutdown timed out with {0} operations still pending")]
        ShutdownTimeout(usize),
    }

    impl CoordinatorError {
        /// Whether the caller may safely submit the same operation again.
        ///
        /// None of these outcomes applied any effect.
        #[must_use]
        pub const fn is_retryable(&self) -> bool {
            matches!(
                self,
                Self::QueueTimeout { .. } | Self::ShuttingDown | Self::WorkerLost(_)
            )
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn retryable_classification() {
            let timeout = CoordinatorError::QueueTimeout {
                key: "room:1:2".into(),
                waited: Duration::from_millis(5),
            };
            assert!(timeout.is_retryable());
            assert!(CoordinatorError::ShuttingDown.is_retryable());
            assert!(!CoordinatorError::Cancelled.is_retryable());
            assert!(!CoordinatorError::OperationPanicked("boom".into()).is_retryable());
        }

        #[test]
        fn timeout_display_names_key() {
            let timeout = CoordinatorError::QueueTimeout {
                key: "room:1:2".into(),
                waited: Duration::from_millis(5),
            };
            assert!(timeout.to_string().contains("room:1:2"));
        }
    }
}
