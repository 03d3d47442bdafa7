//! Event bus abstraction for post-commit notifications.
//!
//! Reducers describe events as [`Effect::Publish`](crate::effect::Effect);
//! the runtime hands them to an [`EventBus`] only after the state change
//! that produced them has been committed to the state store.
//!
//! ```text
//! ┌─────────────────┐
//! │    Reducer      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 1. Commit state │◄─── Source of truth
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Publish to   │
//! │    Event Bus    │◄─── Best-effort, in order per publisher
//! └────────┬────────┘
//!          │
//!     ┌────┴────┐
//!     ▼         ▼
//! ┌───────┐ ┌─────────┐
//! │ Audit │ │ Metrics │
//! └───────┘ └─────────┘
//! ```
//!
//! Subscribers are observers: losing an event never affects booking
//! correctness, because the committed state is authoritative.

use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The bus has been shut down.
    #[error("Event bus closed")]
    Closed,

    /// Failed to publish an event.
    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

/// Stream of events from a subscription.
///
/// A subscriber that falls too far behind skips the events it missed; the
/// stream ends when the bus is dropped.
pub type EventStream<E> = Pin<Box<dyn Stream<Item = E> + Send>>;

/// Publish/subscribe channel for committed domain events.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one bus is shared by every
/// worker of the booking coordinator.
pub trait EventBus<E>: Send + Sync {
    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that will receive it. Publishing
    /// with no subscribers is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] if the bus cannot accept the event.
    fn publish(&self, event: E) -> Result<usize, EventBusError>;

    /// Subscribe to events published from now on.
    fn subscribe(&self) -> EventStream<E>;
}
