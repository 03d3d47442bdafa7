//! Error taxonomy of the hotel service.

use crate::authz::Permission;
use crate::types::{ReservationId, ReservationStatus, RoomId};
use hotel_ops_core::state_store::StateStoreError;
use hotel_ops_runtime::CoordinatorError;
use thiserror::Error;

/// Why a request failed.
///
/// Only [`HotelError::Unavailable`] is worth retrying; every other kind is a
/// definitive answer for the request as submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HotelError {
    /// The request is malformed or references something that does not exist
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The acting principal lacks the required permission
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Permission that was required
        permission: Permission,
        /// Human-readable explanation
        reason: String,
    },

    /// The requested dates overlap an existing blocking reservation
    #[error("Room {room_id} is already booked for overlapping dates (reservation {conflicting})")]
    BookingConflict {
        /// Room that was requested
        room_id: RoomId,
        /// A reservation holding overlapping nights
        conflicting: ReservationId,
    },

    /// The reservation's current status does not allow the action
    #[error("Cannot {action} reservation {reservation_id} in status {from}: {reason}")]
    InvalidTransition {
        /// Reservation the action targeted
        reservation_id: ReservationId,
        /// Status it was in
        from: ReservationStatus,
        /// Attempted action
        action: &'static str,
        /// Why the transition is not allowed
        reason: String,
    },

    /// Temporarily unable to serve the request (queue timeout, store
    /// contention, shutdown); safe to retry
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure; nothing was applied
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HotelError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Stable name of the error kind, as reported to clients
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::PermissionDenied { .. } => "PermissionDenied",
            Self::BookingConflict { .. } => "BookingConflict",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Unavailable(_) => "Unavailable",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<CoordinatorError> for HotelError {
    fn from(error: CoordinatorError) -> Self {
        match error {
            CoordinatorError::OperationPanicked(message) => Self::Internal(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<StateStoreError> for HotelError {
    fn from(error: StateStoreError) -> Self {
        if error.is_transient() {
            Self::Unavailable(error.to_string())
        } else {
            Self::Internal(error.to_string())
        }
    }
}

/// Outcome of one optimistic read-reduce-commit attempt.
#[derive(Error, Debug)]
pub(crate) enum AttemptError {
    /// Business rejection; final
    #[error(transparent)]
    Rejected(#[from] HotelError),

    /// Store failure; retried when it is a compare-and-set conflict
    #[error(transparent)]
    Store(#[from] StateStoreError),
}

impl AttemptError {
    pub(crate) const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StateStoreError::Conflict { .. }))
    }
}
