//! Request and response shapes at the service boundary.
//!
//! Requests arrive with raw wire values (epoch seconds, floating-point
//! amounts) and are validated into domain types before anything else
//! happens. Responses flatten a `Result` into the success flag plus message
//! form clients expect.

use crate::authz::Decision;
use crate::booking::ReservationRequest;
use crate::error::HotelError;
use crate::types::{Guest, HotelId, Money, NewRoom, ReservationId, ReservationStatus, RoomId, StayDates};
use hotel_ops_runtime::RetryPolicy;
use hotel_ops_runtime::retry::retry_with_predicate;
use serde::{Deserialize, Serialize};
use std::future::Future;

// ============================================================================
// Requests
// ============================================================================

/// `CreateReservation` as received
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    /// Hotel id
    pub hotel_id: u64,
    /// Room id
    pub room_id: u64,
    /// Guest name
    pub guest_name: String,
    /// Guest phone
    pub guest_phone: String,
    /// Check-in, epoch seconds of UTC midnight
    pub check_in: i64,
    /// Check-out, epoch seconds of UTC midnight
    pub check_out: i64,
    /// Total amount in major units
    pub total_amount: f64,
}

impl CreateReservationRequest {
    /// Validate into a [`ReservationRequest`].
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for blank guest details, dates that are not
    /// UTC midnights or not ordered, or a non-positive amount.
    pub fn validate(self) -> Result<ReservationRequest, HotelError> {
        let guest = Guest::new(self.guest_name, self.guest_phone)?;
        let stay = StayDates::from_epoch_seconds(self.check_in, self.check_out)?;
        let total_amount = positive_amount(self.total_amount, "Total amount")?;
        Ok(ReservationRequest {
            hotel_id: HotelId::new(self.hotel_id),
            room_id: RoomId::new(self.room_id),
            guest,
            stay,
            total_amount,
        })
    }
}

/// `AddRoom` as received
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddRoomRequest {
    /// Room number
    pub room_number: String,
    /// Room type
    pub room_type: String,
    /// Nightly price in major units
    pub price: f64,
}

impl AddRoomRequest {
    /// Validate into a [`NewRoom`].
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for a blank field or a non-positive price.
    /// Duplicate numbers are checked against the hotel when the room is added.
    pub fn validate(self) -> Result<NewRoom, HotelError> {
        if self.room_number.trim().is_empty() {
            return Err(HotelError::Validation("Room number is required".to_string()));
        }
        if self.room_type.trim().is_empty() {
            return Err(HotelError::Validation("Room type is required".to_string()));
        }
        Ok(NewRoom {
            number: self.room_number,
            room_type: self.room_type,
            price: positive_amount(self.price, "Price")?,
        })
    }
}

fn positive_amount(amount: f64, field: &str) -> Result<Money, HotelError> {
    match Money::from_major_units(amount) {
        Some(money) if money.cents() > 0 => Ok(money),
        _ => Err(HotelError::Validation(format!("{field} must be a positive amount, got {amount}"))),
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Result of `CreateReservation`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReservationResponse {
    /// Whether the reservation was created
    pub success: bool,
    /// New reservation id, 0 on failure
    pub reservation_id: u64,
    /// Error kind on failure
    pub error_kind: Option<String>,
    /// Empty on success
    pub error_message: String,
}

impl From<Result<ReservationId, HotelError>> for CreateReservationResponse {
    fn from(result: Result<ReservationId, HotelError>) -> Self {
        match result {
            Ok(id) => Self {
                success: true,
                reservation_id: id.value(),
                error_kind: None,
                error_message: String::new(),
            },
            Err(error) => Self {
                success: false,
                reservation_id: 0,
                error_kind: Some(error.kind().to_string()),
                error_message: error.to_string(),
            },
        }
    }
}

/// Result of a reservation transition (`ConfirmReservation`, `CancelReservation`, ...)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the transition succeeded (including idempotent repeats)
    pub success: bool,
    /// Status after the call, on success
    pub status: Option<ReservationStatus>,
    /// Error kind on failure
    pub error_kind: Option<String>,
    /// Empty on success
    pub error_message: String,
}

impl From<Result<ReservationStatus, HotelError>> for StatusResponse {
    fn from(result: Result<ReservationStatus, HotelError>) -> Self {
        match result {
            Ok(status) => Self {
                success: true,
                status: Some(status),
                error_kind: None,
                error_message: String::new(),
            },
            Err(error) => Self {
                success: false,
                status: None,
                error_kind: Some(error.kind().to_string()),
                error_message: error.to_string(),
            },
        }
    }
}

/// Result of `CheckPermission`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheckResponse {
    /// Whether the permission is held
    pub has_permission: bool,
    /// Why
    pub reason: String,
}

impl From<Result<Decision, HotelError>> for PermissionCheckResponse {
    fn from(result: Result<Decision, HotelError>) -> Self {
        match result {
            Ok(decision) => Self { has_permission: decision.granted, reason: decision.reason },
            Err(error) => Self { has_permission: false, reason: error.to_string() },
        }
    }
}

/// Result of `CreateHotel`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHotelResponse {
    /// Whether the hotel was created
    pub success: bool,
    /// New hotel id, 0 on failure
    pub hotel_id: u64,
    /// Empty on success
    pub error_message: String,
}

impl From<Result<HotelId, HotelError>> for CreateHotelResponse {
    fn from(result: Result<HotelId, HotelError>) -> Self {
        match result {
            Ok(id) => Self { success: true, hotel_id: id.value(), error_message: String::new() },
            Err(error) => Self { success: false, hotel_id: 0, error_message: error.to_string() },
        }
    }
}

/// Result of `AddRoom`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRoomResponse {
    /// Whether the room was added
    pub success: bool,
    /// New room id, 0 on failure
    pub room_id: u64,
    /// Empty on success
    pub error_message: String,
}

impl From<Result<RoomId, HotelError>> for AddRoomResponse {
    fn from(result: Result<RoomId, HotelError>) -> Self {
        match result {
            Ok(id) => Self { success: true, room_id: id.value(), error_message: String::new() },
            Err(error) => Self { success: false, room_id: 0, error_message: error.to_string() },
        }
    }
}

// ============================================================================
// Client helpers
// ============================================================================

/// Run `operation` again while it fails with [`HotelError::Unavailable`].
///
/// Every other error is final and returned at once.
///
/// # Errors
///
/// The first non-retryable error, or the last `Unavailable` once the policy
/// is exhausted.
pub async fn retry_unavailable<T, F, Fut>(policy: RetryPolicy, operation: F) -> Result<T, HotelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HotelError>>,
{
    retry_with_predicate(policy, operation, HotelError::is_retryable).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn request() -> CreateReservationRequest {
        CreateReservationRequest {
            hotel_id: 1,
            room_id: 1,
            guest_name: "张三".to_string(),
            guest_phone: "13800138000".to_string(),
            // 2025-06-01 .. 2025-06-03
            check_in: 1_748_736_000,
            check_out: 1_748_908_800,
            total_amount: 598.0,
        }
    }

    #[test]
    fn valid_request_converts() {
        let validated = request().validate().unwrap();
        assert_eq!(validated.stay.nights(), 2);
        assert_eq!(validated.total_amount, Money::from_cents(59_800));
        assert_eq!(validated.guest.name, "张三");
    }

    #[test]
    fn invalid_requests_fail_validation() {
        let mut reversed = request();
        std::mem::swap(&mut reversed.check_in, &mut reversed.check_out);
        assert_eq!(reversed.validate().unwrap_err().kind(), "ValidationError");

        let mut not_midnight = request();
        not_midnight.check_in += 3_600;
        assert!(not_midnight.validate().is_err());

        let mut free = request();
        free.total_amount = 0.0;
        assert!(free.validate().is_err());

        let mut nameless = request();
        nameless.guest_name = " ".to_string();
        assert!(nameless.validate().is_err());
    }

    #[test]
    fn responses_flatten_results() {
        let ok = CreateReservationResponse::from(Ok(ReservationId::new(4)));
        assert!(ok.success);
        assert_eq!(ok.reservation_id, 4);
        assert!(ok.error_message.is_empty());

        let conflict = CreateReservationResponse::from(Err(HotelError::BookingConflict {
            room_id: RoomId::new(1),
            conflicting: ReservationId::new(4),
        }));
        assert!(!conflict.success);
        assert_eq!(conflict.reservation_id, 0);
        assert_eq!(conflict.error_kind.as_deref(), Some("BookingConflict"));

        let status = StatusResponse::from(Ok(ReservationStatus::Confirmed));
        assert_eq!(status.status, Some(ReservationStatus::Confirmed));
    }

    #[test]
    fn add_room_price_must_be_positive() {
        let request = AddRoomRequest {
            room_number: "101".to_string(),
            room_type: "标准间".to_string(),
            price: 299.0,
        };
        assert_eq!(request.clone().validate().unwrap().price, Money::from_cents(29_900));
        assert!(AddRoomRequest { price: -1.0, ..request }.validate().is_err());
    }

    #[tokio::test]
    async fn only_unavailable_is_retried() {
        let policy = RetryPolicy::builder().max_retries(3).initial_delay(Duration::from_millis(1)).build();

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = retry_unavailable(policy.clone(), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(HotelError::Unavailable("queue full".into()))
            } else {
                Ok(1)
            }
        })
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        let rejected = AtomicUsize::new(0);
        let calls = &rejected;
        let result: Result<(), _> = retry_unavailable(policy, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(HotelError::Validation("bad".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
    }
}
