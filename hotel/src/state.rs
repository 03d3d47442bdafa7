//! Layout of hotel state in the clustered store.
//!
//! ```text
//! hotel/catalog/{hotel}          Hotel
//! hotel/rooms/{hotel}            HotelRooms        (written on the hotel key)
//! hotel/ledger/{hotel}/{room}    RoomLedger        (written on the room key)
//! hotel/locator/{reservation}    ReservationLocator
//! authz/roles/{role}             RoleDefinition
//! authz/principals/{user}        Principal
//! ```

use crate::error::{AttemptError, HotelError};
use crate::types::{HotelId, ReservationId, RoleName, RoomId, UserId};
use hotel_ops_core::state::StateKey;
use hotel_ops_core::state_store::StateStoreError;
use hotel_ops_runtime::retry::{RetryPolicy, retry_with_predicate};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Store keys
pub mod keys {
    use super::{HotelId, ReservationId, RoleName, RoomId, StateKey, UserId};

    /// Everything owned by the hotel domain
    pub const HOTEL_PREFIX: &str = "hotel/";
    /// Hotel records
    pub const CATALOG_PREFIX: &str = "hotel/catalog/";
    /// Per-hotel room lists
    pub const ROOMS_PREFIX: &str = "hotel/rooms/";
    /// Per-room ledgers
    pub const LEDGER_PREFIX: &str = "hotel/ledger/";
    /// Reservation id → room
    pub const LOCATOR_PREFIX: &str = "hotel/locator/";
    /// Role definitions
    pub const ROLE_PREFIX: &str = "authz/roles/";
    /// Principals
    pub const PRINCIPAL_PREFIX: &str = "authz/principals/";

    /// Hotel record
    #[must_use]
    pub fn catalog(hotel: HotelId) -> StateKey {
        StateKey::new(format!("{CATALOG_PREFIX}{hotel}"))
    }

    /// Room list of a hotel
    #[must_use]
    pub fn rooms(hotel: HotelId) -> StateKey {
        StateKey::new(format!("{ROOMS_PREFIX}{hotel}"))
    }

    /// Ledger of one room
    #[must_use]
    pub fn ledger(hotel: HotelId, room: RoomId) -> StateKey {
        StateKey::new(format!("{LEDGER_PREFIX}{hotel}/{room}"))
    }

    /// Where a reservation lives
    #[must_use]
    pub fn locator(reservation: ReservationId) -> StateKey {
        StateKey::new(format!("{LOCATOR_PREFIX}{reservation}"))
    }

    /// Role definition
    #[must_use]
    pub fn role(role: &RoleName) -> StateKey {
        StateKey::new(format!("{ROLE_PREFIX}{role}"))
    }

    /// Principal record
    #[must_use]
    pub fn principal(user: &UserId) -> StateKey {
        StateKey::new(format!("{PRINCIPAL_PREFIX}{user}"))
    }
}

/// Identifier sequences
pub mod sequences {
    /// Hotel ids
    pub const HOTEL: &str = "hotel";
    /// Room ids
    pub const ROOM: &str = "room";
    /// Reservation ids
    pub const RESERVATION: &str = "reservation";
}

/// Room holding a reservation, written once when the reservation is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLocator {
    /// Hotel
    pub hotel_id: HotelId,
    /// Room
    pub room_id: RoomId,
}

/// Run a read-modify-commit `attempt`, retrying compare-and-set conflicts.
///
/// Business rejections are returned as they are. A conflict that outlives
/// the policy becomes [`HotelError::Unavailable`]; nothing from any attempt
/// was applied in that case.
pub(crate) async fn commit_with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    attempt: F,
) -> Result<T, HotelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    retry_with_predicate(policy.clone(), attempt, AttemptError::is_conflict)
        .await
        .map_err(|error| match error {
            AttemptError::Rejected(error) => error,
            AttemptError::Store(StateStoreError::Conflict { key, .. }) => {
                HotelError::Unavailable(format!("Contention on '{key}', retry later"))
            },
            AttemptError::Store(error) => error.into(),
        })
}
