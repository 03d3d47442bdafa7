//! Reducers for the hotel domain.
//!
//! - [`reservation`]: the room ledger, one per room, owning the room's
//!   availability index and every reservation made on it
//! - [`rooms`]: a hotel's room catalog
//!
//! Both are pure; the booking coordinator loads their state from the store,
//! runs them under the right resource key, commits, and only then publishes
//! the resulting [`HotelEvent`]s.

pub mod reservation;
pub mod rooms;

pub use reservation::{
    LedgerAction, ReservationEnvironment, ReservationEvent, ReservationReducer, RoomLedger,
};
pub use rooms::{HotelRooms, RoomCatalogAction, RoomCatalogEvent, RoomCatalogReducer};

use crate::types::{HotelId, ReservationId};
use serde::{Deserialize, Serialize};

/// Every event published on the application bus
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotelEvent {
    /// A hotel was added to the catalog
    HotelCreated {
        /// New hotel
        hotel_id: HotelId,
        /// Its name
        name: String,
    },
    /// A room-catalog change
    Room(RoomCatalogEvent),
    /// A reservation lifecycle change
    Reservation(ReservationEvent),
}

impl HotelEvent {
    /// The reservation this event concerns, if any
    #[must_use]
    pub const fn reservation_id(&self) -> Option<ReservationId> {
        match self {
            Self::Reservation(event) => Some(event.reservation_id()),
            Self::HotelCreated { .. } | Self::Room(_) => None,
        }
    }
}

impl From<ReservationEvent> for HotelEvent {
    fn from(event: ReservationEvent) -> Self {
        Self::Reservation(event)
    }
}

impl From<RoomCatalogEvent> for HotelEvent {
    fn from(event: RoomCatalogEvent) -> Self {
        Self::Room(event)
    }
}
