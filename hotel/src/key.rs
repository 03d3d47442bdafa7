//! Resource keys: the unit of serialization.
//!
//! Every mutating request maps to exactly one key, and the coordinator runs
//! operations on the same key one at a time. Reservation changes are keyed
//! by room (regardless of dates); room-catalog changes are keyed by hotel.

use crate::types::{HotelId, RoomId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical concurrency key
///
/// # Example
///
/// ```
/// use hotel::key::ResourceKey;
/// use hotel::types::{HotelId, RoomId};
///
/// let key = ResourceKey::room(HotelId::new(7), RoomId::new(12));
/// assert_eq!(key.to_string(), "room:7:12");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKey {
    /// A room's availability and reservations
    Room {
        /// Owning hotel
        hotel: HotelId,
        /// The room
        room: RoomId,
    },
    /// A hotel's room catalog
    Hotel(HotelId),
}

impl ResourceKey {
    /// Key for reservation operations on a room
    #[must_use]
    pub const fn room(hotel: HotelId, room: RoomId) -> Self {
        Self::Room { hotel, room }
    }

    /// Key for room-catalog operations on a hotel
    #[must_use]
    pub const fn hotel(hotel: HotelId) -> Self {
        Self::Hotel(hotel)
    }

    /// The hotel the key belongs to
    #[must_use]
    pub const fn hotel_id(&self) -> HotelId {
        match self {
            Self::Room { hotel, .. } | Self::Hotel(hotel) => *hotel,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room { hotel, room } => write!(f, "room:{hotel}:{room}"),
            Self::Hotel(hotel) => write!(f, "hotel:{hotel}"),
        }
    }
}
