//! Room catalog of one hotel, serialized on the hotel's resource key.

use crate::error::HotelError;
use crate::types::{HotelId, NewRoom, Room, RoomId};
use hotel_ops_core::effect::{Effect, Effects};
use hotel_ops_core::reducer::Reducer;
use hotel_ops_core::smallvec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rooms of one hotel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelRooms {
    /// Owning hotel
    pub hotel_id: HotelId,
    /// Rooms by id
    pub rooms: BTreeMap<RoomId, Room>,
}

impl HotelRooms {
    /// A hotel with no rooms yet
    #[must_use]
    pub const fn new(hotel_id: HotelId) -> Self {
        Self { hotel_id, rooms: BTreeMap::new() }
    }

    /// Room by id
    #[must_use]
    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    /// Room by number
    #[must_use]
    pub fn by_number(&self, number: &str) -> Option<&Room> {
        self.rooms.values().find(|room| room.number == number)
    }

    /// Number of rooms
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the hotel has no rooms
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Room catalog commands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomCatalogAction {
    /// Add a room under a freshly allocated id
    AddRoom {
        /// Allocated id
        room_id: RoomId,
        /// Room details
        room: NewRoom,
    },
}

/// Room catalog facts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomCatalogEvent {
    /// A room was added
    RoomAdded {
        /// Hotel
        hotel_id: HotelId,
        /// New room
        room_id: RoomId,
        /// Its number
        number: String,
    },
}

/// Reducer for [`HotelRooms`]
#[derive(Clone, Copy, Debug, Default)]
pub struct RoomCatalogReducer;

impl RoomCatalogReducer {
    fn validate_room(rooms: &HotelRooms, room_id: RoomId, room: &NewRoom) -> Result<(), HotelError> {
        if room.number.trim().is_empty() {
            return Err(HotelError::Validation("Room number is required".to_string()));
        }
        if room.room_type.trim().is_empty() {
            return Err(HotelError::Validation("Room type is required".to_string()));
        }
        if rooms.by_number(room.number.trim()).is_some() {
            return Err(HotelError::Validation(format!(
                "Room number {} already exists in hotel {}",
                room.number.trim(),
                rooms.hotel_id
            )));
        }
        if rooms.rooms.contains_key(&room_id) {
            return Err(HotelError::Internal(format!("Room id {room_id} is already in use")));
        }
        Ok(())
    }
}

impl Reducer for RoomCatalogReducer {
    type State = HotelRooms;
    type Action = RoomCatalogAction;
    type Event = RoomCatalogEvent;
    type Environment = ();
    type Error = HotelError;

    fn reduce(
        &self,
        state: &mut HotelRooms,
        action: RoomCatalogAction,
        _env: &(),
    ) -> Result<Effects<RoomCatalogEvent>, HotelError> {
        match action {
            RoomCatalogAction::AddRoom { room_id, room } => {
                Self::validate_room(state, room_id, &room)?;

                let number = room.number.trim().to_string();
                state.rooms.insert(
                    room_id,
                    Room {
                        id: room_id,
                        hotel_id: state.hotel_id,
                        number: number.clone(),
                        room_type: room.room_type.trim().to_string(),
                        price: room.price,
                    },
                );

                Ok(smallvec![Effect::Publish(RoomCatalogEvent::RoomAdded {
                    hotel_id: state.hotel_id,
                    room_id,
                    number,
                })])
            },
        }
    }
}
