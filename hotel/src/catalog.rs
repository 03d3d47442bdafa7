//! Hotel catalog and read paths.
//!
//! Reads never enter a coordinator lane. Each answer is computed from one
//! store snapshot, so it reflects a single consistent (possibly slightly
//! past) revision.

use crate::aggregates::{HotelEvent, HotelRooms, RoomLedger};
use crate::error::HotelError;
use crate::state::{ReservationLocator, keys, sequences};
use crate::types::{
    AvailabilityInterval, Hotel, HotelId, NewHotel, Reservation, ReservationId, RoomId, RoomView,
    StarRating,
};
use hotel_ops_core::effect::Effect;
use hotel_ops_core::environment::Clock;
use hotel_ops_core::event_bus::EventBus;
use hotel_ops_core::state::StateKey;
use hotel_ops_core::state_store::{Expect, Snapshot, StateStore, Write};
use hotel_ops_runtime::effects::dispatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reads before giving up when a room list keeps changing between reads.
const MAX_SNAPSHOT_ATTEMPTS: usize = 3;

/// Aggregate counts across all hotels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelStatistics {
    /// Hotels in the catalog
    pub total_hotels: usize,
    /// Rooms across all hotels
    pub total_rooms: usize,
    /// Rooms with no blocking reservation covering today
    pub available_rooms: usize,
    /// Reservations ever made, in any status
    pub total_reservations: usize,
}

/// Hotel records and every read-only query
#[derive(Clone)]
pub struct HotelCatalog {
    store: Arc<dyn StateStore>,
    bus: Arc<dyn EventBus<HotelEvent>>,
    clock: Arc<dyn Clock>,
}

impl HotelCatalog {
    /// Creates a new `HotelCatalog`
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        bus: Arc<dyn EventBus<HotelEvent>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, bus, clock }
    }

    /// Add a hotel with an empty room list.
    ///
    /// Writes only keys that did not exist before, so no lane is needed.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for a blank name or a star rating outside 1..=5.
    pub async fn create_hotel(&self, hotel: NewHotel) -> Result<HotelId, HotelError> {
        let name = hotel.name.trim().to_string();
        if name.is_empty() {
            return Err(HotelError::Validation("Hotel name is required".to_string()));
        }
        let star_rating = StarRating::new(hotel.star_rating)?;

        let hotel_id = HotelId::new(self.store.next_sequence(sequences::HOTEL).await?);
        let record = Hotel {
            id: hotel_id,
            name: name.clone(),
            address: hotel.address.trim().to_string(),
            phone: hotel.phone.trim().to_string(),
            star_rating,
        };
        self.store
            .commit(vec![
                Write::put(keys::catalog(hotel_id), Expect::Absent, &record)?,
                Write::put(keys::rooms(hotel_id), Expect::Absent, &HotelRooms::new(hotel_id))?,
            ])
            .await?;

        tracing::info!(hotel_id = %hotel_id, name = %name, "Hotel created");
        dispatch([Effect::Publish(HotelEvent::HotelCreated { hotel_id, name })], &*self.bus);
        Ok(hotel_id)
    }

    /// One hotel
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] if the hotel does not exist.
    pub async fn get_hotel(&self, hotel_id: HotelId) -> Result<Hotel, HotelError> {
        match self.store.get(&keys::catalog(hotel_id)).await? {
            Some(entry) => Ok(entry.decode()?),
            None => Err(hotel_not_found(hotel_id)),
        }
    }

    /// Every hotel, ordered by id
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn get_all_hotels(&self) -> Result<Vec<Hotel>, HotelError> {
        let snapshot = self.store.scan_prefix(keys::CATALOG_PREFIX).await?;
        let mut hotels = decode_all::<Hotel>(&snapshot, keys::CATALOG_PREFIX)?;
        hotels.sort_by_key(|hotel| hotel.id);
        Ok(hotels)
    }

    /// Hotels whose name or address contains `term`, ignoring case.
    /// A blank term matches every hotel.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn search_hotels(&self, term: &str) -> Result<Vec<Hotel>, HotelError> {
        let needle = term.trim().to_lowercase();
        let mut hotels = self.get_all_hotels().await?;
        hotels.retain(|hotel| {
            hotel.name.to_lowercase().contains(&needle) || hotel.address.to_lowercase().contains(&needle)
        });
        Ok(hotels)
    }

    /// Counts across the whole catalog, from one snapshot.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn statistics(&self) -> Result<HotelStatistics, HotelError> {
        let snapshot = self.store.scan_prefix(keys::HOTEL_PREFIX).await?;
        let today = self.clock.today();

        let hotels = snapshot.with_prefix(keys::CATALOG_PREFIX).count();
        let room_lists = decode_all::<HotelRooms>(&snapshot, keys::ROOMS_PREFIX)?;
        let ledgers = decode_all::<RoomLedger>(&snapshot, keys::LEDGER_PREFIX)?;

        let occupied = ledgers.iter().filter(|ledger| !ledger.index.is_free_on(today)).count();
        let total_rooms: usize = room_lists.iter().map(HotelRooms::len).sum();

        Ok(HotelStatistics {
            total_hotels: hotels,
            total_rooms,
            available_rooms: total_rooms.saturating_sub(occupied),
            total_reservations: ledgers.iter().map(|ledger| ledger.reservations.len()).sum(),
        })
    }

    /// Rooms of a hotel with their availability for today.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] if the hotel does not exist.
    pub async fn get_hotel_rooms(&self, hotel_id: HotelId) -> Result<Vec<RoomView>, HotelError> {
        let rooms_key = keys::rooms(hotel_id);
        let today = self.clock.today();

        for _ in 0..MAX_SNAPSHOT_ATTEMPTS {
            let Some(entry) = self.store.get(&rooms_key).await? else {
                return Err(hotel_not_found(hotel_id));
            };
            let rooms: HotelRooms = entry.decode()?;

            let mut read = vec![rooms_key.clone()];
            read.extend(rooms.rooms.keys().map(|room_id| keys::ledger(hotel_id, *room_id)));
            let snapshot = self.store.snapshot(&read).await?;
            if snapshot.get(&rooms_key).map(|e| e.revision) != Some(entry.revision) {
                continue;
            }

            let mut views = Vec::with_capacity(rooms.len());
            for room in rooms.rooms.into_values() {
                let ledger: Option<RoomLedger> = snapshot.decode(&keys::ledger(hotel_id, room.id))?;
                let is_available = ledger.is_none_or(|ledger| ledger.index.is_free_on(today));
                views.push(RoomView { room, is_available });
            }
            return Ok(views);
        }

        Err(HotelError::Unavailable(format!("Rooms of hotel {hotel_id} are changing too quickly to read")))
    }

    /// Blocking intervals of one room, ordered by check-in.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] if the hotel or room does not exist.
    pub async fn get_room_availability(
        &self,
        hotel_id: HotelId,
        room_id: RoomId,
    ) -> Result<Vec<AvailabilityInterval>, HotelError> {
        let read = [keys::rooms(hotel_id), keys::ledger(hotel_id, room_id)];
        let snapshot = self.store.snapshot(&read).await?;

        let rooms = snapshot.decode::<HotelRooms>(&read[0])?.ok_or_else(|| hotel_not_found(hotel_id))?;
        if rooms.get(room_id).is_none() {
            return Err(HotelError::Validation(format!("Room {room_id} not found in hotel {hotel_id}")));
        }

        let ledger: Option<RoomLedger> = snapshot.decode(&read[1])?;
        Ok(ledger
            .map(|ledger| ledger.index.active_intervals().cloned().collect())
            .unwrap_or_default())
    }

    /// One reservation
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] if the reservation does not exist.
    pub async fn get_reservation(&self, reservation_id: ReservationId) -> Result<Reservation, HotelError> {
        let not_found = || HotelError::Validation(format!("Reservation {reservation_id} not found"));

        let Some(entry) = self.store.get(&keys::locator(reservation_id)).await? else {
            return Err(not_found());
        };
        let locator: ReservationLocator = entry.decode()?;
        let ledger_key: StateKey = keys::ledger(locator.hotel_id, locator.room_id);
        let ledger: RoomLedger = match self.store.get(&ledger_key).await? {
            Some(entry) => entry.decode()?,
            None => return Err(not_found()),
        };
        ledger.reservation(reservation_id).cloned().ok_or_else(not_found)
    }
}

fn hotel_not_found(hotel_id: HotelId) -> HotelError {
    HotelError::Validation(format!("Hotel {hotel_id} not found"))
}

fn decode_all<T: serde::de::DeserializeOwned>(snapshot: &Snapshot, prefix: &str) -> Result<Vec<T>, HotelError> {
    snapshot
        .with_prefix(prefix)
        .map(|entry| entry.decode::<T>().map_err(HotelError::from))
        .collect()
}
