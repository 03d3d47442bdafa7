//! Booking coordinator: every reservation and room-catalog mutation.
//!
//! Each mutation maps to one [`ResourceKey`] and runs inside that key's FIFO
//! lane of the [`Coordinator`]. Inside the lane the operation reads durable
//! state, runs the pure reducer, commits with compare-and-set and only then
//! publishes events:
//!
//! ```text
//! request ─► lane(room key) ─► snapshot ─► reducer ─► CAS commit ─► publish
//! ```
//!
//! Because queued work always re-reads the store, an operation that moves to
//! another execution context after a membership change behaves exactly as it
//! would have where it was queued.

use crate::aggregates::{
    HotelEvent, HotelRooms, LedgerAction, ReservationEnvironment, ReservationEvent,
    ReservationReducer, RoomCatalogAction, RoomCatalogEvent, RoomCatalogReducer, RoomLedger,
};
use crate::error::{AttemptError, HotelError};
use crate::key::ResourceKey;
use crate::state::{ReservationLocator, commit_with_retries, keys, sequences};
use crate::types::{
    Guest, HotelId, Money, NewRoom, ReservationId, ReservationStatus, RoomId, StayDates,
};
use hotel_ops_core::effect::{Effect, Effects};
use hotel_ops_core::environment::Clock;
use hotel_ops_core::event_bus::EventBus;
use hotel_ops_core::reducer::Reducer;
use hotel_ops_core::state_store::{Expect, StateStore, Write};
use hotel_ops_runtime::effects::dispatch;
use hotel_ops_runtime::metrics::BookingMetrics;
use hotel_ops_runtime::{Coordinator, RetryPolicy};
use std::sync::Arc;

/// A validated reservation request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationRequest {
    /// Hotel
    pub hotel_id: HotelId,
    /// Room
    pub room_id: RoomId,
    /// Guest details
    pub guest: Guest,
    /// Nights requested
    pub stay: StayDates,
    /// Amount agreed
    pub total_amount: Money,
}

/// Serializes every mutation of rooms and reservations
#[derive(Clone)]
pub struct BookingCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn StateStore>,
    coordinator: Coordinator<ResourceKey>,
    bus: Arc<dyn EventBus<HotelEvent>>,
    env: ReservationEnvironment,
    retry: RetryPolicy,
}

impl BookingCoordinator {
    /// Creates a new `BookingCoordinator`
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        coordinator: Coordinator<ResourceKey>,
        bus: Arc<dyn EventBus<HotelEvent>>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                coordinator,
                bus,
                env: ReservationEnvironment::new(clock),
                retry,
            }),
        }
    }

    /// The underlying keyed coordinator
    #[must_use]
    pub fn coordinator(&self) -> &Coordinator<ResourceKey> {
        &self.inner.coordinator
    }

    /// Reserve a room. The new reservation is Pending.
    ///
    /// An unknown hotel or room is rejected before the room's key is queued.
    /// The lane checks existence again, then the dates, then inserts, all in
    /// one step.
    ///
    /// # Errors
    ///
    /// - [`HotelError::Validation`] for an unknown hotel or room, or a past check-in
    /// - [`HotelError::BookingConflict`] if the dates overlap a blocking reservation
    /// - [`HotelError::Unavailable`] on queue timeout or persistent contention
    pub async fn create_reservation(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationId, HotelError> {
        let key = ResourceKey::room(request.hotel_id, request.room_id);
        if let Err(error) = self.inner.ensure_room_exists(request.hotel_id, request.room_id).await {
            record_rejection(key, "create", &error);
            return Err(error);
        }
        let inner = Arc::clone(&self.inner);
        let outcome = self
            .inner
            .coordinator
            .execute(key, move || async move { inner.create_in_lane(request).await })
            .await
            .map_err(HotelError::from)
            .and_then(|result| result);

        match &outcome {
            Ok(reservation_id) => {
                BookingMetrics::record_admitted("create");
                tracing::info!(key = %key, reservation_id = %reservation_id, "Reservation created");
            },
            Err(error) => record_rejection(key, "create", error),
        }
        outcome
    }

    /// Pending → Confirmed. Confirming a confirmed reservation succeeds
    /// without change.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for an unknown reservation,
    /// [`HotelError::InvalidTransition`] from any other status.
    pub async fn confirm_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.transition(reservation_id, "confirm", |reservation_id| LedgerAction::Confirm {
            reservation_id,
        })
        .await
    }

    /// Pending | Confirmed → Cancelled, releasing the dates. Cancelling a
    /// cancelled reservation succeeds without change.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for an unknown reservation,
    /// [`HotelError::InvalidTransition`] once the guest has checked in.
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.transition(reservation_id, "cancel", |reservation_id| LedgerAction::Cancel {
            reservation_id,
        })
        .await
    }

    /// Confirmed → `CheckedIn`, on or after the check-in date.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for an unknown reservation,
    /// [`HotelError::InvalidTransition`] otherwise.
    pub async fn check_in_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.transition(reservation_id, "check_in", |reservation_id| LedgerAction::CheckIn {
            reservation_id,
        })
        .await
    }

    /// `CheckedIn` → Completed, on or after the check-out date.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for an unknown reservation,
    /// [`HotelError::InvalidTransition`] otherwise.
    pub async fn complete_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.transition(reservation_id, "complete", |reservation_id| LedgerAction::Complete {
            reservation_id,
        })
        .await
    }

    /// Add a room to a hotel, serialized on the hotel's key.
    ///
    /// # Errors
    ///
    /// [`HotelError::Validation`] for an unknown hotel, a blank field or a
    /// room number already used in the hotel.
    pub async fn add_room(&self, hotel_id: HotelId, room: NewRoom) -> Result<RoomId, HotelError> {
        let key = ResourceKey::hotel(hotel_id);
        if let Err(error) = self.inner.ensure_hotel_exists(hotel_id).await {
            record_rejection(key, "add_room", &error);
            return Err(error);
        }
        let inner = Arc::clone(&self.inner);
        let outcome = self
            .inner
            .coordinator
            .execute(key, move || async move { inner.add_room_in_lane(hotel_id, room).await })
            .await
            .map_err(HotelError::from)
            .and_then(|result| result);

        match &outcome {
            Ok(room_id) => tracing::info!(key = %key, room_id = %room_id, "Room added"),
            Err(error) => record_rejection(key, "add_room", error),
        }
        outcome
    }

    async fn transition(
        &self,
        reservation_id: ReservationId,
        action: &'static str,
        make: fn(ReservationId) -> LedgerAction,
    ) -> Result<ReservationStatus, HotelError> {
        // The locator is written once at creation and never changes, so it
        // can be read outside the lane.
        let locator = self.inner.locate(reservation_id).await?;
        let key = ResourceKey::room(locator.hotel_id, locator.room_id);
        let inner = Arc::clone(&self.inner);
        let outcome = self
            .inner
            .coordinator
            .execute(key, move || async move {
                inner.transition_in_lane(locator, make(reservation_id)).await
            })
            .await
            .map_err(HotelError::from)
            .and_then(|result| result);

        match &outcome {
            Ok(status) => {
                BookingMetrics::record_admitted(action);
                tracing::info!(
                    key = %key,
                    reservation_id = %reservation_id,
                    action,
                    status = %status,
                    "Reservation transition applied"
                );
            },
            Err(error) => record_rejection(key, action, error),
        }
        outcome
    }
}

impl Inner {
    // Hotels and rooms are never removed, so a check made before queuing
    // still holds when the lane runs.
    async fn ensure_hotel_exists(&self, hotel_id: HotelId) -> Result<(), HotelError> {
        match self.store.get(&keys::catalog(hotel_id)).await? {
            Some(_) => Ok(()),
            None => Err(HotelError::Validation(format!("Hotel {hotel_id} not found"))),
        }
    }

    async fn ensure_room_exists(&self, hotel_id: HotelId, room_id: RoomId) -> Result<(), HotelError> {
        let read = [keys::catalog(hotel_id), keys::rooms(hotel_id)];
        let snapshot = self.store.snapshot(&read).await?;
        if snapshot.get(&read[0]).is_none() {
            return Err(HotelError::Validation(format!("Hotel {hotel_id} not found")));
        }
        let rooms: Option<HotelRooms> = snapshot.decode(&read[1])?;
        if rooms.is_none_or(|rooms| rooms.get(room_id).is_none()) {
            return Err(HotelError::Validation(format!(
                "Room {room_id} not found in hotel {hotel_id}"
            )));
        }
        Ok(())
    }

    async fn locate(&self, reservation_id: ReservationId) -> Result<ReservationLocator, HotelError> {
        match self.store.get(&keys::locator(reservation_id)).await? {
            Some(entry) => Ok(entry.decode()?),
            None => Err(HotelError::Validation(format!("Reservation {reservation_id} not found"))),
        }
    }

    async fn create_in_lane(&self, request: ReservationRequest) -> Result<ReservationId, HotelError> {
        let request = &request;
        let (reservation_id, effects) =
            commit_with_retries(&self.retry, move || self.try_create(request)).await?;
        self.publish(effects);
        Ok(reservation_id)
    }

    async fn try_create(
        &self,
        request: &ReservationRequest,
    ) -> Result<(ReservationId, Effects<ReservationEvent>), AttemptError> {
        let (hotel_id, room_id) = (request.hotel_id, request.room_id);
        let ledger_key = keys::ledger(hotel_id, room_id);
        let read = [keys::catalog(hotel_id), keys::rooms(hotel_id), ledger_key.clone()];
        let snapshot = self.store.snapshot(&read).await?;

        if snapshot.get(&read[0]).is_none() {
            return Err(HotelError::Validation(format!("Hotel {hotel_id} not found")).into());
        }
        let rooms: Option<HotelRooms> = snapshot.decode(&read[1])?;
        if rooms.is_none_or(|rooms| rooms.get(room_id).is_none()) {
            return Err(HotelError::Validation(format!(
                "Room {room_id} not found in hotel {hotel_id}"
            ))
            .into());
        }

        let entry = snapshot.get(&ledger_key);
        let mut ledger = match entry {
            Some(entry) => entry.decode::<RoomLedger>()?,
            None => RoomLedger::new(hotel_id, room_id),
        };

        let reservation_id =
            ReservationId::new(self.store.next_sequence(sequences::RESERVATION).await?);
        let effects = ReservationReducer.reduce(
            &mut ledger,
            LedgerAction::Create {
                reservation_id,
                guest: request.guest.clone(),
                stay: request.stay,
                total_amount: request.total_amount,
            },
            &self.env,
        )?;

        self.store
            .commit(vec![
                Write::put(ledger_key, Expect::observed(entry), &ledger)?,
                Write::put(
                    keys::locator(reservation_id),
                    Expect::Absent,
                    &ReservationLocator { hotel_id, room_id },
                )?,
            ])
            .await?;
        Ok((reservation_id, effects))
    }

    async fn transition_in_lane(
        &self,
        locator: ReservationLocator,
        action: LedgerAction,
    ) -> Result<ReservationStatus, HotelError> {
        let action = &action;
        let (status, effects) =
            commit_with_retries(&self.retry, move || self.try_transition(locator, action)).await?;
        self.publish(effects);
        Ok(status)
    }

    async fn try_transition(
        &self,
        locator: ReservationLocator,
        action: &LedgerAction,
    ) -> Result<(ReservationStatus, Effects<ReservationEvent>), AttemptError> {
        let reservation_id = action.reservation_id();
        let ledger_key = keys::ledger(locator.hotel_id, locator.room_id);
        let Some(entry) = self.store.get(&ledger_key).await? else {
            return Err(HotelError::Internal(format!(
                "Ledger {ledger_key} for reservation {reservation_id} is missing"
            ))
            .into());
        };
        let mut ledger: RoomLedger = entry.decode()?;
        let effects = ReservationReducer.reduce(&mut ledger, action.clone(), &self.env)?;
        let status = ledger
            .reservation(reservation_id)
            .map(|reservation| reservation.status)
            .ok_or_else(|| {
                HotelError::Internal(format!("Reservation {reservation_id} vanished from its ledger"))
            })?;

        // Idempotent repeats change nothing and need no commit.
        if effects.iter().all(Effect::is_none) {
            return Ok((status, effects));
        }

        self.store
            .commit(vec![Write::put(ledger_key, Expect::Revision(entry.revision), &ledger)?])
            .await?;
        Ok((status, effects))
    }

    async fn add_room_in_lane(&self, hotel_id: HotelId, room: NewRoom) -> Result<RoomId, HotelError> {
        let room = &room;
        let (room_id, effects) =
            commit_with_retries(&self.retry, move || self.try_add_room(hotel_id, room)).await?;
        self.publish(effects);
        Ok(room_id)
    }

    async fn try_add_room(
        &self,
        hotel_id: HotelId,
        room: &NewRoom,
    ) -> Result<(RoomId, Effects<RoomCatalogEvent>), AttemptError> {
        let rooms_key = keys::rooms(hotel_id);
        let Some(entry) = self.store.get(&rooms_key).await? else {
            return Err(HotelError::Validation(format!("Hotel {hotel_id} not found")).into());
        };
        let mut rooms: HotelRooms = entry.decode()?;

        // Reject duplicates before drawing an id.
        if rooms.by_number(room.number.trim()).is_some() {
            return Err(HotelError::Validation(format!(
                "Room number {} already exists in hotel {hotel_id}",
                room.number.trim()
            ))
            .into());
        }

        let room_id = RoomId::new(self.store.next_sequence(sequences::ROOM).await?);
        let effects = RoomCatalogReducer.reduce(
            &mut rooms,
            RoomCatalogAction::AddRoom { room_id, room: room.clone() },
            &(),
        )?;
        self.store
            .commit(vec![Write::put(rooms_key, Expect::Revision(entry.revision), &rooms)?])
            .await?;
        Ok((room_id, effects))
    }

    fn publish<E: Into<HotelEvent>>(&self, effects: Effects<E>) {
        dispatch(
            effects.into_iter().map(|effect| effect.map(&<E as Into<HotelEvent>>::into)),
            &*self.bus,
        );
    }
}

fn record_rejection(key: ResourceKey, action: &'static str, error: &HotelError) {
    match error {
        HotelError::BookingConflict { conflicting, .. } => {
            BookingMetrics::record_conflict();
            tracing::warn!(key = %key, action, conflicting = %conflicting, "Booking conflict");
        },
        HotelError::Unavailable(reason) => {
            BookingMetrics::record_rejection(error.kind());
            tracing::warn!(key = %key, action, reason = %reason, "Booking unavailable");
        },
        HotelError::Internal(reason) => {
            BookingMetrics::record_rejection(error.kind());
            tracing::error!(key = %key, action, reason = %reason, "Booking failed");
        },
        other => {
            BookingMetrics::record_rejection(other.kind());
            tracing::info!(key = %key, action, error = %other, "Booking request rejected");
        },
    }
}
