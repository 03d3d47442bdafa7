//! Reservation state machine.
//!
//! A [`RoomLedger`] holds everything the room key protects: the room's
//! availability index and every reservation ever made on the room. Each
//! [`LedgerAction`] is one serialized step: the status change and the
//! matching index change happen together or not at all.
//!
//! ```text
//! Create   ─► Pending                       (dates free, check-in not in the past)
//! Confirm  :  Pending ─► Confirmed           (Confirmed: no-op)
//! Cancel   :  Pending | Confirmed ─► Cancelled, dates released (Cancelled: no-op)
//! CheckIn  :  Confirmed ─► CheckedIn         (on or after the check-in date)
//! Complete :  CheckedIn ─► Completed, dates released (on or after check-out)
//! ```

use crate::availability::RoomAvailabilityIndex;
use crate::error::HotelError;
use crate::types::{
    AvailabilityInterval, Guest, HotelId, Money, Reservation, ReservationId, ReservationStatus,
    RoomId, StayDates,
};
use chrono::{DateTime, Utc};
use hotel_ops_core::effect::{Effect, Effects};
use hotel_ops_core::environment::Clock;
use hotel_ops_core::reducer::Reducer;
use hotel_ops_core::smallvec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Durable state of one room
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLedger {
    /// Owning hotel
    pub hotel_id: HotelId,
    /// The room
    pub room_id: RoomId,
    /// Date intervals held on the room
    pub index: RoomAvailabilityIndex,
    /// Every reservation made on the room, never deleted
    pub reservations: BTreeMap<ReservationId, Reservation>,
}

impl RoomLedger {
    /// Ledger of a room with no reservations
    #[must_use]
    pub const fn new(hotel_id: HotelId, room_id: RoomId) -> Self {
        Self {
            hotel_id,
            room_id,
            index: RoomAvailabilityIndex::new(room_id),
            reservations: BTreeMap::new(),
        }
    }

    /// Look up a reservation
    #[must_use]
    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    /// Every reservation and its interval agree on status, and blocking
    /// intervals do not overlap.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.index.is_consistent()
            && self.index.len() == self.reservations.len()
            && self.reservations.values().all(|reservation| {
                self.index.get(reservation.id).is_some_and(|interval| {
                    interval.status == reservation.status && interval.stay == reservation.stay
                })
            })
    }
}

// ============================================================================
// Actions & Events
// ============================================================================

/// Commands accepted by a room ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerAction {
    /// Reserve the room for a stay
    Create {
        /// Freshly allocated id
        reservation_id: ReservationId,
        /// Guest details
        guest: Guest,
        /// Nights requested
        stay: StayDates,
        /// Amount agreed
        total_amount: Money,
    },
    /// Pending → Confirmed
    Confirm {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// Pending | Confirmed → Cancelled
    Cancel {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// Confirmed → `CheckedIn`
    CheckIn {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// `CheckedIn` → Completed
    Complete {
        /// Target reservation
        reservation_id: ReservationId,
    },
}

impl LedgerAction {
    /// Reservation the action targets
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::Create { reservation_id, .. }
            | Self::Confirm { reservation_id }
            | Self::Cancel { reservation_id }
            | Self::CheckIn { reservation_id }
            | Self::Complete { reservation_id } => *reservation_id,
        }
    }
}

/// Facts published after a ledger change is committed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationEvent {
    /// A reservation was created in Pending
    Created {
        /// New reservation
        reservation_id: ReservationId,
        /// Hotel
        hotel_id: HotelId,
        /// Room
        room_id: RoomId,
        /// Nights held
        stay: StayDates,
        /// Amount agreed
        total_amount: Money,
        /// When
        at: DateTime<Utc>,
    },
    /// Pending → Confirmed
    Confirmed {
        /// Reservation
        reservation_id: ReservationId,
        /// When
        at: DateTime<Utc>,
    },
    /// Cancelled and dates released
    Cancelled {
        /// Reservation
        reservation_id: ReservationId,
        /// Status before cancellation
        from: ReservationStatus,
        /// When
        at: DateTime<Utc>,
    },
    /// Guest checked in
    CheckedIn {
        /// Reservation
        reservation_id: ReservationId,
        /// When
        at: DateTime<Utc>,
    },
    /// Stay completed and dates released
    Completed {
        /// Reservation
        reservation_id: ReservationId,
        /// When
        at: DateTime<Utc>,
    },
}

impl ReservationEvent {
    /// Reservation the event concerns
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::Created { reservation_id, .. }
            | Self::Confirmed { reservation_id, .. }
            | Self::Cancelled { reservation_id, .. }
            | Self::CheckedIn { reservation_id, .. }
            | Self::Completed { reservation_id, .. } => *reservation_id,
        }
    }

    /// Short name for logs and audit entries
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Confirmed { .. } => "confirmed",
            Self::Cancelled { .. } => "cancelled",
            Self::CheckedIn { .. } => "checked_in",
            Self::Completed { .. } => "completed",
        }
    }

    /// When the change happened
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Created { at, .. }
            | Self::Confirmed { at, .. }
            | Self::Cancelled { at, .. }
            | Self::CheckedIn { at, .. }
            | Self::Completed { at, .. } => *at,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of [`ReservationReducer`]
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Source of "now" and "today" for date rules and timestamps
    pub clock: Arc<dyn Clock>,
}

impl ReservationEnvironment {
    /// Creates a new `ReservationEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// The reservation state machine over a [`RoomLedger`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReservationReducer;

impl ReservationReducer {
    fn validate_create(
        ledger: &RoomLedger,
        reservation_id: ReservationId,
        stay: &StayDates,
        env: &ReservationEnvironment,
    ) -> Result<(), HotelError> {
        if ledger.reservations.contains_key(&reservation_id) {
            return Err(HotelError::Internal(format!(
                "Reservation id {reservation_id} is already in use"
            )));
        }

        let today = env.clock.today();
        if stay.check_in() < today {
            return Err(HotelError::Validation(format!(
                "Check-in date {} is in the past (today is {today})",
                stay.check_in()
            )));
        }

        if let Some(conflict) = ledger.index.query_conflicts(stay).first() {
            return Err(HotelError::BookingConflict {
                room_id: ledger.room_id,
                conflicting: conflict.reservation_id,
            });
        }

        Ok(())
    }

    fn existing(ledger: &RoomLedger, id: ReservationId) -> Result<&Reservation, HotelError> {
        ledger
            .reservation(id)
            .ok_or_else(|| HotelError::Validation(format!("Reservation {id} not found")))
    }

    fn invalid(
        reservation: &Reservation,
        action: &'static str,
        reason: impl Into<String>,
    ) -> HotelError {
        HotelError::InvalidTransition {
            reservation_id: reservation.id,
            from: reservation.status,
            action,
            reason: reason.into(),
        }
    }

    /// Move `id` to `status` in both the reservation and the index.
    fn apply_status(
        ledger: &mut RoomLedger,
        id: ReservationId,
        status: ReservationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), HotelError> {
        ledger.index.update_status(id, status)?;
        if let Some(reservation) = ledger.reservations.get_mut(&id) {
            reservation.status = status;
            reservation.updated_at = at;
        }
        Ok(())
    }

    fn create(
        ledger: &mut RoomLedger,
        reservation_id: ReservationId,
        guest: Guest,
        stay: StayDates,
        total_amount: Money,
        env: &ReservationEnvironment,
    ) -> Result<Effects<ReservationEvent>, HotelError> {
        Self::validate_create(ledger, reservation_id, &stay, env)?;

        let now = env.clock.now();
        ledger.index.insert(AvailabilityInterval {
            room_id: ledger.room_id,
            stay,
            reservation_id,
            status: ReservationStatus::Pending,
        })?;
        ledger.reservations.insert(
            reservation_id,
            Reservation {
                id: reservation_id,
                hotel_id: ledger.hotel_id,
                room_id: ledger.room_id,
                guest,
                stay,
                total_amount,
                status: ReservationStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(smallvec![Effect::Publish(ReservationEvent::Created {
            reservation_id,
            hotel_id: ledger.hotel_id,
            room_id: ledger.room_id,
            stay,
            total_amount,
            at: now,
        })])
    }

    fn confirm(
        ledger: &mut RoomLedger,
        id: ReservationId,
        env: &ReservationEnvironment,
    ) -> Result<Effects<ReservationEvent>, HotelError> {
        let reservation = Self::existing(ledger, id)?;
        match reservation.status {
            ReservationStatus::Confirmed => Ok(smallvec![Effect::None]),
            ReservationStatus::Pending => {
                let at = env.clock.now();
                Self::apply_status(ledger, id, ReservationStatus::Confirmed, at)?;
                Ok(smallvec![Effect::Publish(ReservationEvent::Confirmed { reservation_id: id, at })])
            },
            ReservationStatus::CheckedIn
            | ReservationStatus::Completed
            | ReservationStatus::Cancelled => {
                Err(Self::invalid(reservation, "confirm", "only pending reservations can be confirmed"))
            },
        }
    }

    fn cancel(
        ledger: &mut RoomLedger,
        id: ReservationId,
        env: &ReservationEnvironment,
    ) -> Result<Effects<ReservationEvent>, HotelError> {
        let reservation = Self::existing(ledger, id)?;
        match reservation.status {
            ReservationStatus::Cancelled => Ok(smallvec![Effect::None]),
            from @ (ReservationStatus::Pending | ReservationStatus::Confirmed) => {
                let at = env.clock.now();
                Self::apply_status(ledger, id, ReservationStatus::Cancelled, at)?;
                Ok(smallvec![Effect::Publish(ReservationEvent::Cancelled {
                    reservation_id: id,
                    from,
                    at,
                })])
            },
            ReservationStatus::CheckedIn | ReservationStatus::Completed => Err(Self::invalid(
                reservation,
                "cancel",
                "the guest has already checked in",
            )),
        }
    }

    fn check_in(
        ledger: &mut RoomLedger,
        id: ReservationId,
        env: &ReservationEnvironment,
    ) -> Result<Effects<ReservationEvent>, HotelError> {
        let reservation = Self::existing(ledger, id)?;
        if reservation.status != ReservationStatus::Confirmed {
            return Err(Self::invalid(
                reservation,
                "check in",
                "only confirmed reservations can be checked in",
            ));
        }
        let today = env.clock.today();
        if today < reservation.stay.check_in() {
            return Err(Self::invalid(
                reservation,
                "check in",
                format!("check-in opens on {}", reservation.stay.check_in()),
            ));
        }

        let at = env.clock.now();
        Self::apply_status(ledger, id, ReservationStatus::CheckedIn, at)?;
        Ok(smallvec![Effect::Publish(ReservationEvent::CheckedIn { reservation_id: id, at })])
    }

    fn complete(
        ledger: &mut RoomLedger,
        id: ReservationId,
        env: &ReservationEnvironment,
    ) -> Result<Effects<ReservationEvent>, HotelError> {
        let reservation = Self::existing(ledger, id)?;
        if reservation.status != ReservationStatus::CheckedIn {
            return Err(Self::invalid(
                reservation,
                "complete",
                "only checked-in reservations can be completed",
            ));
        }
        let today = env.clock.today();
        if today < reservation.stay.check_out() {
            return Err(Self::invalid(
                reservation,
                "complete",
                format!("the stay runs until {}", reservation.stay.check_out()),
            ));
        }

        let at = env.clock.now();
        Self::apply_status(ledger, id, ReservationStatus::Completed, at)?;
        Ok(smallvec![Effect::Publish(ReservationEvent::Completed { reservation_id: id, at })])
    }
}

impl Reducer for ReservationReducer {
    type State = RoomLedger;
    type Action = LedgerAction;
    type Event = ReservationEvent;
    type Environment = ReservationEnvironment;
    type Error = HotelError;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Effects<ReservationEvent>, HotelError> {
        match action {
            LedgerAction::Create { reservation_id, guest, stay, total_amount } => {
                Self::create(state, reservation_id, guest, stay, total_amount, env)
            },
            LedgerAction::Confirm { reservation_id } => Self::confirm(state, reservation_id, env),
            LedgerAction::Cancel { reservation_id } => Self::cancel(state, reservation_id, env),
            LedgerAction::CheckIn { reservation_id } => Self::check_in(state, reservation_id, env),
            LedgerAction::Complete { reservation_id } => Self::complete(state, reservation_id, env),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use hotel_ops_testing::{ReducerTest, assertions, test_clock};

    fn env() -> ReservationEnvironment {
        ReservationEnvironment::new(Arc::new(test_clock()))
    }

    fn day(offset: i64) -> NaiveDate {
        test_clock().today() + Duration::days(offset)
    }

    fn create(id: u64, from: i64, to: i64) -> LedgerAction {
        LedgerAction::Create {
            reservation_id: ReservationId::new(id),
            guest: Guest::new("Zhang San", "13800138000").unwrap(),
            stay: StayDates::new(day(from), day(to)).unwrap(),
            total_amount: Money::from_cents(59_800),
        }
    }

    fn ledger_with(actions: Vec<LedgerAction>) -> RoomLedger {
        let mut ledger = RoomLedger::new(HotelId::new(1), RoomId::new(101));
        for action in actions {
            ReservationReducer.reduce(&mut ledger, action, &env()).unwrap();
        }
        ledger
    }

    fn status_of(ledger: &RoomLedger, id: u64) -> ReservationStatus {
        ledger.reservation(ReservationId::new(id)).unwrap().status
    }

    #[test]
    fn create_on_free_dates_is_pending() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(RoomLedger::new(HotelId::new(1), RoomId::new(101)))
            .when_action(create(1, 1, 3))
            .then_state(|ledger| {
                assert_eq!(status_of(ledger, 1), ReservationStatus::Pending);
                assert_eq!(ledger.index.active_intervals().count(), 1);
                assert!(ledger.is_consistent());
            })
            .then_events(|events| {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].name(), "created");
            })
            .run();
    }

    #[test]
    fn create_overlapping_is_a_booking_conflict() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![create(1, 1, 3)]))
            .when_action(create(2, 2, 4))
            .then_error(|error| {
                assert_eq!(
                    *error,
                    HotelError::BookingConflict {
                        room_id: RoomId::new(101),
                        conflicting: ReservationId::new(1)
                    }
                );
            })
            .run();
    }

    #[test]
    fn create_in_the_past_is_rejected() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(RoomLedger::new(HotelId::new(1), RoomId::new(101)))
            .when_action(create(1, -1, 2))
            .then_error(|error| assert_eq!(error.kind(), "ValidationError"))
            .run();
    }

    #[test]
    fn check_in_today_is_allowed() {
        let ledger = ledger_with(vec![
            create(1, 0, 2),
            LedgerAction::Confirm { reservation_id: ReservationId::new(1) },
        ]);
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger)
            .when_action(LedgerAction::CheckIn { reservation_id: ReservationId::new(1) })
            .then_state(|ledger| {
                assert_eq!(status_of(ledger, 1), ReservationStatus::CheckedIn);
                // A checked-in guest still occupies the room.
                assert!(!ledger.index.is_free_on(day(0)));
            })
            .run();
    }

    #[test]
    fn confirm_twice_is_idempotent() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 1, 3),
                LedgerAction::Confirm { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::Confirm { reservation_id: ReservationId::new(1) })
            .then_state(|ledger| {
                assert_eq!(status_of(ledger, 1), ReservationStatus::Confirmed);
                assert_eq!(ledger.reservations.len(), 1);
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn confirm_cancelled_is_invalid() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 1, 3),
                LedgerAction::Cancel { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::Confirm { reservation_id: ReservationId::new(1) })
            .then_error(|error| {
                assert!(matches!(
                    error,
                    HotelError::InvalidTransition { from: ReservationStatus::Cancelled, .. }
                ));
            })
            .run();
    }

    #[test]
    fn cancel_releases_dates_and_keeps_record() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 1, 3),
                LedgerAction::Confirm { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::Cancel { reservation_id: ReservationId::new(1) })
            .then_state(|ledger| {
                assert_eq!(status_of(ledger, 1), ReservationStatus::Cancelled);
                assert_eq!(ledger.index.active_intervals().count(), 0);
                assert_eq!(ledger.index.len(), 1);
                assert!(ledger.is_consistent());
            })
            .then_events(|events| {
                assert!(matches!(
                    events,
                    [ReservationEvent::Cancelled { from: ReservationStatus::Confirmed, .. }]
                ));
            })
            .run();
    }

    #[test]
    fn cancel_twice_is_idempotent() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 1, 3),
                LedgerAction::Cancel { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::Cancel { reservation_id: ReservationId::new(1) })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn rebooking_after_cancel_succeeds() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 1, 3),
                LedgerAction::Cancel { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(create(2, 1, 3))
            .then_state(|ledger| {
                assert_eq!(status_of(ledger, 2), ReservationStatus::Pending);
                assert!(ledger.is_consistent());
            })
            .run();
    }

    #[test]
    fn check_in_before_arrival_is_invalid() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 2, 4),
                LedgerAction::Confirm { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::CheckIn { reservation_id: ReservationId::new(1) })
            .then_error(|error| {
                assert!(matches!(error, HotelError::InvalidTransition { action: "check in", .. }));
            })
            .run();
    }

    #[test]
    fn check_in_requires_confirmation() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![create(1, 0, 2)]))
            .when_action(LedgerAction::CheckIn { reservation_id: ReservationId::new(1) })
            .then_error(|error| {
                assert!(matches!(
                    error,
                    HotelError::InvalidTransition { from: ReservationStatus::Pending, .. }
                ));
            })
            .run();
    }

    #[test]
    fn complete_before_check_out_is_invalid() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 0, 2),
                LedgerAction::Confirm { reservation_id: ReservationId::new(1) },
                LedgerAction::CheckIn { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::Complete { reservation_id: ReservationId::new(1) })
            .then_error(|error| {
                assert!(matches!(error, HotelError::InvalidTransition { action: "complete", .. }));
            })
            .run();
    }

    #[test]
    fn cancel_after_check_in_is_invalid() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![
                create(1, 0, 2),
                LedgerAction::Confirm { reservation_id: ReservationId::new(1) },
                LedgerAction::CheckIn { reservation_id: ReservationId::new(1) },
            ]))
            .when_action(LedgerAction::Cancel { reservation_id: ReservationId::new(1) })
            .then_error(|error| assert_eq!(error.kind(), "InvalidTransition"))
            .run();
    }

    #[test]
    fn unknown_reservation_is_a_validation_error() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(RoomLedger::new(HotelId::new(1), RoomId::new(101)))
            .when_action(LedgerAction::Confirm { reservation_id: ReservationId::new(42) })
            .then_error(|error| {
                assert_eq!(*error, HotelError::Validation("Reservation 42 not found".to_string()));
            })
            .run();
    }

    #[test]
    fn reused_id_is_an_internal_error() {
        ReducerTest::new(ReservationReducer)
            .with_env(env())
            .given_state(ledger_with(vec![create(1, 1, 3)]))
            .when_action(create(1, 5, 6))
            .then_error(|error| assert_eq!(error.kind(), "InternalError"))
            .run();
    }
}
