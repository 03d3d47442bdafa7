//! Per-room availability index.
//!
//! An ordered set of date intervals, one per reservation ever made on the
//! room. Intervals whose status blocks the room are pairwise
//! non-overlapping; cancelled and completed intervals are kept for history
//! but never conflict with anything.
//!
//! The index is plain data. Callers mutate it only while holding the room's
//! resource key, and only after `query_conflicts` on the same instance.

use crate::error::HotelError;
use crate::types::{AvailabilityInterval, ReservationId, ReservationStatus, RoomId, StayDates};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered interval set for one room
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAvailabilityIndex {
    room_id: RoomId,
    /// Ordered by start date, ties broken by reservation id.
    by_start: BTreeMap<(NaiveDate, ReservationId), AvailabilityInterval>,
    starts: BTreeMap<ReservationId, NaiveDate>,
}

impl RoomAvailabilityIndex {
    /// Empty index for `room_id`
    #[must_use]
    pub const fn new(room_id: RoomId) -> Self {
        Self { room_id, by_start: BTreeMap::new(), starts: BTreeMap::new() }
    }

    /// The room this index belongs to
    #[must_use]
    pub const fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Blocking intervals sharing at least one night with `stay`, ordered by
    /// start date.
    #[must_use]
    pub fn query_conflicts(&self, stay: &StayDates) -> Vec<&AvailabilityInterval> {
        // Only intervals starting before the requested check-out can overlap.
        self.by_start
            .range(..(stay.check_out(), ReservationId::new(0)))
            .map(|(_, interval)| interval)
            .filter(|interval| interval.is_blocking() && interval.stay.overlaps(stay))
            .collect()
    }

    /// Add an interval.
    ///
    /// # Errors
    ///
    /// - [`HotelError::BookingConflict`] if the interval blocks and overlaps an
    ///   existing blocking interval
    /// - [`HotelError::Internal`] if the reservation already has an interval
    ///   or the interval belongs to another room
    pub fn insert(&mut self, interval: AvailabilityInterval) -> Result<(), HotelError> {
        if interval.room_id != self.room_id {
            return Err(HotelError::Internal(format!(
                "Interval for room {} inserted into index of room {}",
                interval.room_id, self.room_id
            )));
        }
        if self.starts.contains_key(&interval.reservation_id) {
            return Err(HotelError::Internal(format!(
                "Reservation {} already holds an interval on room {}",
                interval.reservation_id, self.room_id
            )));
        }
        if interval.is_blocking() {
            if let Some(existing) = self.query_conflicts(&interval.stay).first() {
                return Err(HotelError::BookingConflict {
                    room_id: self.room_id,
                    conflicting: existing.reservation_id,
                });
            }
        }

        let start = interval.stay.check_in();
        self.starts.insert(interval.reservation_id, start);
        self.by_start.insert((start, interval.reservation_id), interval);
        Ok(())
    }

    /// Remove a reservation's interval entirely.
    pub fn remove(&mut self, reservation_id: ReservationId) -> Option<AvailabilityInterval> {
        let start = self.starts.remove(&reservation_id)?;
        self.by_start.remove(&(start, reservation_id))
    }

    /// Change the status recorded for a reservation's interval.
    ///
    /// # Errors
    ///
    /// - [`HotelError::Internal`] if the reservation has no interval here
    /// - [`HotelError::BookingConflict`] if a non-blocking interval would
    ///   start blocking over an occupied night
    pub fn update_status(
        &mut self,
        reservation_id: ReservationId,
        status: ReservationStatus,
    ) -> Result<(), HotelError> {
        let Some(start) = self.starts.get(&reservation_id).copied() else {
            return Err(HotelError::Internal(format!(
                "Reservation {reservation_id} has no interval on room {}",
                self.room_id
            )));
        };

        let reactivating = self
            .by_start
            .get(&(start, reservation_id))
            .is_some_and(|interval| !interval.is_blocking() && status.blocks_room());
        if reactivating {
            let stay = self.by_start[&(start, reservation_id)].stay;
            if let Some(existing) = self.query_conflicts(&stay).first() {
                return Err(HotelError::BookingConflict {
                    room_id: self.room_id,
                    conflicting: existing.reservation_id,
                });
            }
        }

        if let Some(interval) = self.by_start.get_mut(&(start, reservation_id)) {
            interval.status = status;
        }
        Ok(())
    }

    /// The interval held by a reservation
    #[must_use]
    pub fn get(&self, reservation_id: ReservationId) -> Option<&AvailabilityInterval> {
        let start = self.starts.get(&reservation_id)?;
        self.by_start.get(&(*start, reservation_id))
    }

    /// Blocking intervals, ordered by start date
    pub fn active_intervals(&self) -> impl Iterator<Item = &AvailabilityInterval> {
        self.by_start.values().filter(|interval| interval.is_blocking())
    }

    /// All intervals including released ones, ordered by start date
    pub fn intervals(&self) -> impl Iterator<Item = &AvailabilityInterval> {
        self.by_start.values()
    }

    /// Whether the night of `date` is free
    #[must_use]
    pub fn is_free_on(&self, date: NaiveDate) -> bool {
        !self.active_intervals().any(|interval| interval.stay.contains(date))
    }

    /// Number of intervals, including released ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    /// Whether no interval was ever recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    /// Full scan: blocking intervals are pairwise non-overlapping.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut latest_end: Option<NaiveDate> = None;
        for interval in self.active_intervals() {
            if latest_end.is_some_and(|end| interval.stay.check_in() < end) {
                return false;
            }
            latest_end = Some(latest_end.map_or(interval.stay.check_out(), |end| {
                end.max(interval.stay.check_out())
            }));
        }
        self.starts.len() == self.by_start.len()
    }
}
