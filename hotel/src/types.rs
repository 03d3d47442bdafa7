//! Domain types for the hotel reservation engine.
//!
//! Value objects validate on construction, so anything holding a
//! [`StayDates`], [`Guest`] or [`StarRating`] can rely on its invariants.
//! Persisted state is trusted and deserialized without re-validation.

use crate::error::HotelError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw id
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// The raw id
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// Hotel identifier, allocated from the `hotel` sequence
    HotelId
);
numeric_id!(
    /// Room identifier, allocated from the `room` sequence (unique across hotels)
    RoomId
);
numeric_id!(
    /// Reservation identifier, allocated from the `reservation` sequence
    ///
    /// Ids are unique and increasing but may have gaps: an id drawn for a
    /// request that is then rejected is never reused.
    ReservationId
);

/// Identifier of an acting principal
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a user id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Name of a role
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Create a role name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Hotel classification, 1 to 5 stars
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StarRating(u8);

impl StarRating {
    /// Validate a star rating
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] outside `1..=5`.
    pub fn new(stars: u8) -> Result<Self, HotelError> {
        if (1..=5).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(HotelError::Validation(format!("Star rating must be between 1 and 5, got {stars}")))
        }
    }

    /// Number of stars
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Largest amount accepted from a floating-point major-unit value
    const MAX_MAJOR_UNITS: f64 = 1e12;

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from a major-unit amount such as `299.00`
    ///
    /// Rounds to the nearest cent. Returns `None` for negative, non-finite
    /// or absurdly large amounts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above the cast
    pub fn from_major_units(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 || amount > Self::MAX_MAJOR_UNITS {
            return None;
        }
        Some(Self((amount * 100.0).round() as u64))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Returns the amount in major units
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // amounts stay far below 2^52 cents
    pub fn to_major_units(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Stay Dates
// ============================================================================

const SECONDS_PER_DAY: i64 = 86_400;

/// A stay as the half-open range of nights `[check_in, check_out)`.
///
/// `check_out` is always strictly after `check_in`. Two stays overlap when
/// `a.check_in < b.check_out && b.check_in < a.check_out`; a stay ending on
/// the day another begins does not overlap it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayDates {
    /// Validate a stay.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] unless `check_out > check_in`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, HotelError> {
        if check_out <= check_in {
            return Err(HotelError::Validation(format!(
                "Check-out date {check_out} must be after check-in date {check_in}"
            )));
        }
        Ok(Self { check_in, check_out })
    }

    /// Build a stay from epoch seconds of UTC midnight, the wire format.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] if either timestamp is not exactly
    /// a UTC midnight or the range is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use hotel::types::StayDates;
    ///
    /// // 2025-01-01T00:00:00Z .. 2025-01-03T00:00:00Z
    /// let stay = StayDates::from_epoch_seconds(1_735_689_600, 1_735_862_400).unwrap();
    /// assert_eq!(stay.nights(), 2);
    ///
    /// assert!(StayDates::from_epoch_seconds(1_735_689_601, 1_735_862_400).is_err());
    /// ```
    pub fn from_epoch_seconds(check_in: i64, check_out: i64) -> Result<Self, HotelError> {
        Self::new(midnight_to_date(check_in, "check-in")?, midnight_to_date(check_out, "check-out")?)
    }

    /// First night of the stay
    #[must_use]
    pub const fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    /// Departure day (not a night of the stay)
    #[must_use]
    pub const fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Whether the two stays share at least one night
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Whether `date` is one of the stay's nights
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Both ends as epoch seconds of UTC midnight
    #[must_use]
    pub fn to_epoch_seconds(&self) -> (i64, i64) {
        (date_to_midnight(self.check_in), date_to_midnight(self.check_out))
    }
}

impl fmt::Display for StayDates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

fn midnight_to_date(seconds: i64, field: &str) -> Result<NaiveDate, HotelError> {
    if seconds.rem_euclid(SECONDS_PER_DAY) != 0 {
        return Err(HotelError::Validation(format!(
            "{field} timestamp {seconds} is not a UTC midnight"
        )));
    }
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|at| at.date_naive())
        .ok_or_else(|| HotelError::Validation(format!("{field} timestamp {seconds} is out of range")))
}

fn date_to_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Guest contact details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    /// Full name
    pub name: String,
    /// Contact phone number
    pub phone: String,
}

impl Guest {
    /// Validate guest details
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] if the name or phone is blank.
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Result<Self, HotelError> {
        let name = name.into().trim().to_string();
        let phone = phone.into().trim().to_string();
        if name.is_empty() {
            return Err(HotelError::Validation("Guest name is required".to_string()));
        }
        if phone.is_empty() {
            return Err(HotelError::Validation("Guest phone is required".to_string()));
        }
        Ok(Self { name, phone })
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A hotel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    /// Hotel id
    pub id: HotelId,
    /// Display name
    pub name: String,
    /// Street address
    pub address: String,
    /// Front desk phone
    pub phone: String,
    /// Classification
    pub star_rating: StarRating,
}

/// Input for creating a hotel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHotel {
    /// Display name
    pub name: String,
    /// Street address
    pub address: String,
    /// Front desk phone
    pub phone: String,
    /// Stars, validated to `1..=5`
    pub star_rating: u8,
}

/// A bookable room
///
/// Availability is not stored here; it is derived from the room's
/// availability index whenever it is read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id
    pub id: RoomId,
    /// Owning hotel
    pub hotel_id: HotelId,
    /// Room number, unique within the hotel
    pub number: String,
    /// Room type, e.g. "Standard"
    pub room_type: String,
    /// Nightly price
    pub price: Money,
}

/// Input for adding a room to a hotel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    /// Room number, unique within the hotel
    pub number: String,
    /// Room type
    pub room_type: String,
    /// Nightly price
    pub price: Money,
}

/// A room together with its derived availability for one day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    /// The room
    pub room: Room,
    /// Whether no blocking reservation covers the day
    pub is_available: bool,
}

/// Reservation lifecycle status
///
/// ```text
/// Pending ──confirm──► Confirmed ──check in──► CheckedIn ──complete──► Completed
///    │                     │
///    └──────cancel─────────┴──► Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Created, holding the room
    Pending,
    /// Confirmed, holding the room
    Confirmed,
    /// Guest is in the room
    CheckedIn,
    /// Stay finished
    Completed,
    /// Cancelled before check-in
    Cancelled,
}

impl ReservationStatus {
    /// Whether a reservation in this status occupies its dates
    #[must_use]
    pub const fn blocks_room(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::CheckedIn)
    }

    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::CheckedIn => "CheckedIn",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// A reservation of one room for one stay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation id
    pub id: ReservationId,
    /// Hotel of the reserved room
    pub hotel_id: HotelId,
    /// Reserved room
    pub room_id: RoomId,
    /// Guest details
    pub guest: Guest,
    /// Nights reserved
    pub stay: StayDates,
    /// Amount agreed at booking time
    pub total_amount: Money,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// When the reservation was created
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

/// One entry of a room's availability index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityInterval {
    /// Room the interval belongs to
    pub room_id: RoomId,
    /// Nights covered
    pub stay: StayDates,
    /// Reservation holding the interval
    pub reservation_id: ReservationId,
    /// Status of that reservation
    pub status: ReservationStatus,
}

impl AvailabilityInterval {
    /// Whether the interval currently occupies its nights
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.status.blocks_room()
    }
}
