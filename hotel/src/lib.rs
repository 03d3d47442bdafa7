//! # Hotel
//!
//! Hotel reservation consistency engine with per-request authorization.
//!
//! Three guarantees hold for every request:
//!
//! - two concurrent reservations of the same room never both succeed for
//!   overlapping nights
//! - each reservation moves through a fixed lifecycle
//!   (Pending → Confirmed → `CheckedIn` → Completed, or Cancelled)
//! - the acting principal's roles are checked before anything is queued
//!
//! ## Architecture
//!
//! ```text
//! request ─► Dispatcher ─► PermissionResolver ─► validate
//!                │
//!                ├─► BookingCoordinator ─► Coordinator lane (room / hotel key)
//!                │        └─► load ─► reducer ─► commit ─► publish
//!                └─► HotelCatalog (snapshot reads)
//! ```
//!
//! State lives in one versioned [`StateStore`](hotel_ops_core::state_store::StateStore).
//! Mutations of a room run one at a time on that room's lane and commit with
//! compare-and-set preconditions, so the store rejects any write based on a
//! stale read even if two nodes briefly believe they own the same room.
//!
//! ## Example
//!
//! ```ignore
//! use hotel::{Config, HotelApp, RequestContext};
//!
//! let app = HotelApp::in_memory(Config::default());
//! app.roles().seed_default_roles().await?;
//! let ctx = RequestContext::new("frontdesk");
//! let id = app.dispatcher().create_reservation(&ctx, request).await?;
//! app.dispatcher().confirm_reservation(&ctx, id).await?;
//! ```

pub mod aggregates;
pub mod api;
pub mod app;
pub mod audit;
pub mod authz;
pub mod availability;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod state;
pub mod types;

pub use aggregates::{HotelEvent, ReservationEvent};
pub use app::HotelApp;
pub use audit::AuditTrail;
pub use authz::{Action, Decision, Permission, PermissionResolver, ResourceType, RoleAdmin, RoleDefinition};
pub use availability::RoomAvailabilityIndex;
pub use booking::{BookingCoordinator, ReservationRequest};
pub use catalog::{HotelCatalog, HotelStatistics};
pub use config::{Config, ConfigError};
pub use dispatcher::{Dispatcher, RequestContext};
pub use error::HotelError;
pub use key::ResourceKey;
pub use types::{
    AvailabilityInterval, Guest, Hotel, HotelId, Money, NewHotel, NewRoom, Reservation, ReservationId,
    ReservationStatus, RoleName, Room, RoomId, RoomView, StarRating, StayDates, UserId,
};
