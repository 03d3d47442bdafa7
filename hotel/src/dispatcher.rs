//! Request dispatcher: the front door of the hotel service.
//!
//! Every request is handled in the same order:
//!
//! 1. resolve the acting principal's permission for the operation
//! 2. validate the request
//! 3. hand it to the booking coordinator (mutations) or the catalog (reads)
//!
//! A request that fails step 1 or 2 never reaches a coordinator queue.

use crate::api::{AddRoomRequest, CreateReservationRequest};
use crate::authz::{
    Action, Decision, Permission, PermissionResolver, ResourceType, RoleAdmin, RoleDefinition,
};
use crate::booking::BookingCoordinator;
use crate::catalog::{HotelCatalog, HotelStatistics};
use crate::error::HotelError;
use crate::types::{
    AvailabilityInterval, Hotel, HotelId, NewHotel, Reservation, ReservationId, ReservationStatus,
    RoleName, RoomId, RoomView, UserId,
};

const HOTEL_READ: Permission = Permission::new(ResourceType::Hotel, Action::Read);
const HOTEL_CREATE: Permission = Permission::new(ResourceType::Hotel, Action::Create);
const ROOM_READ: Permission = Permission::new(ResourceType::Room, Action::Read);
const ROOM_CREATE: Permission = Permission::new(ResourceType::Room, Action::Create);
const RESERVATION_READ: Permission = Permission::new(ResourceType::Reservation, Action::Read);
const RESERVATION_CREATE: Permission = Permission::new(ResourceType::Reservation, Action::Create);
const RESERVATION_UPDATE: Permission = Permission::new(ResourceType::Reservation, Action::Update);
const ROLE_MANAGE: Permission = Permission::new(ResourceType::Role, Action::Manage);

/// Who is making a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Acting principal
    pub user_id: UserId,
}

impl RequestContext {
    /// Context for `user_id`
    #[must_use]
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// Authorizes, validates and routes every request
#[derive(Clone)]
pub struct Dispatcher {
    resolver: PermissionResolver,
    roles: RoleAdmin,
    booking: BookingCoordinator,
    catalog: HotelCatalog,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`
    #[must_use]
    pub const fn new(
        resolver: PermissionResolver,
        roles: RoleAdmin,
        booking: BookingCoordinator,
        catalog: HotelCatalog,
    ) -> Self {
        Self { resolver, roles, booking, catalog }
    }

    async fn authorize(&self, ctx: &RequestContext, permission: Permission) -> Result<(), HotelError> {
        self.resolver.check(&ctx.user_id, permission).await?.into_result()
    }

    // ------------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------------

    /// `CreateReservation`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Reservation:Create`, otherwise as
    /// [`BookingCoordinator::create_reservation`].
    #[tracing::instrument(skip(self, request), fields(user = %ctx.user_id, hotel_id = request.hotel_id, room_id = request.room_id))]
    pub async fn create_reservation(
        &self,
        ctx: &RequestContext,
        request: CreateReservationRequest,
    ) -> Result<ReservationId, HotelError> {
        self.authorize(ctx, RESERVATION_CREATE).await?;
        let request = request.validate()?;
        self.booking.create_reservation(request).await
    }

    /// `ConfirmReservation`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Reservation:Update`, otherwise as
    /// [`BookingCoordinator::confirm_reservation`].
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn confirm_reservation(
        &self,
        ctx: &RequestContext,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.authorize(ctx, RESERVATION_UPDATE).await?;
        self.booking.confirm_reservation(reservation_id).await
    }

    /// `CancelReservation`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Reservation:Update`, otherwise as
    /// [`BookingCoordinator::cancel_reservation`].
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn cancel_reservation(
        &self,
        ctx: &RequestContext,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.authorize(ctx, RESERVATION_UPDATE).await?;
        self.booking.cancel_reservation(reservation_id).await
    }

    /// `CheckInReservation`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Reservation:Update`, otherwise as
    /// [`BookingCoordinator::check_in_reservation`].
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn check_in_reservation(
        &self,
        ctx: &RequestContext,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.authorize(ctx, RESERVATION_UPDATE).await?;
        self.booking.check_in_reservation(reservation_id).await
    }

    /// `CompleteReservation`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Reservation:Update`, otherwise as
    /// [`BookingCoordinator::complete_reservation`].
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn complete_reservation(
        &self,
        ctx: &RequestContext,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, HotelError> {
        self.authorize(ctx, RESERVATION_UPDATE).await?;
        self.booking.complete_reservation(reservation_id).await
    }

    /// `GetReservation`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Reservation:Read`; `ValidationError` for
    /// an unknown reservation.
    pub async fn get_reservation(
        &self,
        ctx: &RequestContext,
        reservation_id: ReservationId,
    ) -> Result<Reservation, HotelError> {
        self.authorize(ctx, RESERVATION_READ).await?;
        self.catalog.get_reservation(reservation_id).await
    }

    // ------------------------------------------------------------------------
    // Hotels and rooms
    // ------------------------------------------------------------------------

    /// `CreateHotel`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Hotel:Create`; `ValidationError` for bad input.
    #[tracing::instrument(skip(self, hotel), fields(user = %ctx.user_id, name = %hotel.name))]
    pub async fn create_hotel(&self, ctx: &RequestContext, hotel: NewHotel) -> Result<HotelId, HotelError> {
        self.authorize(ctx, HOTEL_CREATE).await?;
        self.catalog.create_hotel(hotel).await
    }

    /// `AddRoom`, serialized on the hotel's key
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Room:Create`; `ValidationError` for bad
    /// input, an unknown hotel or a duplicate room number.
    #[tracing::instrument(skip(self, request), fields(user = %ctx.user_id, number = %request.room_number))]
    pub async fn add_room(
        &self,
        ctx: &RequestContext,
        hotel_id: HotelId,
        request: AddRoomRequest,
    ) -> Result<RoomId, HotelError> {
        self.authorize(ctx, ROOM_CREATE).await?;
        let room = request.validate()?;
        self.booking.add_room(hotel_id, room).await
    }

    /// `GetAllHotels`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Hotel:Read`.
    pub async fn get_all_hotels(&self, ctx: &RequestContext) -> Result<Vec<Hotel>, HotelError> {
        self.authorize(ctx, HOTEL_READ).await?;
        self.catalog.get_all_hotels().await
    }

    /// `GetHotel`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Hotel:Read`; `ValidationError` for an unknown hotel.
    pub async fn get_hotel(&self, ctx: &RequestContext, hotel_id: HotelId) -> Result<Hotel, HotelError> {
        self.authorize(ctx, HOTEL_READ).await?;
        self.catalog.get_hotel(hotel_id).await
    }

    /// `SearchHotels`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Hotel:Read`.
    pub async fn search_hotels(&self, ctx: &RequestContext, term: &str) -> Result<Vec<Hotel>, HotelError> {
        self.authorize(ctx, HOTEL_READ).await?;
        self.catalog.search_hotels(term).await
    }

    /// `GetHotelStatistics`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Hotel:Read`.
    pub async fn statistics(&self, ctx: &RequestContext) -> Result<HotelStatistics, HotelError> {
        self.authorize(ctx, HOTEL_READ).await?;
        self.catalog.statistics().await
    }

    /// `GetHotelRooms`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Room:Read`; `ValidationError` for an unknown hotel.
    pub async fn get_hotel_rooms(&self, ctx: &RequestContext, hotel_id: HotelId) -> Result<Vec<RoomView>, HotelError> {
        self.authorize(ctx, ROOM_READ).await?;
        self.catalog.get_hotel_rooms(hotel_id).await
    }

    /// `GetRoomAvailability`
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Room:Read`; `ValidationError` for an
    /// unknown hotel or room.
    pub async fn get_room_availability(
        &self,
        ctx: &RequestContext,
        hotel_id: HotelId,
        room_id: RoomId,
    ) -> Result<Vec<AvailabilityInterval>, HotelError> {
        self.authorize(ctx, ROOM_READ).await?;
        self.catalog.get_room_availability(hotel_id, room_id).await
    }

    // ------------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------------

    /// `CheckPermission`. Open to every caller; it only reports.
    ///
    /// # Errors
    ///
    /// `ValidationError` for an unknown resource type or action.
    pub async fn check_permission(
        &self,
        user_id: &UserId,
        resource: &str,
        action: &str,
    ) -> Result<Decision, HotelError> {
        let permission = Permission::new(resource.parse()?, action.parse()?);
        self.resolver.check(user_id, permission).await
    }

    /// Create or replace a role
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Role:Manage`.
    #[tracing::instrument(skip(self, role), fields(user = %ctx.user_id, role = %role.name))]
    pub async fn define_role(&self, ctx: &RequestContext, role: RoleDefinition) -> Result<(), HotelError> {
        self.authorize(ctx, ROLE_MANAGE).await?;
        self.roles.define_role(role).await
    }

    /// Grant a permission to a role
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Role:Manage`; `ValidationError` for an unknown role.
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn grant(&self, ctx: &RequestContext, role: &RoleName, permission: Permission) -> Result<(), HotelError> {
        self.authorize(ctx, ROLE_MANAGE).await?;
        self.roles.grant(role, permission).await
    }

    /// Revoke a permission from a role
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Role:Manage`; `ValidationError` for an unknown role.
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn revoke(&self, ctx: &RequestContext, role: &RoleName, permission: Permission) -> Result<(), HotelError> {
        self.authorize(ctx, ROLE_MANAGE).await?;
        self.roles.revoke(role, permission).await
    }

    /// Assign a role to a user
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Role:Manage`; `ValidationError` for an unknown role.
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn assign_role(&self, ctx: &RequestContext, target: &UserId, role: &RoleName) -> Result<(), HotelError> {
        self.authorize(ctx, ROLE_MANAGE).await?;
        self.roles.assign_role(target, role).await
    }

    /// Remove a role from a user
    ///
    /// # Errors
    ///
    /// `PermissionDenied` without `Role:Manage`.
    #[tracing::instrument(skip(self), fields(user = %ctx.user_id))]
    pub async fn unassign_role(&self, ctx: &RequestContext, target: &UserId, role: &RoleName) -> Result<(), HotelError> {
        self.authorize(ctx, ROLE_MANAGE).await?;
        self.roles.unassign_role(target, role).await
    }
}
