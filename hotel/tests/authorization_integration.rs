//! Integration tests for request authorization
//!
//! Every request passes the permission resolver before validation and
//! before any coordinator queue; these tests check both the decisions and
//! that rejected requests leave the coordinator untouched.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use hotel::api::{AddRoomRequest, CreateReservationRequest, PermissionCheckResponse};
use hotel::{
    Action, Config, HotelApp, HotelError, HotelId, NewHotel, Permission, RequestContext,
    ResourceType, RoleDefinition, RoleName, UserId,
};
use hotel_ops_core::environment::Clock;
use hotel_ops_runtime::InMemoryStateStore;
use hotel_ops_testing::{init_test_tracing, midnight_epoch_seconds, test_clock};
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

const HOTEL_READ: Permission = Permission::new(ResourceType::Hotel, Action::Read);

async fn app() -> HotelApp {
    init_test_tracing();
    let app = HotelApp::new(Config::default(), Arc::new(InMemoryStateStore::new()), Arc::new(test_clock()));
    app.roles().seed_default_roles().await.unwrap();
    for (user, role) in [("root", "admin"), ("hotelmanager", "manager"), ("frontdesk", "receptionist"), ("visitor", "guest")] {
        app.roles().assign_role(&UserId::from(user), &RoleName::from(role)).await.unwrap();
    }
    app
}

fn as_user(user: &str) -> RequestContext {
    RequestContext::new(user)
}

fn new_hotel() -> NewHotel {
    NewHotel {
        name: "北京饭店".to_string(),
        address: "北京市东城区东长安街33号".to_string(),
        phone: "010-65137766".to_string(),
        star_rating: 5,
    }
}

fn reservation(hotel_id: HotelId, room_id: u64) -> CreateReservationRequest {
    let today = test_clock().today();
    CreateReservationRequest {
        hotel_id: hotel_id.value(),
        room_id,
        guest_name: "李四".to_string(),
        guest_phone: "13900139000".to_string(),
        check_in: midnight_epoch_seconds(today + chrono::Duration::days(1)),
        check_out: midnight_epoch_seconds(today + chrono::Duration::days(3)),
        total_amount: 598.0,
    }
}

// ============================================================================
// Decisions
// ============================================================================

#[tokio::test]
async fn role_with_hotel_read_only() {
    let app = app().await;
    let dispatcher = app.dispatcher();
    let admin = as_user("root");
    let alice = UserId::from("alice");
    let viewer = RoleName::from("viewer");

    dispatcher.define_role(&admin, RoleDefinition::new("viewer", [HOTEL_READ])).await.unwrap();
    dispatcher.assign_role(&admin, &alice, &viewer).await.unwrap();

    let read = dispatcher.check_permission(&alice, "Hotel", "Read").await.unwrap();
    assert!(read.granted);
    assert_eq!(read.reason, "Granted by role viewer");

    let delete = dispatcher.check_permission(&alice, "hotel", "delete").await.unwrap();
    assert!(!delete.granted);
    assert_eq!(delete.reason, "Missing permission Hotel:Delete (roles: viewer)");
}

#[tokio::test]
async fn unknown_users_hold_nothing() {
    let app = app().await;
    let response = PermissionCheckResponse::from(
        app.dispatcher().check_permission(&UserId::from("mallory"), "Hotel", "Read").await,
    );
    assert!(!response.has_permission);
    assert_eq!(response.reason, "User mallory not found");
}

#[tokio::test]
async fn malformed_permission_names_are_rejected() {
    let app = app().await;
    let result = app.dispatcher().check_permission(&UserId::from("root"), "Spaceship", "Read").await;
    assert!(matches!(result, Err(HotelError::Validation(_))));
}

#[tokio::test]
async fn role_changes_apply_to_the_next_request() {
    let app = app().await;
    let dispatcher = app.dispatcher();
    let admin = as_user("root");
    let guest_role = RoleName::from("guest");
    let visitor = as_user("visitor");

    assert!(dispatcher.get_all_hotels(&visitor).await.is_ok());
    dispatcher.revoke(&admin, &guest_role, HOTEL_READ).await.unwrap();
    assert!(matches!(
        dispatcher.get_all_hotels(&visitor).await,
        Err(HotelError::PermissionDenied { permission, .. }) if permission == HOTEL_READ
    ));
    dispatcher.grant(&admin, &guest_role, HOTEL_READ).await.unwrap();
    assert!(dispatcher.get_all_hotels(&visitor).await.is_ok());
}

#[tokio::test]
async fn only_role_managers_administer_roles() {
    let app = app().await;
    let dispatcher = app.dispatcher();
    let result = dispatcher
        .assign_role(&as_user("hotelmanager"), &UserId::from("hotelmanager"), &RoleName::from("admin"))
        .await;
    assert!(matches!(result, Err(HotelError::PermissionDenied { .. })));

    dispatcher
        .unassign_role(&as_user("root"), &UserId::from("hotelmanager"), &RoleName::from("manager"))
        .await
        .unwrap();
    let result = dispatcher.create_hotel(&as_user("hotelmanager"), new_hotel()).await;
    assert!(matches!(result, Err(HotelError::PermissionDenied { .. })));
}

// ============================================================================
// Denied requests never reach a queue
// ============================================================================

#[tokio::test]
async fn denied_and_invalid_requests_are_not_queued() {
    let app = app().await;
    let dispatcher = app.dispatcher();
    let manager = as_user("hotelmanager");

    let hotel_id = dispatcher.create_hotel(&manager, new_hotel()).await.unwrap();
    let room = AddRoomRequest { room_number: "101".to_string(), room_type: "标准间".to_string(), price: 299.0 };
    let room_id = dispatcher.add_room(&manager, hotel_id, room.clone()).await.unwrap();
    let reservation_id = dispatcher
        .create_reservation(&as_user("frontdesk"), reservation(hotel_id, room_id.value()))
        .await
        .unwrap();

    let coordinator = app.booking().coordinator();
    let submitted = coordinator.stats().submitted;

    // No role at all.
    let result = dispatcher.create_reservation(&as_user("nobody"), reservation(hotel_id, room_id.value())).await;
    assert!(matches!(result, Err(HotelError::PermissionDenied { .. })));

    // Guests can book but not confirm, and cannot add rooms.
    let result = dispatcher.confirm_reservation(&as_user("visitor"), reservation_id).await;
    assert!(matches!(result, Err(HotelError::PermissionDenied { .. })));
    let result = dispatcher.add_room(&as_user("visitor"), hotel_id, room.clone()).await;
    assert!(matches!(result, Err(HotelError::PermissionDenied { .. })));

    // Authorized but malformed.
    let mut reversed = reservation(hotel_id, room_id.value());
    std::mem::swap(&mut reversed.check_in, &mut reversed.check_out);
    let result = dispatcher.create_reservation(&as_user("frontdesk"), reversed).await;
    assert!(matches!(result, Err(HotelError::Validation(_))));

    let blank_number = AddRoomRequest { room_number: "  ".to_string(), ..room.clone() };
    let result = dispatcher.add_room(&manager, hotel_id, blank_number).await;
    assert_eq!(result, Err(HotelError::Validation("Room number is required".to_string())));
    let blank_type = AddRoomRequest { room_type: String::new(), ..room.clone() };
    let result = dispatcher.add_room(&manager, hotel_id, blank_type).await;
    assert_eq!(result, Err(HotelError::Validation("Room type is required".to_string())));
    let result = dispatcher.add_room(&manager, HotelId::new(999), room).await;
    assert_eq!(result, Err(HotelError::Validation("Hotel 999 not found".to_string())));

    // Unknown hotel or room.
    let frontdesk = as_user("frontdesk");
    let result = dispatcher.create_reservation(&frontdesk, reservation(HotelId::new(999), room_id.value())).await;
    assert_eq!(result, Err(HotelError::Validation("Hotel 999 not found".to_string())));
    let result = dispatcher.create_reservation(&frontdesk, reservation(hotel_id, 999)).await;
    assert!(matches!(result, Err(HotelError::Validation(_))));

    assert_eq!(coordinator.stats().submitted, submitted);

    // An allowed request does go through the lane.
    dispatcher.confirm_reservation(&as_user("frontdesk"), reservation_id).await.unwrap();
    assert_eq!(coordinator.stats().submitted, submitted + 1);
}

#[tokio::test]
async fn read_paths_require_read_permissions() {
    let app = app().await;
    let dispatcher = app.dispatcher();
    let manager = as_user("hotelmanager");
    let hotel_id = dispatcher.create_hotel(&manager, new_hotel()).await.unwrap();

    let found = dispatcher.search_hotels(&as_user("visitor"), "北京").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(dispatcher.get_hotel(&as_user("visitor"), hotel_id).await.unwrap().star_rating.value(), 5);
    assert!(dispatcher.get_hotel_rooms(&as_user("visitor"), hotel_id).await.unwrap().is_empty());

    let stats = dispatcher.statistics(&as_user("frontdesk")).await.unwrap();
    assert_eq!(stats.total_hotels, 1);

    assert!(matches!(
        dispatcher.statistics(&as_user("nobody")).await,
        Err(HotelError::PermissionDenied { .. })
    ));
    assert!(matches!(
        dispatcher.get_reservation(&as_user("visitor"), hotel::ReservationId::new(1)).await,
        Err(HotelError::PermissionDenied { .. })
    ));
}
