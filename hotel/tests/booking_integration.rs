//! Integration tests for the booking path
//!
//! Drives the assembled service through its booking coordinator: concurrent
//! reservations of one room, the full lifecycle across days, and commits
//! failing underneath.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hotel::aggregates::RoomLedger;
use hotel::api::retry_unavailable;
use hotel::state::keys;
use hotel::{
    Config, Guest, HotelApp, HotelError, HotelId, Money, NewHotel, NewRoom, ReservationId,
    ReservationRequest, ReservationStatus, RoomId, StayDates,
};
use hotel_ops_core::environment::Clock;
use hotel_ops_core::state_store::{ActualRevision, Expect, StateStore, StateStoreError};
use hotel_ops_runtime::RetryPolicy;
use hotel_ops_testing::{FlakyStateStore, ManualClock, init_test_tracing};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

/// `n` days after the fixture's first day
fn day(n: i64) -> NaiveDate {
    start().date_naive() + Duration::days(n)
}

fn config() -> Config {
    let mut config = Config::default();
    config.booking.commit_retry_delay_ms = 1;
    config
}

struct Fixture {
    app: HotelApp,
    store: Arc<dyn StateStore>,
    clock: Arc<ManualClock>,
    hotel_id: HotelId,
    room_id: RoomId,
}

async fn fixture_on(store: Arc<dyn StateStore>) -> Fixture {
    init_test_tracing();
    let clock = Arc::new(ManualClock::new(start()));
    let app = HotelApp::new(config(), Arc::clone(&store), clock.clone());

    let hotel_id = app
        .catalog()
        .create_hotel(NewHotel {
            name: "深圳凯悦酒店".to_string(),
            address: "深圳市福田区".to_string(),
            phone: "0755-88888888".to_string(),
            star_rating: 4,
        })
        .await
        .unwrap();
    let room_id = app.booking().add_room(hotel_id, standard_room("101")).await.unwrap();

    Fixture { app, store, clock, hotel_id, room_id }
}

async fn fixture() -> Fixture {
    fixture_on(Arc::new(hotel_ops_runtime::InMemoryStateStore::new())).await
}

fn standard_room(number: &str) -> NewRoom {
    NewRoom {
        number: number.to_string(),
        room_type: "标准间".to_string(),
        price: Money::from_cents(29_900),
    }
}

fn request(hotel_id: HotelId, room_id: RoomId, from: i64, to: i64) -> ReservationRequest {
    ReservationRequest {
        hotel_id,
        room_id,
        guest: Guest::new("张三", "13800138000").unwrap(),
        stay: StayDates::new(day(from), day(to)).unwrap(),
        total_amount: Money::from_cents(59_800),
    }
}

async fn ledger(store: &dyn StateStore, hotel_id: HotelId, room_id: RoomId) -> RoomLedger {
    store.get(&keys::ledger(hotel_id, room_id)).await.unwrap().unwrap().decode().unwrap()
}

fn conflict(hotel_id: HotelId, room_id: RoomId) -> StateStoreError {
    StateStoreError::Conflict {
        key: keys::ledger(hotel_id, room_id),
        expected: Expect::Absent,
        actual: ActualRevision(None),
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_requests_admit_at_most_one() {
    let f = fixture().await;

    let attempts: Vec<_> = (0..16)
        .map(|i| {
            let booking = f.app.booking().clone();
            // Every stay covers night 5.
            let req = request(f.hotel_id, f.room_id, 1 + i % 5, 6 + i % 3);
            tokio::spawn(async move { booking.create_reservation(req).await })
        })
        .collect();

    let mut admitted = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(HotelError::BookingConflict { room_id, .. }) => assert_eq!(room_id, f.room_id),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted, 1);
    let ledger = ledger(f.store.as_ref(), f.hotel_id, f.room_id).await;
    assert!(ledger.is_consistent());
    assert_eq!(ledger.index.active_intervals().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_rooms_book_in_parallel() {
    let f = fixture().await;
    let mut rooms = vec![f.room_id];
    for number in ["102", "103", "104"] {
        rooms.push(f.app.booking().add_room(f.hotel_id, standard_room(number)).await.unwrap());
    }

    let attempts: Vec<_> = rooms
        .iter()
        .map(|&room_id| {
            let booking = f.app.booking().clone();
            let req = request(f.hotel_id, room_id, 1, 3);
            tokio::spawn(async move { booking.create_reservation(req).await })
        })
        .collect();

    for attempt in attempts {
        assert!(attempt.await.unwrap().is_ok());
    }
    let stats = f.app.catalog().statistics().await.unwrap();
    assert_eq!(stats.total_rooms, 4);
    assert_eq!(stats.total_reservations, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_guests_racing_for_room_101() {
    let f = fixture().await;
    let booking_a = f.app.booking().clone();
    let booking_b = f.app.booking().clone();
    let a = request(f.hotel_id, f.room_id, 1, 3);
    let b = request(f.hotel_id, f.room_id, 2, 4);

    let (a, b) = tokio::join!(
        tokio::spawn(async move { booking_a.create_reservation(a).await }),
        tokio::spawn(async move { booking_b.create_reservation(b).await }),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let winners: Vec<ReservationId> = outcomes.iter().filter_map(|o| o.as_ref().ok().copied()).collect();
    assert_eq!(winners.len(), 1);
    assert!(outcomes.iter().any(|o| matches!(o, Err(HotelError::BookingConflict { .. }))));

    let reservation = f.app.catalog().get_reservation(winners[0]).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    let intervals = f.app.catalog().get_room_availability(f.hotel_id, f.room_id).await.unwrap();
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].reservation_id, winners[0]);
}

#[tokio::test]
async fn cancelling_frees_the_dates() {
    let f = fixture().await;
    let booking = f.app.booking();

    let first = booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await.unwrap();
    assert!(matches!(
        booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await,
        Err(HotelError::BookingConflict { conflicting, .. }) if conflicting == first
    ));

    assert_eq!(booking.cancel_reservation(first).await, Ok(ReservationStatus::Cancelled));
    let second = booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await.unwrap();
    assert_ne!(first, second);

    let ledger = ledger(f.store.as_ref(), f.hotel_id, f.room_id).await;
    assert!(ledger.is_consistent());
    assert_eq!(ledger.reservations.len(), 2);
}

#[tokio::test]
async fn back_to_back_stays_do_not_conflict() {
    let f = fixture().await;
    let booking = f.app.booking();
    booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await.unwrap();
    booking.create_reservation(request(f.hotel_id, f.room_id, 3, 5)).await.unwrap();
    booking.create_reservation(request(f.hotel_id, f.room_id, 0, 1)).await.unwrap();
}

#[tokio::test]
async fn confirming_twice_publishes_once() {
    let f = fixture().await;
    let booking = f.app.booking();
    let id = booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await.unwrap();

    assert_eq!(booking.confirm_reservation(id).await, Ok(ReservationStatus::Confirmed));
    assert_eq!(booking.confirm_reservation(id).await, Ok(ReservationStatus::Confirmed));

    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while f.app.audit().history(id).len() < 2 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    let names: Vec<_> = f.app.audit().history(id).iter().map(|event| event.name()).collect();
    assert_eq!(names, ["created", "confirmed"]);
}

// ============================================================================
// Validation before the lane
// ============================================================================

#[tokio::test]
async fn unknown_hotel_room_or_reservation_is_a_validation_error() {
    let f = fixture().await;
    let booking = f.app.booking();
    let submitted = booking.coordinator().stats().submitted;

    let result = booking.create_reservation(request(HotelId::new(99), f.room_id, 1, 2)).await;
    assert_eq!(result, Err(HotelError::Validation("Hotel 99 not found".to_string())));

    let result = booking.create_reservation(request(f.hotel_id, RoomId::new(99), 1, 2)).await;
    assert!(matches!(result, Err(HotelError::Validation(_))));

    let result = booking.confirm_reservation(ReservationId::new(404)).await;
    assert_eq!(result, Err(HotelError::Validation("Reservation 404 not found".to_string())));
    assert_eq!(booking.coordinator().stats().submitted, submitted);
}

#[tokio::test]
async fn past_check_in_is_rejected() {
    let f = fixture().await;
    f.clock.advance_days(5);
    let result = f.app.booking().create_reservation(request(f.hotel_id, f.room_id, 1, 7)).await;
    assert_eq!(result.unwrap_err().kind(), "ValidationError");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn full_lifecycle_follows_the_calendar() {
    let f = fixture().await;
    let booking = f.app.booking();
    let id = booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await.unwrap();

    // Pending cannot check in.
    assert!(matches!(
        booking.check_in_reservation(id).await,
        Err(HotelError::InvalidTransition { from: ReservationStatus::Pending, .. })
    ));
    booking.confirm_reservation(id).await.unwrap();

    // Too early.
    assert!(matches!(booking.check_in_reservation(id).await, Err(HotelError::InvalidTransition { .. })));

    f.clock.advance_days(1);
    assert_eq!(f.clock.today(), day(1));
    assert_eq!(booking.check_in_reservation(id).await, Ok(ReservationStatus::CheckedIn));
    assert!(matches!(booking.cancel_reservation(id).await, Err(HotelError::InvalidTransition { .. })));

    let rooms = f.app.catalog().get_hotel_rooms(f.hotel_id).await.unwrap();
    assert!(!rooms[0].is_available);

    // The stay runs until day 3.
    assert!(matches!(booking.complete_reservation(id).await, Err(HotelError::InvalidTransition { .. })));
    f.clock.advance_days(2);
    assert_eq!(booking.complete_reservation(id).await, Ok(ReservationStatus::Completed));
    assert!(matches!(booking.complete_reservation(id).await, Err(HotelError::InvalidTransition { .. })));

    let reservation = f.app.catalog().get_reservation(id).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Completed);
    assert_eq!(reservation.updated_at, start() + Duration::days(3));
    assert!(f.app.catalog().get_room_availability(f.hotel_id, f.room_id).await.unwrap().is_empty());
}

// ============================================================================
// Failure Injection
// ============================================================================

#[tokio::test]
async fn persistent_contention_surfaces_as_unavailable_with_nothing_applied() {
    let store = Arc::new(FlakyStateStore::in_memory());
    let f = fixture_on(store.clone()).await;

    // One initial attempt plus three retries.
    store.fail_next_commits(4, conflict(f.hotel_id, f.room_id));
    let before = store.commit_attempts();
    let result = f.app.booking().create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await;

    assert!(matches!(result, Err(HotelError::Unavailable(_))));
    assert_eq!(store.commit_attempts() - before, 4);
    assert!(store.get(&keys::ledger(f.hotel_id, f.room_id)).await.unwrap().is_none());
    assert_eq!(f.app.catalog().statistics().await.unwrap().total_reservations, 0);
}

#[tokio::test]
async fn transient_contention_is_absorbed() {
    let store = Arc::new(FlakyStateStore::in_memory());
    let f = fixture_on(store.clone()).await;

    store.fail_next_commits(2, conflict(f.hotel_id, f.room_id));
    let id = f.app.booking().create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await.unwrap();

    let reservation = f.app.catalog().get_reservation(id).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert!(ledger(f.store.as_ref(), f.hotel_id, f.room_id).await.is_consistent());
}

#[tokio::test]
async fn unreachable_store_is_retried_by_the_client() {
    let store = Arc::new(FlakyStateStore::in_memory());
    let f = fixture_on(store.clone()).await;

    store.fail_next_commits(1, StateStoreError::Unavailable("leader election".into()));
    let booking = f.app.booking();
    let first = booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await;
    assert!(matches!(first, Err(HotelError::Unavailable(_))));

    store.fail_next_commits(1, StateStoreError::Unavailable("leader election".into()));
    let policy = RetryPolicy::builder().max_retries(2).initial_delay(std::time::Duration::from_millis(1)).build();
    let id = retry_unavailable(policy, || booking.create_reservation(request(f.hotel_id, f.room_id, 1, 3)))
        .await
        .unwrap();
    assert_eq!(f.app.catalog().get_reservation(id).await.unwrap().status, ReservationStatus::Pending);
}

#[tokio::test]
async fn shutdown_rejects_new_work() {
    let f = fixture().await;
    f.app.shutdown().await.unwrap();

    let result = f.app.booking().create_reservation(request(f.hotel_id, f.room_id, 1, 3)).await;
    assert!(matches!(result, Err(HotelError::Unavailable(_))));
    assert!(f.app.health().await.status.is_unhealthy());
}

// ============================================================================
// Property: blocking intervals never overlap
// ============================================================================

#[derive(Clone, Debug)]
enum Op {
    Create { room: usize, from: i64, nights: i64 },
    Confirm(usize),
    Cancel(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..2_usize, 0..20_i64, 1..5_i64).prop_map(|(room, from, nights)| Op::Create { room, from, nights }),
        1 => any::<usize>().prop_map(Op::Confirm),
        1 => any::<usize>().prop_map(Op::Cancel),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn blocking_intervals_never_overlap(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let f = fixture().await;
            let booking = f.app.booking();
            let second_room = booking.add_room(f.hotel_id, standard_room("102")).await.unwrap();
            let rooms = [f.room_id, second_room];
            let mut created: Vec<ReservationId> = Vec::new();

            for op in ops {
                match op {
                    Op::Create { room, from, nights } => {
                        let req = request(f.hotel_id, rooms[room], from, from + nights);
                        match booking.create_reservation(req).await {
                            Ok(id) => created.push(id),
                            Err(error) => assert_eq!(error.kind(), "BookingConflict"),
                        }
                    },
                    Op::Confirm(pick) if !created.is_empty() => {
                        let _ = booking.confirm_reservation(created[pick % created.len()]).await;
                    },
                    Op::Cancel(pick) if !created.is_empty() => {
                        let _ = booking.cancel_reservation(created[pick % created.len()]).await;
                    },
                    Op::Confirm(_) | Op::Cancel(_) => {},
                }
            }

            for room_id in rooms {
                let Some(entry) = f.store.get(&keys::ledger(f.hotel_id, room_id)).await.unwrap() else {
                    continue;
                };
                let ledger: RoomLedger = entry.decode().unwrap();
                assert!(ledger.is_consistent());

                let blocking: Vec<_> = ledger.reservations.values().filter(|r| r.status.blocks_room()).collect();
                for (i, a) in blocking.iter().enumerate() {
                    for b in &blocking[i + 1..] {
                        assert!(!a.stay.overlaps(&b.stay), "{} overlaps {}", a.id, b.id);
                    }
                }
            }
        });
    }
}
