//! Hotel service demo
//!
//! Replays a typical client session against an in-memory node:
//!
//! 1. bootstrap roles and users
//! 2. check a permission, list and search hotels, read statistics
//! 3. create a hotel, add a room, reserve it and confirm the reservation
//!
//! Every later call uses the ids returned by earlier ones. Each response is
//! printed as JSON.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=hotel=debug cargo run --bin hotel-demo
//! ```

use chrono::Duration;
use hotel::api::{
    AddRoomRequest, AddRoomResponse, CreateHotelResponse, CreateReservationRequest,
    CreateReservationResponse, PermissionCheckResponse, StatusResponse, retry_unavailable,
};
use hotel::{Config, HotelApp, NewHotel, RequestContext, RoleName, UserId};
use hotel_ops_core::environment::{Clock, SystemClock};
use hotel_ops_runtime::RetryPolicy;
use hotel_ops_runtime::metrics::MetricsServer;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print<T: Serialize>(label: &str, value: &T) -> anyhow::Result<()> {
    println!("{label}:\n{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn midnight(date: chrono::NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = config.server.metrics_addr.map(MetricsServer::new);
    if let Some(server) = metrics.as_mut() {
        server.start()?;
    }

    let app = HotelApp::in_memory(config);
    let dispatcher = app.dispatcher();

    // Bootstrap
    app.roles().seed_default_roles().await?;
    let admin = UserId::from("admin");
    let manager = UserId::from("hotelmanager");
    app.roles().assign_role(&admin, &RoleName::from("admin")).await?;
    app.roles().assign_role(&manager, &RoleName::from("manager")).await?;
    let ctx = RequestContext::new(manager.clone());

    // Reads
    let decision = dispatcher.check_permission(&manager, "Hotel", "Read").await;
    print("CheckPermission", &PermissionCheckResponse::from(decision))?;
    print("GetAllHotels", &dispatcher.get_all_hotels(&ctx).await?)?;
    print("SearchHotels(北京)", &dispatcher.search_hotels(&ctx, "北京").await?)?;
    print("GetHotelStatistics", &dispatcher.statistics(&ctx).await?)?;

    // Hotel and room
    let hotel = dispatcher
        .create_hotel(
            &RequestContext::new(admin),
            NewHotel {
                name: "深圳凯悦酒店".to_string(),
                address: "深圳市福田区".to_string(),
                phone: "0755-88888888".to_string(),
                star_rating: 4,
            },
        )
        .await;
    print("CreateHotel", &CreateHotelResponse::from(hotel.clone()))?;
    let hotel_id = hotel?;

    let room = dispatcher
        .add_room(
            &ctx,
            hotel_id,
            AddRoomRequest {
                room_number: "101".to_string(),
                room_type: "标准间".to_string(),
                price: 299.00,
            },
        )
        .await;
    print("AddRoom", &AddRoomResponse::from(room.clone()))?;
    let room_id = room?;

    // Reservation: tomorrow for two nights
    let today = SystemClock.today();
    let request = CreateReservationRequest {
        hotel_id: hotel_id.value(),
        room_id: room_id.value(),
        guest_name: "张三".to_string(),
        guest_phone: "13800138000".to_string(),
        check_in: midnight(today + Duration::days(1)),
        check_out: midnight(today + Duration::days(3)),
        total_amount: 598.00,
    };
    let created = retry_unavailable(RetryPolicy::default(), || {
        dispatcher.create_reservation(&ctx, request.clone())
    })
    .await;
    print("CreateReservation", &CreateReservationResponse::from(created.clone()))?;
    let reservation_id = created?;

    let confirmed = dispatcher.confirm_reservation(&ctx, reservation_id).await;
    print("ConfirmReservation", &StatusResponse::from(confirmed))?;

    print("GetHotelRooms", &dispatcher.get_hotel_rooms(&ctx, hotel_id).await?)?;
    print("GetHotelStatistics", &dispatcher.statistics(&ctx).await?)?;

    let health = app.health().await;
    tracing::info!(status = %health.status, "Demo finished");

    app.shutdown().await?;
    if let Some(rendered) = metrics.as_ref().and_then(MetricsServer::render) {
        println!("{rendered}");
    }
    Ok(())
}
