//! Shared setup for the backend-lib integration tests.
#![allow(dead_code)]

use backend_lib::{
    auth::JwtAuth,
    bookings::{Booking, BookingStatus, InMemoryBookingDirectory},
    config::Settings,
    storage::FlatFileLocationStore,
    ws_router::create_router,
    AppState,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SECRET: &str = "integration-secret";

pub type TestState = Arc<AppState<FlatFileLocationStore>>;

pub fn booking(id: &str, renter: &str, owner: &str) -> Booking {
    let now = Utc::now();
    Booking {
        id: id.to_string(),
        renter: renter.to_string(),
        owner: owner.to_string(),
        status: BookingStatus::Confirmed,
        pickup_date: now - ChronoDuration::hours(1),
        return_date: now + ChronoDuration::days(1),
    }
}

/// Issue a token the test state accepts
pub fn token_for(user_id: &str) -> String {
    JwtAuth::new(SECRET, Duration::from_secs(300))
        .issue(user_id)
        .unwrap()
}

/// State with B1 (renter-1/owner-1), B2 (renter-2/owner-2) and the
/// cancelled B3 (renter-3/owner-3)
pub fn setup_state() -> (TestState, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let mut settings = Settings::default();
    settings.storage.path = temp_dir.path().to_path_buf();
    settings.auth.jwt_secret = SECRET.to_string();

    let storage =
        FlatFileLocationStore::new(temp_dir.path(), settings.retention()).unwrap();
    let auth = Arc::new(JwtAuth::new(SECRET, settings.token_ttl()));
    let cancelled = Booking {
        status: BookingStatus::Cancelled,
        ..booking("B3", "renter-3", "owner-3")
    };
    let bookings = Arc::new(InMemoryBookingDirectory::with_bookings([
        booking("B1", "renter-1", "owner-1"),
        booking("B2", "renter-2", "owner-2"),
        cancelled,
    ]));

    let state = Arc::new(AppState::new(storage, auth, bookings, settings));
    (state, temp_dir)
}

/// Serve the router on an ephemeral port
pub async fn spawn_server(state: TestState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

/// Wait until the relay has `expected` members in a room
pub async fn wait_for_members(state: &TestState, booking_id: &str, expected: usize) {
    for _ in 0..100 {
        if state.relay.member_count(booking_id) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "room {booking_id} never reached {expected} members (has {})",
        state.relay.member_count(booking_id)
    );
}
