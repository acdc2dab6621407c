// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core of the `triptrack` location relay server.

pub mod auth;
pub mod bookings;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod relay;
pub mod storage;
pub mod validation;
pub mod websocket;
pub mod ws_router;

use crate::auth::AuthService;
use crate::bookings::BookingDirectory;
use crate::config::Settings;
use crate::relay::RoomRelay;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState<S> {
    /// Bearer token verification
    pub auth: Arc<dyn AuthService>,
    /// Booking records used by the access checks
    pub bookings: Arc<dyn BookingDirectory>,
    /// Booking rooms
    pub relay: Arc<RoomRelay>,
    /// Location store
    pub storage: S,
    pub settings: Arc<Settings>,
}

impl<S> AppState<S> {
    /// Create a new application state
    pub fn new(
        storage: S,
        auth: Arc<dyn AuthService>,
        bookings: Arc<dyn BookingDirectory>,
        settings: Settings,
    ) -> Self {
        let relay = Arc::new(RoomRelay::new(settings.relay.outbound_buffer));
        Self {
            auth,
            bookings,
            relay,
            storage,
            settings: Arc::new(settings),
        }
    }
}
