//! Common types shared by the `triptrack` server and its clients.
//!
//! Two surfaces live here:
//! - the real-time relay protocol (`ClientToServer` / `ServerToClient`), carried as
//!   JSON text frames of the shape `{"event": <name>, "data": <payload>}`
//! - the request/response bodies of the location-history HTTP endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single coordinate pair as it travels over the relay.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Events sent from a client to the relay
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientToServer {
    /// Join the broadcast group of a booking. The payload is the booking id.
    JoinBookingRoom(String),
    /// Publish a position to everyone else in the booking's group
    UpdateLocation(LocationUpdate),
}

/// Payload of `update_location`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    /// Booking whose room receives the position
    pub booking_id: String,
    /// The position itself
    pub location: LatLng,
}

/// Events sent from the relay to a client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerToClient {
    /// A position published by another member of a joined room
    LocationUpdate(LatLng),
}

/// Body of `POST /locations`.
///
/// Every field is optional on the wire so that a missing field can be reported
/// as a validation error instead of a generic decoding failure.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppendLocationRequest {
    pub booking_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Generic acknowledgment body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

/// A stored sample as exposed over HTTP
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationRecord {
    /// The record as a relay coordinate pair
    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// Body of a successful `GET /locations/{bookingId}`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LatestLocationResponse {
    pub success: bool,
    pub location: LocationRecord,
}

/// Body of every failed HTTP request
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
