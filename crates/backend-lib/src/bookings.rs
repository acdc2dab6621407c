// ============================
// crates/backend-lib/src/bookings.rs
// ============================
//! Read-only view of the bookings the tracking endpoints need.
//!
//! Bookings are owned by the marketplace; this module only knows the parties,
//! the status and the trip window.
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Booking lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// A booking as seen by the tracking subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    /// User renting the vehicle (the publisher)
    pub renter: String,
    /// User owning the vehicle
    pub owner: String,
    pub status: BookingStatus,
    pub pickup_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
}

impl Booking {
    /// Confirmed and `now` falls inside `[pickup, return]`.
    ///
    /// Advisory only: nothing in the server rejects traffic outside the window.
    pub fn is_trip_active(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Confirmed
            && now >= self.pickup_date
            && now <= self.return_date
    }

    /// Whether the map view is offered for this booking
    pub fn is_viewable(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// Lookup of booking records
#[async_trait]
pub trait BookingDirectory: Send + Sync {
    /// Find a booking by id
    async fn find(&self, booking_id: &str) -> Result<Option<Booking>, AppError>;
}

/// Booking directory held in memory, optionally seeded from a JSON file
#[derive(Default)]
pub struct InMemoryBookingDirectory {
    bookings: RwLock<HashMap<String, Booking>>,
}

impl InMemoryBookingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a list of bookings
    pub fn with_bookings(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let directory = Self::new();
        for booking in bookings {
            directory.upsert(booking);
        }
        directory
    }

    /// Load a JSON array of bookings. A missing file yields an empty directory.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("booking file {} not found, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        let bookings: Vec<Booking> = serde_json::from_str(&content)?;
        tracing::info!("loaded {} bookings from {}", bookings.len(), path.display());

        Ok(Self::with_bookings(bookings))
    }

    /// Insert or replace a booking
    pub fn upsert(&self, booking: Booking) {
        self.bookings.write().insert(booking.id.clone(), booking);
    }

    pub fn len(&self) -> usize {
        self.bookings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.read().is_empty()
    }
}

#[async_trait]
impl BookingDirectory for InMemoryBookingDirectory {
    async fn find(&self, booking_id: &str) -> Result<Option<Booking>, AppError> {
        Ok(self.bookings.read().get(booking_id).cloned())
    }
}
