// ============================
// crates/backend-lib/src/handlers/locations.rs
// ============================
//! Location history endpoints.
//!
//! `POST /locations` records a fix for the renter of a booking, and
//! `GET /locations/{booking_id}` returns the newest live fix to either party.
//! Both run behind [`require_bearer`](crate::middleware::require_bearer).
use crate::auth::{require_party, require_renter, Principal};
use crate::error::AppError;
use crate::storage::LocationStore;
use crate::validation::{validate_append_request, ValidationError};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use triptrack_common::{AckResponse, AppendLocationRequest, LatestLocationResponse};

/// `POST /locations`
pub async fn append_location<S: LocationStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<AppendLocationRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Json(body) = body.map_err(|e| ValidationError::MalformedBody(e.body_text()))?;
    let (booking_id, coords) = validate_append_request(&body)?;

    let booking = state
        .bookings
        .find(&booking_id)
        .await?
        .ok_or(AppError::BookingNotFound)?;
    require_renter(&principal, &booking)?;

    if !booking.is_trip_active(Utc::now()) {
        tracing::debug!(
            user = %principal,
            "recording location for {booking_id} outside its trip window"
        );
    }

    state
        .storage
        .append(&booking_id, coords.latitude(), coords.longitude())
        .await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Location updated".to_string(),
    }))
}

/// `GET /locations/{booking_id}`
pub async fn latest_location<S: LocationStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<String>,
) -> Result<Json<LatestLocationResponse>, AppError> {
    let booking = state
        .bookings
        .find(&booking_id)
        .await?
        .ok_or(AppError::BookingNotFound)?;
    let party = require_party(&principal, &booking)?;

    if !booking.is_viewable() {
        tracing::debug!(
            user = %principal,
            status = ?booking.status,
            "serving location for {booking_id} outside a confirmed booking"
        );
    }

    let sample = state.storage.latest(&booking_id).await?;
    tracing::debug!(user = %principal, ?party, "served latest location for {booking_id}");

    Ok(Json(LatestLocationResponse {
        success: true,
        location: sample.to_record(),
    }))
}
