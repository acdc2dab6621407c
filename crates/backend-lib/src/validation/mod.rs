// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for location writes and booking identifiers.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use triptrack_common::AppendLocationRequest;

const MAX_BOOKING_ID_LENGTH: usize = 128;
const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

// Booking ids that may be used as a directory name
static PATH_SAFE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static regex"));

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid booking ID: {0}")]
    InvalidBookingId(String),

    #[error("Latitude must be between -90 and 90, got {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude must be between -180 and 180, got {0}")]
    LongitudeOutOfRange(f64),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A latitude/longitude pair known to be finite and in range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Validate a booking ID
pub fn validate_booking_id(booking_id: &str) -> ValidationResult<&str> {
    let trimmed = booking_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidBookingId(
            "Booking ID must not be empty".to_string(),
        ));
    }

    if trimmed.len() > MAX_BOOKING_ID_LENGTH {
        return Err(ValidationError::InvalidBookingId(format!(
            "Booking ID cannot exceed {MAX_BOOKING_ID_LENGTH} characters"
        )));
    }

    Ok(trimmed)
}

/// Whether a booking ID can be used as a single path component
pub fn is_path_safe_booking_id(booking_id: &str) -> bool {
    booking_id.len() <= MAX_BOOKING_ID_LENGTH && PATH_SAFE_ID_REGEX.is_match(booking_id)
}

/// Validate a coordinate pair. NaN fails both range checks.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> ValidationResult<Coordinates> {
    if !LATITUDE_RANGE.contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !LONGITUDE_RANGE.contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }

    Ok(Coordinates {
        latitude,
        longitude,
    })
}

/// Validate the body of `POST /locations`
pub fn validate_append_request(
    req: &AppendLocationRequest,
) -> ValidationResult<(String, Coordinates)> {
    let booking_id = req
        .booking_id
        .as_deref()
        .ok_or(ValidationError::MissingField("bookingId"))?;
    let latitude = req.latitude.ok_or(ValidationError::MissingField("latitude"))?;
    let longitude = req
        .longitude
        .ok_or(ValidationError::MissingField("longitude"))?;

    let booking_id = validate_booking_id(booking_id)?;
    let coords = validate_coordinates(latitude, longitude)?;

    Ok((booking_id.to_string(), coords))
}
