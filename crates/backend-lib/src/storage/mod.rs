// ============================
// crates/backend-lib/src/storage/mod.rs
// ============================
//! Location history: storage abstraction, engines and the expiry sweeper.
//!
//! Samples are insert-only. A sample is live until `retention` has elapsed
//! since its timestamp; reads ignore expired samples and the sweeper deletes
//! them in the background, so callers never depend on exact-second expiry.
use crate::error::AppError;
use crate::metrics::{LOCATION_APPENDED, LOCATION_EXPIRED};
use crate::validation::{validate_booking_id, validate_coordinates, Coordinates};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use triptrack_common::LocationRecord;

mod flat_file;
mod memory;

pub use flat_file::FlatFileLocationStore;
pub use memory::MemoryLocationStore;

#[cfg(test)]
pub(crate) const DEFAULT_TEST_RETENTION: Duration = Duration::from_secs(60 * 60);

/// One GPS fix recorded for a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub booking_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(booking_id: &str, coords: Coordinates, timestamp: DateTime<Utc>) -> Self {
        Self {
            booking_id: booking_id.to_string(),
            latitude: coords.latitude(),
            longitude: coords.longitude(),
            timestamp,
        }
    }

    /// Whether the sample is still within retention at `cutoff`
    pub fn is_live(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp > cutoff
    }

    /// HTTP view of the sample
    pub fn to_record(&self) -> LocationRecord {
        LocationRecord {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp,
        }
    }
}

/// Oldest timestamp that is already expired at `now`
pub fn expiry_cutoff(now: DateTime<Utc>, retention: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| now.checked_sub_signed(retention))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Pick the newest sample; on equal timestamps the later one in iteration
/// (insertion) order wins.
pub(crate) fn newest<'a, I>(samples: I) -> Option<&'a LocationSample>
where
    I: IntoIterator<Item = &'a LocationSample>,
{
    samples.into_iter().fold(None, |best, sample| match best {
        Some(current) if current.timestamp > sample.timestamp => Some(current),
        _ => Some(sample),
    })
}

/// Trait for location store engines
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Persist an already validated sample
    async fn insert(&self, sample: LocationSample) -> Result<(), AppError>;

    /// Newest live sample for a booking, or [`AppError::LocationNotFound`]
    async fn latest(&self, booking_id: &str) -> Result<LocationSample, AppError>;

    /// Delete every expired sample and return how many were removed
    async fn purge_expired(&self) -> Result<usize, AppError>;

    /// Validate and insert a new sample stamped with the current time
    async fn append(
        &self,
        booking_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationSample, AppError> {
        let booking_id = validate_booking_id(booking_id)?;
        let coords = validate_coordinates(latitude, longitude)?;
        let sample = LocationSample::new(booking_id, coords, Utc::now());

        self.insert(sample.clone()).await?;
        counter!(LOCATION_APPENDED).increment(1);

        Ok(sample)
    }
}

/// Spawn the background task that purges expired samples every `interval`
pub fn spawn_expiry_sweeper<S>(store: S, interval: Duration) -> JoinHandle<()>
where
    S: LocationStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {},
                Ok(removed) => {
                    counter!(LOCATION_EXPIRED).increment(removed as u64);
                    tracing::info!("expired {removed} location samples");
                },
                Err(e) => tracing::error!("location expiry sweep failed: {e}"),
            }
        }
    })
}
