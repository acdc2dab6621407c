//! In-process location store, used for tests and `storage.backend = "memory"`.
use super::{expiry_cutoff, newest, LocationSample, LocationStore};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct MemoryLocationStore {
    samples: Arc<DashMap<String, Vec<LocationSample>>>,
    retention: Duration,
}

impl MemoryLocationStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            samples: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Samples currently held for a booking, expired ones included
    pub fn sample_count(&self, booking_id: &str) -> usize {
        self.samples.get(booking_id).map_or(0, |s| s.len())
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn insert(&self, sample: LocationSample) -> Result<(), AppError> {
        self.samples
            .entry(sample.booking_id.clone())
            .or_default()
            .push(sample);
        Ok(())
    }

    async fn latest(&self, booking_id: &str) -> Result<LocationSample, AppError> {
        let cutoff = expiry_cutoff(Utc::now(), self.retention);
        let samples = self
            .samples
            .get(booking_id)
            .ok_or(AppError::LocationNotFound)?;

        newest(samples.iter().filter(|s| s.is_live(cutoff)))
            .cloned()
            .ok_or(AppError::LocationNotFound)
    }

    async fn purge_expired(&self) -> Result<usize, AppError> {
        let cutoff = expiry_cutoff(Utc::now(), self.retention);
        let mut removed = 0;

        for mut entry in self.samples.iter_mut() {
            let before = entry.len();
            entry.retain(|s| s.is_live(cutoff));
            removed += before - entry.len();
        }
        self.samples.retain(|_, samples| !samples.is_empty());

        Ok(removed)
    }
}
