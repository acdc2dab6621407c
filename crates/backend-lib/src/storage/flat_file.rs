//! Flat-file location store.
//!
//! Layout: `<root>/locations/<booking_id>/samples.log`, one JSON sample per
//! line, appended in insertion order.
use super::{expiry_cutoff, newest, LocationSample, LocationStore};
use crate::error::AppError;
use crate::validation::is_path_safe_booking_id;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::{fs as tokio_fs, io::AsyncWriteExt, sync::RwLock};

const LOCATIONS_DIR: &str = "locations";
const SAMPLES_FILE: &str = "samples.log";

/// Flat-file implementation of [`LocationStore`]
#[derive(Clone)]
pub struct FlatFileLocationStore {
    root: PathBuf,
    retention: Duration,
    // Appends and reads share the lock; the sweeper rewrites files under the
    // exclusive side.
    rewrite_lock: Arc<RwLock<()>>,
}

impl FlatFileLocationStore {
    pub fn new<P: AsRef<Path>>(root: P, retention: Duration) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(LOCATIONS_DIR))?;
        Ok(Self {
            root,
            retention,
            rewrite_lock: Arc::new(RwLock::new(())),
        })
    }

    fn booking_dir(&self, booking_id: &str) -> Result<PathBuf, AppError> {
        if !is_path_safe_booking_id(booking_id) {
            return Err(AppError::InvalidInput(format!(
                "booking id {booking_id:?} cannot be stored"
            )));
        }
        Ok(self.root.join(LOCATIONS_DIR).join(booking_id))
    }

    async fn read_samples(path: &Path) -> Result<Vec<LocationSample>, AppError> {
        if !tokio_fs::try_exists(path).await? {
            return Ok(Vec::new());
        }

        let content = tokio_fs::read_to_string(path).await?;
        let samples = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LocationSample>(line) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    tracing::warn!("skipping corrupt sample in {}: {e}", path.display());
                    None
                },
            })
            .collect();

        Ok(samples)
    }

    async fn purge_file(&self, dir: &Path) -> Result<usize, AppError> {
        let path = dir.join(SAMPLES_FILE);
        let samples = Self::read_samples(&path).await?;
        let cutoff = expiry_cutoff(Utc::now(), self.retention);

        let before = samples.len();
        let live: Vec<_> = samples.into_iter().filter(|s| s.is_live(cutoff)).collect();
        let removed = before - live.len();

        if live.is_empty() {
            tokio_fs::remove_dir_all(dir).await?;
        } else if removed > 0 {
            let mut content = String::new();
            for sample in &live {
                content.push_str(&serde_json::to_string(sample)?);
                content.push('\n');
            }
            let tmp = dir.join(format!("{SAMPLES_FILE}.tmp"));
            tokio_fs::write(&tmp, content).await?;
            tokio_fs::rename(&tmp, &path).await?;
        }

        Ok(removed)
    }
}

#[async_trait]
impl LocationStore for FlatFileLocationStore {
    /// Append a JSON line to `samples.log`.
    async fn insert(&self, sample: LocationSample) -> Result<(), AppError> {
        let dir = self.booking_dir(&sample.booking_id)?;
        let mut line = serde_json::to_string(&sample)?;
        line.push('\n');

        let _guard = self.rewrite_lock.read().await;

        // ensure directory exists
        tokio_fs::create_dir_all(&dir).await?;

        let mut file = tokio_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(SAMPLES_FILE))
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn latest(&self, booking_id: &str) -> Result<LocationSample, AppError> {
        // Ids that can never have been written have no history
        let Ok(dir) = self.booking_dir(booking_id) else {
            return Err(AppError::LocationNotFound);
        };

        let samples = {
            let _guard = self.rewrite_lock.read().await;
            Self::read_samples(&dir.join(SAMPLES_FILE)).await?
        };
        let cutoff = expiry_cutoff(Utc::now(), self.retention);

        newest(samples.iter().filter(|s| s.is_live(cutoff)))
            .cloned()
            .ok_or(AppError::LocationNotFound)
    }

    async fn purge_expired(&self) -> Result<usize, AppError> {
        let _guard = self.rewrite_lock.write().await;
        let mut removed = 0;

        let mut entries = tokio_fs::read_dir(self.root.join(LOCATIONS_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match self.purge_file(&entry.path()).await {
                Ok(n) => removed += n,
                Err(e) => {
                    tracing::warn!("failed to purge {}: {e}", entry.path().display());
                },
            }
        }

        Ok(removed)
    }
}
