//! Position sources and the cancellable position watch.
//!
//! A [`LocationSource`] starts a watch that yields fixes until it is
//! cancelled. The watch applies [`WatchOptions`]: fixes older than
//! `maximum_age` are discarded and a [`GeolocationError::Timeout`] is reported
//! whenever no fix arrives within `timeout`. Timeouts are not terminal.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use triptrack_common::LatLng;

const WATCH_BUFFER: usize = 16;

/// Errors reported by a position watch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("User denied Geolocation")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Timeout expired")]
    Timeout,

    #[error("Geolocation is not supported by this device.")]
    Unsupported,
}

impl GeolocationError {
    /// Whether the watch can never produce another fix
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::Unsupported)
    }
}

/// One position reading
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub location: LatLng,
    /// Accuracy radius in metres, when the source knows it
    pub accuracy: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl Fix {
    pub fn now(location: LatLng) -> Self {
        Self {
            location,
            accuracy: None,
            captured_at: Utc::now(),
        }
    }

    fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.captured_at).to_std().unwrap_or_default()
    }
}

/// Options of a position watch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Oldest fix still accepted
    pub maximum_age: Duration,
    /// How long to wait for a fix before reporting a timeout
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Something that can watch the device position
pub trait LocationSource: Send + Sync {
    /// Start a watch. Fails immediately when positioning is unavailable.
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, GeolocationError>;
}

/// A running position watch. Dropping it cancels the watch.
pub struct PositionWatch {
    readings: mpsc::Receiver<Result<Fix, GeolocationError>>,
    options: WatchOptions,
    task: Option<JoinHandle<()>>,
}

impl PositionWatch {
    /// Wrap a stream of raw readings produced by `task`
    pub fn new(
        readings: mpsc::Receiver<Result<Fix, GeolocationError>>,
        options: WatchOptions,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            readings,
            options,
            task,
        }
    }

    /// Build a watch and the sender feeding it, for sources that push readings
    pub fn channel(options: WatchOptions) -> (mpsc::Sender<Result<Fix, GeolocationError>>, Self) {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        (tx, Self::new(rx, options, None))
    }

    /// Next fresh fix or error; `None` once the watch has ended or was cancelled
    pub async fn next(&mut self) -> Option<Result<Fix, GeolocationError>> {
        loop {
            let reading = match tokio::time::timeout(self.options.timeout, self.readings.recv()).await {
                Ok(reading) => reading?,
                Err(_) => return Some(Err(GeolocationError::Timeout)),
            };

            match reading {
                Ok(fix) if fix.age(Utc::now()) > self.options.maximum_age => {
                    tracing::debug!("discarding stale fix from {}", fix.captured_at);
                },
                other => return Some(other),
            }
        }
    }

    /// Stop the watch
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.readings.close();
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Replays a fixed route, one point per `interval`, stamped at emission time
#[derive(Debug, Clone)]
pub struct ReplaySource {
    points: Vec<LatLng>,
    interval: Duration,
}

impl ReplaySource {
    pub fn new(points: Vec<LatLng>, interval: Duration) -> Self {
        Self { points, interval }
    }

    /// Load a JSON array of `{"lat": .., "lng": ..}` points
    pub fn from_json_file<P: AsRef<Path>>(path: P, interval: Duration) -> Result<Self, crate::ClientError> {
        #[derive(Deserialize)]
        struct Point {
            lat: f64,
            lng: f64,
        }

        let content = std::fs::read_to_string(path)?;
        let points: Vec<Point> = serde_json::from_str(&content)?;
        Ok(Self::new(
            points.into_iter().map(|p| LatLng::new(p.lat, p.lng)).collect(),
            interval,
        ))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl LocationSource for ReplaySource {
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, GeolocationError> {
        if self.points.is_empty() {
            return Err(GeolocationError::PositionUnavailable(
                "replay route is empty".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let points = self.points.clone();
        let interval = self.interval;
        let accuracy = options.high_accuracy.then_some(5.0);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for location in points {
                ticker.tick().await;
                let fix = Fix {
                    location,
                    accuracy,
                    captured_at: Utc::now(),
                };
                if tx.send(Ok(fix)).await.is_err() {
                    break;
                }
            }
        });

        Ok(PositionWatch::new(rx, options, Some(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast_options() -> WatchOptions {
        WatchOptions {
            high_accuracy: true,
            maximum_age: Duration::from_secs(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_replay_emits_route_in_order() {
        let source = ReplaySource::new(
            vec![LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0)],
            Duration::from_millis(10),
        );
        let mut watch = source.watch(fast_options()).unwrap();

        assert_eq!(watch.next().await.unwrap().unwrap().location, LatLng::new(1.0, 1.0));
        let second = watch.next().await.unwrap().unwrap();
        assert_eq!(second.location, LatLng::new(2.0, 2.0));
        assert_eq!(second.accuracy, Some(5.0));
        assert!(watch.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_route_is_unavailable() {
        let source = ReplaySource::new(Vec::new(), Duration::from_millis(10));
        assert!(matches!(
            source.watch(fast_options()),
            Err(GeolocationError::PositionUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_fixes_are_discarded() {
        let (tx, mut watch) = PositionWatch::channel(fast_options());
        let mut stale = Fix::now(LatLng::new(9.0, 9.0));
        stale.captured_at = Utc::now() - chrono::Duration::seconds(30);

        tx.send(Ok(stale)).await.unwrap();
        tx.send(Ok(Fix::now(LatLng::new(1.0, 1.0)))).await.unwrap();

        assert_eq!(watch.next().await.unwrap().unwrap().location, LatLng::new(1.0, 1.0));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_and_watch_continues() {
        let (tx, mut watch) = PositionWatch::channel(fast_options());

        assert_eq!(watch.next().await, Some(Err(GeolocationError::Timeout)));

        tx.send(Ok(Fix::now(LatLng::new(1.0, 1.0)))).await.unwrap();
        assert!(watch.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_ends_the_watch() {
        let source = ReplaySource::new(vec![LatLng::new(1.0, 1.0); 100], Duration::from_millis(5));
        let mut watch = source.watch(fast_options()).unwrap();
        assert!(watch.next().await.is_some());

        watch.cancel();
        // buffered readings drain, then the watch ends
        let mut remaining = 0;
        while watch.next().await.is_some() {
            remaining += 1;
        }
        assert!(remaining < 100);
    }

    #[test]
    fn test_load_route_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("route.json");
        std::fs::write(&path, r#"[{"lat": 12.9, "lng": 77.6}, {"lat": 0.0, "lng": 0.0}]"#).unwrap();

        let source = ReplaySource::from_json_file(&path, Duration::from_secs(1)).unwrap();
        assert_eq!(source.len(), 2);
    }
}
