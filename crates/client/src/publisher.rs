//! Renter side: stream the device position for a booking.
//!
//! Every fix goes out twice and independently: as a live `update_location`
//! frame on the relay link, and as a durable write to the location history.
//! Failure of one path never blocks or cancels the other: the durable write is
//! spawned before the live send, and a live send that does not complete within
//! the send timeout counts as a missed frame.
use crate::api::LocationApi;
use crate::error::ClientError;
use crate::relay_link::RelayLink;
use crate::source::{Fix, GeolocationError, LocationSource, WatchOptions};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use triptrack_common::{ClientToServer, LatLng, LocationUpdate};

/// Shown when the publisher starts without a session
pub const LOGIN_REQUIRED: &str = "Please log in to start tracking.";

/// Longest a live frame may wait on the relay link
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// What the publisher is currently doing
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherStatus {
    Initializing,
    Joined,
    Live(LatLng),
    GpsError(String),
    Unsupported,
}

impl fmt::Display for PublisherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => f.write_str("Initializing tracker..."),
            Self::Joined => f.write_str("Joined tracking room..."),
            Self::Live(_) => f.write_str("Live location acquired."),
            Self::GpsError(message) => write!(f, "GPS Error: {message}"),
            Self::Unsupported => f.write_str("Geolocation is not supported by this device."),
        }
    }
}

/// Counters of a finished publishing session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishSummary {
    pub fixes: usize,
    pub live_sent: usize,
    pub live_failed: usize,
    pub stored: usize,
    pub store_failed: usize,
}

pub struct TripPublisher<L, A> {
    booking_id: String,
    link: L,
    api: Arc<A>,
    status: watch::Sender<PublisherStatus>,
    send_timeout: Duration,
}

impl<L, A> TripPublisher<L, A>
where
    L: RelayLink,
    A: LocationApi + 'static,
{
    pub fn new(booking_id: impl Into<String>, link: L, api: Arc<A>) -> Self {
        let (status, _) = watch::channel(PublisherStatus::Initializing);
        Self {
            booking_id: booking_id.into(),
            link,
            api,
            status,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Follow status changes
    pub fn subscribe(&self) -> watch::Receiver<PublisherStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: PublisherStatus) {
        tracing::info!(booking = %self.booking_id, "{status}");
        self.status.send_replace(status);
    }

    /// Join the booking room and publish every fix from `source` until the
    /// watch ends, permission is denied, or `shutdown` resolves.
    pub async fn run<S, F>(
        mut self,
        source: &S,
        options: WatchOptions,
        shutdown: F,
    ) -> Result<PublishSummary, ClientError>
    where
        S: LocationSource + ?Sized,
        F: Future<Output = ()>,
    {
        self.set_status(PublisherStatus::Initializing);

        self.link
            .send(ClientToServer::JoinBookingRoom(self.booking_id.clone()))
            .await?;
        self.set_status(PublisherStatus::Joined);

        let mut summary = PublishSummary::default();
        let mut watch = match source.watch(options) {
            Ok(watch) => watch,
            Err(e) => {
                self.report_gps_error(&e);
                let _ = self.link.close().await;
                return Ok(summary);
            },
        };

        let mut writes = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                reading = watch.next() => match reading {
                    None => break,
                    Some(Ok(fix)) => self.publish_fix(fix, &mut writes, &mut summary).await,
                    Some(Err(e)) => {
                        self.report_gps_error(&e);
                        if e.is_fatal() {
                            break;
                        }
                    },
                },
            }

            while let Some(done) = writes.try_join_next() {
                record_write(done, &mut summary);
            }
        }

        watch.cancel();
        match tokio::time::timeout(self.send_timeout, self.link.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => tracing::debug!("closing relay link: {e}"),
            Err(_) => tracing::debug!("relay link did not close in time"),
        }

        // Let in-flight durable writes finish
        while let Some(done) = writes.join_next().await {
            record_write(done, &mut summary);
        }

        Ok(summary)
    }

    async fn publish_fix(
        &mut self,
        fix: Fix,
        writes: &mut JoinSet<Result<(), ClientError>>,
        summary: &mut PublishSummary,
    ) {
        let location = fix.location;
        summary.fixes += 1;
        self.set_status(PublisherStatus::Live(location));

        let api = Arc::clone(&self.api);
        let booking_id = self.booking_id.clone();
        writes.spawn(async move { api.append(&booking_id, location.lat, location.lng).await });

        let event = ClientToServer::UpdateLocation(LocationUpdate {
            booking_id: self.booking_id.clone(),
            location,
        });
        match tokio::time::timeout(self.send_timeout, self.link.send(event)).await {
            Ok(Ok(())) => summary.live_sent += 1,
            Ok(Err(e)) => {
                summary.live_failed += 1;
                tracing::warn!("live update for {} not sent: {e}", self.booking_id);
            },
            Err(_) => {
                summary.live_failed += 1;
                tracing::warn!(
                    "live update for {} dropped after {:?}",
                    self.booking_id,
                    self.send_timeout
                );
            },
        }
    }

    fn report_gps_error(&self, error: &GeolocationError) {
        tracing::warn!(booking = %self.booking_id, "geolocation failed: {error}");
        let status = match error {
            GeolocationError::Unsupported => PublisherStatus::Unsupported,
            other => PublisherStatus::GpsError(other.to_string()),
        };
        self.set_status(status);
    }
}

fn record_write(
    done: Result<Result<(), ClientError>, tokio::task::JoinError>,
    summary: &mut PublishSummary,
) {
    match done {
        Ok(Ok(())) => summary.stored += 1,
        Ok(Err(e)) => {
            summary.store_failed += 1;
            tracing::error!("failed to save location: {e}");
        },
        Err(e) => {
            summary.store_failed += 1;
            tracing::error!("location write task failed: {e}");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(PublisherStatus::Initializing.to_string(), "Initializing tracker...");
        assert_eq!(PublisherStatus::Joined.to_string(), "Joined tracking room...");
        assert_eq!(
            PublisherStatus::Live(LatLng::new(1.0, 2.0)).to_string(),
            "Live location acquired."
        );
        assert_eq!(
            PublisherStatus::GpsError("Timeout expired".to_string()).to_string(),
            "GPS Error: Timeout expired"
        );
        assert_eq!(
            PublisherStatus::Unsupported.to_string(),
            "Geolocation is not supported by this device."
        );
    }
}
