//! Owner side: show the vehicle position for a booking.
//!
//! The stored history lookup runs alongside the room join and gives the first
//! paint; every relayed `location_update` replaces the marker, and a lookup
//! that lands after a live update is ignored. When the relay goes away the
//! last marker stays where it was.
use crate::api::LocationApi;
use crate::error::ClientError;
use crate::relay_link::RelayLink;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use triptrack_common::{ClientToServer, LatLng, LocationRecord, ServerToClient};

/// Shown when the viewer starts without a session
pub const LOGIN_REQUIRED: &str = "Please log in to view the map.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerStatus {
    Connecting,
    LastKnown,
    NoHistory,
    HistoryUnavailable,
    Connected,
    LiveReceived,
}

impl fmt::Display for ViewerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "Connecting...",
            Self::LastKnown => "Last known location acquired.",
            Self::NoHistory => "No location history found.",
            Self::HistoryUnavailable => "Could not fetch location history.",
            Self::Connected => "Connected to live tracking service.",
            Self::LiveReceived => "Live location received!",
        })
    }
}

/// Status line plus the marker position, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub status: ViewerStatus,
    pub position: Option<LatLng>,
}

type HistoryLookup = Result<Result<Option<LocationRecord>, ClientError>, JoinError>;

enum Step {
    Shutdown,
    History(HistoryLookup),
    Relay(Option<Result<ServerToClient, ClientError>>),
}

pub struct TripViewer<L, A> {
    booking_id: String,
    link: L,
    api: Arc<A>,
    state: watch::Sender<ViewState>,
}

impl<L, A> TripViewer<L, A>
where
    L: RelayLink,
    A: LocationApi + 'static,
{
    pub fn new(booking_id: impl Into<String>, link: L, api: Arc<A>) -> Self {
        let (state, _) = watch::channel(ViewState {
            status: ViewerStatus::Connecting,
            position: None,
        });
        Self {
            booking_id: booking_id.into(),
            link,
            api,
            state,
        }
    }

    /// Follow view changes
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    fn update(&self, status: ViewerStatus, position: Option<LatLng>) {
        tracing::info!(booking = %self.booking_id, "{status}");
        self.state.send_modify(|state| {
            state.status = status;
            if position.is_some() {
                state.position = position;
            }
        });
    }

    /// Apply the history lookup unless a live update already arrived
    fn apply_history(&self, fetched: HistoryLookup, live_seen: bool) {
        let (status, position) = match fetched {
            Ok(Ok(Some(record))) => (ViewerStatus::LastKnown, Some(record.lat_lng())),
            Ok(Ok(None)) => (ViewerStatus::NoHistory, None),
            Ok(Err(e)) => {
                tracing::warn!("error fetching location for {}: {e}", self.booking_id);
                (ViewerStatus::HistoryUnavailable, None)
            },
            Err(e) => {
                tracing::warn!("location lookup for {} failed: {e}", self.booking_id);
                (ViewerStatus::HistoryUnavailable, None)
            },
        };

        if live_seen {
            tracing::debug!(booking = %self.booking_id, "history arrived after live update: {status}");
        } else {
            self.update(status, position);
        }
    }

    /// Fetch the last stored position while joining the room, then follow
    /// live updates until the relay closes and the lookup is settled, or
    /// `shutdown` resolves. Returns the final view.
    pub async fn run<F>(mut self, shutdown: F) -> Result<ViewState, ClientError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.update(ViewerStatus::Connecting, None);

        let mut history = {
            let api = Arc::clone(&self.api);
            let booking_id = self.booking_id.clone();
            tokio::spawn(async move { api.latest(&booking_id).await })
        };

        let join = ClientToServer::JoinBookingRoom(self.booking_id.clone());
        let joined = tokio::select! {
            () = &mut shutdown => None,
            sent = self.link.send(join) => Some(sent),
        };
        match joined {
            Some(Ok(())) => self.update(ViewerStatus::Connected, None),
            Some(Err(e)) => {
                history.abort();
                return Err(e);
            },
            None => {
                history.abort();
                return Ok(*self.state.borrow());
            },
        }

        let mut history_done = false;
        let mut link_open = true;
        let mut live_seen = false;

        while link_open || !history_done {
            let step = tokio::select! {
                () = &mut shutdown => Step::Shutdown,
                fetched = &mut history, if !history_done => Step::History(fetched),
                event = self.link.next_event(), if link_open => Step::Relay(event),
            };

            match step {
                Step::Shutdown => break,
                Step::History(fetched) => {
                    history_done = true;
                    self.apply_history(fetched, live_seen);
                },
                Step::Relay(Some(Ok(ServerToClient::LocationUpdate(location)))) => {
                    live_seen = true;
                    self.update(ViewerStatus::LiveReceived, Some(location));
                },
                Step::Relay(Some(Err(e))) => {
                    tracing::warn!("relay connection failed: {e}");
                    link_open = false;
                },
                Step::Relay(None) => {
                    tracing::info!("relay connection closed");
                    link_open = false;
                },
            }
        }

        history.abort();
        if link_open {
            if let Err(e) = self.link.close().await {
                tracing::debug!("closing relay link: {e}");
            }
        }

        Ok(*self.state.borrow())
    }
}
