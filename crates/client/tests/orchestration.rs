//! Publisher and viewer orchestration against in-process fakes.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use trip_client::{
    ClientError, Fix, GeolocationError, LocationApi, LocationSource, PositionWatch,
    PublisherStatus, RelayLink, TripPublisher, TripViewer, ViewerStatus, WatchOptions,
};
use triptrack_common::{ClientToServer, LatLng, LocationRecord, LocationUpdate, ServerToClient};

/// Relay link that records outgoing events and replays scripted incoming ones
struct FakeLink {
    sent: Arc<Mutex<Vec<ClientToServer>>>,
    incoming: mpsc::Receiver<ServerToClient>,
    fail_updates: bool,
    stall_updates: bool,
}

impl FakeLink {
    fn new() -> (Self, Arc<Mutex<Vec<ClientToServer>>>, mpsc::Sender<ServerToClient>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (tx, incoming) = mpsc::channel(16);
        let link = Self {
            sent: Arc::clone(&sent),
            incoming,
            fail_updates: false,
            stall_updates: false,
        };
        (link, sent, tx)
    }
}

#[async_trait]
impl RelayLink for FakeLink {
    async fn send(&mut self, event: ClientToServer) -> Result<(), ClientError> {
        if matches!(event, ClientToServer::UpdateLocation(_)) {
            if self.fail_updates {
                return Err(ClientError::RelayClosed);
            }
            if self.stall_updates {
                std::future::pending::<()>().await;
            }
        }
        self.sent.lock().unwrap().push(event);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<ServerToClient, ClientError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.incoming.close();
        Ok(())
    }
}

#[derive(Default)]
struct FakeApi {
    appended: Mutex<Vec<(String, f64, f64)>>,
    latest: Mutex<Option<Result<Option<LocationRecord>, u16>>>,
    fail_appends: bool,
    /// When set, `latest` waits for a notification before answering
    history_gate: Option<Arc<Notify>>,
}

#[async_trait]
impl LocationApi for FakeApi {
    async fn append(&self, booking_id: &str, latitude: f64, longitude: f64) -> Result<(), ClientError> {
        if self.fail_appends {
            return Err(ClientError::Status {
                status: 500,
                message: "Server Error".to_string(),
            });
        }
        self.appended
            .lock()
            .unwrap()
            .push((booking_id.to_string(), latitude, longitude));
        Ok(())
    }

    async fn latest(&self, _booking_id: &str) -> Result<Option<LocationRecord>, ClientError> {
        if let Some(gate) = &self.history_gate {
            gate.notified().await;
        }
        match self.latest.lock().unwrap().clone() {
            Some(Ok(record)) => Ok(record),
            Some(Err(status)) => Err(ClientError::Status {
                status,
                message: "boom".to_string(),
            }),
            None => Ok(None),
        }
    }
}

/// Source that plays back scripted readings, then ends
struct ScriptedSource {
    readings: Vec<Result<LatLng, GeolocationError>>,
}

impl LocationSource for ScriptedSource {
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, GeolocationError> {
        let (tx, watch) = PositionWatch::channel(options);
        let readings = self.readings.clone();
        tokio::spawn(async move {
            for reading in readings {
                if tx.send(reading.map(Fix::now)).await.is_err() {
                    break;
                }
            }
        });
        Ok(watch)
    }
}

/// Source whose watch stays open without ever producing a reading
struct SilentSource;

impl LocationSource for SilentSource {
    fn watch(&self, options: WatchOptions) -> Result<PositionWatch, GeolocationError> {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        Ok(PositionWatch::new(rx, options, Some(task)))
    }
}

struct NoGeolocation;

impl LocationSource for NoGeolocation {
    fn watch(&self, _options: WatchOptions) -> Result<PositionWatch, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

fn options() -> WatchOptions {
    WatchOptions {
        high_accuracy: true,
        maximum_age: Duration::from_secs(5),
        timeout: Duration::from_secs(5),
    }
}

fn record(lat: f64, lng: f64) -> LocationRecord {
    LocationRecord {
        latitude: lat,
        longitude: lng,
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn test_publisher_joins_then_dual_writes_every_fix() {
    let (link, sent, _incoming) = FakeLink::new();
    let api = Arc::new(FakeApi::default());
    let publisher = TripPublisher::new("B1", link, Arc::clone(&api));
    let status = publisher.subscribe();

    let source = ScriptedSource {
        readings: vec![Ok(LatLng::new(12.9, 77.6)), Ok(LatLng::new(13.0, 77.7))],
    };
    let summary = publisher
        .run(&source, options(), std::future::pending())
        .await
        .unwrap();

    let sent = sent.lock().unwrap().clone();
    assert_eq!(sent[0], ClientToServer::JoinBookingRoom("B1".to_string()));
    assert_eq!(
        sent[1],
        ClientToServer::UpdateLocation(LocationUpdate {
            booking_id: "B1".to_string(),
            location: LatLng::new(12.9, 77.6),
        })
    );
    assert_eq!(sent.len(), 3);

    assert_eq!(summary.fixes, 2);
    assert_eq!(summary.live_sent, 2);
    assert_eq!(summary.stored, 2);
    // durable writes run concurrently, so only membership is checked
    let appended = api.appended.lock().unwrap().clone();
    assert_eq!(appended.len(), 2);
    assert!(appended.contains(&("B1".to_string(), 12.9, 77.6)));
    assert!(appended.contains(&("B1".to_string(), 13.0, 77.7)));
    assert_eq!(*status.borrow(), PublisherStatus::Live(LatLng::new(13.0, 77.7)));
}

#[tokio::test]
async fn test_store_failures_do_not_stop_live_updates() {
    let (link, sent, _incoming) = FakeLink::new();
    let api = Arc::new(FakeApi {
        fail_appends: true,
        ..FakeApi::default()
    });
    let source = ScriptedSource {
        readings: vec![Ok(LatLng::new(1.0, 1.0)), Ok(LatLng::new(2.0, 2.0))],
    };

    let summary = TripPublisher::new("B1", link, api)
        .run(&source, options(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.live_sent, 2);
    assert_eq!(summary.store_failed, 2);
    assert_eq!(sent.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_relay_failures_do_not_stop_durable_writes() {
    let (mut link, _sent, _incoming) = FakeLink::new();
    link.fail_updates = true;
    let api = Arc::new(FakeApi::default());
    let source = ScriptedSource {
        readings: vec![Ok(LatLng::new(1.0, 1.0))],
    };

    let summary = TripPublisher::new("B1", link, Arc::clone(&api))
        .run(&source, options(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.live_failed, 1);
    assert_eq!(summary.stored, 1);
    assert_eq!(api.appended.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stalled_relay_send_does_not_hold_back_durable_writes() {
    let (mut link, _sent, _incoming) = FakeLink::new();
    link.stall_updates = true;
    let api = Arc::new(FakeApi::default());
    let source = ScriptedSource {
        readings: vec![Ok(LatLng::new(1.0, 1.0)), Ok(LatLng::new(2.0, 2.0))],
    };

    let publisher = TripPublisher::new("B1", link, Arc::clone(&api))
        .with_send_timeout(Duration::from_millis(50));
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        publisher.run(&source, options(), std::future::pending()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.fixes, 2);
    assert_eq!(summary.live_failed, 2);
    assert_eq!(summary.stored, 2);
    assert_eq!(api.appended.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_durable_write_starts_while_relay_send_is_pending() {
    let (mut link, _sent, _incoming) = FakeLink::new();
    link.stall_updates = true;
    let api = Arc::new(FakeApi::default());
    let source = ScriptedSource {
        readings: vec![Ok(LatLng::new(1.0, 1.0))],
    };

    let run = {
        let api = Arc::clone(&api);
        tokio::spawn(async move {
            TripPublisher::new("B1", link, api)
                .with_send_timeout(Duration::from_secs(60))
                .run(&source, options(), std::future::pending())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(api.appended.lock().unwrap().len(), 1);
    run.abort();
}

#[tokio::test]
async fn test_gps_errors_are_reported_and_denial_halts() {
    let (link, sent, _incoming) = FakeLink::new();
    let publisher = TripPublisher::new("B1", link, Arc::new(FakeApi::default()));
    let mut status = publisher.subscribe();

    let source = ScriptedSource {
        readings: vec![
            Err(GeolocationError::PositionUnavailable("no satellites".to_string())),
            Ok(LatLng::new(1.0, 1.0)),
            Err(GeolocationError::PermissionDenied),
            Ok(LatLng::new(2.0, 2.0)),
        ],
    };
    let summary = publisher
        .run(&source, options(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.fixes, 1);
    assert_eq!(sent.lock().unwrap().len(), 2);
    assert_eq!(
        status.borrow_and_update().to_string(),
        "GPS Error: User denied Geolocation"
    );
}

#[tokio::test]
async fn test_unsupported_geolocation() {
    let (link, sent, _incoming) = FakeLink::new();
    let publisher = TripPublisher::new("B1", link, Arc::new(FakeApi::default()));
    let status = publisher.subscribe();

    let summary = publisher
        .run(&NoGeolocation, options(), std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.fixes, 0);
    assert_eq!(sent.lock().unwrap().len(), 1);
    assert_eq!(
        status.borrow().to_string(),
        "Geolocation is not supported by this device."
    );
}

#[tokio::test]
async fn test_publisher_stops_on_shutdown() {
    let (link, _sent, _incoming) = FakeLink::new();
    let source = SilentSource;
    let mut opts = options();
    opts.timeout = Duration::from_secs(60);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn(async move {
        TripPublisher::new("B1", link, Arc::new(FakeApi::default()))
            .run(&source, opts, async {
                let _ = stop_rx.await;
            })
            .await
    });

    stop_tx.send(()).unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.fixes, 0);
}

#[tokio::test]
async fn test_viewer_paints_history_then_follows_live_updates() {
    let (link, sent, incoming) = FakeLink::new();
    let api = Arc::new(FakeApi::default());
    *api.latest.lock().unwrap() = Some(Ok(Some(record(12.9, 77.6))));

    let viewer = TripViewer::new("B1", link, api);
    let mut state = viewer.subscribe();
    let run = tokio::spawn(viewer.run(std::future::pending()));

    state
        .wait_for(|s| s.status == ViewerStatus::LastKnown)
        .await
        .unwrap();
    assert_eq!(state.borrow().position, Some(LatLng::new(12.9, 77.6)));
    assert_eq!(
        sent.lock().unwrap().clone(),
        vec![ClientToServer::JoinBookingRoom("B1".to_string())]
    );

    incoming
        .send(ServerToClient::LocationUpdate(LatLng::new(13.0, 77.7)))
        .await
        .unwrap();
    state
        .wait_for(|s| s.status == ViewerStatus::LiveReceived)
        .await
        .unwrap();
    assert_eq!(state.borrow().position, Some(LatLng::new(13.0, 77.7)));

    // publisher gone: relay closes, the last marker stays
    drop(incoming);
    let final_view = run.await.unwrap().unwrap();
    assert_eq!(final_view.position, Some(LatLng::new(13.0, 77.7)));
    assert_eq!(final_view.status, ViewerStatus::LiveReceived);
}

#[tokio::test]
async fn test_viewer_without_history_settles_on_no_history() {
    let (link, sent, incoming) = FakeLink::new();
    let viewer = TripViewer::new("B2", link, Arc::new(FakeApi::default()));
    let mut state = viewer.subscribe();
    let run = tokio::spawn(viewer.run(std::future::pending()));

    state
        .wait_for(|s| s.status == ViewerStatus::NoHistory)
        .await
        .unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = *state.borrow();
    assert_eq!(settled.status, ViewerStatus::NoHistory);
    assert_eq!(settled.status.to_string(), "No location history found.");
    assert_eq!(settled.position, None);

    drop(incoming);
    let final_view = run.await.unwrap().unwrap();
    assert_eq!(final_view.status, ViewerStatus::NoHistory);
    assert_eq!(final_view.position, None);
}

#[tokio::test]
async fn test_viewer_history_failure_is_not_fatal() {
    let (link, sent, incoming) = FakeLink::new();
    let api = Arc::new(FakeApi::default());
    *api.latest.lock().unwrap() = Some(Err(500));

    let viewer = TripViewer::new("B1", link, api);
    let mut state = viewer.subscribe();
    let run = tokio::spawn(viewer.run(std::future::pending()));

    state
        .wait_for(|s| s.status == ViewerStatus::HistoryUnavailable)
        .await
        .unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1);

    incoming
        .send(ServerToClient::LocationUpdate(LatLng::new(1.0, 2.0)))
        .await
        .unwrap();
    drop(incoming);

    let final_view = run.await.unwrap().unwrap();
    assert_eq!(final_view.position, Some(LatLng::new(1.0, 2.0)));
}

#[tokio::test]
async fn test_viewer_joins_while_history_is_pending() {
    let gate = Arc::new(Notify::new());
    let (link, sent, incoming) = FakeLink::new();
    let api = Arc::new(FakeApi {
        history_gate: Some(Arc::clone(&gate)),
        ..FakeApi::default()
    });
    *api.latest.lock().unwrap() = Some(Ok(Some(record(12.9, 77.6))));

    let viewer = TripViewer::new("B1", link, api);
    let mut state = viewer.subscribe();
    let run = tokio::spawn(viewer.run(std::future::pending()));

    state
        .wait_for(|s| s.status == ViewerStatus::Connected)
        .await
        .unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1);

    incoming
        .send(ServerToClient::LocationUpdate(LatLng::new(13.0, 77.7)))
        .await
        .unwrap();
    state
        .wait_for(|s| s.status == ViewerStatus::LiveReceived)
        .await
        .unwrap();

    // stale history must not replace the live marker
    gate.notify_one();
    drop(incoming);
    let final_view = run.await.unwrap().unwrap();
    assert_eq!(final_view.status, ViewerStatus::LiveReceived);
    assert_eq!(final_view.position, Some(LatLng::new(13.0, 77.7)));
}

#[tokio::test]
async fn test_viewer_stops_on_shutdown_while_history_stalls() {
    let (link, _sent, _incoming) = FakeLink::new();
    let api = Arc::new(FakeApi {
        history_gate: Some(Arc::new(Notify::new())),
        ..FakeApi::default()
    });

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn(TripViewer::new("B1", link, api).run(async {
        let _ = stop_rx.await;
    }));

    stop_tx.send(()).unwrap();
    let final_view = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(final_view.position, None);
}

#[test]
fn test_login_messages() {
    use trip_client::{publisher, viewer, Session};

    let err = Session::require(None, publisher::LOGIN_REQUIRED).unwrap_err();
    assert_eq!(err.to_string(), "Please log in to start tracking.");
    let err = Session::require(None, viewer::LOGIN_REQUIRED).unwrap_err();
    assert_eq!(err.to_string(), "Please log in to view the map.");
}
