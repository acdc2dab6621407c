//! Publisher and viewer orchestration for `triptrack` clients.
//!
//! The orchestrations only talk to two seams: a [`RelayLink`] for the live
//! room traffic and a [`LocationApi`] for the stored history. The default
//! implementations speak WebSocket and HTTP to a `triptrack` server.

pub mod api;
pub mod error;
pub mod publisher;
pub mod relay_link;
pub mod session;
pub mod source;
pub mod viewer;

pub use api::{HttpLocationApi, LocationApi};
pub use error::ClientError;
pub use publisher::{PublishSummary, PublisherStatus, TripPublisher};
pub use relay_link::{RelayLink, WsRelayLink};
pub use session::Session;
pub use source::{Fix, GeolocationError, LocationSource, PositionWatch, ReplaySource, WatchOptions};
pub use viewer::{TripViewer, ViewState, ViewerStatus};
