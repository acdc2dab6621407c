//! Client error type.
use crate::source::GeolocationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// No session credential; carries the message shown to the user
    #[error("{0}")]
    LoginRequired(&'static str),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Relay connection closed")]
    RelayClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
}
