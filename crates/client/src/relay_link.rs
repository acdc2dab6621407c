//! Client side of the real-time relay connection.
use crate::error::ClientError;
use crate::session::Session;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use triptrack_common::{ClientToServer, ServerToClient};

/// A duplex event channel to the relay
#[async_trait]
pub trait RelayLink: Send {
    async fn send(&mut self, event: ClientToServer) -> Result<(), ClientError>;

    /// Next event from the relay; `None` once the connection is gone
    async fn next_event(&mut self) -> Option<Result<ServerToClient, ClientError>>;

    async fn close(&mut self) -> Result<(), ClientError>;
}

/// [`RelayLink`] over a WebSocket
pub struct WsRelayLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsRelayLink {
    /// Connect to `url` (e.g. `ws://127.0.0.1:3000/ws`) with the session's token
    pub async fn connect(url: &str, session: &Session) -> Result<Self, ClientError> {
        let mut request = url.into_client_request()?;
        let bearer = HeaderValue::from_str(&session.bearer())
            .map_err(|e| ClientError::InvalidToken(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _) = connect_async(request).await?;
        tracing::info!("connected to relay at {url}");
        Ok(Self { stream })
    }
}

#[async_trait]
impl RelayLink for WsRelayLink {
    async fn send(&mut self, event: ClientToServer) -> Result<(), ClientError> {
        let json = serde_json::to_string(&event)?;
        self.stream.send(Message::Text(json.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<ServerToClient, ClientError>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                    Ok(event) => return Some(Ok(event)),
                    Err(e) => tracing::warn!("ignoring malformed relay frame: {e}"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {},
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
