// ==================
// crates/backend-lib/src/websocket.rs
// ==================
//! Per-connection relay handler.
//!
//! One `WebSocketHandler` is created for every upgraded socket. It owns the
//! connection's room memberships; dropping it leaves every room the
//! connection joined.
use crate::auth::Principal;
use crate::metrics::WS_MALFORMED;
use crate::relay::{Connection, ConnectionId, RoomRelay};
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use triptrack_common::{ClientToServer, LocationUpdate, ServerToClient};

/// Relay state of a single WebSocket client
pub struct WebSocketHandler {
    connection: Connection,
    principal: Option<Principal>,
    peer: Option<SocketAddr>,
}

impl WebSocketHandler {
    /// Register a connection with the relay. The returned receiver carries the
    /// frames to write back to the socket.
    pub fn new(
        relay: &Arc<RoomRelay>,
        principal: Option<Principal>,
    ) -> (Self, mpsc::Receiver<ServerToClient>) {
        let (connection, rx) = relay.connect();
        let handler = Self {
            connection,
            principal,
            peer: None,
        };
        (handler, rx)
    }

    /// Set client address
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Handle one inbound text frame. Malformed frames are logged and ignored.
    pub fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientToServer>(text) {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                counter!(WS_MALFORMED).increment(1);
                tracing::warn!(
                    connection = %self.connection.id(),
                    peer = ?self.peer,
                    "ignoring malformed frame: {e}"
                );
            },
        }
    }

    /// Apply a decoded client event
    pub fn handle_event(&mut self, event: ClientToServer) {
        match event {
            ClientToServer::JoinBookingRoom(booking_id) => {
                self.connection.join(&booking_id);
            },
            ClientToServer::UpdateLocation(LocationUpdate {
                booking_id,
                location,
            }) => {
                let delivered = self.connection.publish(&booking_id, location);
                tracing::debug!(
                    connection = %self.connection.id(),
                    user = self.principal.as_ref().map(|p| p.user_id.as_str()),
                    "relayed location for {booking_id} to {delivered} members"
                );
            },
        }
    }
}
