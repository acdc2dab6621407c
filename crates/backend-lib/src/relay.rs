// ============================
// crates/backend-lib/src/relay.rs
// ============================
//! Booking rooms and location fan-out.
//!
//! A room is keyed by booking id and lives only while it has members. Every
//! connection owns a bounded outbound queue; broadcasting is a synchronous
//! loop of `try_send` calls, so a slow or dead subscriber loses frames
//! instead of stalling the publisher.
use crate::metrics::{RELAY_BROADCAST, RELAY_DELIVERED, RELAY_DROPPED, RELAY_JOIN, RELAY_ROOMS_ACTIVE};
use dashmap::DashMap;
use metrics::{counter, gauge};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use triptrack_common::{LatLng, ServerToClient};
use uuid::Uuid;

pub type ConnectionId = Uuid;

type Members = HashMap<ConnectionId, mpsc::Sender<ServerToClient>>;

/// Registry of booking rooms
pub struct RoomRelay {
    rooms: DashMap<String, Members>,
    buffer: usize,
}

impl RoomRelay {
    /// `buffer` is the per-connection outbound queue size
    pub fn new(buffer: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a new connection. The receiver yields every frame routed to it.
    pub fn connect(self: &Arc<Self>) -> (Connection, mpsc::Receiver<ServerToClient>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let connection = Connection {
            id: Uuid::new_v4(),
            tx,
            rooms: HashSet::new(),
            relay: Arc::clone(self),
        };
        (connection, rx)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, booking_id: &str) -> usize {
        self.rooms.get(booking_id).map_or(0, |members| members.len())
    }

    fn add_member(&self, booking_id: &str, id: ConnectionId, tx: mpsc::Sender<ServerToClient>) {
        self.rooms
            .entry(booking_id.to_string())
            .or_default()
            .insert(id, tx);
        gauge!(RELAY_ROOMS_ACTIVE).set(self.rooms.len() as f64);
    }

    fn remove_member(&self, booking_id: &str, id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(booking_id) {
            members.remove(&id);
        }
        // Re-checked under the shard lock in case someone joined in between
        self.rooms.remove_if(booking_id, |_, members| members.is_empty());
        gauge!(RELAY_ROOMS_ACTIVE).set(self.rooms.len() as f64);
    }

    fn broadcast(&self, sender: ConnectionId, booking_id: &str, location: LatLng) -> usize {
        counter!(RELAY_BROADCAST).increment(1);

        let Some(members) = self.rooms.get(booking_id) else {
            tracing::debug!("no room for booking {booking_id}, dropping update");
            return 0;
        };

        let frame = ServerToClient::LocationUpdate(location);
        let mut delivered = 0;

        for (member, tx) in members.iter() {
            if *member == sender {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    counter!(RELAY_DROPPED).increment(1);
                    tracing::warn!("outbound queue full for {member}, dropping update");
                },
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("connection {member} already closed");
                },
            }
        }

        counter!(RELAY_DELIVERED).increment(delivered as u64);
        delivered
    }
}

/// Relay-side state of one duplex connection
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<ServerToClient>,
    rooms: HashSet<String>,
    relay: Arc<RoomRelay>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Join the room for `booking_id`. Joining twice is a no-op.
    pub fn join(&mut self, booking_id: &str) {
        if !self.rooms.insert(booking_id.to_string()) {
            tracing::debug!("{} already in room {booking_id}", self.id);
            return;
        }

        self.relay.add_member(booking_id, self.id, self.tx.clone());
        counter!(RELAY_JOIN).increment(1);
        tracing::info!("{} joined room {booking_id}", self.id);
    }

    /// Send `location` to every other member of the room. Returns how many
    /// queues accepted the frame.
    pub fn publish(&self, booking_id: &str, location: LatLng) -> usize {
        self.relay.broadcast(self.id, booking_id, location)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for booking_id in self.rooms.drain() {
            self.relay.remove_member(&booking_id, self.id);
            tracing::debug!("{} left room {booking_id}", self.id);
        }
    }
}
