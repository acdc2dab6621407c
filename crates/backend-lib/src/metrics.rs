// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_MALFORMED: &str = "ws.malformed";
pub const RELAY_ROOMS_ACTIVE: &str = "relay.rooms.active";
pub const RELAY_JOIN: &str = "relay.join";
pub const RELAY_BROADCAST: &str = "relay.broadcast";
pub const RELAY_DELIVERED: &str = "relay.delivered";
pub const RELAY_DROPPED: &str = "relay.dropped";
pub const LOCATION_APPENDED: &str = "location.appended";
pub const LOCATION_EXPIRED: &str = "location.expired";
