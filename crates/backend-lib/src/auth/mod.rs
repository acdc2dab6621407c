// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication (bearer tokens) and booking-party authorization.

pub mod guard;
mod service;
pub mod token;

pub use guard::{authorize_as_party, authorize_as_renter, party_of, require_party, require_renter, Party};
pub use service::AuthService;
pub use token::{Claims, JwtAuth, Principal};
