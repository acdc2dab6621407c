// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the location endpoints.

pub mod auth;

pub use auth::{bearer_token, require_bearer};
