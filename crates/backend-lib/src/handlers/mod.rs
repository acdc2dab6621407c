//! HTTP handlers.
pub mod locations;

pub use locations::{append_location, latest_location};
