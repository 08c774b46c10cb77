//! HTTP status surface for the relay.

pub mod web;

pub use web::{create_router as create_relay_router, RelayApiState, RelayStatus};
