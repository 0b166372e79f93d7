//! HTTP and WebSocket surface of the notification relay.
//!
//! The binary in `main.rs` wires these modules together; integration tests
//! build the same router through [`router::build_app_router`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod notifications;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
