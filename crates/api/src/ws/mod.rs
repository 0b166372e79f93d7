//! WebSocket fan-out bridge.
//!
//! Every accepted connection gets its own event bus subscription, relayed
//! through a bounded hand-off to the socket. Provides the connection
//! registry, the bridge itself, and the HTTP upgrade handler used by Axum
//! routes.

pub mod bridge;
pub mod frame;
mod handler;
pub mod handoff;
pub mod manager;

pub use bridge::{BridgeConfig, BridgeState};
pub use frame::Frame;
pub use handler::ws_handler;
pub use handoff::OverflowPolicy;
pub use manager::WsManager;
