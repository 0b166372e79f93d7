use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::state::AppState;
use crate::ws::bridge;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the socket is handed to [`bridge::serve`], which owns
/// it until either the client or the event stream goes away.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let bus = Arc::clone(&state.bus);
    let manager = Arc::clone(&state.ws_manager);
    let config = state.config.bridge.clone();
    ws.on_upgrade(move |socket| bridge::serve(socket, bus, manager, config))
}
