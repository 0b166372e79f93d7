pub mod health;
pub mod notification;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the API route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket event stream
///
/// /notifications                       create (POST)
/// /notifications/verify/{id}           verify (PUT)
/// /notifications/unverified            list unverified, newest first (GET)
/// /notifications/verified              list verified, oldest first (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/notifications", notification::router())
}
