//! Route definitions for the `/notifications` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::notification;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// POST   /                          -> create_notification
/// PUT    /verify/{id}               -> verify_notification
/// GET    /unverified                -> list_unverified
/// GET    /verified                  -> list_verified
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(notification::create_notification))
        .route("/verify/{id}", put(notification::verify_notification))
        .route("/unverified", get(notification::list_unverified))
        .route("/verified", get(notification::list_verified))
}
