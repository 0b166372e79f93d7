//! Handlers for the `/notifications` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use relay_core::NotificationRecord;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for `POST /notifications`.
///
/// A missing `message` is read as the empty string.
#[derive(Debug, Deserialize)]
pub struct CreateNotification {
    #[serde(default)]
    pub message: String,
}

/// POST /notifications
///
/// Store a new unverified notification, announce it on the bus and return
/// the created record.
pub async fn create_notification(
    State(state): State<AppState>,
    body: Result<Json<CreateNotification>, JsonRejection>,
) -> AppResult<Json<NotificationRecord>> {
    let Json(input) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let record = state.lifecycle.create(input.message).await?;
    Ok(Json(record))
}

/// PUT /notifications/verify/{id}
///
/// Move a notification to the verified sequence. Returns 200 with an empty
/// body, or 404 if no unverified notification has that id.
pub async fn verify_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.lifecycle.verify(&id).await?;
    Ok(StatusCode::OK)
}

/// GET /notifications/unverified
pub async fn list_unverified(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<NotificationRecord>>> {
    Ok(Json(state.lifecycle.list_unverified().await?))
}

/// GET /notifications/verified
pub async fn list_verified(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<NotificationRecord>>> {
    Ok(Json(state.lifecycle.list_verified().await?))
}
