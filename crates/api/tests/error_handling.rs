//! Tests for `AppError` → HTTP response mapping.
//!
//! These tests verify that each `AppError` variant produces the correct HTTP
//! status code, error code, and message. They do NOT need an HTTP server --
//! they call `IntoResponse` directly on `AppError` values.

use axum::response::IntoResponse;
use http_body_util::BodyExt;
use relay_api::error::AppError;
use relay_api::notifications::LifecycleError;
use relay_core::error::CoreError;
use relay_store::StoreError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (axum::http::StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::NotFound maps to 404 with NOT_FOUND code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Notification",
        id: "42".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Notification with id 42 not found");
}

// ---------------------------------------------------------------------------
// Test: LifecycleError::NotFound converts to the same 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_not_found_returns_404() {
    let err = AppError::from(LifecycleError::NotFound("7".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Notification with id 7 not found");
}

// ---------------------------------------------------------------------------
// Test: AppError::BadRequest maps to 400 with BAD_REQUEST code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("invalid field value".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "invalid field value");
}

// ---------------------------------------------------------------------------
// Test: store errors map to 500 and hide the backend detail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_error_returns_500_and_sanitizes_message() {
    let err = AppError::from(LifecycleError::Storage(StoreError::Unavailable(
        "redis://secret-host:6379 refused".into(),
    )));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "STORAGE_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("secret-host"));
}

// ---------------------------------------------------------------------------
// Test: encode failures map to 500 and hide the serializer detail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn encode_error_returns_500_and_sanitizes_message() {
    let encode_err = serde_json::from_str::<u8>("\"secret\"").unwrap_err();
    let err = AppError::from(LifecycleError::Encode(encode_err));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
