//! Error responses and axum `IntoResponse` implementation.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use finvue_core::DataError;
use serde_json::{Value, json};
use thiserror::Error;

/// Upstream answered with an error status.
pub const UPSTREAM_ERROR: &str = "Error fetching data from SEC API";
/// Upstream could not be reached.
pub const NO_RESPONSE: &str = "No response received from SEC API";
/// The request to the upstream could not be built.
pub const SETUP_ERROR: &str = "Error setting up request to SEC API";
/// The gateway's own throttle fired.
pub const TOO_MANY_REQUESTS: &str = "Too many requests, please try again later.";
/// The caller's origin is not allowed.
pub const FORBIDDEN_ORIGIN: &str = "Origin not allowed";

/// A [`DataError`] on its way out of a handler.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub DataError);

/// The upstream body as JSON when it parses, else as a string.
fn details(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            DataError::UpstreamError { status, body, url } => (
                status_code(status),
                Json(json!({
                    "error": UPSTREAM_ERROR,
                    "details": details(&body),
                    "status": status,
                    "url": url,
                })),
            )
                .into_response(),
            DataError::NotFound { url, body } => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": UPSTREAM_ERROR,
                    "details": details(&body),
                    "status": 404,
                    "url": url,
                })),
            )
                .into_response(),
            DataError::UpstreamUnavailable(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": NO_RESPONSE, "details": msg })),
            )
                .into_response(),
            DataError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": SETUP_ERROR, "details": msg })),
            )
                .into_response(),
            DataError::RateLimited { retry_after } => {
                let mut res = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": TOO_MANY_REQUESTS, "status": 429 })),
                )
                    .into_response();
                if let Some(wait) = retry_after {
                    // whole seconds, rounded up
                    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                    res.headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                }
                res
            }
            DataError::InvalidParameter(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request", "details": msg, "status": 400 })),
            )
                .into_response(),
            DataError::Parse(msg) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Invalid response from SEC API", "details": msg, "status": 502 })),
            )
                .into_response(),
            DataError::Cache(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal error", "details": msg })),
            )
                .into_response(),
        }
    }
}
