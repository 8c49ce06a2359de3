//! Origin restriction, CORS and security response headers.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::{AppState, error::FORBIDDEN_ORIGIN};

/// Standard hardening headers set on every response.
const HARDENING_HEADERS: [(&str, &str); 11] = [
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Rejects requests whose `Origin` is neither the frontend nor the gateway
/// itself. Requests without an `Origin` header pass.
pub async fn check_origin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let allowed = origin == state.frontend_origin() || origin == state.backend_origin();
        if !allowed {
            warn!(origin = ?origin, path = %req.uri().path(), "Rejected request from unknown origin");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": FORBIDDEN_ORIGIN, "status": 403 })),
            )
                .into_response();
        }
    }
    next.run(req).await
}

/// CORS restricted to the configured frontend origin.
#[must_use]
pub fn cors_layer(frontend_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_methods([Method::GET])
}

/// Adds the hardening headers, keeping any a handler already set.
pub async fn hardening_headers(mut res: Response) -> Response {
    let headers = res.headers_mut();
    for (name, value) in HARDENING_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert(HeaderValue::from_static(value));
    }
    res
}
