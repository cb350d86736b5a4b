//! Request tracing middleware for the node's HTTP router
//!
//! - Propagates `X-Request-ID` (a forwarding peer sends one; otherwise a new
//!   one is generated) so the forwarder's and the owner's logs line up
//! - One `http_request` span per request
//! - Completion log with status and latency

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Generate a new unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Middleware that adds request ID and structured logging to each request
pub async fn request_tracing_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(generate_request_id);

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let _entered = span.enter();
    if status.is_success() {
        info!(status = status.as_u16(), duration_ms, "Request completed");
    } else if status.is_client_error() {
        warn!(status = status.as_u16(), duration_ms, "Client error");
    } else {
        warn!(status = status.as_u16(), duration_ms, "Server error");
    }

    response
}
