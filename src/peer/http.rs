//! HTTP API of a cache node
//!
//! - `GET /_repocache/v1/:group?key=`: forwarded reads from other peers.
//!   Served only for keys this node owns and never forwarded again.
//! - `GET /get?key=`: consumer read, routed through the cache group.
//! - `GET /health`, `GET /stats`

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::cache::CacheGroup;
use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::Error;
use crate::peer::protocol::{
    HealthResponse, KeyQuery, StatsResponse, ENDPOINT_GET, ENDPOINT_HEALTH, ENDPOINT_PEER_GET,
    ENDPOINT_STATS, ERROR_KIND_HEADER, PROTOCOL_HEADER, PROTOCOL_VERSION,
};

/// Requests carry no body; anything beyond this is refused.
const MAX_REQUEST_BODY: usize = 4 * 1024;

#[derive(Clone)]
pub struct NodeState {
    pub group: Arc<CacheGroup>,
}

pub fn create_router(state: NodeState) -> Router {
    Router::new()
        .route(&format!("{}/:group", ENDPOINT_PEER_GET), get(peer_get))
        .route(ENDPOINT_GET, get(consumer_get))
        .route(ENDPOINT_HEALTH, get(health))
        .route(ENDPOINT_STATS, get(stats))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_tracing_middleware))
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY)),
        )
        .with_state(state)
}

fn with_protocol(mut response: Response) -> Response {
    response.headers_mut().insert(
        HeaderName::from_static(PROTOCOL_HEADER),
        HeaderValue::from(PROTOCOL_VERSION),
    );
    response
}

fn value_response(value: Bytes) -> Response {
    with_protocol(
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value,
        )
            .into_response(),
    )
}

fn error_response(error: Error) -> Response {
    with_protocol(
        (
            error.to_http_status(),
            [(HeaderName::from_static(ERROR_KIND_HEADER), error.kind())],
            error.message(),
        )
            .into_response(),
    )
}

fn to_response(result: crate::Result<Bytes>) -> Response {
    match result {
        Ok(value) => value_response(value),
        Err(e) => error_response(e),
    }
}

fn required_key(query: KeyQuery) -> crate::Result<String> {
    query
        .key
        .ok_or_else(|| Error::InvalidKey("missing key parameter".into()))
}

/// Forwarded read from another peer
async fn peer_get(
    State(state): State<NodeState>,
    Path(group): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Response {
    if group != state.group.name() {
        return error_response(Error::NotFound(format!("unknown group {}", group)));
    }
    let key = match required_key(query) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };
    to_response(state.group.serve_owned(&key).await)
}

/// Consumer read
async fn consumer_get(State(state): State<NodeState>, Query(query): Query<KeyQuery>) -> Response {
    let key = match required_key(query) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };
    to_response(state.group.get(&key).await)
}

async fn health(State(state): State<NodeState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        node: state.group.peers().me().to_string(),
        group: state.group.name().to_string(),
        peers: state.group.peers().len(),
        protocol: PROTOCOL_VERSION,
    })
}

async fn stats(State(state): State<NodeState>) -> impl IntoResponse {
    Json(StatsResponse {
        node: state.group.peers().me().to_string(),
        group: state.group.name().to_string(),
        stats: state.group.stats(),
    })
}
