//! Peer wire contract
//!
//! Forwarded reads are plain HTTP:
//!
//! ```text
//! GET /_repocache/v1/{group}?key={percent-encoded key}
//!
//! 200  body = blob                       x-repocache-protocol: 1
//! 4xx/5xx  body = message                x-repocache-protocol: 1
//!          x-repocache-error: <kind>     (see Error::kind)
//! ```
//!
//! The key travels in the query rather than the path: keys are opaque, and
//! path normalization would rewrite `.`, `..` or `\` before the owner sees
//! them.
//!
//! Bump [`PROTOCOL_VERSION`] together with the path prefix on any
//! incompatible change; clients reject responses with another version.

use serde::{Deserialize, Serialize};

use crate::cache::peers::Peer;
use crate::cache::stats::StatsSnapshot;
use crate::common::utils::encode_key;

pub const PROTOCOL_VERSION: u32 = 1;

/// Present on every peer response
pub const PROTOCOL_HEADER: &str = "x-repocache-protocol";
/// Error kind of a failed peer response
pub const ERROR_KIND_HEADER: &str = "x-repocache-error";

// --- API Endpoints ---

/// Internal endpoint answering forwarded reads from other peers.
pub const ENDPOINT_PEER_GET: &str = "/_repocache/v1";
/// Public endpoint for consumers (probe handlers).
pub const ENDPOINT_GET: &str = "/get";
pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_STATS: &str = "/stats";

/// Query parameter carrying the key on `ENDPOINT_PEER_GET` and `ENDPOINT_GET`
pub const KEY_PARAM: &str = "key";

/// URL of `key` in `group` on `peer`
pub fn peer_get_url(peer: &Peer, group: &str, key: &str) -> String {
    format!(
        "{}{}/{}?{}={}",
        peer.url(),
        ENDPOINT_PEER_GET,
        encode_key(group),
        KEY_PARAM,
        encode_key(key)
    )
}

/// Consumer URL of `key` on the node at `base_url`
pub fn get_url(base_url: &str, key: &str) -> String {
    format!(
        "{}{}?{}={}",
        base_url.trim_end_matches('/'),
        ENDPOINT_GET,
        KEY_PARAM,
        encode_key(key)
    )
}

/// Query string of `ENDPOINT_PEER_GET` and `ENDPOINT_GET`
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

/// Body of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node: String,
    pub group: String,
    pub peers: usize,
    pub protocol: u32,
}

/// Body of `GET /stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub node: String,
    pub group: String,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}
