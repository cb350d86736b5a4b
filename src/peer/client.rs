//! Outbound side of the peer protocol

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::cache::peers::Peer;
use crate::common::tracing_middleware::{generate_request_id, REQUEST_ID_HEADER};
use crate::common::Result;
use crate::peer::protocol::{peer_get_url, ERROR_KIND_HEADER, PROTOCOL_HEADER, PROTOCOL_VERSION};

/// Asks the owner of a key for its value.
///
/// Implementations return the owner's answer unchanged: its value, or the
/// error it reported. Failing to get an answer at all is
/// [`crate::Error::PeerUnavailable`]. Never try another peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn fetch(&self, peer: &Peer, group: &str, key: &str) -> Result<Bytes>;
}

/// [`PeerTransport`] over HTTP
pub struct HttpPeerTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeerTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::InvalidConfig(format!("peer client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

fn unavailable(peer: &Peer, reason: impl Into<String>) -> crate::Error {
    crate::Error::PeerUnavailable {
        peer: peer.to_string(),
        reason: reason.into(),
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn fetch(&self, peer: &Peer, group: &str, key: &str) -> Result<Bytes> {
        let url = peer_get_url(peer, group, key);
        let request_id = generate_request_id();
        tracing::debug!(peer = %peer, key = %key, request_id = %request_id, "forwarding to owner");

        let response = self
            .client
            .get(&url)
            .header(REQUEST_ID_HEADER, &request_id)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unavailable(peer, e.to_string()))?;

        let version = response
            .headers()
            .get(PROTOCOL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        if version != Some(PROTOCOL_VERSION) {
            return Err(unavailable(
                peer,
                format!(
                    "protocol mismatch: expected {}, got {:?} (status {})",
                    PROTOCOL_VERSION,
                    version,
                    response.status()
                ),
            ));
        }

        let status = response.status();
        if status.is_success() {
            return response
                .bytes()
                .await
                .map_err(|e| unavailable(peer, format!("reading body: {}", e)));
        }

        let kind = response
            .headers()
            .get(ERROR_KIND_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let message = response.text().await.unwrap_or_default();
        match kind {
            Some(kind) => Err(crate::Error::from_wire(&kind, message, peer.url())),
            None => Err(unavailable(peer, format!("status {}: {}", status, message))),
        }
    }
}
