//! Static peer registry

use crate::common::Result;
use serde::Serialize;
use std::fmt;

/// Base URL of one cluster member, e.g. `http://probe-2:7070`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Peer(String);

impl Peer {
    /// Trailing slashes are dropped so `http://a/` and `http://a` are the
    /// same peer.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref().trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(crate::Error::InvalidConfig("empty peer address".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::Error::InvalidConfig(format!(
                "peer address must be an http(s) URL: {}",
                url
            )));
        }
        Ok(Self(url.to_string()))
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable cluster membership: every peer plus which one is this process.
///
/// All nodes must be started with the same set. Nothing checks this at
/// runtime.
#[derive(Debug, Clone)]
pub struct PeerSet {
    peers: Vec<Peer>,
    self_index: usize,
}

impl PeerSet {
    /// Build from the full peer list and this node's own URL.
    ///
    /// An empty list means a single-node (local-only) deployment.
    pub fn new<I, S>(peers: I, self_url: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let me = Peer::new(self_url)?;
        let mut list = Vec::new();
        for url in peers {
            let peer = Peer::new(url)?;
            if list.contains(&peer) {
                return Err(crate::Error::InvalidConfig(format!(
                    "duplicate peer {}",
                    peer
                )));
            }
            list.push(peer);
        }
        if list.is_empty() {
            list.push(me.clone());
        }

        let self_index = list.iter().position(|p| *p == me).ok_or_else(|| {
            crate::Error::InvalidConfig(format!("peer list does not contain self ({})", me))
        })?;

        Ok(Self {
            peers: list,
            self_index,
        })
    }

    /// Set containing only this node
    pub fn local(self_url: &str) -> Result<Self> {
        Self::new(std::iter::empty::<&str>(), self_url)
    }

    pub fn me(&self) -> &Peer {
        &self.peers[self.self_index]
    }

    pub fn is_self(&self, peer: &Peer) -> bool {
        peer == self.me()
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Look a peer up by URL
    pub fn find(&self, url: &str) -> Option<&Peer> {
        let url = url.trim_end_matches('/');
        self.peers.iter().find(|p| p.url() == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_marker() {
        let set = PeerSet::new(
            ["http://a:7070", "http://b:7070/", "http://c:7070"],
            "http://b:7070",
        )
        .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.me().url(), "http://b:7070");
        assert!(set.is_self(&Peer::new("http://b:7070/").unwrap()));
        assert!(!set.is_self(&Peer::new("http://a:7070").unwrap()));
    }

    #[test]
    fn test_missing_self_rejected() {
        let result = PeerSet::new(["http://a:7070", "http://c:7070"], "http://b:7070");
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let result = PeerSet::new(["http://a:7070", "http://a:7070/"], "http://a:7070");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_list_is_local_only() {
        let set = PeerSet::local("http://solo:7070").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.me().url(), "http://solo:7070");
    }

    #[test]
    fn test_bad_urls() {
        assert!(Peer::new("").is_err());
        assert!(Peer::new("probe-1:7070").is_err());
    }
}
