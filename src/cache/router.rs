//! Key ownership
//!
//! Every key has exactly one owner in the cluster: the peer that loads it
//! from the origin and holds the authoritative copy. Ownership is a pure
//! function of the peer set and the key, so all nodes configured with the
//! same peers agree without talking to each other.

use crate::cache::peers::{Peer, PeerSet};
use crate::common::ConsistentHashRing;

/// Who owns a key, from this node's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// This node owns the key and loads it itself
    Local,
    /// Another peer owns the key; ask it
    Remote(Peer),
}

impl Ownership {
    pub fn is_local(&self) -> bool {
        matches!(self, Ownership::Local)
    }
}

/// Maps keys to owners over a consistent hash ring.
pub struct OwnershipRouter {
    peers: PeerSet,
    ring: ConsistentHashRing,
}

impl OwnershipRouter {
    pub fn new(peers: PeerSet, virtual_nodes: usize) -> Self {
        let ring = ConsistentHashRing::with_nodes(virtual_nodes, peers.peers().iter().map(|p| p.url()));
        Self { peers, ring }
    }

    /// Owner of `key`
    pub fn owner_of(&self, key: &str) -> Ownership {
        if self.peers.len() == 1 {
            return Ownership::Local;
        }
        let owner = self
            .ring
            .get_node(key)
            .and_then(|url| self.peers.find(url));
        match owner {
            Some(peer) if !self.peers.is_self(peer) => Ownership::Remote(peer.clone()),
            // The ring is built from the peer set, so a lookup always hits.
            _ => Ownership::Local,
        }
    }

    /// Owning peer of `key` regardless of which node asks
    pub fn owner_peer(&self, key: &str) -> &Peer {
        match self.ring.get_node(key).and_then(|url| self.peers.find(url)) {
            Some(peer) => peer,
            None => self.peers.me(),
        }
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }
}
