//! Hashing utilities for repocache
//!
//! - BLAKE3 for stable, process-independent key hashing
//! - Consistent hash ring with virtual nodes for ownership

use std::collections::BTreeMap;

/// Default number of ring positions per node
pub const DEFAULT_VIRTUAL_NODES: usize = 50;

/// Hash a string to a point on the ring.
///
/// BLAKE3 rather than `DefaultHasher` so that every process in the cluster
/// computes the same point for the same input.
pub fn ring_hash(data: &str) -> u64 {
    let hash = blake3::hash(data.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(prefix)
}

/// Consistent hash ring
///
/// Each node is placed at `virtual_nodes` positions derived from
/// `"{index}-{node}"`. A key belongs to the first position clockwise from its
/// own hash. Removing a node only moves the keys that node owned.
#[derive(Debug, Clone)]
pub struct ConsistentHashRing {
    virtual_nodes: usize,
    positions: BTreeMap<u64, String>,
}

impl ConsistentHashRing {
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            positions: BTreeMap::new(),
        }
    }

    /// Build a ring holding all `nodes`
    pub fn with_nodes<I, S>(virtual_nodes: usize, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = Self::new(virtual_nodes);
        for node in nodes {
            ring.add_node(node.as_ref());
        }
        ring
    }

    /// Place a node on the ring
    pub fn add_node(&mut self, node: &str) {
        for i in 0..self.virtual_nodes {
            let point = ring_hash(&format!("{}-{}", i, node));
            // On a (vanishingly rare) collision the lexicographically smaller
            // node keeps the point, so insertion order never matters.
            match self.positions.get(&point) {
                Some(existing) if existing.as_str() <= node => {}
                _ => {
                    self.positions.insert(point, node.to_string());
                }
            }
        }
    }

    /// Take a node off the ring
    pub fn remove_node(&mut self, node: &str) {
        self.positions.retain(|_, owner| owner != node);
    }

    /// Node responsible for a key, `None` on an empty ring
    pub fn get_node(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }
        let point = ring_hash(key);
        self.positions
            .range(point..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, node)| node.as_str())
    }

    /// Number of positions on the ring
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
