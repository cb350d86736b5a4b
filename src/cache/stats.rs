//! Cache group counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for tracking event counts
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Live counters of one cache group
#[derive(Debug, Default)]
pub struct CacheStats {
    /// `get` calls, consumer and peer-serving paths alike
    pub gets: Counter,
    /// answered from the local store
    pub hits: Counter,
    /// misses that entered the coalescer
    pub loads: Counter,
    /// misses that joined a load already in flight
    pub coalesced: Counter,
    /// loader invocations
    pub local_loads: Counter,
    pub local_load_errors: Counter,
    /// forwarded calls to an owner
    pub peer_loads: Counter,
    pub peer_errors: Counter,
    /// requests received from other peers
    pub server_requests: Counter,
}

/// Point-in-time copy of the counters plus store gauges
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub hits: u64,
    pub loads: u64,
    pub coalesced: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub server_requests: u64,
    pub items: usize,
    pub bytes: u64,
    pub capacity_bytes: i64,
    pub evictions: u64,
    pub in_flight: usize,
}
