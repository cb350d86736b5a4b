//! Distributed cache
//!
//! - `key`: wire key = resource id + optional freshness token
//! - `store`: byte-bounded LRU
//! - `peers` / `router`: static membership and consistent-hash ownership
//! - `coalesce`: one in-flight load per key
//! - `loader`: origin access
//! - `group`: the orchestrating read path

pub mod coalesce;
pub mod group;
pub mod key;
pub mod loader;
pub mod peers;
pub mod router;
pub mod stats;
pub mod store;

pub use group::{CacheGroup, GroupOptions};
pub use key::CacheKey;
pub use loader::{loader_fn, HttpLoader, Loader};
pub use peers::{Peer, PeerSet};
pub use router::{Ownership, OwnershipRouter};
pub use store::LocalStore;
