//! # repocache
//!
//! A sharded read-through cache for repository metadata, shared by a small
//! cluster of probe nodes:
//! - Consistent-hash ownership: each key has one owner that loads it
//! - Request coalescing: one origin load per key at a time, per node
//! - Freshness tokens in keys instead of TTLs
//! - Byte-bounded LRU local store
//!
//! ## Architecture
//!
//! ```text
//!        probe handler
//!             │ get("…/x86_64-repodata{{1700000000}}")
//!   ┌─────────▼──────────┐   forwarded read (HTTP)   ┌────────────────────┐
//!   │ Node A             │ ────────────────────────► │ Node B (owner)     │
//!   │  store miss        │                           │  store / coalescer │
//!   │  coalescer ─ owner?│ ◄──────────────────────── │  loader ─► origin  │
//!   └────────────────────┘        blob / error       └────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a node
//! ```bash
//! repocache-node serve \
//!   --bind 0.0.0.0:7070 \
//!   --self-url http://probe-1:7070 \
//!   --peers http://probe-1:7070,http://probe-2:7070,http://probe-3:7070 \
//!   --origin https://repo-default.voidlinux.org/current
//! ```
//!
//! ### Embed a group
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use repocache::cache::{loader_fn, CacheGroup, CacheKey, GroupOptions, PeerSet};
//! use repocache::peer::HttpPeerTransport;
//!
//! # async fn demo() -> repocache::Result<()> {
//! let options = GroupOptions::default();
//! let group = CacheGroup::new(
//!     "repodata",
//!     PeerSet::local("http://127.0.0.1:7070")?,
//!     Arc::new(loader_fn(|id: String| async move { Ok(Bytes::from(id)) })),
//!     Arc::new(HttpPeerTransport::new(options.peer_timeout)?),
//!     options,
//! );
//! let key = CacheKey::new("x86_64-repodata").with_epoch(1_700_000_000 / 300);
//! let blob = group.get(&key.to_wire()).await?;
//! # let _ = blob;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod common;
pub mod peer;

// Re-export commonly used types
pub use cache::{CacheGroup, CacheKey, GroupOptions};
pub use common::{Config, Error, Result};
pub use peer::CacheNode;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
