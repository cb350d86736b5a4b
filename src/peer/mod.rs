//! Peer networking
//!
//! - `protocol`: versioned wire contract between nodes
//! - `client`: outbound forwarded reads (`PeerTransport`)
//! - `http`: inbound router (peer reads, consumer reads, health, stats)
//! - `server`: binds and runs a node

pub mod client;
pub mod http;
pub mod protocol;
pub mod server;

pub use client::{HttpPeerTransport, PeerTransport};
pub use server::CacheNode;
