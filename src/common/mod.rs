//! Common utilities and types shared across repocache

pub mod config;
pub mod error;
pub mod hash;
pub mod tracing_middleware;
pub mod utils;

pub use config::{CacheConfig, Config, NodeConfig, OriginConfig};
pub use error::{Error, Result};
pub use hash::{ring_hash, ConsistentHashRing};
pub use utils::{encode_key, format_bytes, parse_duration, validate_key};
