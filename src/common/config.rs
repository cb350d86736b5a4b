//! Configuration for a repocache node
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. TOML file named by `REPOCACHE_CONFIG` (default `repocache.toml`, optional)
//! 3. `REPOCACHE__SECTION__FIELD` environment variables
//!
//! The node binary applies its CLI flags on top.

use crate::common::utils::parse_duration;
use crate::common::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "REPOCACHE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "repocache.toml";
const ENV_PREFIX: &str = "REPOCACHE";

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub cache: CacheConfig,
    pub origin: OriginConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Cluster membership of this node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Bind address for the HTTP listener
    pub bind_addr: SocketAddr,

    /// Base URL other peers use to reach this node
    pub self_url: String,

    /// Every peer base URL, this node included
    pub peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7070)),
            self_url: "http://127.0.0.1:7070".to_string(),
            peers: Vec::new(),
        }
    }
}

/// Cache group settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Group name, part of the peer URL
    pub group: String,

    /// Byte budget of the local store; zero or negative disables caching
    pub capacity_bytes: i64,

    /// Ring positions per peer
    pub virtual_nodes: usize,

    /// Keep a local copy of values fetched from their owner
    pub populate_from_peers: bool,

    /// Deadline for one Loader invocation, e.g. "10s"
    pub loader_timeout: String,

    /// Deadline for one forwarded peer call, e.g. "15s". Must be longer
    /// than `loader_timeout`.
    pub peer_timeout: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            group: "repodata".to_string(),
            capacity_bytes: 64 << 20,
            virtual_nodes: crate::common::hash::DEFAULT_VIRTUAL_NODES,
            populate_from_peers: true,
            loader_timeout: "10s".to_string(),
            peer_timeout: "15s".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn loader_timeout(&self) -> Result<Duration> {
        parse_duration(&self.loader_timeout)
    }

    pub fn peer_timeout(&self) -> Result<Duration> {
        parse_duration(&self.peer_timeout)
    }
}

/// Origin the default HTTP loader fetches from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Prefix joined with the resource id; absolute-URL resource ids ignore it
    pub base_url: Option<String>,

    /// Per-request timeout of the origin HTTP client
    pub timeout: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: "10s".to_string(),
        }
    }
}

impl OriginConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }
}

impl Config {
    /// Load from the file named by `REPOCACHE_CONFIG` plus the environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from an explicit file path plus the environment.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("node.peers")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations the node cannot run with.
    ///
    /// A non-positive capacity is accepted: it only disables caching.
    pub fn validate(&self) -> Result<()> {
        if self.node.self_url.trim().is_empty() {
            return Err(crate::Error::InvalidConfig("node.self_url is empty".into()));
        }
        let self_url = normalize(&self.node.self_url);
        if !self.node.peers.is_empty() && !self.node.peers.iter().any(|p| normalize(p) == self_url)
        {
            return Err(crate::Error::InvalidConfig(format!(
                "node.peers does not contain node.self_url ({})",
                self.node.self_url
            )));
        }
        if self.cache.group.is_empty() || self.cache.group.contains('/') {
            return Err(crate::Error::InvalidConfig(format!(
                "invalid cache.group {:?}",
                self.cache.group
            )));
        }
        let loader_timeout = self.cache.loader_timeout()?;
        let peer_timeout = self.cache.peer_timeout()?;
        for (name, timeout) in [
            ("cache.loader_timeout", loader_timeout),
            ("cache.peer_timeout", peer_timeout),
            ("origin.timeout", self.origin.timeout()?),
        ] {
            if timeout.is_zero() {
                return Err(crate::Error::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        // The owner spends up to loader_timeout on the origin before it can
        // answer a forwarded call.
        if peer_timeout <= loader_timeout {
            return Err(crate::Error::InvalidConfig(format!(
                "cache.peer_timeout ({:?}) must be longer than cache.loader_timeout ({:?})",
                peer_timeout, loader_timeout
            )));
        }
        Ok(())
    }
}

fn normalize(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}
