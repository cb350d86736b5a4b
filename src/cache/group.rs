//! Cache group: the read path
//!
//! ```text
//! get(key)
//!   ├─ local store hit ───────────────────────────────► value
//!   └─ miss ─► coalescer(key) ─┬─ owner is self ─► loader(resource_id) ─► store ─► value
//!                              └─ owner is peer ─► transport(peer, key) ─► store? ─► value
//! ```
//!
//! Errors are handed to every waiter of the failed load and never stored.
//! Nothing is retried here.

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::coalesce::Coalescer;
use crate::cache::key::CacheKey;
use crate::cache::loader::Loader;
use crate::cache::peers::PeerSet;
use crate::cache::router::{Ownership, OwnershipRouter};
use crate::cache::stats::{CacheStats, StatsSnapshot};
use crate::cache::store::LocalStore;
use crate::common::config::CacheConfig;
use crate::common::hash::DEFAULT_VIRTUAL_NODES;
use crate::common::utils::validate_key;
use crate::common::Result;
use crate::peer::PeerTransport;

/// Tunables fixed at construction
#[derive(Debug, Clone)]
pub struct GroupOptions {
    /// Byte budget of the local store; zero or negative disables caching
    pub capacity_bytes: i64,
    pub virtual_nodes: usize,
    /// Keep a local replica of values fetched from their owner
    pub populate_from_peers: bool,
    pub loader_timeout: Duration,
    /// Deadline for a forwarded call. Must exceed the owner's
    /// `loader_timeout`, or a slow but successful origin load shows up as
    /// an unavailable owner.
    pub peer_timeout: Duration,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 << 20,
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            populate_from_peers: true,
            loader_timeout: Duration::from_secs(10),
            peer_timeout: Duration::from_secs(15),
        }
    }
}

impl GroupOptions {
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            capacity_bytes: config.capacity_bytes,
            virtual_nodes: config.virtual_nodes,
            populate_from_peers: config.populate_from_peers,
            loader_timeout: config.loader_timeout()?,
            peer_timeout: config.peer_timeout()?,
        })
    }
}

/// A named, sharded, read-through cache shared by the cluster.
///
/// Build one per process and share it behind an `Arc`.
pub struct CacheGroup {
    name: String,
    store: Arc<LocalStore>,
    coalescer: Coalescer<Bytes>,
    router: OwnershipRouter,
    loader: Arc<dyn Loader>,
    transport: Arc<dyn PeerTransport>,
    options: GroupOptions,
    stats: Arc<CacheStats>,
}

impl CacheGroup {
    pub fn new(
        name: impl Into<String>,
        peers: PeerSet,
        loader: Arc<dyn Loader>,
        transport: Arc<dyn PeerTransport>,
        options: GroupOptions,
    ) -> Self {
        let name = name.into();
        tracing::info!(
            group = %name,
            me = %peers.me(),
            peers = peers.len(),
            capacity_bytes = options.capacity_bytes,
            "cache group created"
        );
        Self {
            name,
            store: Arc::new(LocalStore::new(options.capacity_bytes)),
            coalescer: Coalescer::new(),
            router: OwnershipRouter::new(peers, options.virtual_nodes),
            loader,
            transport,
            options,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peers(&self) -> &PeerSet {
        self.router.peers()
    }

    pub fn owner_of(&self, key: &str) -> Ownership {
        self.router.owner_of(key)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Value of `key`, from the local store, the loader or the owning peer.
    ///
    /// Dropping the returned future only detaches this caller. A load it
    /// started keeps running and still fills the cache.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        validate_key(key)?;
        self.stats.gets.inc();

        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }
        let ownership = self.router.owner_of(key);
        self.load(key, ownership).await
    }

    /// Inbound path for requests forwarded by other peers.
    ///
    /// Only answers keys this node owns and never forwards again, so a
    /// request crosses at most one hop even if peers disagree on membership.
    pub async fn serve_owned(&self, key: &str) -> Result<Bytes> {
        validate_key(key)?;
        self.stats.server_requests.inc();

        if !self.router.owner_of(key).is_local() {
            tracing::warn!(
                group = %self.name,
                key = %key,
                owner = %self.router.owner_peer(key),
                "forwarded request for a key owned elsewhere; check peer lists"
            );
            return Err(crate::Error::NotOwner {
                key: key.to_string(),
            });
        }

        self.stats.gets.inc();
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }
        self.load(key, Ownership::Local).await
    }

    /// Counters and store gauges right now
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.stats.gets.get(),
            hits: self.stats.hits.get(),
            loads: self.stats.loads.get(),
            coalesced: self.stats.coalesced.get(),
            local_loads: self.stats.local_loads.get(),
            local_load_errors: self.stats.local_load_errors.get(),
            peer_loads: self.stats.peer_loads.get(),
            peer_errors: self.stats.peer_errors.get(),
            server_requests: self.stats.server_requests.get(),
            items: self.store.len(),
            bytes: self.store.bytes(),
            capacity_bytes: self.store.capacity(),
            evictions: self.store.evictions(),
            in_flight: self.coalescer.in_flight(),
        }
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let value = self.store.get(key)?;
        self.stats.hits.inc();
        tracing::debug!(group = %self.name, key = %key, "cache hit");
        Some(value)
    }

    async fn load(&self, key: &str, ownership: Ownership) -> Result<Bytes> {
        self.stats.loads.inc();
        let work = self.produce(key.to_string(), ownership);
        let flight = self.coalescer.run(key, move || work).await;
        if flight.joined {
            self.stats.coalesced.inc();
            tracing::debug!(group = %self.name, key = %key, "joined in-flight load");
        }
        flight.result
    }

    /// The load itself. Owns everything it touches so it can outlive the
    /// caller that started it.
    fn produce(
        &self,
        key: String,
        ownership: Ownership,
    ) -> impl Future<Output = Result<Bytes>> + Send + 'static {
        let group = self.name.clone();
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let loader = Arc::clone(&self.loader);
        let transport = Arc::clone(&self.transport);
        let options = self.options.clone();

        async move {
            // A load that finished right before this one was registered may
            // already have filled the store.
            if let Some(value) = store.get(&key) {
                return Ok(value);
            }

            match ownership {
                Ownership::Local => {
                    let resource_id = CacheKey::parse(&key)?.resource_id;
                    stats.local_loads.inc();
                    tracing::debug!(group = %group, key = %key, resource_id = %resource_id, "loading from origin");

                    let result =
                        match tokio::time::timeout(options.loader_timeout, loader.load(&resource_id))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(crate::Error::Timeout(format!(
                                "loading {} exceeded {:?}",
                                resource_id, options.loader_timeout
                            ))),
                        };

                    match result {
                        Ok(value) => {
                            store.set(&key, value.clone());
                            Ok(value)
                        }
                        Err(e) => {
                            stats.local_load_errors.inc();
                            tracing::warn!(group = %group, key = %key, error = %e, "origin load failed");
                            Err(e)
                        }
                    }
                }
                Ownership::Remote(peer) => {
                    stats.peer_loads.inc();
                    tracing::debug!(group = %group, key = %key, owner = %peer, "fetching from owner");

                    let result = match tokio::time::timeout(
                        options.peer_timeout,
                        transport.fetch(&peer, &group, &key),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(crate::Error::PeerUnavailable {
                            peer: peer.to_string(),
                            reason: format!("no answer within {:?}", options.peer_timeout),
                        }),
                    };

                    match result {
                        Ok(value) => {
                            if options.populate_from_peers {
                                store.set(&key, value.clone());
                            }
                            Ok(value)
                        }
                        Err(e) => {
                            stats.peer_errors.inc();
                            tracing::warn!(group = %group, key = %key, owner = %peer, error = %e, "owner fetch failed");
                            Err(e)
                        }
                    }
                }
            }
        }
    }
}
