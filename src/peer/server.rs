//! Cache node server

use std::sync::Arc;
use tokio::net::TcpListener;

use crate::cache::loader::{HttpLoader, Loader};
use crate::cache::peers::PeerSet;
use crate::cache::{CacheGroup, GroupOptions};
use crate::common::utils::format_bytes;
use crate::common::{Config, Result};
use crate::peer::client::HttpPeerTransport;
use crate::peer::http::{create_router, NodeState};

pub struct CacheNode {
    config: Config,
}

impl CacheNode {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build this node's cache group around `loader`.
    pub fn build_group(&self, loader: Arc<dyn Loader>) -> Result<Arc<CacheGroup>> {
        self.config.validate()?;
        let options = GroupOptions::from_config(&self.config.cache)?;
        let peers = PeerSet::new(&self.config.node.peers, &self.config.node.self_url)?;
        let transport = Arc::new(HttpPeerTransport::new(options.peer_timeout)?);

        Ok(Arc::new(CacheGroup::new(
            self.config.cache.group.clone(),
            peers,
            loader,
            transport,
            options,
        )))
    }

    /// Serve with the HTTP origin loader from `[origin]`
    pub async fn serve(self) -> Result<()> {
        let loader = Arc::new(HttpLoader::new(
            self.config.origin.base_url.clone(),
            self.config.origin.timeout()?,
        )?);
        self.serve_with_loader(loader).await
    }

    pub async fn serve_with_loader(self, loader: Arc<dyn Loader>) -> Result<()> {
        let group = self.build_group(loader)?;

        tracing::info!("Starting cache node: {}", group.peers().me());
        tracing::info!("  HTTP API: {}", self.config.node.bind_addr);
        tracing::info!("  Group: {}", group.name());
        tracing::info!("  Peers: {}", group.peers().len());
        if self.config.cache.capacity_bytes > 0 {
            tracing::info!(
                "  Capacity: {}",
                format_bytes(self.config.cache.capacity_bytes as u64)
            );
        }

        let listener = TcpListener::bind(self.config.node.bind_addr).await?;
        tracing::info!("✓ Cache node ready");

        run(listener, group, shutdown_signal()).await
    }
}

/// Serve `group` on an already bound listener until `shutdown` resolves.
pub async fn run<F>(listener: TcpListener, group: Arc<CacheGroup>, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = create_router(NodeState { group });
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
