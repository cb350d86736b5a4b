//! Cache node binary

use clap::{Parser, Subcommand};
use repocache::{CacheNode, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repocache-node")]
#[command(about = "repocache node: sharded, coalescing cache for repository metadata")]
#[command(version = repocache::VERSION)]
struct Cli {
    /// Config file (defaults to $REPOCACHE_CONFIG, then ./repocache.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cache node
    Serve {
        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// URL other peers use to reach this node
        #[arg(long)]
        self_url: Option<String>,

        /// All peer URLs including this node (comma-separated)
        #[arg(long, value_delimiter = ',')]
        peers: Vec<String>,

        /// Cache group name
        #[arg(long)]
        group: Option<String>,

        /// Local store budget in bytes (0 disables caching)
        #[arg(long)]
        capacity: Option<i64>,

        /// Origin base URL for non-URL resource ids
        #[arg(long)]
        origin: Option<String>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file, then override with CLI arguments
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve {
            bind,
            self_url,
            peers,
            group,
            capacity,
            origin,
            log_level,
        } => {
            if let Some(bind) = bind {
                config.node.bind_addr = bind;
            }
            if let Some(self_url) = self_url {
                config.node.self_url = self_url;
            }
            if !peers.is_empty() {
                config.node.peers = peers;
            }
            if let Some(group) = group {
                config.cache.group = group;
            }
            if let Some(capacity) = capacity {
                config.cache.capacity_bytes = capacity;
            }
            if origin.is_some() {
                config.origin.base_url = origin;
            }
            if let Some(log_level) = log_level {
                config.log_level = log_level;
            }

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.clone().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            tracing::info!("repocache {}", repocache::BUILD_INFO);
            config.validate()?;
            CacheNode::new(config).serve().await?;
        }
    }

    Ok(())
}
