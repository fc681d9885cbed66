//! # TKA - Tailscale-authenticated ephemeral Kubernetes access
//!
//! The collaborator binary around the `tka-gossip` cluster-membership
//! engine: an HTTP API fronted by Tailscale identity headers, a stub
//! ServiceAccount minter, and a terminal dashboard for operators.
//!
//! ## Architecture
//! ```text
//! Tailscale -> tka (HTTP API) -> tka-gossip (membership) -> K8s (stub)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tka_gossip::{GossipClient, StoreBuilder};

mod auth;
mod config;
mod dashboard;
mod k8s;
mod payload;
mod routes;
mod state;

use config::{AppConfig, ConfigOverrides};
use payload::ClusterNodeInfo;
use state::AppState;

/// TKA - ephemeral Kubernetes access over a gossiping cluster
#[derive(Parser, Debug)]
#[command(name = "tka")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config/tka.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, global = true, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and gossip engine.
    Serve {
        /// HTTP listen address (overrides config)
        #[arg(short, long, env = "LISTEN_ADDR")]
        listen: Option<String>,

        /// Gossip bind address (overrides config)
        #[arg(long, env = "GOSSIP_ADDR")]
        gossip_addr: Option<String>,

        /// Bootstrap peer address; may be repeated
        #[arg(long = "peer")]
        bootstrap_peers: Vec<String>,
    },
    /// Poll a running node's memberlist and render it as a live table.
    Members {
        /// Base URL of the node to poll, e.g. http://127.0.0.1:7900
        #[arg(short, long, default_value = "http://127.0.0.1:7900")]
        url: String,

        /// Poll interval in seconds
        #[arg(long, default_value_t = 2)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    match args.command {
        Command::Serve {
            listen,
            gossip_addr,
            bootstrap_peers,
        } => {
            serve(
                &args.config,
                ConfigOverrides {
                    listen_addr: listen,
                    gossip_addr,
                    bootstrap_peers,
                },
            )
            .await
        }
        Command::Members { url, interval_secs } => dashboard::run(&url, interval_secs).await,
    }
}

async fn serve(config_path: &str, overrides: ConfigOverrides) -> Result<()> {
    info!("starting tka v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(config_path, &overrides).context("failed to load config")?;
    info!(path = %config_path, "configuration loaded");

    let local_state = ClusterNodeInfo {
        tailscale_ip: config.gossip_addr.clone(),
        k8s_namespace: config.k8s_namespace.clone(),
        advertised_role: config.advertised_role.clone(),
        capacity_hint: 100,
    };

    let store = Arc::new(
        StoreBuilder::new(config.gossip_addr.clone())
            .with_local_state(local_state)
            .with_resurrection_threshold(config.gossip.resurrection_threshold())
            .build(),
    );

    let gossip_listener = tokio::net::TcpListener::bind(&config.gossip_addr)
        .await
        .with_context(|| format!("failed to bind gossip address {}", config.gossip_addr))?;
    info!(addr = %config.gossip_addr, "gossip listener bound");

    let mut gossip_builder = GossipClient::new(store.clone(), gossip_listener)
        .with_gossip_interval(config.gossip.interval())
        .with_gossip_factor(config.gossip.fanout)
        .with_staleness_threshold(config.gossip.staleness_threshold)
        .with_dead_threshold(config.gossip.dead_threshold);
    for peer in &config.gossip.bootstrap_peers {
        gossip_builder = gossip_builder.with_bootstrap_peer(peer.clone());
    }
    let gossip_client = gossip_builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build gossip client: {e}"))?;

    let shutdown = CancellationToken::new();
    let gossip_shutdown = shutdown.clone();
    let gossip_task = tokio::spawn(async move { gossip_client.start(gossip_shutdown).await });

    let state = AppState::new(config.clone(), store);
    state.mark_ready();

    let app = routes::create_router(state);
    let http_listener: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen_addr))?;
    let http_listener = tokio::net::TcpListener::bind(http_listener)
        .await
        .with_context(|| format!("failed to bind HTTP address {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "HTTP listener bound");

    let http_shutdown = shutdown.clone();
    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("shutdown signal received");
        http_shutdown.cancel();
    };

    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("HTTP server error")?;

    shutdown.cancel();
    gossip_task
        .await
        .context("gossip task panicked")?
        .map_err(|e| anyhow::anyhow!("gossip engine error: {e}"))?;

    info!("tka shutdown complete");
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
