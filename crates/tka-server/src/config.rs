//! Configuration management for the TKA server.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use tka_common::constants::{
    DEFAULT_ACCESS_GRANT_TTL_SECS, DEFAULT_DEAD_THRESHOLD, DEFAULT_GOSSIP_ADDR,
    DEFAULT_GOSSIP_FANOUT, DEFAULT_GOSSIP_INTERVAL_SECS, DEFAULT_LISTEN_ADDR,
    DEFAULT_RESURRECTION_THRESHOLD_MS, DEFAULT_STALENESS_THRESHOLD,
};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address for the collaborator API.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Gossip bind address (also the input to this node's deterministic
    /// `PeerId` derivation).
    #[serde(default = "default_gossip_addr")]
    pub gossip_addr: String,

    /// Kubernetes namespace the access-grant stub mints into.
    #[serde(default = "default_k8s_namespace")]
    pub k8s_namespace: String,

    /// This node's advertised role label in the memberlist.
    #[serde(default = "default_role")]
    pub advertised_role: String,

    /// Minted ServiceAccount grant TTL in seconds.
    #[serde(default = "default_access_grant_ttl")]
    pub access_grant_ttl_secs: u64,

    /// Gossip tuning.
    #[serde(default)]
    pub gossip: GossipSettings,
}

/// Gossip engine tuning, layered over `tka_gossip::GossipConfig`'s
/// defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct GossipSettings {
    #[serde(default = "default_gossip_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_fanout")]
    pub fanout: usize,

    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold: u32,

    #[serde(default = "default_dead_threshold")]
    pub dead_threshold: u32,

    #[serde(default = "default_resurrection_threshold_ms")]
    pub resurrection_threshold_ms: u64,

    /// Addresses of peers to gossip with before any real exchange has
    /// taught this node about them directly.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl GossipSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn resurrection_threshold(&self) -> Duration {
        Duration::from_millis(self.resurrection_threshold_ms)
    }
}

impl Default for GossipSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_gossip_interval_secs(),
            fanout: default_fanout(),
            staleness_threshold: default_staleness_threshold(),
            dead_threshold: default_dead_threshold(),
            resurrection_threshold_ms: default_resurrection_threshold_ms(),
            bootstrap_peers: Vec::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}
fn default_gossip_addr() -> String {
    DEFAULT_GOSSIP_ADDR.to_string()
}
fn default_k8s_namespace() -> String {
    "tka-access".to_string()
}
fn default_role() -> String {
    "member".to_string()
}
fn default_access_grant_ttl() -> u64 {
    DEFAULT_ACCESS_GRANT_TTL_SECS
}
fn default_gossip_interval_secs() -> u64 {
    DEFAULT_GOSSIP_INTERVAL_SECS
}
fn default_fanout() -> usize {
    DEFAULT_GOSSIP_FANOUT
}
fn default_staleness_threshold() -> u32 {
    DEFAULT_STALENESS_THRESHOLD
}
fn default_dead_threshold() -> u32 {
    DEFAULT_DEAD_THRESHOLD
}
fn default_resurrection_threshold_ms() -> u64 {
    DEFAULT_RESURRECTION_THRESHOLD_MS
}

impl AppConfig {
    /// Loads configuration from an optional TOML file, then applies CLI
    /// overrides.
    pub fn load(config_path: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("failed to load config file")?;

            settings
                .try_deserialize()
                .context("failed to parse config")?
        } else {
            tracing::warn!(path = %config_path, "config file not found, using defaults");
            Self::default()
        };

        if let Some(ref listen) = overrides.listen_addr {
            config.listen_addr = listen.clone();
        }
        if let Some(ref gossip) = overrides.gossip_addr {
            config.gossip_addr = gossip.clone();
        }
        for peer in &overrides.bootstrap_peers {
            config.gossip.bootstrap_peers.push(peer.clone());
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            gossip_addr: default_gossip_addr(),
            k8s_namespace: default_k8s_namespace(),
            advertised_role: default_role(),
            access_grant_ttl_secs: default_access_grant_ttl(),
            gossip: GossipSettings::default(),
        }
    }
}

/// CLI-supplied overrides, kept separate from `clap::Parser` so
/// `AppConfig::load` doesn't depend on the binary's argument type.
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub listen_addr: Option<String>,
    pub gossip_addr: Option<String>,
    pub bootstrap_peers: Vec<String>,
}
