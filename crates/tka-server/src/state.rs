//! Shared application state wiring the gossip `Store` into axum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tka_gossip::Store;

use crate::config::AppConfig;
use crate::k8s::K8sAccessMinter;
use crate::payload::ClusterNodeInfo;

/// Shared application state, cheaply `Clone`-able (everything inside is
/// already behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Store<ClusterNodeInfo>>,
    pub k8s: Arc<K8sAccessMinter>,
    /// Flipped once the gossip listener has bound; `readyz` reports 503
    /// until then.
    ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<Store<ClusterNodeInfo>>) -> Self {
        let k8s = Arc::new(K8sAccessMinter::new(config.access_grant_ttl_secs));
        Self {
            config,
            store,
            k8s,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
