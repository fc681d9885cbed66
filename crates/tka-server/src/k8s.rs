//! A minimal ServiceAccount-minting stub standing in for the Kubernetes
//! controller collaborator. No real `kube` client is involved - this is
//! an in-memory mock; everything outside the gossip engine here has no
//! comparable engineering depth.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// An ephemeral credential minted for one Tailscale identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountGrant {
    pub token: String,
    pub namespace: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints [`ServiceAccountGrant`]s. Holds only the TTL; it has no backing
/// store because grants are never looked up again here - validating a
/// minted token against the cluster is the real controller's job.
pub struct K8sAccessMinter {
    ttl: ChronoDuration,
}

impl K8sAccessMinter {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: ChronoDuration::seconds(ttl_secs as i64),
        }
    }

    /// Mints a grant for `identity` in `namespace`. A real implementation
    /// would create a `ServiceAccount` + time-bound `Secret` against the
    /// Kubernetes API; this generates a random token locally instead.
    pub fn mint(&self, identity: &str, namespace: &str) -> ServiceAccountGrant {
        let mut token_bytes = [0u8; 24];
        rand::rng().fill_bytes(&mut token_bytes);
        let token = format!("tka-grant-{}", hex_encode(&token_bytes));

        tracing::info!(identity, namespace, "minted ephemeral ServiceAccount grant");

        ServiceAccountGrant {
            token,
            namespace: namespace.to_string(),
            expires_at: Utc::now() + self.ttl,
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_sets_namespace_and_future_expiry() {
        let minter = K8sAccessMinter::new(900);
        let grant = minter.mint("alice@example.ts.net", "tka-access");
        assert_eq!(grant.namespace, "tka-access");
        assert!(grant.expires_at > Utc::now());
        assert!(grant.token.starts_with("tka-grant-"));
    }
}
