//! `POST /api/access` - mints an ephemeral ServiceAccount grant for the
//! calling Tailscale identity, and as a side effect refreshes this
//! node's advertised `capacity_hint` in the gossip store (a light
//! illustration of collaborator -> core data flow, not a core
//! operation).

use axum::extract::State;
use axum::Json;

use crate::auth::TailscaleIdentity;
use crate::k8s::ServiceAccountGrant;
use crate::payload::ClusterNodeInfo;
use crate::state::AppState;

/// `POST /api/access`
pub async fn request_access(
    State(state): State<AppState>,
    TailscaleIdentity(identity): TailscaleIdentity,
) -> Json<ServiceAccountGrant> {
    let grant = state.k8s.mint(&identity, &state.config.k8s_namespace);

    let current = state
        .store
        .get_display_data()
        .await
        .into_iter()
        .find(|r| r.is_local)
        .map(|r| r.payload);

    let refreshed = match current {
        Some(mut info) => {
            info.capacity_hint = info.capacity_hint.saturating_sub(1);
            info
        }
        None => ClusterNodeInfo {
            tailscale_ip: state.config.gossip_addr.clone(),
            k8s_namespace: state.config.k8s_namespace.clone(),
            advertised_role: state.config.advertised_role.clone(),
            capacity_hint: 0,
        },
    };
    state.store.set_data(refreshed).await;

    Json(grant)
}
