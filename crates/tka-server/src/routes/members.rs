//! The memberlist HTTP boundary: a read-only JSON projection of
//! `Store::get_display_data`. Explicitly outside the gossip wire
//! protocol - this is for the dashboard and for operators, not for
//! reconciliation between nodes.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tka_gossip::PeerState;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub id: String,
    pub address: String,
    pub last_seen_nanos: u64,
    pub version: u64,
    pub advertised_role: String,
    pub tailscale_ip: String,
    pub k8s_namespace: String,
    pub capacity_hint: u32,
    pub is_local: bool,
    pub state: &'static str,
}

fn state_label(state: PeerState) -> &'static str {
    match state {
        PeerState::Unspecified => "unspecified",
        PeerState::Healthy => "healthy",
        PeerState::SuspectedDead => "suspected-dead",
        PeerState::Dead => "dead",
    }
}

/// `GET /api/members`
pub async fn list_members(State(state): State<AppState>) -> Json<Vec<MemberView>> {
    let rows = state.store.get_display_data().await;
    let members = rows
        .into_iter()
        .map(|r| MemberView {
            id: r.id.to_string(),
            address: r.address,
            last_seen_nanos: r.last_seen_nanos,
            version: r.version,
            advertised_role: r.payload.advertised_role,
            tailscale_ip: r.payload.tailscale_ip,
            k8s_namespace: r.payload.k8s_namespace,
            capacity_hint: r.payload.capacity_hint,
            is_local: r.is_local,
            state: state_label(r.peer_state),
        })
        .collect();
    Json(members)
}
