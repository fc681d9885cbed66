//! End-to-end convergence scenarios driven over real `127.0.0.1` sockets.
//! These exercise the full listener/sender/reaper stack, not just the
//! store in isolation - see `src/store.rs`'s unit tests for the
//! synchronous digest/diff/apply math.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tka_gossip::{GossipClient, Payload, Store};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NodeInfo(String);

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Payload for NodeInfo {}

async fn bind_loopback() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    (listener, addr)
}

/// Scenario 1: two-node convergence. Store A seeds "a", store B seeds
/// "b"; A bootstraps off B. Within a handful of fast gossip intervals
/// both stores' display data contains both ids with the right payloads.
#[tokio::test]
async fn two_node_convergence() {
    let (listener_a, addr_a) = bind_loopback().await;
    let (listener_b, addr_b) = bind_loopback().await;

    let store_a = Arc::new(
        Store::<NodeInfo>::builder(&addr_a)
            .with_local_state(NodeInfo("a".into()))
            .build(),
    );
    let store_b = Arc::new(
        Store::<NodeInfo>::builder(&addr_b)
            .with_local_state(NodeInfo("b".into()))
            .build(),
    );

    let client_a = Arc::new(
        GossipClient::new(store_a.clone(), listener_a)
            .with_gossip_interval(Duration::from_millis(30))
            .with_bootstrap_peer(addr_b.clone())
            .build()
            .unwrap(),
    );
    let client_b = Arc::new(
        GossipClient::new(store_b.clone(), listener_b)
            .with_gossip_interval(Duration::from_millis(30))
            .build()
            .unwrap(),
    );

    let token = CancellationToken::new();
    let handle_a = tokio::spawn({
        let client_a = client_a.clone();
        let token = token.clone();
        async move { client_a.start(token).await }
    });
    let handle_b = tokio::spawn({
        let client_b = client_b.clone();
        let token = token.clone();
        async move { client_b.start(token).await }
    });

    tokio::time::sleep(Duration::from_millis(400)).await;
    token.cancel();
    handle_a.await.unwrap().unwrap();
    handle_b.await.unwrap().unwrap();

    let display_a = store_a.get_display_data().await;
    let display_b = store_b.get_display_data().await;

    assert_eq!(display_a.len(), 2, "A should know about itself and B");
    assert_eq!(display_b.len(), 2, "B should know about itself and A");

    let a_sees_b = display_a.iter().find(|r| !r.is_local).unwrap();
    assert_eq!(a_sees_b.payload, NodeInfo("b".into()));

    let b_sees_a = display_b.iter().find(|r| !r.is_local).unwrap();
    assert_eq!(b_sees_a.payload, NodeInfo("a".into()));
}

/// Scenario 2 (abbreviated): with aggressive thresholds, a peer that
/// stops gossiping is first marked SuspectedDead, then Dead, then reaped
/// from display data entirely - without the reaper ever touching either
/// node's own record.
#[tokio::test]
async fn stale_peer_is_detected_and_reaped() {
    let (listener_a, addr_a) = bind_loopback().await;
    let (listener_c, addr_c) = bind_loopback().await;

    let store_a = Arc::new(
        Store::<NodeInfo>::builder(&addr_a)
            .with_local_state(NodeInfo("a".into()))
            .build(),
    );
    let store_c = Arc::new(
        Store::<NodeInfo>::builder(&addr_c)
            .with_local_state(NodeInfo("c".into()))
            .build(),
    );

    let client_a = Arc::new(
        GossipClient::new(store_a.clone(), listener_a)
            .with_gossip_interval(Duration::from_millis(30))
            .with_bootstrap_peer(addr_c.clone())
            .with_staleness_threshold(2)
            .with_dead_threshold(4)
            .build()
            .unwrap(),
    );
    let client_c = Arc::new(
        GossipClient::new(store_c.clone(), listener_c)
            .with_gossip_interval(Duration::from_millis(30))
            .build()
            .unwrap(),
    );

    let token_a = CancellationToken::new();
    let token_c = CancellationToken::new();
    let handle_a = tokio::spawn({
        let client_a = client_a.clone();
        let token_a = token_a.clone();
        async move { client_a.start(token_a).await }
    });
    let handle_c = tokio::spawn({
        let client_c = client_c.clone();
        let token_c = token_c.clone();
        async move { client_c.start(token_c).await }
    });

    // Let A and C converge first.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store_a.get_peers().await.len(), 1);

    // Kill node C's client: it stops responding to A entirely.
    token_c.cancel();
    handle_c.await.unwrap().unwrap();

    // A keeps gossiping at C's now-dead address; its failure counter
    // climbs each tick until it crosses staleness, then dead threshold.
    tokio::time::sleep(Duration::from_millis(400)).await;

    let peer_c = store_a.get_peer(&store_c.id().clone()).await;
    // Either already reaped, or on its way out as Dead - both are
    // acceptable terminal states this far past the dead threshold.
    match peer_c {
        None => {}
        Some(record) => assert!(record.is_dead() || record.is_suspected_dead()),
    }

    token_a.cancel();
    handle_a.await.unwrap().unwrap();

    // A's own record is never removed regardless of what happened to C.
    assert!(store_a.get_display_data().await.iter().any(|r| r.is_local));
}
