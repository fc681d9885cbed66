//! The versioned store: the replicated peer/state maps, digest/diff/apply,
//! and the two-pass reaper.
//!
//! This is the richest module in the engine. It owns two independent
//! `tokio::sync::RwLock`s - `peers` and `state` - and every method that
//! needs both acquires them in that fixed order (peers before state) to
//! preclude deadlock with any other method. No lock is ever held across
//! an `.await` on network I/O; callers snapshot under lock, then do I/O
//! after releasing it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::codec::{Diff, DiffEntry, Digest, DigestEntry};
use crate::error::GossipError;
use crate::node::{NodeRecord, PeerState};
use crate::payload::{Payload, PeerId};
use crate::time::{Clock, SystemClock};

const DEFAULT_RESURRECTION_THRESHOLD: Duration = Duration::from_secs(5);

/// A payload tagged with the version it was written at.
#[derive(Debug, Clone)]
pub struct VersionedPayload<P> {
    pub version: u64,
    pub payload: P,
}

/// One row of `Store::get_display_data`: everything a consumer (the
/// memberlist HTTP route, the terminal dashboard) needs to render a peer,
/// with the payload already in its typed form.
#[derive(Debug, Clone)]
pub struct DisplayRecord<P> {
    pub id: PeerId,
    pub address: String,
    pub last_seen_nanos: u64,
    pub version: u64,
    pub payload: P,
    pub last_updated_nanos: u64,
    pub is_local: bool,
    pub peer_state: PeerState,
}

/// Builds a [`Store`] with a fluent option chain, like `NewStore(address, options...)`.
pub struct StoreBuilder<P: Payload> {
    self_address: String,
    local_state: Option<P>,
    resurrection_threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl<P: Payload> StoreBuilder<P> {
    pub fn new(self_address: impl Into<String>) -> Self {
        Self {
            self_address: self_address.into(),
            local_state: None,
            resurrection_threshold: DEFAULT_RESURRECTION_THRESHOLD,
            clock: Arc::new(SystemClock),
        }
    }

    /// `WithLocalState` - seeds the local node's initial payload at version 0.
    pub fn with_local_state(mut self, payload: P) -> Self {
        self.local_state = Some(payload);
        self
    }

    /// `WithResurrectionThreshold` - overrides the 5-second default.
    pub fn with_resurrection_threshold(mut self, threshold: Duration) -> Self {
        self.resurrection_threshold = threshold;
        self
    }

    /// Not part of the builder's production option set: lets tests (and the
    /// scenario harness in `tests/gossip_convergence.rs`) inject a
    /// [`ManualClock`](crate::time::ManualClock) so resurrection-threshold
    /// comparisons are deterministic.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Store<P> {
        let self_id = PeerId::from_address(&self.self_address);
        let mut state = HashMap::new();
        if let Some(payload) = self.local_state {
            state.insert(
                self_id.clone(),
                VersionedPayload { version: 0, payload },
            );
        }
        Store {
            self_id,
            self_address: self.self_address,
            resurrection_threshold_nanos: self.resurrection_threshold.as_nanos() as u64,
            peers: RwLock::new(HashMap::new()),
            state: RwLock::new(state),
            clock: self.clock,
        }
    }
}

/// The thread-safe, vector-versioned replicated key-value store at the
/// heart of the gossip engine.
pub struct Store<P: Payload> {
    self_id: PeerId,
    self_address: String,
    resurrection_threshold_nanos: u64,
    peers: RwLock<HashMap<PeerId, NodeRecord>>,
    state: RwLock<HashMap<PeerId, VersionedPayload<P>>>,
    clock: Arc<dyn Clock>,
}

impl<P: Payload> Store<P> {
    pub fn builder(self_address: impl Into<String>) -> StoreBuilder<P> {
        StoreBuilder::new(self_address)
    }

    pub fn id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn address(&self) -> &str {
        &self.self_address
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// `GetPeers` - a snapshot of every known peer, self excluded.
    pub async fn get_peers(&self) -> Vec<NodeRecord> {
        self.peers.read().await.values().cloned().collect()
    }

    /// `GetPeer` - a snapshot of one peer's node record, if known.
    pub async fn get_peer(&self, id: &PeerId) -> Option<NodeRecord> {
        self.peers.read().await.get(id).cloned()
    }

    /// `SetData` - bumps the local node's version and stores the payload.
    /// Returns the new version.
    pub async fn set_data(&self, payload: P) -> u64 {
        let mut state = self.state.write().await;
        let new_version = state
            .get(&self.self_id)
            .map(|v| v.version + 1)
            .unwrap_or(0);
        state.insert(
            self.self_id.clone(),
            VersionedPayload {
                version: new_version,
                payload,
            },
        );
        new_version
    }

    /// `GetDisplayData` - one record per id in `state`, sorted by id.
    pub async fn get_display_data(&self) -> Vec<DisplayRecord<P>> {
        let peers = self.peers.read().await;
        let state = self.state.read().await;
        let now = self.clock.now_nanos();

        let mut ids: Vec<&PeerId> = state.keys().collect();
        ids.sort();

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let versioned = &state[id];
            if *id == self.self_id {
                out.push(DisplayRecord {
                    id: id.clone(),
                    address: self.self_address.clone(),
                    last_seen_nanos: now,
                    version: versioned.version,
                    payload: versioned.payload.clone(),
                    last_updated_nanos: now,
                    is_local: true,
                    peer_state: PeerState::Healthy,
                });
                continue;
            }
            let Some(record) = peers.get(id) else {
                tracing::warn!(peer = %id, "state entry has no backing node record, skipping display row");
                continue;
            };
            out.push(DisplayRecord {
                id: id.clone(),
                address: record.address().to_string(),
                last_seen_nanos: record.last_seen_nanos(),
                version: versioned.version,
                payload: versioned.payload.clone(),
                last_updated_nanos: now,
                is_local: false,
                peer_state: record.state(),
            });
        }
        out
    }

    /// Builds the digest: one entry per id in `state`, excluding ids whose
    /// backing node record is `SuspectedDead` or `Dead` - non-healthy peers
    /// are not re-advertised.
    pub async fn digest(&self) -> Digest {
        let peers = self.peers.read().await;
        let state = self.state.read().await;
        let now = self.clock.now_nanos();

        let mut digest = Digest::new();
        for (id, versioned) in state.iter() {
            let (address, last_seen_nanos, peer_state) = if *id == self.self_id {
                (self.self_address.clone(), now, PeerState::Healthy)
            } else {
                match peers.get(id) {
                    Some(record) => (
                        record.address().to_string(),
                        record.last_seen_nanos(),
                        record.state(),
                    ),
                    None => {
                        tracing::warn!(peer = %id, "no backing node record while building digest, skipping");
                        continue;
                    }
                }
            };

            if peer_state == PeerState::SuspectedDead || peer_state == PeerState::Dead {
                continue;
            }

            digest.insert(
                id.to_string(),
                DigestEntry {
                    version: versioned.version,
                    address,
                    last_seen_nanos,
                    state: peer_state,
                },
            );
        }
        digest
    }

    /// Computes a diff against a remote digest, applying the reconciliation
    /// rules in order: pull unknown ids, push ids ahead of the remote or
    /// tied with it, push local peers the remote digest doesn't mention,
    /// then announce self if the remote is missing us or behind us.
    /// Returns the diff plus any non-fatal errors encountered while
    /// building it (e.g. a peer with no backing payload).
    pub async fn diff(&self, remote_digest: &Digest) -> (Diff, Vec<GossipError>) {
        let peers = self.peers.read().await;
        let state = self.state.read().await;
        let mut errors = Vec::new();
        let mut diff = Diff::new();

        // Rule 1: for each id in the remote digest, compare versions.
        for (id_str, remote_entry) in remote_digest.iter() {
            let id = PeerId::from_raw(id_str.clone());
            match state.get(&id) {
                None => {
                    diff.insert(
                        id_str.clone(),
                        DiffEntry {
                            entry: DigestEntry {
                                version: 0,
                                address: remote_entry.address.clone(),
                                last_seen_nanos: remote_entry.last_seen_nanos,
                                state: PeerState::Unspecified,
                            },
                            payload: Vec::new(),
                        },
                    );
                }
                Some(local) => {
                    if local.version < remote_entry.version {
                        // Remote is ahead; it will push to us. No entry.
                        continue;
                    }
                    // local.version >= remote_entry.version: send our full
                    // copy, even on a tie, so the remote can detect a fork.
                    match self.local_diff_entry(&id, local, &peers) {
                        Ok(entry) => {
                            diff.insert(id_str.clone(), entry);
                        }
                        Err(e) => errors.push(e),
                    }
                }
            }
        }

        // Rule 2: local peers absent from the remote digest.
        for (id, local) in state.iter() {
            if *id == self.self_id || remote_digest.contains_key(id.as_str()) {
                continue;
            }
            match self.local_diff_entry(id, local, &peers) {
                Ok(entry) => {
                    diff.insert(id.to_string(), entry);
                }
                Err(e) => errors.push(e),
            }
        }

        // Rule 3: announce self if the remote lacks us or is behind.
        let announce_self = match remote_digest.get(self.self_id.as_str()) {
            None => true,
            Some(remote_self) => match state.get(&self.self_id) {
                Some(local_self) => local_self.version > remote_self.version,
                None => false,
            },
        };
        if announce_self {
            if let Some(local_self) = state.get(&self.self_id) {
                match local_self.payload.marshal() {
                    Ok(bytes) => {
                        diff.insert(
                            self.self_id.to_string(),
                            DiffEntry {
                                entry: DigestEntry {
                                    version: local_self.version,
                                    address: self.self_address.clone(),
                                    last_seen_nanos: self.clock.now_nanos(),
                                    state: PeerState::Healthy,
                                },
                                payload: bytes,
                            },
                        );
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        (diff, errors)
    }

    fn local_diff_entry(
        &self,
        id: &PeerId,
        local: &VersionedPayload<P>,
        peers: &HashMap<PeerId, NodeRecord>,
    ) -> Result<DiffEntry, GossipError> {
        let (address, last_seen_nanos, peer_state) = if *id == self.self_id {
            (self.self_address.clone(), self.clock.now_nanos(), PeerState::Healthy)
        } else {
            match peers.get(id) {
                Some(record) => (
                    record.address().to_string(),
                    record.last_seen_nanos(),
                    record.state(),
                ),
                None => {
                    return Err(GossipError::MissingNodeRecord {
                        id: id.to_string(),
                    });
                }
            }
        };
        let bytes = local.payload.marshal()?;
        Ok(DiffEntry {
            entry: DigestEntry {
                version: local.version,
                address,
                last_seen_nanos,
                state: peer_state,
            },
            payload: bytes,
        })
    }

    /// Applies an incoming diff. Every entry is processed independently;
    /// errors are collected rather than aborting the batch.
    pub async fn apply_diff(&self, diff: Diff) -> Vec<GossipError> {
        let mut peers = self.peers.write().await;
        let mut state = self.state.write().await;
        let mut errors = Vec::new();

        for (id_str, entry) in diff.into_iter() {
            let id = PeerId::from_raw(id_str);
            if id == self.self_id {
                // The local node is authoritative for its own state.
                continue;
            }
            if entry.payload.is_empty() {
                // A pull-request placeholder: the sender is asking us for
                // this id's data, not handing us anything to merge. The
                // response side of the exchange (our own diff computed
                // against the sender's digest) is what actually answers it.
                continue;
            }

            if !peers.contains_key(&id) {
                if entry.entry.state == PeerState::SuspectedDead
                    || entry.entry.state == PeerState::Dead
                {
                    errors.push(GossipError::RejectedPeer { id: id.to_string() });
                    continue;
                }
                peers.insert(
                    id.clone(),
                    NodeRecord::from_digest(
                        id.clone(),
                        entry.entry.address.clone(),
                        entry.entry.last_seen_nanos,
                        entry.entry.state,
                    ),
                );
            } else if let Some(record) = peers.get_mut(&id) {
                apply_health_transition(record, &entry.entry, self.resurrection_threshold_nanos);
            }

            if let Err(e) = self.merge_payload(&mut state, &id, &entry) {
                errors.push(e);
            }
        }

        errors
    }

    fn merge_payload(
        &self,
        state: &mut HashMap<PeerId, VersionedPayload<P>>,
        id: &PeerId,
        entry: &DiffEntry,
    ) -> Result<(), GossipError> {
        let incoming_payload = P::unmarshal(&entry.payload)?;

        match state.get(id) {
            None => {
                state.insert(
                    id.clone(),
                    VersionedPayload {
                        version: entry.entry.version,
                        payload: incoming_payload,
                    },
                );
                Ok(())
            }
            Some(local) if entry.entry.version < local.version => Err(GossipError::MonotonicViolation {
                id: id.to_string(),
                local_version: local.version,
                incoming_version: entry.entry.version,
            }),
            Some(local) if entry.entry.version > local.version => {
                state.insert(
                    id.clone(),
                    VersionedPayload {
                        version: entry.entry.version,
                        payload: incoming_payload,
                    },
                );
                Ok(())
            }
            Some(local) => {
                // Version tie.
                if local.payload.values_equal(&incoming_payload) {
                    return Ok(());
                }
                // Fork. Tie-break between the owning peer's id and our own.
                if id.as_str() < self.self_id.as_str() {
                    let new_version = entry.entry.version + 1;
                    state.insert(
                        id.clone(),
                        VersionedPayload {
                            version: new_version,
                            payload: incoming_payload,
                        },
                    );
                    Err(GossipError::ForkResolved {
                        id: id.to_string(),
                        new_version,
                    })
                } else {
                    Err(GossipError::ForkRetained { id: id.to_string() })
                }
            }
        }
    }

    /// A direct, first-hand message from `id`: inserts or resurrects its
    /// node record. Called on every inbound connection, regardless of
    /// message variant, since receiving anything at all is evidence the
    /// peer is alive.
    pub async fn heartbeat(&self, id: PeerId, address: String) {
        if id == self.self_id {
            return;
        }
        let mut peers = self.peers.write().await;
        match peers.get_mut(&id) {
            Some(record) => record.heartbeat(&address, self.clock.as_ref()),
            None => {
                let record = NodeRecord::new(id.clone(), address, self.clock.as_ref());
                peers.insert(id, record);
            }
        }
    }

    /// Increments the failure counter for every known peer (self excluded)
    /// and promotes any that cross `staleness_threshold` to `SuspectedDead`.
    /// Peers heard from directly between ticks already had their counter
    /// reset to zero by [`Store::heartbeat`], so this blanket increment is
    /// equivalent to counting missed gossip rounds.
    pub async fn increment_peer_failure(&self, staleness_threshold: u32) {
        let mut peers = self.peers.write().await;
        for record in peers.values_mut() {
            record.increment_failure_count();
            if record.is_healthy() && record.is_stale(staleness_threshold) {
                record.mark_suspected_dead();
            }
        }
    }

    /// The two-pass reaper: `Dead` peers are removed outright; `SuspectedDead`
    /// peers that have crossed `dead_threshold` are demoted to `Dead` (and
    /// will be removed on the next pass). Never touches the local node.
    pub async fn remove_stale_peers(&self, dead_threshold: u32) -> Vec<PeerId> {
        let mut peers = self.peers.write().await;
        let mut state = self.state.write().await;
        let mut removed = Vec::new();

        let ids: Vec<PeerId> = peers.keys().cloned().collect();
        for id in ids {
            let Some(record) = peers.get_mut(&id) else {
                continue;
            };
            if record.is_dead() {
                peers.remove(&id);
                state.remove(&id);
                removed.push(id);
            } else if record.is_suspected_dead() && record.is_stale(dead_threshold) {
                record.mark_dead();
            }
        }
        removed
    }
}

/// Applies the asymmetric health-transition rules to an already-known
/// peer, based on what the remote digest entry reports.
fn apply_health_transition(record: &mut NodeRecord, remote: &DigestEntry, resurrection_threshold_nanos: u64) {
    match remote.state {
        PeerState::Unspecified => {}
        PeerState::SuspectedDead => {
            if record.is_healthy() {
                record.mark_suspected_dead();
            }
        }
        PeerState::Dead => {
            record.mark_dead();
        }
        PeerState::Healthy => {
            if !record.is_healthy()
                && remote.last_seen_nanos > record.last_seen_nanos().saturating_add(resurrection_threshold_nanos)
            {
                record.resurrect(remote.last_seen_nanos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use serde::{Deserialize, Serialize};
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestPayload(String);

    impl fmt::Display for TestPayload {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl Payload for TestPayload {}

    fn store_with_clock(addr: &str, clock: Arc<ManualClock>) -> Store<TestPayload> {
        Store::builder(addr)
            .with_local_state(TestPayload("self".into()))
            .with_clock(clock as Arc<dyn Clock>)
            .build()
    }

    #[tokio::test]
    async fn set_data_bumps_version_each_call() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock);
        assert_eq!(store.set_data(TestPayload("v1".into())).await, 1);
        assert_eq!(store.set_data(TestPayload("v2".into())).await, 2);
    }

    #[tokio::test]
    async fn digest_excludes_suspected_and_dead_peers() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock.clone());

        let remote_id = PeerId::from_address("127.0.0.1:2");
        let mut diff = Diff::new();
        diff.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(diff).await;
        assert!(store.digest().await.contains_key(remote_id.as_str()));

        store.increment_peer_failure(0).await; // threshold 0 -> immediately stale
        assert!(!store.digest().await.contains_key(remote_id.as_str()));
    }

    #[tokio::test]
    async fn unknown_peer_with_suspected_state_is_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock);

        let remote_id = PeerId::from_address("127.0.0.1:2");
        let mut diff = Diff::new();
        diff.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 0,
                    state: PeerState::SuspectedDead,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        let errors = store.apply_diff(diff).await;
        assert!(matches!(errors[0], GossipError::RejectedPeer { .. }));
        assert!(store.get_peer(&remote_id).await.is_none());
    }

    #[tokio::test]
    async fn monotonic_violation_is_rejected_and_store_unchanged() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock);
        let remote_id = PeerId::from_address("127.0.0.1:2");

        let mut first = Diff::new();
        first.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 5,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("v5".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(first).await;

        let mut stale = Diff::new();
        stale.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 3,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("v3".into()).marshal().unwrap(),
            },
        );
        let errors = store.apply_diff(stale).await;
        assert!(matches!(errors[0], GossipError::MonotonicViolation { .. }));

        let display = store.get_display_data().await;
        let remote_row = display.iter().find(|r| r.id == remote_id).unwrap();
        assert_eq!(remote_row.version, 5);
        assert_eq!(remote_row.payload, TestPayload("v5".into()));
    }

    #[tokio::test]
    async fn fork_tie_break_favors_lexically_smaller_id() {
        // "id-alpha" < "id-bravo" lexically, so alpha's payload wins.
        let clock = Arc::new(ManualClock::new(0));
        let store = Store::<TestPayload>::builder("127.0.0.1:1")
            .with_local_state(TestPayload("bravo-self".into()))
            .with_clock(clock as Arc<dyn Clock>)
            .build();
        // Force a deterministic self id for the assertions below by reading it back.
        let self_id = store.id().clone();

        let alpha_id = PeerId::from_raw("id-alpha");
        let mut seed = Diff::new();
        seed.insert(
            alpha_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:3".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("X1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(seed).await;

        // Now a fork arrives for the same id at the same version.
        let mut fork = Diff::new();
        fork.insert(
            alpha_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:3".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("X1-fork".into()).marshal().unwrap(),
            },
        );
        let errors = store.apply_diff(fork).await;

        if alpha_id.as_str() < self_id.as_str() {
            assert!(matches!(errors[0], GossipError::ForkResolved { .. }));
        } else {
            assert!(matches!(errors[0], GossipError::ForkRetained { .. }));
        }
    }

    #[tokio::test]
    async fn reaper_never_removes_self_and_requires_two_passes() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock);
        let remote_id = PeerId::from_address("127.0.0.1:2");

        let mut diff = Diff::new();
        diff.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(diff).await;

        store.increment_peer_failure(0).await;
        assert!(store.get_peer(&remote_id).await.unwrap().is_suspected_dead());

        // First reaper pass: stale SuspectedDead -> Dead, not yet removed.
        let removed = store.remove_stale_peers(0).await;
        assert!(removed.is_empty());
        assert!(store.get_peer(&remote_id).await.unwrap().is_dead());

        // Second pass: Dead is removed.
        let removed = store.remove_stale_peers(0).await;
        assert_eq!(removed, vec![remote_id.clone()]);
        assert!(store.get_peer(&remote_id).await.is_none());

        // Self survives regardless.
        assert!(store.get_display_data().await.iter().any(|r| r.is_local));
    }

    #[tokio::test]
    async fn unknown_peer_advertised_non_healthy_is_not_inserted() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock);
        let remote_id = PeerId::from_address("127.0.0.1:2");

        let mut seed = Diff::new();
        seed.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 1_000,
                    state: PeerState::SuspectedDead,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(seed).await;
        assert!(
            store.get_peer(&remote_id).await.is_none(),
            "unknown peer advertised non-Healthy must not be inserted"
        );
    }

    #[tokio::test]
    async fn resurrection_requires_remote_last_seen_advantage() {
        let clock = Arc::new(ManualClock::new(0));
        let store = store_with_clock("127.0.0.1:1", clock.clone());
        let remote_id = PeerId::from_address("127.0.0.1:2");

        let mut seed = Diff::new();
        seed.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 0,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(seed).await;
        store.increment_peer_failure(0).await; // -> SuspectedDead, last_seen stays at 0

        // Remote reports Healthy with only a 200ns advantage: below the
        // (default 5s = 5_000_000_000ns) resurrection threshold, rejected.
        let mut weak = Diff::new();
        weak.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 200,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(weak).await;
        assert!(store.get_peer(&remote_id).await.unwrap().is_suspected_dead());

        // A remote report comfortably past the threshold resurrects it.
        let mut strong = Diff::new();
        strong.insert(
            remote_id.to_string(),
            DiffEntry {
                entry: DigestEntry {
                    version: 1,
                    address: "127.0.0.1:2".into(),
                    last_seen_nanos: 10_000_000_000,
                    state: PeerState::Healthy,
                },
                payload: TestPayload("r1".into()).marshal().unwrap(),
            },
        );
        store.apply_diff(strong).await;
        assert!(store.get_peer(&remote_id).await.unwrap().is_healthy());
    }
}
