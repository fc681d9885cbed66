//! Per-peer node record: address, last-seen timestamp, and the health
//! state machine (`Healthy` / `SuspectedDead` / `Dead`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::payload::PeerId;
use crate::time::Clock;

/// The health state a peer is reported (or locally believed) to be in.
///
/// `Unspecified` is the wire default: a sender that doesn't offer an
/// opinion on a peer's health (e.g. a pull-request placeholder entry)
/// leaves the receiver's view untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PeerState {
    #[default]
    Unspecified,
    Healthy,
    SuspectedDead,
    Dead,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeerState::Unspecified => "unspecified",
            PeerState::Healthy => "healthy",
            PeerState::SuspectedDead => "suspected-dead",
            PeerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Everything the local node tracks about one peer, excluding its
/// versioned payload (which lives in `Store`'s state map, keyed by the
/// same id).
#[derive(Debug, Clone)]
pub struct NodeRecord {
    id: PeerId,
    address: String,
    last_seen_nanos: u64,
    failure_count: u32,
    state: PeerState,
}

impl NodeRecord {
    /// Creates a record from a direct, first-hand observation (e.g. an
    /// inbound heartbeat from a peer we'd never heard from before).
    pub fn new(id: PeerId, address: impl Into<String>, clock: &dyn Clock) -> Self {
        Self {
            id,
            address: address.into(),
            last_seen_nanos: clock.now_nanos(),
            failure_count: 0,
            state: PeerState::Healthy,
        }
    }

    /// Creates a record from a second-hand digest entry learned via gossip.
    /// `Unspecified` defaults to `Healthy`: we only ever learn about a new
    /// peer through a Healthy announcement (see `RejectedPeer`).
    pub fn from_digest(
        id: PeerId,
        address: impl Into<String>,
        last_seen_nanos: u64,
        state: PeerState,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            last_seen_nanos,
            failure_count: 0,
            state: if state == PeerState::Unspecified {
                PeerState::Healthy
            } else {
                state
            },
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn last_seen_nanos(&self) -> u64 {
        self.last_seen_nanos
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    /// A direct, first-hand message from this peer: resets failures,
    /// updates the address if it changed, and resurrects a non-Healthy
    /// peer unconditionally (hearing from it directly is stronger evidence
    /// than any gossiped opinion).
    pub fn heartbeat(&mut self, address: &str, clock: &dyn Clock) {
        self.last_seen_nanos = clock.now_nanos();
        if self.address != address {
            self.address = address.to_string();
        }
        self.failure_count = 0;
        self.state = PeerState::Healthy;
    }

    pub fn increment_failure_count(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
    }

    pub fn is_stale(&self, threshold: u32) -> bool {
        self.failure_count >= threshold
    }

    pub fn mark_suspected_dead(&mut self) {
        if self.state == PeerState::Healthy {
            self.state = PeerState::SuspectedDead;
        }
    }

    pub fn mark_dead(&mut self) {
        self.state = PeerState::Dead;
    }

    /// Resurrects the peer and adopts the remote's last-seen timestamp, per
    /// the merge rule: resurrection evidence is second-hand, so the
    /// timestamp it carries is the only freshness signal we have.
    pub fn resurrect(&mut self, remote_last_seen_nanos: u64) {
        self.state = PeerState::Healthy;
        self.failure_count = 0;
        self.last_seen_nanos = remote_last_seen_nanos;
    }

    pub fn is_healthy(&self) -> bool {
        self.state == PeerState::Healthy
    }

    pub fn is_suspected_dead(&self) -> bool {
        self.state == PeerState::SuspectedDead
    }

    pub fn is_dead(&self) -> bool {
        self.state == PeerState::Dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    #[test]
    fn heartbeat_resets_failures_and_resurrects() {
        let clock = ManualClock::new(1_000);
        let mut rec = NodeRecord::new(PeerId::from_raw("p1"), "10.0.0.1:1", &clock);
        rec.increment_failure_count();
        rec.increment_failure_count();
        rec.mark_suspected_dead();
        assert!(rec.is_suspected_dead());

        clock.set(2_000);
        rec.heartbeat("10.0.0.1:1", &clock);
        assert!(rec.is_healthy());
        assert_eq!(rec.failure_count(), 0);
        assert_eq!(rec.last_seen_nanos(), 2_000);
    }

    #[test]
    fn mark_suspected_dead_is_a_one_way_ratchet_from_healthy() {
        let clock = ManualClock::new(0);
        let mut rec = NodeRecord::new(PeerId::from_raw("p1"), "10.0.0.1:1", &clock);
        rec.mark_dead();
        rec.mark_suspected_dead();
        assert!(rec.is_dead(), "Dead must not regress to SuspectedDead");
    }

    #[test]
    fn from_digest_defaults_unspecified_to_healthy() {
        let rec = NodeRecord::from_digest(PeerId::from_raw("p1"), "10.0.0.1:1", 500, PeerState::Unspecified);
        assert!(rec.is_healthy());
    }
}
