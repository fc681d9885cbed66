//! The gossip engine's typed error.
//!
//! Most variants here are informational: a gossip round that produces one
//! is still a successful round. `apply_diff` collects them into a `Vec`
//! rather than failing fast, since one malformed or stale entry in a batch
//! should never block the rest of the batch from merging.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GossipError {
    /// A message, envelope, or payload failed to decode.
    #[error("malformed message: {0}")]
    Codec(String),

    /// An incoming version was lower than the version already held locally.
    /// The entry is rejected outright; the sender is behind, not malicious.
    #[error("monotonic violation for peer {id}: local version {local_version} is ahead of incoming version {incoming_version}")]
    MonotonicViolation {
        id: String,
        local_version: u64,
        incoming_version: u64,
    },

    /// Same version, different payload, and the incoming side won the
    /// lexical tie-break: the incoming payload was adopted and bumped to
    /// `new_version` so the resolution propagates on the next round.
    #[error("fork resolved for peer {id}: adopted incoming payload at version {new_version}")]
    ForkResolved { id: String, new_version: u64 },

    /// Same version, different payload, but the local copy won the
    /// tie-break: nothing changed locally.
    #[error("fork detected for peer {id}: local payload retained")]
    ForkRetained { id: String },

    /// A diff entry named a peer we've never seen before, but advertised a
    /// non-Healthy state for it. We only learn about new peers via a
    /// Healthy announcement.
    #[error("rejected diff entry for unknown peer {id}: advertised state is not Healthy")]
    RejectedPeer { id: String },

    /// A state entry existed with no backing node record (or vice versa).
    /// Logged and skipped rather than treated as fatal, since the two maps
    /// are expected to reconverge on the next gossip round.
    #[error("skipped entry for peer {id}: no backing node record")]
    MissingNodeRecord { id: String },
}
