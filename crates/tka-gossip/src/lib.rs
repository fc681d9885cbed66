//! # TKA Gossip
//!
//! An anti-entropy cluster-membership gossip engine: a vector-versioned
//! replicated key-value store reconciled over a length-prefixed binary wire
//! protocol, with failure detection and last-write-wins conflict
//! resolution.
//!
//! ## Modules
//! - `payload` - the `Payload` capability trait and `PeerId` derivation
//! - `node` - per-peer `NodeRecord` and its health state machine
//! - `codec` - LEB128 length-prefixed framing and the wire message schema
//! - `store` - the versioned store: digest, diff, apply, reap
//! - `client` - the listener/sender/reaper that drive gossip rounds
//! - `time` - an injectable clock so time-dependent behavior is testable
//! - `error` - the engine's typed error

pub mod client;
pub mod codec;
pub mod error;
pub mod node;
pub mod payload;
pub mod store;
pub mod time;

pub use client::{GossipClient, GossipClientBuilder, GossipConfig};
pub use error::GossipError;
pub use node::{NodeRecord, PeerState};
pub use payload::{Payload, PeerId};
pub use store::{DisplayRecord, Store, StoreBuilder, VersionedPayload};
pub use time::{Clock, ManualClock, SystemClock};
