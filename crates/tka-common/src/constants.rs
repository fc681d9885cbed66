//! Shared constants for TKA components.

/// Default HTTP listen address for the collaborator API
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8888";

/// Default gossip bind address
pub const DEFAULT_GOSSIP_ADDR: &str = "127.0.0.1:7946";

/// Default gossip tick interval (seconds)
pub const DEFAULT_GOSSIP_INTERVAL_SECS: u64 = 1;

/// Default gossip fanout factor
pub const DEFAULT_GOSSIP_FANOUT: usize = 3;

/// Default missed-tick count before a peer is marked SuspectedDead
pub const DEFAULT_STALENESS_THRESHOLD: u32 = 2;

/// Default missed-tick count before a peer is marked Dead
pub const DEFAULT_DEAD_THRESHOLD: u32 = 4;

/// Default resurrection threshold (milliseconds of last-seen advantage required)
pub const DEFAULT_RESURRECTION_THRESHOLD_MS: u64 = 5_000;

/// Default TTL of a minted ServiceAccount grant (seconds)
pub const DEFAULT_ACCESS_GRANT_TTL_SECS: u64 = 900;

/// HTTP header names
pub mod headers {
    /// Tailscale identity header, populated by the overlay's LocalAPI in
    /// production (out of scope here: see `tka_server::auth`).
    pub const X_TAILSCALE_USER: &str = "X-Tailscale-User";

    /// Gossip answer-port header is not used on the wire (the port travels
    /// inside the envelope); this header is only used by the HTTP
    /// memberlist boundary to identify which node answered a request.
    pub const X_NODE_ID: &str = "X-Node-Id";
}
