//! Common error types for TKA components.

use thiserror::Error;

/// Common errors across the TKA collaborator layer (HTTP API, CLI, config).
///
/// The gossip engine has its own typed error (`tka_gossip::error::GossipError`);
/// this enum is for the process boundary that wraps it.
#[derive(Debug, Error)]
pub enum TkaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gossip engine error surfaced to a collaborator
    #[error("Gossip error: {0}")]
    Gossip(String),

    /// Authentication/authorization error
    #[error("Auth error: {0}")]
    Auth(String),

    /// Kubernetes access-minting error
    #[error("Access grant error: {0}")]
    AccessGrant(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl TkaError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::Gossip(_) => 503,
            Self::Auth(_) => 401,
            Self::AccessGrant(_) => 502,
            Self::InvalidInput(_) => 400,
            Self::Internal(_) => 500,
            Self::Timeout(_) => 504,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gossip(_) | Self::Timeout(_))
    }
}
