//! The `Payload` capability trait and deterministic `PeerId` derivation.

use std::fmt;
use std::hash::Hasher;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::error::GossipError;

/// A stable peer identifier.
///
/// Derived deterministically from a node's bind address: two stores bound
/// to the same address produce the same id, which is what makes resurrection
/// and fork-tie-break logic reproducible in tests. Ids learned from the
/// wire are wrapped verbatim via [`PeerId::from_raw`] rather than
/// recomputed, since we don't know the remote's own bind-address string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Derives an id from a bind address by hashing it with two
    /// differently-seeded 64-bit xxHash passes and concatenating the
    /// results into a 128-bit value, base64-rendered.
    pub fn from_address(address: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(hash128(address.as_bytes()).to_be_bytes()))
    }

    /// Wraps an id string received over the wire without reinterpreting it.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash128(bytes: &[u8]) -> u128 {
    let mut lo_hasher = XxHash64::with_seed(0);
    lo_hasher.write(bytes);
    let lo = lo_hasher.finish();

    let mut hi_hasher = XxHash64::with_seed(1);
    hi_hasher.write(bytes);
    let hi = hi_hasher.finish();

    ((hi as u128) << 64) | (lo as u128)
}

/// The capability set a value must have to live inside the store: it can be
/// marshaled to and from bytes, displayed, and compared for equality.
/// `marshal`/`unmarshal`/`values_equal` have sensible defaults for any type
/// that is already `Serialize + DeserializeOwned + PartialEq`; implementors
/// only need to opt into the bound set.
pub trait Payload:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Display + Send + Sync + 'static
{
    fn marshal(&self) -> Result<Vec<u8>, GossipError> {
        bincode::serialize(self).map_err(|e| GossipError::Codec(e.to_string()))
    }

    fn unmarshal(bytes: &[u8]) -> Result<Self, GossipError>
    where
        Self: Sized,
    {
        bincode::deserialize(bytes).map_err(|e| GossipError::Codec(e.to_string()))
    }

    fn values_equal(&self, other: &Self) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestPayload(String);

    impl fmt::Display for TestPayload {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl Payload for TestPayload {}

    #[test]
    fn same_address_yields_same_id() {
        let a = PeerId::from_address("10.0.0.1:7946");
        let b = PeerId::from_address("10.0.0.1:7946");
        assert_eq!(a, b);
    }

    #[test]
    fn different_addresses_yield_different_ids() {
        let a = PeerId::from_address("10.0.0.1:7946");
        let b = PeerId::from_address("10.0.0.2:7946");
        assert_ne!(a, b);
    }

    #[test]
    fn marshal_roundtrips_through_default_impl() {
        let p = TestPayload("hello".into());
        let bytes = p.marshal().unwrap();
        let back = TestPayload::unmarshal(&bytes).unwrap();
        assert!(p.values_equal(&back));
    }
}
