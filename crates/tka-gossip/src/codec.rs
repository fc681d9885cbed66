//! Wire format: LEB128 varint length-prefixed framing around
//! bincode-encoded envelopes.
//!
//! Every connection carries exactly one frame: a varint length prefix
//! followed by that many bytes of a bincode-encoded [`Envelope`]. A zero
//! length is legal and means "empty connection" - ignored cleanly by the
//! caller, not an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::GossipError;
use crate::node::PeerState;

const MAX_VARINT_BYTES: usize = 10;

/// What the sender believes about one peer, without the payload itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub version: u64,
    pub address: String,
    pub last_seen_nanos: u64,
    pub state: PeerState,
}

/// A peer's view of the whole cluster, one entry per known id.
pub type Digest = HashMap<String, DigestEntry>;

/// One entry of a reconciliation diff: a digest entry plus the marshaled
/// payload bytes. Empty `payload` is a pull request: "I don't have this
/// peer, send me its state."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub entry: DigestEntry,
    pub payload: Vec<u8>,
}

pub type Diff = HashMap<String, DiffEntry>;

/// The three message kinds exchanged during a gossip round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    /// Round 1: announce a digest, ask for a diff back.
    Heartbeat { ts_nanos: u64, digest: Digest },
    /// Round 2: reply to a Heartbeat with both a diff and our own digest,
    /// so the original sender can compute and send back a final delta.
    GossipDiff { state_delta: Diff, digest: Digest },
    /// Round 3: the closing delta, applied with no further reply expected.
    GossipDelta { state_delta: Diff },
}

/// Wraps a message with sender identity and the port the sender is
/// listening on, so the receiver can dial back using the TCP peer address
/// it observed (the sender's outbound source port is not its listen port).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub src_id: String,
    pub answer_port: String,
    pub message: GossipMessage,
}

pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, GossipError> {
    bincode::serialize(envelope).map_err(|e| GossipError::Codec(e.to_string()))
}

pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, GossipError> {
    bincode::deserialize(bytes).map_err(|e| GossipError::Codec(e.to_string()))
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Writes a varint length prefix followed by `payload`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), GossipError> {
    let mut framed = Vec::with_capacity(payload.len() + MAX_VARINT_BYTES);
    encode_varint(payload.len() as u64, &mut framed);
    framed.extend_from_slice(payload);
    writer
        .write_all(&framed)
        .await
        .map_err(|e| GossipError::Codec(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| GossipError::Codec(format!("flush failed: {e}")))
}

/// Reads one length-prefixed frame.
///
/// Returns `Ok(None)` if the connection closed before any bytes arrived
/// (an empty connection at the TCP level). Returns `Ok(Some(vec![]))` for
/// a frame whose varint length decodes to zero (an empty connection at
/// the protocol level) - both are legal and should be ignored by the
/// caller, not treated as errors.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, GossipError> {
    let mut first = [0u8; 1];
    let n = reader
        .read(&mut first)
        .await
        .map_err(|e| GossipError::Codec(format!("read failed: {e}")))?;
    if n == 0 {
        return Ok(None);
    }

    let mut value: u64 = (first[0] & 0x7f) as u64;
    let mut cont = first[0] & 0x80 != 0;
    let mut shift = 7u32;
    let mut read_bytes = 1;
    while cont {
        if read_bytes >= MAX_VARINT_BYTES {
            return Err(GossipError::Codec("varint exceeds 10 bytes".into()));
        }
        let mut byte = [0u8; 1];
        reader
            .read_exact(&mut byte)
            .await
            .map_err(|e| GossipError::Codec(format!("short read on varint: {e}")))?;
        value |= ((byte[0] & 0x7f) as u64) << shift;
        cont = byte[0] & 0x80 != 0;
        shift += 7;
        read_bytes += 1;
    }

    if value == 0 {
        return Ok(Some(Vec::new()));
    }

    let mut buf = vec![0u8; value as usize];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| GossipError::Codec(format!("short read on frame body: {e}")))?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn frame_roundtrips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello gossip").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let got = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(got, b"hello gossip");
    }

    #[tokio::test]
    async fn zero_length_frame_is_legal_and_empty() {
        let mut buf = Vec::new();
        encode_varint(0, &mut buf);

        let mut cursor = Cursor::new(buf);
        let got = read_frame(&mut cursor).await.unwrap();
        assert_eq!(got, Some(Vec::new()));
    }

    #[tokio::test]
    async fn closed_connection_before_any_byte_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let got = read_frame(&mut cursor).await.unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn envelope_roundtrips_through_bincode() {
        let mut digest = Digest::new();
        digest.insert(
            "peer-a".into(),
            DigestEntry {
                version: 3,
                address: "10.0.0.1:7946".into(),
                last_seen_nanos: 42,
                state: PeerState::Healthy,
            },
        );
        let envelope = Envelope {
            src_id: "peer-b".into(),
            answer_port: "7946".into(),
            message: GossipMessage::Heartbeat { ts_nanos: 100, digest },
        };

        let bytes = encode_envelope(&envelope).unwrap();
        let back = decode_envelope(&bytes).unwrap();
        assert_eq!(back.src_id, "peer-b");
        match back.message {
            GossipMessage::Heartbeat { ts_nanos, digest } => {
                assert_eq!(ts_nanos, 100);
                assert_eq!(digest.get("peer-a").unwrap().version, 3);
            }
            _ => panic!("expected Heartbeat"),
        }
    }
}
