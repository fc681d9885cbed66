//! The active component: a listener accepting peer connections, a
//! periodic sender that drives three-round reconciliation, and a reaper
//! that removes dead peers.
//!
//! All three run as independent `tokio` tasks under a shared
//! [`CancellationToken`], joined in [`GossipClient::start`]. Per the
//! concurrency model, no task holds a store lock across network I/O: the
//! pattern throughout is snapshot-under-lock, then dial/read/write after
//! the lock is released (the `Store` methods already enforce this
//! internally).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, Envelope, GossipMessage};
use crate::error::GossipError;
use crate::payload::{Payload, PeerId};
use crate::store::Store;

/// How long a single connection handler will wait on a read before giving
/// up; bounds a slow or wedged peer to a single handler task rather than
/// letting it accumulate forever.
const CONNECTION_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning knobs for the gossip client.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    pub gossip_interval: Duration,
    pub fanout: usize,
    pub staleness_threshold: u32,
    pub dead_threshold: u32,
    pub bootstrap_peers: Vec<String>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_secs(1),
            fanout: 3,
            staleness_threshold: 2,
            dead_threshold: 4,
            bootstrap_peers: Vec::new(),
        }
    }
}

/// Builds a [`GossipClient`] with a fluent option chain, like
/// `NewGossipClient(store, listener, options...)`.
pub struct GossipClientBuilder<P: Payload> {
    store: Arc<Store<P>>,
    listener: Arc<TcpListener>,
    config: GossipConfig,
}

impl<P: Payload> GossipClientBuilder<P> {
    pub fn with_gossip_factor(mut self, fanout: usize) -> Self {
        self.config.fanout = fanout;
        self
    }

    pub fn with_gossip_interval(mut self, interval: Duration) -> Self {
        self.config.gossip_interval = interval;
        self
    }

    pub fn with_bootstrap_peer(mut self, address: impl Into<String>) -> Self {
        self.config.bootstrap_peers.push(address.into());
        self
    }

    pub fn with_staleness_threshold(mut self, threshold: u32) -> Self {
        self.config.staleness_threshold = threshold;
        self
    }

    pub fn with_dead_threshold(mut self, threshold: u32) -> Self {
        self.config.dead_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<GossipClient<P>, GossipError> {
        let answer_port = self
            .listener
            .local_addr()
            .map_err(|e| GossipError::Codec(format!("listener has no local address: {e}")))?
            .port()
            .to_string();
        Ok(GossipClient {
            store: self.store,
            listener: self.listener,
            config: self.config,
            answer_port,
            shutdown: CancellationToken::new(),
        })
    }
}

/// The listener + sender ticker + reaper ticker that drive gossip rounds
/// for one [`Store`]. `listener` is `Arc`-wrapped so `start` can borrow
/// `&self` (and spawn `'static` tasks off a clone) rather than consuming
/// the client, which is what makes [`GossipClient::stop`] reachable while
/// a gossip round is in progress.
pub struct GossipClient<P: Payload> {
    store: Arc<Store<P>>,
    listener: Arc<TcpListener>,
    config: GossipConfig,
    answer_port: String,
    shutdown: CancellationToken,
}

impl<P: Payload> GossipClient<P> {
    /// `NewGossipClient` - `listener` must already be bound; a bind
    /// failure is the one process-fatal condition in this subsystem, and
    /// the caller observes it directly from `TcpListener::bind` before a
    /// client ever exists.
    pub fn new(store: Arc<Store<P>>, listener: TcpListener) -> GossipClientBuilder<P> {
        GossipClientBuilder {
            store,
            listener: Arc::new(listener),
            config: GossipConfig::default(),
        }
    }

    /// `client.Stop()` - requests shutdown of a running `start` call.
    /// Safe to call concurrently with `start` from another handle to the
    /// same client (e.g. an `Arc<GossipClient<P>>` shared with the caller
    /// that spawned `start`).
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// `client.Start(cancellation)` - blocks until either `external` or a
    /// prior/concurrent call to [`GossipClient::stop`] fires, then waits
    /// for every spawned task to finish before returning. Takes `&self`
    /// rather than consuming the client so a caller can retain a handle
    /// and call `stop()` while `start` is running.
    pub async fn start(&self, external: CancellationToken) -> Result<(), GossipError> {
        // Fuse the externally-supplied token with our own Stop() token:
        // either firing tears everything down.
        {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                external.cancelled().await;
                shutdown.cancel();
            });
        }

        let self_id = self.store.id().clone();
        let mut tasks = JoinSet::new();

        tasks.spawn(listener_loop(
            self.store.clone(),
            self.listener.clone(),
            self_id.clone(),
            self.answer_port.clone(),
            self.shutdown.clone(),
        ));
        tasks.spawn(gossip_loop(
            self.store.clone(),
            self.config.clone(),
            self_id,
            self.answer_port.clone(),
            self.shutdown.clone(),
        ));

        self.shutdown.cancelled().await;
        while tasks.join_next().await.is_some() {}
        Ok(())
    }
}

/// Accepts inbound connections, handing each to its own task.
async fn listener_loop<P: Payload>(
    store: Arc<Store<P>>,
    listener: Arc<TcpListener>,
    self_id: PeerId,
    answer_port: String,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let store = store.clone();
                        let self_id = self_id.clone();
                        let answer_port = answer_port.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(store, stream, peer_addr, self_id, answer_port).await {
                                tracing::debug!(peer = %peer_addr, error = %e, "gossip connection handling failed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept gossip connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("gossip listener shutting down");
                return;
            }
        }
    }
}

/// Reads exactly one frame from `stream`, dispatches on its message
/// variant, and replies (at most once) on a fresh outbound connection.
async fn handle_connection<P: Payload>(
    store: Arc<Store<P>>,
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    self_id: PeerId,
    self_answer_port: String,
) -> Result<(), GossipError> {
    let frame = tokio::time::timeout(CONNECTION_IO_TIMEOUT, codec::read_frame(&mut stream))
        .await
        .map_err(|_| GossipError::Codec("read timed out".into()))??;

    let Some(bytes) = frame else {
        return Ok(()); // connection closed before any byte arrived
    };
    if bytes.is_empty() {
        return Ok(()); // zero-length frame: legal, empty connection
    }

    let envelope = codec::decode_envelope(&bytes)?;
    let reachable_address = reachable_address(peer_addr, &envelope.answer_port);
    let src_id = PeerId::from_raw(envelope.src_id.clone());

    // Any inbound message, regardless of variant, is direct evidence the
    // sender is alive.
    store.heartbeat(src_id, reachable_address.clone()).await;

    match envelope.message {
        GossipMessage::Heartbeat { digest, .. } => {
            let (diff, errors) = store.diff(&digest).await;
            log_errors(&errors);
            let local_digest = store.digest().await;
            send_message(
                &reachable_address,
                &self_id,
                &self_answer_port,
                GossipMessage::GossipDiff {
                    state_delta: diff,
                    digest: local_digest,
                },
            )
            .await?;
        }
        GossipMessage::GossipDiff { state_delta, digest } => {
            let (response_diff, diff_errors) = store.diff(&digest).await;
            log_errors(&diff_errors);
            let apply_errors = store.apply_diff(state_delta).await;
            log_errors(&apply_errors);
            if !response_diff.is_empty() {
                send_message(
                    &reachable_address,
                    &self_id,
                    &self_answer_port,
                    GossipMessage::GossipDelta {
                        state_delta: response_diff,
                    },
                )
                .await?;
            }
        }
        GossipMessage::GossipDelta { state_delta } => {
            let errors = store.apply_diff(state_delta).await;
            log_errors(&errors);
        }
    }

    Ok(())
}

fn log_errors(errors: &[GossipError]) {
    for e in errors {
        match e {
            GossipError::ForkResolved { .. } | GossipError::ForkRetained { .. } => {
                tracing::info!(error = %e, "gossip reconciliation note");
            }
            _ => tracing::debug!(error = %e, "gossip reconciliation error"),
        }
    }
}

/// Reconstructs the sender's dial-back address from the TCP remote host
/// plus the port it advertised in the envelope. IPv6 hosts are
/// bracket-wrapped.
fn reachable_address(peer_addr: SocketAddr, answer_port: &str) -> String {
    match peer_addr {
        SocketAddr::V4(v4) => format!("{}:{}", v4.ip(), answer_port),
        SocketAddr::V6(v6) => format!("[{}]:{}", v6.ip(), answer_port),
    }
}

async fn send_message(
    address: &str,
    self_id: &PeerId,
    self_answer_port: &str,
    message: GossipMessage,
) -> Result<(), GossipError> {
    let envelope = Envelope {
        src_id: self_id.to_string(),
        answer_port: self_answer_port.to_string(),
        message,
    };
    let bytes = codec::encode_envelope(&envelope)?;

    let mut stream = tokio::time::timeout(CONNECTION_IO_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| GossipError::Codec(format!("dial to {address} timed out")))?
        .map_err(|e| GossipError::Codec(format!("dial to {address} failed: {e}")))?;

    tokio::time::timeout(CONNECTION_IO_TIMEOUT, codec::write_frame(&mut stream, &bytes))
        .await
        .map_err(|_| GossipError::Codec(format!("write to {address} timed out")))??;
    Ok(())
}

/// The fused sender+reaper ticker. Performs one sender iteration
/// immediately on entry, then runs both on `config.gossip_interval`. A
/// single tick never blocks the next:
/// per-peer sends are fired as independent tasks rather than awaited
/// in-line.
async fn gossip_loop<P: Payload>(
    store: Arc<Store<P>>,
    config: GossipConfig,
    self_id: PeerId,
    self_answer_port: String,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.gossip_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    sender_tick(&store, &config, &self_id, &self_answer_port).await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sender_tick(&store, &config, &self_id, &self_answer_port).await;
                store.increment_peer_failure(config.staleness_threshold).await;
                let removed = store.remove_stale_peers(config.dead_threshold).await;
                for id in removed {
                    tracing::info!(peer = %id, "reaped dead peer");
                }
            }
            _ = shutdown.cancelled() => {
                tracing::info!("gossip sender/reaper shutting down");
                return;
            }
        }
    }
}

/// Selects up to `fanout` peers from the union of bootstrap peers and
/// peers currently known to the store, and sends each a `Heartbeat`.
/// Bootstrap peers are eligible for selection but are not promoted to
/// node records until a real message is exchanged with them.
async fn sender_tick<P: Payload>(
    store: &Arc<Store<P>>,
    config: &GossipConfig,
    self_id: &PeerId,
    self_answer_port: &str,
) {
    let mut candidates: Vec<String> = config.bootstrap_peers.clone();
    for peer in store.get_peers().await {
        if !peer.is_dead() {
            candidates.push(peer.address().to_string());
        }
    }
    candidates.sort();
    candidates.dedup();

    let mut rng = rand::rng();
    candidates.shuffle(&mut rng);
    candidates.truncate(config.fanout);

    let digest = store.digest().await;
    let ts_nanos = store.clock().now_nanos();

    for address in candidates {
        let self_id = self_id.clone();
        let self_answer_port = self_answer_port.to_string();
        let digest = digest.clone();
        tokio::spawn(async move {
            if let Err(e) = send_message(
                &address,
                &self_id,
                &self_answer_port,
                GossipMessage::Heartbeat {
                    ts_nanos,
                    digest,
                },
            )
            .await
            {
                tracing::debug!(peer = %address, error = %e, "gossip send failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachable_address_brackets_ipv6() {
        let v6: SocketAddr = "[::1]:9000".parse().unwrap();
        assert_eq!(reachable_address(v6, "7946"), "[::1]:7946");

        let v4: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        assert_eq!(reachable_address(v4, "7946"), "10.0.0.1:7946");
    }

    #[test]
    fn default_config_has_expected_defaults() {
        let config = GossipConfig::default();
        assert_eq!(config.gossip_interval, Duration::from_secs(1));
        assert_eq!(config.fanout, 3);
        assert_eq!(config.staleness_threshold, 2);
        assert_eq!(config.dead_threshold, 4);
    }
}
