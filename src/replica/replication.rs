use crate::replica::peers::{PeerSet, ReplicaId};
use crate::replica::replica_api::ReplicationDelay;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Duration;

/// ReplicationSender fans a replicated write out to every other replica.
///
/// Fire and forget: one outbound task per peer per write, each dialing with
/// a bounded timeout, writing the encoded message and half-closing. A peer
/// that cannot be reached simply misses the write; there is no retry queue
/// and no acknowledgment.
pub(crate) struct ReplicationSender {
    logger: slog::Logger,
    peers: PeerSet,
    dial_timeout: Duration,
}

impl ReplicationSender {
    pub(crate) fn new(logger: slog::Logger, peers: PeerSet, dial_timeout: Duration) -> Self {
        ReplicationSender {
            logger,
            peers,
            dial_timeout,
        }
    }

    /// Dispatches `payload` to every peer. Returns as soon as the tasks are
    /// spawned; the caller's client response must not wait on delivery.
    pub(crate) fn fan_out(&self, payload: Vec<u8>, delay: Option<ReplicationDelay>) {
        for peer in self.peers.iter() {
            let logger = self
                .logger
                .new(slog::o!("RemoteReplicaId" => peer.as_str().to_string()));
            let peer = peer.clone();
            let payload = payload.clone();
            let dial_timeout = self.dial_timeout;
            let injected_delay = match &delay {
                Some(d) if d.peer == peer => Some(d.duration),
                _ => None,
            };

            tokio::spawn(async move {
                if let Some(duration) = injected_delay {
                    slog::debug!(logger, "holding replicated write"; "for_secs" => duration.as_secs());
                    tokio::time::sleep(duration).await;
                }
                if let Err(e) = send_one(&peer, &payload, dial_timeout).await {
                    slog::error!(logger, "replicated write not delivered"; "error" => %e);
                }
            });
        }
    }
}

async fn send_one(peer: &ReplicaId, payload: &[u8], dial_timeout: Duration) -> io::Result<()> {
    let connect = TcpStream::connect(peer.as_str());
    let mut stream = tokio::time::timeout(dial_timeout, connect)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "dial timed out"))??;

    stream.write_all(payload).await?;
    // Half-close tells the receiver the one message is complete.
    stream.shutdown().await?;
    Ok(())
}
