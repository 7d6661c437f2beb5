use crate::api::configuration::ReplicaStartConfig;
use crate::api::options::ReplicaOptionsValidated;
use crate::replica::{
    ClientId, DependencyRecord, InvalidHostPort, InvalidPeerSet, LamportTs, PeerSet, Replica,
    ReplicaConfig, ReplicaId, StoredValue,
};
use crate::server;
use crate::server::{RequestListener, ShutdownHandle};
use std::convert::TryFrom;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug, thiserror::Error)]
pub enum ReplicaStartError {
    #[error("bad host:port {0:?}")]
    InvalidHostPort(String, #[source] InvalidHostPort),
    #[error("invalid peer set")]
    InvalidPeerSet(#[from] InvalidPeerSet),
    #[error("illegal options for configuring replica: {0}")]
    IllegalOptions(String),
    #[error("cannot listen on {0:?}")]
    Bind(String, #[source] io::Error),
}

/// Validates the config, binds the listen address and spawns the request
/// listener. The returned handle keeps the replica alive; dropping it stops
/// the listener.
pub async fn try_start_replica(config: ReplicaStartConfig) -> Result<ReplicaHandle, ReplicaStartError> {
    let self_id = parse_host_port(&config.listen)?;

    let mut peers = Vec::with_capacity(config.peers.len());
    for peer in &config.peers {
        peers.push(parse_host_port(peer)?);
    }
    let peers = PeerSet::try_new(&self_id, peers)?;

    let options = ReplicaOptionsValidated::try_from(config.options)
        .map_err(|e| ReplicaStartError::IllegalOptions(e.to_string()))?;

    let listener = TcpListener::bind(self_id.as_str())
        .await
        .map_err(|e| ReplicaStartError::Bind(self_id.as_str().to_string(), e))?;

    let logger = config
        .logger
        .new(slog::o!("ReplicaId" => self_id.as_str().to_string()));

    let replica = Arc::new(Replica::new(ReplicaConfig {
        logger: logger.clone(),
        self_id,
        peers,
        peer_dial_timeout: options.peer_dial_timeout,
        dependency_poll_interval: options.dependency_poll_interval,
    }));

    let (shutdown_handle, shutdown_signal) = server::shutdown_signal();
    let request_listener = RequestListener::new(logger, Arc::clone(&replica), listener);
    tokio::spawn(request_listener.run(shutdown_signal));

    Ok(ReplicaHandle {
        replica,
        _shutdown: shutdown_handle,
    })
}

fn parse_host_port(host_port: &str) -> Result<ReplicaId, ReplicaStartError> {
    ReplicaId::parse(host_port)
        .map_err(|e| ReplicaStartError::InvalidHostPort(host_port.to_string(), e))
}

/// ReplicaHandle is the in-process view of a running replica. Dropping it
/// shuts the listener down.
pub struct ReplicaHandle {
    replica: Arc<Replica>,
    _shutdown: ShutdownHandle,
}

// In-memory state accessors for operators and tests. All of these take the
// corresponding internal lock, so they see applied state only.
impl ReplicaHandle {
    pub fn replica_id(&self) -> &ReplicaId {
        self.replica.self_id()
    }

    pub async fn current_clock(&self) -> LamportTs {
        self.replica.current_clock().await
    }

    pub async fn stored_value(&self, key: &str) -> Option<StoredValue> {
        self.replica.stored_value(key).await
    }

    pub async fn dependency_list(&self, client_id: &ClientId) -> Vec<DependencyRecord> {
        self.replica.dependency_list(client_id).await
    }
}
