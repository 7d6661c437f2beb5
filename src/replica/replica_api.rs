//! Typed inputs and outputs for the four operations a replica handles. The
//! server layer converts wire shapes into these and back; handlers never see
//! raw JSON.

use crate::replica::clock::LamportTs;
use crate::replica::maintainer::{ClientId, DependencyRecord};
use crate::replica::peers::ReplicaId;
use tokio::time::Duration;

#[derive(Debug)]
pub(crate) struct ConnectInput {
    pub client_id: ClientId,
}

#[derive(Debug)]
pub(crate) struct ReadInput {
    pub client_id: ClientId,
    pub key: String,
}

#[derive(Debug)]
pub(crate) struct ReadOutput {
    pub key: String,
    pub value: String,
    pub origin: ReplicaId,
    pub ts: LamportTs,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ReadError {
    #[error("key {0:?} does not exist")]
    KeyNotFound(String),
}

#[derive(Debug)]
pub(crate) struct WriteInput {
    pub client_id: ClientId,
    pub key: String,
    pub value: String,
    /// Test affordance: hold the outgoing replicated write toward one peer
    /// for a while, so causal gating can be observed end to end. Never
    /// affects the local commit.
    pub replication_delay: Option<ReplicationDelay>,
}

#[derive(Debug)]
pub(crate) struct WriteOutput {
    pub key: String,
    pub value: String,
    pub ts: LamportTs,
}

#[derive(Clone, Debug)]
pub(crate) struct ReplicationDelay {
    pub peer: ReplicaId,
    pub duration: Duration,
}

#[derive(Debug)]
pub(crate) struct ReplicatedWriteInput {
    pub key: String,
    pub value: String,
    pub client_id: ClientId,
    pub dependencies: Vec<DependencyRecord>,
    pub origin: ReplicaId,
    pub clock: LamportTs,
}
