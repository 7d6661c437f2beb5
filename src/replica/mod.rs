mod clock;
mod maintainer;
mod peers;
mod replica;
mod replica_api;
mod replication;
mod storage;

pub use clock::LamportTs;
pub use maintainer::ClientId;
pub use maintainer::DependencyRecord;
pub use peers::InvalidHostPort;
pub use peers::InvalidPeerSet;
pub use peers::ReplicaId;
pub use storage::StoredValue;

pub(crate) use peers::PeerSet;
pub(crate) use replica::Replica;
pub(crate) use replica::ReplicaConfig;
pub(crate) use replica_api::ConnectInput;
pub(crate) use replica_api::ReadInput;
pub(crate) use replica_api::ReplicatedWriteInput;
pub(crate) use replica_api::ReplicationDelay;
pub(crate) use replica_api::WriteInput;
