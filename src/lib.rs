mod api;
mod replica;
mod server;
mod wire;

pub use api::try_start_replica;
pub use api::ClientError;
pub use api::ReplicaHandle;
pub use api::ReplicaOptions;
pub use api::ReplicaStartConfig;
pub use api::ReplicaStartError;
pub use api::StoreClient;
pub use replica::ClientId;
pub use replica::DependencyRecord;
pub use replica::InvalidHostPort;
pub use replica::InvalidPeerSet;
pub use replica::LamportTs;
pub use replica::ReplicaId;
pub use replica::StoredValue;
