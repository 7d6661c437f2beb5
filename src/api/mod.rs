//! This mod holds the crate's public surface: starting a replica and talking
//! to one as a client.
mod client;
mod configuration;
mod factory;
mod options;

pub use client::ClientError;
pub use client::StoreClient;
pub use configuration::ReplicaStartConfig;
pub use factory::try_start_replica;
pub use factory::ReplicaHandle;
pub use factory::ReplicaStartError;
pub use options::ReplicaOptions;
