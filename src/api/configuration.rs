//! This mod is responsible for describing one replica process at launch.

use crate::api::options::ReplicaOptions;

/// Everything needed to bring up one replica. The peer set is fixed for the
/// life of the process; there are no runtime membership changes.
pub struct ReplicaStartConfig {
    /// `host:port` to listen on. Doubles as this replica's identity, so it
    /// must be the address the peers were configured to dial.
    pub listen: String,
    /// `host:port` of every other replica in the deployment.
    pub peers: Vec<String>,
    pub logger: slog::Logger,
    pub options: ReplicaOptions,
}
