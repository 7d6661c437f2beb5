use std::convert::TryFrom;
use tokio::time::Duration;

/// Tunables with sensible defaults; `None` means "use the default".
#[derive(Clone, Default)]
pub struct ReplicaOptions {
    /// How long an outbound replication send waits for a peer to answer the
    /// dial before giving up on that peer.
    pub peer_dial_timeout: Option<Duration>,
    /// Upper bound between dependency rechecks while a replicated write is
    /// gated. Storage updates wake waiters earlier.
    pub dependency_poll_interval: Option<Duration>,
}

pub(crate) struct ReplicaOptionsValidated {
    pub peer_dial_timeout: Duration,
    pub dependency_poll_interval: Duration,
}

impl ReplicaOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.peer_dial_timeout.is_zero() {
            return Err("Peer dial timeout must be non-zero");
        }
        if self.dependency_poll_interval.is_zero() {
            return Err("Dependency poll interval must be non-zero");
        }

        Ok(())
    }
}

impl TryFrom<ReplicaOptions> for ReplicaOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ReplicaOptions) -> Result<Self, Self::Error> {
        let values = ReplicaOptionsValidated {
            peer_dial_timeout: options.peer_dial_timeout.unwrap_or(Duration::from_secs(3)),
            dependency_poll_interval: options
                .dependency_poll_interval
                .unwrap_or(Duration::from_secs(1)),
        };

        values.validate()?;
        Ok(values)
    }
}
