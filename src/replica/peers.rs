use std::collections::HashSet;
use std::fmt;

/// ReplicaId is the `host:port` string a replica listens on. It uniquely
/// names a replica within a deployment and doubles as its dial address.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct ReplicaId(String);

impl ReplicaId {
    /// Wraps an id without validating it. Used for identities that arrive on
    /// the wire from peers; operator-supplied addresses go through `parse`.
    pub fn new(replica_id: impl Into<String>) -> Self {
        ReplicaId(replica_id.into())
    }

    /// Parses and validates an operator-supplied `host:port` string.
    pub fn parse(host_port: &str) -> Result<Self, InvalidHostPort> {
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| InvalidHostPort::MissingPort(host_port.to_string()))?;

        if host.is_empty() {
            return Err(InvalidHostPort::EmptyHost(host_port.to_string()));
        }

        let port: u32 = port
            .parse()
            .map_err(|_| InvalidHostPort::BadPort(host_port.to_string()))?;

        // Port 0 would make the OS pick a port, and the chosen one would no
        // longer match the identity peers dial.
        if port == 0 || port > u16::MAX as u32 {
            return Err(InvalidHostPort::PortOutOfRange(host_port.to_string()));
        }

        Ok(ReplicaId(host_port.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidHostPort {
    #[error("'{0}' is not in host:port form")]
    MissingPort(String),
    #[error("empty host in '{0}'")]
    EmptyHost(String),
    #[error("unparsable port in '{0}'")]
    BadPort(String),
    #[error("tcp port out of range in '{0}'")]
    PortOutOfRange(String),
}

/// PeerSet is every replica in the deployment that is not me. Fixed at
/// startup; replication fans out to exactly these addresses.
pub(crate) struct PeerSet {
    peers: Vec<ReplicaId>,
}

impl PeerSet {
    pub(crate) fn try_new(my_id: &ReplicaId, peers: Vec<ReplicaId>) -> Result<Self, InvalidPeerSet> {
        let mut seen: HashSet<&ReplicaId> = HashSet::with_capacity(peers.len());
        for peer in &peers {
            if peer == my_id {
                return Err(InvalidPeerSet::SelfInPeerSet(peer.clone().into_inner()));
            }
            if !seen.insert(peer) {
                return Err(InvalidPeerSet::DuplicatePeer(peer.clone().into_inner()));
            }
        }

        Ok(PeerSet { peers })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ReplicaId> {
        self.peers.iter()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidPeerSet {
    #[error("duplicate replica '{0}' in peer set")]
    DuplicatePeer(String),
    #[error("own address '{0}' listed as a peer")]
    SelfInPeerSet(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_ordinary_host_port() {
        assert!(ReplicaId::parse("localhost:20001").is_ok());
        assert!(ReplicaId::parse("10.0.0.7:65535").is_ok());
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(matches!(
            ReplicaId::parse("localhost"),
            Err(InvalidHostPort::MissingPort(_))
        ));
        assert!(matches!(
            ReplicaId::parse(":20001"),
            Err(InvalidHostPort::EmptyHost(_))
        ));
        assert!(matches!(
            ReplicaId::parse("localhost:http"),
            Err(InvalidHostPort::BadPort(_))
        ));
    }

    #[test]
    fn parse_rejects_out_of_range_ports() {
        assert!(matches!(
            ReplicaId::parse("localhost:0"),
            Err(InvalidHostPort::PortOutOfRange(_))
        ));
        assert!(matches!(
            ReplicaId::parse("localhost:65536"),
            Err(InvalidHostPort::PortOutOfRange(_))
        ));
    }

    #[test]
    fn peer_set_rejects_duplicates_and_self() {
        let me = ReplicaId::new("localhost:20001");
        let peer = ReplicaId::new("localhost:20002");

        assert!(PeerSet::try_new(&me, vec![peer.clone(), peer.clone()]).is_err());
        assert!(PeerSet::try_new(&me, vec![me.clone()]).is_err());
        assert!(PeerSet::try_new(&me, vec![peer]).is_ok());
    }
}
