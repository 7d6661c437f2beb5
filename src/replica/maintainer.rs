use crate::replica::clock::LamportTs;
use crate::replica::peers::ReplicaId;
use std::collections::HashMap;
use std::fmt;

/// ClientId is an opaque identifier a client chooses when it first connects
/// and repeats on every request. It scopes that client's dependency list.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(client_id: impl Into<String>) -> Self {
        ClientId(client_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DependencyRecord says "this client has observed the version of `key` that
/// `origin` stamped with `ts`". A replicated write carries the accumulated
/// records so receiving replicas can hold it back until all of them are
/// locally visible.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyRecord {
    pub key: String,
    pub origin: ReplicaId,
    pub ts: LamportTs,
}

/// DependencyMaintainer tracks, per client, the ordered list of dependency
/// records accumulated by that client's reads and its last local write.
///
/// The list content is semantically a set, but insertion order is kept: it
/// costs nothing and makes logs and tests straightforward to follow.
///
/// No synchronization here; the owning `Replica` wraps this in a mutex that
/// ranks second in the storage -> maintainer -> clock lock order.
pub(crate) struct DependencyMaintainer {
    by_client: HashMap<ClientId, Vec<DependencyRecord>>,
}

impl DependencyMaintainer {
    pub(crate) fn new() -> Self {
        DependencyMaintainer {
            by_client: HashMap::new(),
        }
    }

    /// Idempotently creates an empty dependency list for a client. A repeat
    /// `connect` must not reset what the client has already accumulated.
    pub(crate) fn ensure(&mut self, client_id: &ClientId) {
        if !self.by_client.contains_key(client_id) {
            self.by_client.insert(client_id.clone(), Vec::new());
        }
    }

    /// Appends a record after a successful read. Clients are allowed to skip
    /// `connect`, so a missing list is created on first touch.
    ///
    /// Re-observing a version already on the list adds nothing: the list is
    /// semantically a set of (key, origin, ts) triples.
    pub(crate) fn append(&mut self, client_id: &ClientId, record: DependencyRecord) {
        let list = self.by_client.entry(client_id.clone()).or_default();
        if !list.contains(&record) {
            list.push(record);
        }
    }

    /// Atomically takes the client's current list and replaces it with the
    /// singleton `[new_head]`. Client-write handling sends the *previous*
    /// list out with the replicated write; from then on the client depends
    /// only on its own freshest write.
    pub(crate) fn take_and_reset(
        &mut self,
        client_id: &ClientId,
        new_head: DependencyRecord,
    ) -> Vec<DependencyRecord> {
        self.by_client
            .insert(client_id.clone(), vec![new_head])
            .unwrap_or_default()
    }

    pub(crate) fn list_for(&self, client_id: &ClientId) -> &[DependencyRecord] {
        self.by_client
            .get(client_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
