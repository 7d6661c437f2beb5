use crate::replica::clock::LamportTs;
use crate::replica::peers::ReplicaId;
use std::collections::HashMap;

/// StoredValue is the currently visible version of a key: the value itself,
/// the replica whose client write produced it, and the Lamport timestamp that
/// replica assigned when it accepted the write.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredValue {
    pub value: String,
    pub origin: ReplicaId,
    pub ts: LamportTs,
}

/// KvStorage holds one version per key. Writes are unconditional overwrites;
/// the handlers above this are responsible for the ordering discipline.
///
/// No synchronization here. The owning `Replica` wraps this in a mutex, which
/// ranks first in the storage -> maintainer -> clock lock order.
pub(crate) struct KvStorage {
    entries: HashMap<String, StoredValue>,
}

impl KvStorage {
    pub(crate) fn new() -> Self {
        KvStorage {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&StoredValue> {
        self.entries.get(key)
    }

    pub(crate) fn put(&mut self, key: String, value: StoredValue) {
        self.entries.insert(key, value);
    }

    /// True iff a value for `key` exists with a timestamp at or past `ts`.
    ///
    /// The origin of the stored value is deliberately not consulted: a newer
    /// write from any replica satisfies the check. Timestamps from different
    /// origins are comparable because every apply merges the incoming clock.
    pub(crate) fn has_at_least(&self, key: &str, ts: LamportTs) -> bool {
        match self.entries.get(key) {
            Some(stored) => stored.ts >= ts,
            None => false,
        }
    }
}
