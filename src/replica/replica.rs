use crate::replica::clock::{LamportClock, LamportTs};
use crate::replica::maintainer::{ClientId, DependencyMaintainer, DependencyRecord};
use crate::replica::peers::{PeerSet, ReplicaId};
use crate::replica::replica_api::{
    ConnectInput, ReadError, ReadInput, ReadOutput, ReplicatedWriteInput, WriteInput, WriteOutput,
};
use crate::replica::replication::ReplicationSender;
use crate::replica::storage::{KvStorage, StoredValue};
use crate::wire;
use tokio::sync::{Mutex, Notify};
use tokio::time::Duration;

pub(crate) struct ReplicaConfig {
    pub logger: slog::Logger,
    pub self_id: ReplicaId,
    pub peers: PeerSet,
    pub peer_dial_timeout: Duration,
    pub dependency_poll_interval: Duration,
}

/// Replica is one process's worth of shared state: the key-value storage,
/// the per-client dependency maintainer and the Lamport clock, each behind
/// its own mutex, plus the immutable identity and peer set.
///
/// Handlers that need more than one of the three mutexes take them in the
/// fixed order storage -> maintainer -> clock and release in reverse. The
/// replicated-write handler never holds storage and the clock at the same
/// time, so it composes with the ordered acquisition of the client-write
/// handler.
pub(crate) struct Replica {
    logger: slog::Logger,
    self_id: ReplicaId,
    storage: Mutex<KvStorage>,
    maintainer: Mutex<DependencyMaintainer>,
    clock: Mutex<LamportClock>,
    /// Signalled after every storage put so dependency-gating loops can
    /// recheck immediately instead of sleeping out their full interval.
    storage_changed: Notify,
    sender: ReplicationSender,
    dependency_poll_interval: Duration,
}

impl Replica {
    pub(crate) fn new(config: ReplicaConfig) -> Self {
        let sender = ReplicationSender::new(
            config.logger.clone(),
            config.peers,
            config.peer_dial_timeout,
        );

        Replica {
            logger: config.logger,
            self_id: config.self_id,
            storage: Mutex::new(KvStorage::new()),
            maintainer: Mutex::new(DependencyMaintainer::new()),
            clock: Mutex::new(LamportClock::new()),
            storage_changed: Notify::new(),
            sender,
            dependency_poll_interval: config.dependency_poll_interval,
        }
    }

    pub(crate) fn self_id(&self) -> &ReplicaId {
        &self.self_id
    }

    /// Idempotent: a repeat connect leaves an existing dependency list alone.
    pub(crate) async fn handle_connect(&self, input: ConnectInput) {
        slog::info!(self.logger, "handling connect"; "client" => %input.client_id);
        self.maintainer.lock().await.ensure(&input.client_id);
    }

    pub(crate) async fn handle_read(&self, input: ReadInput) -> Result<ReadOutput, ReadError> {
        slog::info!(self.logger, "handling read"; "client" => %input.client_id, "key" => %input.key);

        let storage = self.storage.lock().await;
        let mut maintainer = self.maintainer.lock().await;

        let stored = storage
            .get(&input.key)
            .ok_or_else(|| ReadError::KeyNotFound(input.key.clone()))?;

        maintainer.append(
            &input.client_id,
            DependencyRecord {
                key: input.key.clone(),
                origin: stored.origin.clone(),
                ts: stored.ts,
            },
        );

        Ok(ReadOutput {
            key: input.key,
            value: stored.value.clone(),
            origin: stored.origin.clone(),
            ts: stored.ts,
        })
    }

    pub(crate) async fn handle_write(&self, input: WriteInput) -> WriteOutput {
        slog::info!(self.logger, "handling write"; "client" => %input.client_id, "key" => %input.key);

        let mut storage = self.storage.lock().await;
        let mut maintainer = self.maintainer.lock().await;
        let mut clock = self.clock.lock().await;

        let ts = clock.tick_local();
        storage.put(
            input.key.clone(),
            StoredValue {
                value: input.value.clone(),
                origin: self.self_id.clone(),
                ts,
            },
        );

        // The outgoing message carries the dependency list accumulated up to
        // this point; the client's own list shrinks to just this write.
        let prior_dependencies = maintainer.take_and_reset(
            &input.client_id,
            DependencyRecord {
                key: input.key.clone(),
                origin: self.self_id.clone(),
                ts,
            },
        );

        let message = wire::encode_request(
            wire::REPLICATED_WRITE,
            &wire::ReplicatedWriteArgs {
                key: input.key.clone(),
                value: input.value.clone(),
                client_id: input.client_id.as_str().to_string(),
                dependencies: prior_dependencies.into_iter().map(Into::into).collect(),
                original_server: self.self_id.as_str().to_string(),
                clock: ts,
            },
        );

        drop(clock);
        drop(maintainer);
        drop(storage);
        self.storage_changed.notify_waiters();

        slog::info!(self.logger, "committed write"; "key" => %input.key, "value" => %input.value, "ts" => ts.as_u64());

        // Fire and forget; the client's response never waits on peers.
        self.sender.fan_out(message, input.replication_delay);

        WriteOutput {
            key: input.key,
            value: input.value,
            ts,
        }
    }

    /// Applies a write replicated from a peer, but only once every
    /// dependency it carries is locally visible.
    ///
    /// The wait releases the storage lock each round so concurrent appliers
    /// can make progress, then rechecks on a storage-change wakeup or after
    /// the poll interval, whichever comes first. There is no deadline: a
    /// dependency that never arrives (dropped message, peer that was down)
    /// gates this write forever, by design.
    pub(crate) async fn handle_replicated_write(&self, input: ReplicatedWriteInput) {
        slog::info!(
            self.logger, "handling replicated write";
            "origin" => %input.origin, "key" => %input.key, "deps" => input.dependencies.len()
        );

        let ReplicatedWriteInput {
            key,
            value,
            client_id: _,
            mut dependencies,
            origin,
            clock: incoming_clock,
        } = input;

        // Oldest first: a causal chain arriving roughly in order then
        // short-circuits through the checks.
        dependencies.sort_by_key(|d| d.ts);

        for dependency in &dependencies {
            loop {
                // Register for wakeup before checking, so a put landing
                // between check and wait cannot be missed.
                let wakeup = self.storage_changed.notified();
                tokio::pin!(wakeup);
                wakeup.as_mut().enable();

                let satisfied = {
                    let storage = self.storage.lock().await;
                    storage.has_at_least(&dependency.key, dependency.ts)
                };
                if satisfied {
                    break;
                }

                slog::info!(
                    self.logger, "delaying replicated write";
                    "key" => %key, "value" => %value,
                    "waiting_on" => %dependency.key, "needs_ts" => dependency.ts.as_u64()
                );
                let _ = tokio::time::timeout(self.dependency_poll_interval, wakeup).await;
            }
        }

        {
            let mut storage = self.storage.lock().await;
            storage.put(
                key.clone(),
                StoredValue {
                    value: value.clone(),
                    origin,
                    ts: incoming_clock,
                },
            );
        }
        self.storage_changed.notify_waiters();

        self.clock.lock().await.merge(incoming_clock);

        slog::info!(self.logger, "committed replicated write"; "key" => %key, "value" => %value, "ts" => incoming_clock.as_u64());
    }
}

// Inspection accessors, used by the public handle and by tests.
impl Replica {
    pub(crate) async fn current_clock(&self) -> LamportTs {
        self.clock.lock().await.current()
    }

    pub(crate) async fn stored_value(&self, key: &str) -> Option<StoredValue> {
        self.storage.lock().await.get(key).cloned()
    }

    pub(crate) async fn dependency_list(&self, client_id: &ClientId) -> Vec<DependencyRecord> {
        self.maintainer.lock().await.list_for(client_id).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_replica(self_addr: &str) -> Arc<Replica> {
        let self_id = ReplicaId::new(self_addr);
        let peers = PeerSet::try_new(&self_id, vec![]).unwrap();
        Arc::new(Replica::new(ReplicaConfig {
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            self_id,
            peers,
            peer_dial_timeout: Duration::from_secs(3),
            dependency_poll_interval: Duration::from_millis(10),
        }))
    }

    fn write(client: &str, key: &str, value: &str) -> WriteInput {
        WriteInput {
            client_id: ClientId::new(client),
            key: key.to_string(),
            value: value.to_string(),
            replication_delay: None,
        }
    }

    fn read(client: &str, key: &str) -> ReadInput {
        ReadInput {
            client_id: ClientId::new(client),
            key: key.to_string(),
        }
    }

    fn replicated(
        key: &str,
        value: &str,
        origin: &str,
        clock: u64,
        deps: Vec<DependencyRecord>,
    ) -> ReplicatedWriteInput {
        ReplicatedWriteInput {
            key: key.to_string(),
            value: value.to_string(),
            client_id: ClientId::new("remote-client"),
            dependencies: deps,
            origin: ReplicaId::new(origin),
            clock: LamportTs::new(clock),
        }
    }

    fn dep(key: &str, origin: &str, ts: u64) -> DependencyRecord {
        DependencyRecord {
            key: key.to_string(),
            origin: ReplicaId::new(origin),
            ts: LamportTs::new(ts),
        }
    }

    #[tokio::test]
    async fn write_is_immediately_visible_on_origin() {
        let replica = test_replica("localhost:20001");

        let written = replica.handle_write(write("c1", "a", "1")).await;
        assert_eq!(LamportTs::new(1), written.ts);

        let output = replica.handle_read(read("c1", "a")).await.unwrap();
        assert_eq!("1", output.value);
        assert_eq!(written.ts, output.ts);
        assert_eq!(ReplicaId::new("localhost:20001"), output.origin);
    }

    #[tokio::test]
    async fn read_of_absent_key_fails_without_touching_dependencies() {
        let replica = test_replica("localhost:20001");
        let client = ClientId::new("c1");

        replica
            .handle_connect(ConnectInput {
                client_id: client.clone(),
            })
            .await;

        let result = replica.handle_read(read("c1", "x")).await;
        assert_eq!(
            "key \"x\" does not exist",
            result.unwrap_err().to_string()
        );
        assert!(replica.dependency_list(&client).await.is_empty());
    }

    #[tokio::test]
    async fn read_appends_one_dependency_at_the_tail() {
        let replica = test_replica("localhost:20001");
        let client = ClientId::new("c1");

        replica.handle_write(write("other", "a", "1")).await;
        replica.handle_write(write("other", "b", "2")).await;

        replica.handle_read(read("c1", "a")).await.unwrap();
        let after_first = replica.dependency_list(&client).await;
        assert_eq!(vec![dep("a", "localhost:20001", 1)], after_first);

        replica.handle_read(read("c1", "b")).await.unwrap();
        let after_second = replica.dependency_list(&client).await;
        assert_eq!(
            vec![dep("a", "localhost:20001", 1), dep("b", "localhost:20001", 2)],
            after_second
        );
    }

    #[tokio::test]
    async fn write_resets_dependency_list_to_singleton() {
        let replica = test_replica("localhost:20001");
        let client = ClientId::new("c1");

        replica.handle_write(write("seed", "a", "1")).await;
        replica.handle_write(write("seed", "b", "2")).await;
        replica.handle_read(read("c1", "a")).await.unwrap();
        replica.handle_read(read("c1", "b")).await.unwrap();

        let written = replica.handle_write(write("c1", "c", "3")).await;

        let list = replica.dependency_list(&client).await;
        assert_eq!(vec![dep("c", "localhost:20001", written.ts.as_u64())], list);
    }

    #[tokio::test]
    async fn repeat_connect_does_not_reset_dependencies() {
        let replica = test_replica("localhost:20001");
        let client = ClientId::new("c1");

        replica
            .handle_connect(ConnectInput {
                client_id: client.clone(),
            })
            .await;
        replica.handle_write(write("seed", "a", "1")).await;
        replica.handle_read(read("c1", "a")).await.unwrap();

        replica
            .handle_connect(ConnectInput {
                client_id: client.clone(),
            })
            .await;

        assert_eq!(1, replica.dependency_list(&client).await.len());
    }

    #[tokio::test]
    async fn replicated_write_with_no_dependencies_applies_immediately() {
        let replica = test_replica("localhost:20002");

        replica
            .handle_replicated_write(replicated("a", "1", "localhost:20001", 1, vec![]))
            .await;

        let stored = replica.stored_value("a").await.unwrap();
        assert_eq!("1", stored.value);
        assert_eq!(ReplicaId::new("localhost:20001"), stored.origin);
        assert_eq!(LamportTs::new(1), stored.ts);
    }

    #[tokio::test]
    async fn replicated_write_merges_the_clock() {
        let replica = test_replica("localhost:20002");

        replica
            .handle_replicated_write(replicated("a", "1", "localhost:20001", 7, vec![]))
            .await;

        assert_eq!(LamportTs::new(8), replica.current_clock().await);

        // A stale message must not rewind.
        replica
            .handle_replicated_write(replicated("b", "2", "localhost:20001", 2, vec![]))
            .await;
        assert_eq!(LamportTs::new(8), replica.current_clock().await);
    }

    #[tokio::test]
    async fn replicated_write_waits_for_its_dependency() {
        let replica = test_replica("localhost:20002");

        let gated = {
            let replica = Arc::clone(&replica);
            tokio::spawn(async move {
                replica
                    .handle_replicated_write(replicated(
                        "b",
                        "2",
                        "localhost:20001",
                        2,
                        vec![dep("a", "localhost:20001", 1)],
                    ))
                    .await;
            })
        };

        // Give the gating loop a few poll rounds; "b" must stay invisible.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(replica.stored_value("b").await.is_none());
        assert!(!gated.is_finished());

        // Delivering the dependency unblocks the gated write.
        replica
            .handle_replicated_write(replicated("a", "1", "localhost:20001", 1, vec![]))
            .await;
        gated.await.unwrap();

        assert_eq!("2", replica.stored_value("b").await.unwrap().value);
        // Dependency satisfaction held at apply time.
        assert!(replica.stored_value("a").await.unwrap().ts >= LamportTs::new(1));
    }

    #[tokio::test]
    async fn dependency_is_satisfied_by_newer_write_from_any_origin() {
        let replica = test_replica("localhost:20003");

        // A newer version of "a" from a different origin than the dependency
        // names is enough; the gate compares timestamps only.
        replica
            .handle_replicated_write(replicated("a", "9", "localhost:20009", 5, vec![]))
            .await;

        replica
            .handle_replicated_write(replicated(
                "b",
                "2",
                "localhost:20001",
                2,
                vec![dep("a", "localhost:20001", 1)],
            ))
            .await;

        assert_eq!("2", replica.stored_value("b").await.unwrap().value);
    }

    #[tokio::test]
    async fn dependencies_are_waited_on_oldest_first() {
        let replica = test_replica("localhost:20002");

        let gated = {
            let replica = Arc::clone(&replica);
            tokio::spawn(async move {
                replica
                    .handle_replicated_write(replicated(
                        "c",
                        "3",
                        "localhost:20001",
                        3,
                        // Deliberately listed newest-first; the handler sorts.
                        vec![dep("b", "localhost:20001", 2), dep("a", "localhost:20001", 1)],
                    ))
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!gated.is_finished());

        replica
            .handle_replicated_write(replicated("a", "1", "localhost:20001", 1, vec![]))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!gated.is_finished());

        replica
            .handle_replicated_write(replicated("b", "2", "localhost:20001", 2, vec![]))
            .await;
        gated.await.unwrap();

        assert_eq!("3", replica.stored_value("c").await.unwrap().value);
    }

    #[tokio::test]
    async fn clock_never_decreases_across_mixed_operations() {
        let replica = test_replica("localhost:20001");
        let mut previous = replica.current_clock().await;

        for i in 0..5 {
            replica
                .handle_write(write("c1", &format!("k{}", i), "v"))
                .await;
            let now = replica.current_clock().await;
            assert!(now >= previous);
            previous = now;

            replica
                .handle_replicated_write(replicated(
                    &format!("r{}", i),
                    "v",
                    "localhost:20002",
                    i as u64,
                    vec![],
                ))
                .await;
            let now = replica.current_clock().await;
            assert!(now >= previous);
            previous = now;
        }
    }

    #[tokio::test]
    async fn concurrent_local_writes_get_distinct_timestamps() {
        let replica = test_replica("localhost:20001");

        let mut handles = Vec::new();
        for i in 0..10 {
            let replica = Arc::clone(&replica);
            handles.push(tokio::spawn(async move {
                replica
                    .handle_write(write(&format!("c{}", i), &format!("k{}", i), "v"))
                    .await
                    .ts
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(LamportTs::new(10), replica.current_clock().await);
    }
}
