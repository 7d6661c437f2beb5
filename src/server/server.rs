use crate::replica::{
    ClientId, ConnectInput, ReadInput, Replica, ReplicaId, ReplicatedWriteInput, ReplicationDelay,
    WriteInput,
};
use crate::server::shutdown::ShutdownSignal;
use crate::wire;
use crate::wire::OperationResponse;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

const UNMARSHAL_FAIL_DETAIL: &str = "fail to unmarshal";

/// RequestListener accepts connections from clients and from peer replicas
/// and spawns one handler task per connection.
///
/// Every connection carries exactly one JSON request. Client operations get
/// one JSON response back; replicated writes get none. Either way the
/// connection is closed afterwards.
pub(crate) struct RequestListener {
    logger: slog::Logger,
    replica: Arc<Replica>,
    listener: TcpListener,
}

impl RequestListener {
    pub(crate) fn new(logger: slog::Logger, replica: Arc<Replica>, listener: TcpListener) -> Self {
        RequestListener {
            logger,
            replica,
            listener,
        }
    }

    pub(crate) async fn run(self, mut shutdown: ShutdownSignal) {
        slog::info!(self.logger, "server listening"; "addr" => %self.replica.self_id());

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    slog::info!(self.logger, "server stopped");
                    return;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, remote)) => {
                            let logger = self.logger.new(slog::o!("Remote" => remote.to_string()));
                            let replica = Arc::clone(&self.replica);
                            tokio::spawn(handle_connection(logger, replica, stream));
                        }
                        Err(e) => {
                            slog::error!(self.logger, "accept failed"; "error" => %e);
                        }
                    }
                }
            }
        }
    }
}

/// Owns the accepted connection: reads the one request, dispatches it and
/// writes back the response, if the operation has one.
async fn handle_connection(logger: slog::Logger, replica: Arc<Replica>, mut stream: TcpStream) {
    let mut raw = Vec::new();
    if let Err(e) = stream.read_to_end(&mut raw).await {
        slog::error!(logger, "request not readable"; "error" => %e);
        return;
    }

    let response = dispatch(&logger, &replica, &raw).await;

    if let Some(response) = response {
        if let Err(e) = stream.write_all(&wire::encode(&response)).await {
            slog::error!(logger, "response not sent"; "error" => %e);
        }
    }
    let _ = stream.shutdown().await;
}

/// Two-phase decode: the envelope first, then the per-operation args. Either
/// phase failing produces a `fail` response rather than a dropped connection.
/// Returns `None` for operations that are one-way on the wire.
async fn dispatch(
    logger: &slog::Logger,
    replica: &Replica,
    raw: &[u8],
) -> Option<OperationResponse> {
    let envelope: wire::RequestEnvelope = match wire::decode(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            slog::error!(logger, "undecodable request"; "error" => %e);
            return Some(OperationResponse::fail(UNMARSHAL_FAIL_DETAIL));
        }
    };

    match envelope.op.as_str() {
        wire::CONNECT => {
            let args: wire::ConnectArgs = match serde_json::from_value(envelope.args) {
                Ok(args) => args,
                Err(_) => return Some(OperationResponse::fail(UNMARSHAL_FAIL_DETAIL)),
            };

            replica
                .handle_connect(ConnectInput {
                    client_id: ClientId::new(args.client_id),
                })
                .await;

            Some(OperationResponse::success(
                wire::CONNECT,
                "connect is successful",
            ))
        }
        wire::READ => {
            let args: wire::ReadArgs = match serde_json::from_value(envelope.args) {
                Ok(args) => args,
                Err(_) => return Some(OperationResponse::fail(UNMARSHAL_FAIL_DETAIL)),
            };

            let result = replica
                .handle_read(ReadInput {
                    client_id: ClientId::new(args.client_id),
                    key: args.key,
                })
                .await;

            Some(match result {
                Ok(output) => {
                    slog::debug!(
                        logger, "read served";
                        "key" => %output.key, "origin" => %output.origin, "ts" => output.ts.as_u64()
                    );
                    OperationResponse::success_kv(
                        wire::READ,
                        "read is successful",
                        output.key,
                        output.value,
                    )
                }
                Err(e) => OperationResponse::fail(e.to_string()),
            })
        }
        wire::WRITE => {
            let args: wire::WriteArgs = match serde_json::from_value(envelope.args) {
                Ok(args) => args,
                Err(_) => return Some(OperationResponse::fail(UNMARSHAL_FAIL_DETAIL)),
            };

            let output = replica
                .handle_write(WriteInput {
                    client_id: ClientId::new(args.client_id),
                    key: args.key,
                    value: args.value,
                    replication_delay: replication_delay_from_args(
                        args.replicated_write_delay_server,
                        args.replicated_write_delay_in_seconds,
                    ),
                })
                .await;

            slog::debug!(logger, "write accepted"; "key" => %output.key, "ts" => output.ts.as_u64());

            Some(OperationResponse::success_kv(
                wire::WRITE,
                "write is successful",
                output.key,
                output.value,
            ))
        }
        wire::REPLICATED_WRITE => {
            let args: wire::ReplicatedWriteArgs = match serde_json::from_value(envelope.args) {
                Ok(args) => args,
                Err(_) => return Some(OperationResponse::fail(UNMARSHAL_FAIL_DETAIL)),
            };

            replica
                .handle_replicated_write(ReplicatedWriteInput {
                    key: args.key,
                    value: args.value,
                    client_id: ClientId::new(args.client_id),
                    dependencies: args.dependencies.into_iter().map(Into::into).collect(),
                    origin: ReplicaId::new(args.original_server),
                    clock: args.clock,
                })
                .await;

            // Replicated writes are one-way.
            None
        }
        unknown => {
            slog::error!(logger, "unknown operation"; "op" => unknown);
            Some(OperationResponse::fail(format!(
                "unknown operation {:?}",
                unknown
            )))
        }
    }
}

fn replication_delay_from_args(
    delay_server: Option<String>,
    delay_seconds: Option<u64>,
) -> Option<ReplicationDelay> {
    match (delay_server, delay_seconds) {
        (Some(server), Some(seconds)) if seconds > 0 => Some(ReplicationDelay {
            peer: ReplicaId::new(server),
            duration: Duration::from_secs(seconds),
        }),
        _ => None,
    }
}
