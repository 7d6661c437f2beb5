use crate::replica::{ClientId, InvalidHostPort, ReplicaId};
use crate::wire;
use crate::wire::{OperationResponse, OperationResult};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Duration;

const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// StoreClient issues operations against one replica. Each operation is its
/// own TCP session: dial, send one JSON request, half-close, read the one
/// JSON response, done.
///
/// The client id is chosen once at construction and repeated on every
/// request; it is what scopes the dependency list the replica keeps.
pub struct StoreClient {
    server: ReplicaId,
    client_id: ClientId,
}

impl StoreClient {
    /// Client with a fresh random identity.
    pub fn new(server: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_client_id(server, uuid::Uuid::new_v4().to_string())
    }

    /// Client with a caller-chosen identity. Two clients sharing an id share
    /// a dependency list on the replica; usually you want `new`.
    pub fn with_client_id(
        server: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let server = ReplicaId::parse(&server.into())?;
        Ok(StoreClient {
            server,
            client_id: ClientId::new(client_id),
        })
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        let request = wire::encode_request(
            wire::CONNECT,
            &wire::ConnectArgs {
                client_id: self.client_id.as_str().to_string(),
            },
        );
        self.round_trip(request).await.map(|_| ())
    }

    pub async fn read(&self, key: impl Into<String>) -> Result<String, ClientError> {
        let request = wire::encode_request(
            wire::READ,
            &wire::ReadArgs {
                client_id: self.client_id.as_str().to_string(),
                key: key.into(),
            },
        );
        let response = self.round_trip(request).await?;
        response.value.ok_or(ClientError::MissingValue)
    }

    pub async fn write(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.write_impl(key.into(), value.into(), None, None).await
    }

    /// Write whose outgoing replication toward `delay_peer` is held back by
    /// the origin replica for `delay`. Only useful for demonstrating and
    /// testing causal gating; the local commit is unaffected.
    pub async fn write_with_replication_delay(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        delay_peer: impl Into<String>,
        delay: Duration,
    ) -> Result<(), ClientError> {
        self.write_impl(
            key.into(),
            value.into(),
            Some(delay_peer.into()),
            Some(delay.as_secs()),
        )
        .await
    }

    async fn write_impl(
        &self,
        key: String,
        value: String,
        delay_server: Option<String>,
        delay_seconds: Option<u64>,
    ) -> Result<(), ClientError> {
        let request = wire::encode_request(
            wire::WRITE,
            &wire::WriteArgs {
                client_id: self.client_id.as_str().to_string(),
                key,
                value,
                replicated_write_delay_server: delay_server,
                replicated_write_delay_in_seconds: delay_seconds,
            },
        );
        self.round_trip(request).await.map(|_| ())
    }

    async fn round_trip(&self, request: Vec<u8>) -> Result<OperationResponse, ClientError> {
        let connect = TcpStream::connect(self.server.as_str());
        let mut stream = tokio::time::timeout(DIAL_TIMEOUT, connect)
            .await
            .map_err(|_| ClientError::Unreachable(self.server.as_str().to_string()))??;

        stream.write_all(&request).await?;
        stream.shutdown().await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;

        let response: OperationResponse = wire::decode(&raw)?;
        match response.result {
            OperationResult::Success => Ok(response),
            OperationResult::Fail => Err(ClientError::Rejected(response.detailed_result)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("bad server address")]
    BadServerAddress(#[from] InvalidHostPort),
    #[error("could not reach {0:?} within the dial timeout")]
    Unreachable(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("undecodable response")]
    BadResponse(#[from] serde_json::Error),
    #[error("server rejected the request: {0}")]
    Rejected(String),
    #[error("success response carried no value")]
    MissingValue,
}

impl ClientError {
    /// The server-supplied diagnostic, when the request made it to a server
    /// and was answered with a `fail`.
    pub fn rejection_detail(&self) -> Option<&str> {
        match self {
            ClientError::Rejected(detail) => Some(detail),
            _ => None,
        }
    }
}
