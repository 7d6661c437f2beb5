//! The JSON wire contract. One JSON object per connection in each direction:
//! the writer half-closes its side after the object, the reader reads to EOF.
//!
//! Requests are an `{Op, Args}` envelope; `Op` discriminates and `Args` stays
//! raw until the dispatcher knows which shape to expect, so an unknown or
//! malformed operation can still be answered with a `fail` response.

use crate::replica::{DependencyRecord, LamportTs, ReplicaId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub(crate) const CONNECT: &str = "connect";
pub(crate) const READ: &str = "read";
pub(crate) const WRITE: &str = "write";
pub(crate) const REPLICATED_WRITE: &str = "replicated_write";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RequestEnvelope {
    pub op: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ConnectArgs {
    pub client_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReadArgs {
    pub client_id: String,
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WriteArgs {
    pub client_id: String,
    pub key: String,
    pub value: String,
    // Optional delay injection for the outgoing replicated write, aimed at
    // one named peer. Absent on ordinary writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated_write_delay_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated_write_delay_in_seconds: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Dependency {
    pub key: String,
    pub original_server: String,
    pub lamport_clock_timestamp: LamportTs,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReplicatedWriteArgs {
    pub key: String,
    pub value: String,
    pub client_id: String,
    pub dependencies: Vec<Dependency>,
    pub original_server: String,
    pub clock: LamportTs,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OperationResult {
    Success,
    Fail,
}

/// Response for client operations. Failure responses carry only the result
/// discriminator and the diagnostic string; the other fields are omitted
/// from the JSON entirely.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct OperationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub result: OperationResult,
    pub detailed_result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl OperationResponse {
    pub(crate) fn success(op: &str, detail: &str) -> Self {
        OperationResponse {
            op: Some(op.to_string()),
            result: OperationResult::Success,
            detailed_result: detail.to_string(),
            key: None,
            value: None,
        }
    }

    pub(crate) fn success_kv(op: &str, detail: &str, key: String, value: String) -> Self {
        OperationResponse {
            op: Some(op.to_string()),
            result: OperationResult::Success,
            detailed_result: detail.to_string(),
            key: Some(key),
            value: Some(value),
        }
    }

    pub(crate) fn fail(detail: impl Into<String>) -> Self {
        OperationResponse {
            op: None,
            result: OperationResult::Fail,
            detailed_result: detail.into(),
            key: None,
            value: None,
        }
    }
}

/// Encodes a request for the given operation. Serializing our own wire types
/// cannot fail, so this returns the bytes directly.
pub(crate) fn encode_request(op: &str, args: &impl Serialize) -> Vec<u8> {
    let envelope = RequestEnvelope {
        op: op.to_string(),
        args: serde_json::to_value(args).expect("wire args serialize as JSON"),
    };
    encode(&envelope)
}

pub(crate) fn encode(message: &impl Serialize) -> Vec<u8> {
    serde_json::to_vec(message).expect("wire message serializes as JSON")
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes)
}

impl From<Dependency> for DependencyRecord {
    fn from(wire: Dependency) -> Self {
        DependencyRecord {
            key: wire.key,
            origin: ReplicaId::new(wire.original_server),
            ts: wire.lamport_clock_timestamp,
        }
    }
}

impl From<DependencyRecord> for Dependency {
    fn from(record: DependencyRecord) -> Self {
        Dependency {
            key: record.key,
            original_server: record.origin.into_inner(),
            lamport_clock_timestamp: record.ts,
        }
    }
}
