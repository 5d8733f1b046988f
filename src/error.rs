//! Error types surfaced through [`ResponseGetter`](crate::ResponseGetter)s.
//!
//! Local validation failures ([`ClientError::SizeExceeded`], fast-path
//! [`ClientError::VersionConflict`]) and hand-off failures
//! ([`ClientError::Send`]) never reach the network. Everything else arrives
//! through the handle of the request that caused it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::DataIdentifier;

/// Why the network refused a structured-data mutation.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Conflict {
    /// The submitted version is not the successor of the stored one.
    #[error("stale version: stored {current}, submitted {requested}")]
    StaleVersion { current: u64, requested: u64 },
    /// Too few previous owners signed the new version.
    #[error("insufficient signatures: {provided} of {required} required")]
    InsufficientSignatures { required: usize, provided: usize },
}

/// Failure reported by the routing layer on behalf of the network.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum NetworkError {
    #[error("no data stored at the requested address")]
    NoSuchData,
    #[error("mutation rejected: {0}")]
    Conflict(Conflict),
    #[error("access denied")]
    AccessDenied,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// The routing adapter could not accept a request for transmission.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("routing layer is disconnected")]
    Disconnected,
    #[error("too many requests in flight ({0})")]
    Backpressure(usize),
    #[error("transport refused request: {0}")]
    Transport(String),
}

/// Outcome of a failed client operation.
///
/// `Clone` so that every observer of a handle receives the same value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Structured data payload over the size ceiling. Never sent.
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    SizeExceeded { size: usize, max: usize },
    /// The routing adapter refused the request. Never registered.
    #[error("failed to send request: {0}")]
    Send(#[from] SendError),
    /// No matching response arrived before the deadline.
    #[error("request timed out")]
    Timeout,
    /// A response arrived for a different kind or location of data.
    #[error("response mismatch: expected {expected}, received {received}")]
    ProtocolMismatch {
        expected: DataIdentifier,
        received: DataIdentifier,
    },
    /// Immutable data whose recomputed address differs from the requested one.
    #[error("corrupt immutable data: requested {expected}, content hashes to {computed}")]
    Corruption {
        expected: DataIdentifier,
        computed: DataIdentifier,
    },
    /// The update targets the wrong version or lacks owner signatures.
    #[error("version conflict: {0}")]
    VersionConflict(Conflict),
    /// Any other failure reported by the routing layer.
    #[error("network error: {0}")]
    Network(NetworkError),
    /// A value could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<NetworkError> for ClientError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Conflict(conflict) => ClientError::VersionConflict(conflict),
            other => ClientError::Network(other),
        }
    }
}
