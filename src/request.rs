//! Outgoing requests and the rules for matching their responses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{
    Data, DataIdentifier, ImmutableData, ImmutableDataType, Signature, StructuredData, XorName,
};
use crate::error::ClientError;

/// Correlation token linking one outgoing request to its response.
///
/// Allocated by the [`RequestCoordinator`](crate::RequestCoordinator), never
/// by the caller. Unique within one coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single operation against the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRequest {
    GetImmutable {
        name: XorName,
        kind: ImmutableDataType,
    },
    GetStructured {
        identifier: XorName,
        type_tag: u64,
        /// `None` asks for the latest version.
        version: Option<u64>,
    },
    PutImmutable(ImmutableData),
    PutStructured(StructuredData),
    PostStructured(StructuredData),
    DeleteStructured {
        identifier: XorName,
        type_tag: u64,
        version: u64,
        signatures: Vec<Signature>,
    },
}

impl DataRequest {
    /// The location a response to this request must describe.
    pub fn expected_identifier(&self) -> DataIdentifier {
        match self {
            DataRequest::GetImmutable { name, .. } => DataIdentifier::Immutable(*name),
            DataRequest::PutImmutable(data) => data.identifier(),
            DataRequest::GetStructured {
                identifier,
                type_tag,
                ..
            }
            | DataRequest::DeleteStructured {
                identifier,
                type_tag,
                ..
            } => DataIdentifier::Structured(*identifier, *type_tag),
            DataRequest::PutStructured(data) | DataRequest::PostStructured(data) => {
                data.data_identifier()
            }
        }
    }

    /// Short operation name for logs.
    pub fn verb(&self) -> &'static str {
        match self {
            DataRequest::GetImmutable { .. } | DataRequest::GetStructured { .. } => "get",
            DataRequest::PutImmutable(_) | DataRequest::PutStructured(_) => "put",
            DataRequest::PostStructured(_) => "post",
            DataRequest::DeleteStructured { .. } => "delete",
        }
    }

    /// What a valid response to this request looks like.
    pub(crate) fn expectation(&self) -> Expectation {
        let identifier = self.expected_identifier();
        let version = match self {
            DataRequest::GetStructured { version, .. } => *version,
            DataRequest::PutStructured(data) | DataRequest::PostStructured(data) => {
                Some(data.version())
            }
            DataRequest::DeleteStructured { version, .. } => Some(*version),
            DataRequest::GetImmutable { .. } | DataRequest::PutImmutable(_) => None,
        };
        Expectation {
            identifier,
            version,
            removes: matches!(self, DataRequest::DeleteStructured { .. }),
        }
    }
}

/// The response shape registered alongside each pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Expectation {
    pub(crate) identifier: DataIdentifier,
    /// Required structured version, when the request pins one.
    pub(crate) version: Option<u64>,
    /// Whether a success means the data no longer exists.
    pub(crate) removes: bool,
}

impl Expectation {
    /// Check a response payload against this expectation.
    ///
    /// Immutable payloads compare their recomputed address, so a chunk whose
    /// content was altered in transit is reported as corruption rather than as
    /// a mismatch.
    pub(crate) fn check(&self, data: &Data) -> Result<(), ClientError> {
        let received = data.identifier();
        match (&self.identifier, data) {
            (DataIdentifier::Immutable(_), Data::Immutable(_)) => {
                if received != self.identifier {
                    return Err(ClientError::Corruption {
                        expected: self.identifier,
                        computed: received,
                    });
                }
                Ok(())
            }
            (DataIdentifier::Structured(..), Data::Structured(sd)) => {
                if received != self.identifier {
                    return Err(ClientError::ProtocolMismatch {
                        expected: self.identifier,
                        received,
                    });
                }
                match self.version {
                    Some(version) if version != sd.version() => {
                        Err(ClientError::ProtocolMismatch {
                            expected: self.identifier,
                            received,
                        })
                    }
                    _ => Ok(()),
                }
            }
            _ => Err(ClientError::ProtocolMismatch {
                expected: self.identifier,
                received,
            }),
        }
    }
}
