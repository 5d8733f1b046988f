//! Vault protocol message definitions.
//!
//! The RPC requests [`IrohRouting`](crate::IrohRouting) sends to a vault
//! endpoint, defined with the irpc framework. Every call answers with a
//! [`VaultResponse`]; the carried [`MessageId`] lets the vault log and dedupe
//! requests, while the client matches replies on its own side.

use irpc::channel::oneshot;
use irpc::rpc_requests;
use serde::{Deserialize, Serialize};

use crate::data::{Data, ImmutableDataType, Signature, StructuredData, XorName};
use crate::error::NetworkError;
use crate::request::{DataRequest, MessageId};

/// Reply to every vault RPC.
pub type VaultResponse = Result<Data, NetworkError>;

/// What a [`GetRequest`] is looking for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GetTarget {
    Immutable {
        name: XorName,
        kind: ImmutableDataType,
    },
    Structured {
        identifier: XorName,
        type_tag: u64,
        version: Option<u64>,
    },
}

/// Fetch immutable or structured data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetRequest {
    pub message_id: MessageId,
    pub target: GetTarget,
}

/// Store new data (an immutable chunk or version 0 of a structured record).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PutRequest {
    pub message_id: MessageId,
    pub data: Data,
}

/// Replace a structured record with its next version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostRequest {
    pub message_id: MessageId,
    pub data: StructuredData,
}

/// Remove a structured record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub message_id: MessageId,
    pub identifier: XorName,
    pub type_tag: u64,
    pub version: u64,
    pub signatures: Vec<Signature>,
}

/// The vault protocol definition using irpc's RPC framework.
#[rpc_requests(message = VaultMessage)]
#[derive(Debug, Serialize, Deserialize)]
pub enum VaultProtocol {
    /// Fetch data. Returns the stored value.
    #[rpc(tx = oneshot::Sender<VaultResponse>)]
    Get(GetRequest),
    /// Store new data. Returns the stored value.
    #[rpc(tx = oneshot::Sender<VaultResponse>)]
    Put(PutRequest),
    /// Store the next version of a structured record. Returns it.
    #[rpc(tx = oneshot::Sender<VaultResponse>)]
    Post(PostRequest),
    /// Delete a structured record. Returns the deleted version.
    #[rpc(tx = oneshot::Sender<VaultResponse>)]
    Delete(DeleteRequest),
}

/// One vault RPC, ready to send.
#[derive(Clone, Debug)]
pub enum VaultCall {
    Get(GetRequest),
    Put(PutRequest),
    Post(PostRequest),
    Delete(DeleteRequest),
}

impl VaultCall {
    /// Translate a client request into its wire call.
    pub fn new(message_id: MessageId, request: DataRequest) -> Self {
        match request {
            DataRequest::GetImmutable { name, kind } => VaultCall::Get(GetRequest {
                message_id,
                target: GetTarget::Immutable { name, kind },
            }),
            DataRequest::GetStructured {
                identifier,
                type_tag,
                version,
            } => VaultCall::Get(GetRequest {
                message_id,
                target: GetTarget::Structured {
                    identifier,
                    type_tag,
                    version,
                },
            }),
            DataRequest::PutImmutable(data) => VaultCall::Put(PutRequest {
                message_id,
                data: Data::Immutable(data),
            }),
            DataRequest::PutStructured(data) => VaultCall::Put(PutRequest {
                message_id,
                data: Data::Structured(data),
            }),
            DataRequest::PostStructured(data) => VaultCall::Post(PostRequest { message_id, data }),
            DataRequest::DeleteStructured {
                identifier,
                type_tag,
                version,
                signatures,
            } => VaultCall::Delete(DeleteRequest {
                message_id,
                identifier,
                type_tag,
                version,
                signatures,
            }),
        }
    }
}
