//! Boundary with the routing layer.
//!
//! The routing layer is external: it carries requests to the storage network
//! and brings responses back. This module only fixes its contract with the
//! client. Outbound, the client calls [`Routing::send`]. Inbound, the adapter
//! reports each response to the [`ResponseSink`](crate::ResponseSink) it was
//! given at construction.

use crate::error::SendError;
use crate::request::{DataRequest, MessageId};

/// Transport abstraction for client requests.
///
/// Implementations must not block: `send` only acknowledges that the request
/// was accepted for transmission, not that it was delivered. Retry policy, if
/// any, also belongs here. `send` may be called from many threads at once, and
/// an implementation may report the response to the sink before `send` even
/// returns.
pub trait Routing: Send + Sync + 'static {
    /// Hand a request to the network.
    fn send(&self, message_id: MessageId, request: DataRequest) -> Result<(), SendError>;
}
