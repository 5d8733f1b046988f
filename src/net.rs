//! Routing adapter using iroh QUIC transport.
//!
//! This module provides [`IrohRouting`], a [`Routing`] implementation that
//! sends every client request to a vault endpoint as an irpc call over iroh.
//!
//! # Protocol
//!
//! The adapter negotiates the ALPN identifier `safe/vault/1`. Each request is
//! one [`VaultProtocol`] RPC; the reply is fed into the client's
//! [`ResponseSink`]. No retries are attempted here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use iroh::Endpoint;
use iroh::EndpointAddr;
use irpc::Client;
use tokio::runtime::Handle;
use tracing::debug;

use crate::coordinator::ResponseSink;
use crate::error::{NetworkError, SendError};
use crate::protocol::{VaultCall, VaultProtocol, VaultResponse};
use crate::request::{DataRequest, MessageId};
use crate::routing::Routing;

/// ALPN protocol identifier for vault connections.
pub const VAULT_ALPN: &[u8] = b"safe/vault/1";

/// Round trips allowed in flight before `send` pushes back.
pub const MAX_IN_FLIGHT_REQUESTS: usize = 1024;

/// Routing adapter using iroh QUIC transport.
///
/// Wraps an iroh [`Endpoint`] and the address of the vault that serves
/// requests. `send` spawns the round trip on the tokio runtime the adapter was
/// created in and returns at once.
pub struct IrohRouting {
    /// The iroh endpoint used for QUIC connections.
    endpoint: Endpoint,
    /// Address of the vault requests are sent to.
    vault: EndpointAddr,
    /// Runtime that drives round trips.
    runtime: Handle,
    /// Where replies are reported.
    sink: ResponseSink,
    /// Round trips currently in flight.
    in_flight: InFlightLimiter,
}

impl IrohRouting {
    /// Create an adapter for the vault at `vault_addr`, a JSON-serialized
    /// [`EndpointAddr`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(endpoint: Endpoint, vault_addr: &str, sink: ResponseSink) -> Result<Self> {
        let vault = parse_addr(vault_addr)?;
        let runtime =
            Handle::try_current().context("IrohRouting must be created inside a tokio runtime")?;
        Ok(Self {
            endpoint,
            vault,
            runtime,
            sink,
            in_flight: InFlightLimiter::new(MAX_IN_FLIGHT_REQUESTS),
        })
    }

    /// Number of round trips currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Create an RPC client for the vault.
    fn client(&self) -> Client<VaultProtocol> {
        irpc_iroh::client::<VaultProtocol>(self.endpoint.clone(), self.vault.clone(), VAULT_ALPN)
    }
}

/// Parse a vault address from JSON-serialized EndpointAddr.
fn parse_addr(addr: &str) -> Result<EndpointAddr> {
    serde_json::from_str(addr).context("invalid vault endpoint address")
}

/// Bounded count of outstanding round trips.
#[derive(Clone, Debug)]
struct InFlightLimiter {
    count: Arc<AtomicUsize>,
    limit: usize,
}

impl InFlightLimiter {
    fn new(limit: usize) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Reserve a slot, or refuse if all are taken.
    fn try_acquire(&self) -> Result<InFlight, SendError> {
        let previous = self.count.fetch_add(1, Ordering::AcqRel);
        if previous >= self.limit {
            self.count.fetch_sub(1, Ordering::AcqRel);
            return Err(SendError::Backpressure(self.limit));
        }
        Ok(InFlight(self.count.clone()))
    }
}

/// Releases an in-flight slot when the round trip ends.
#[derive(Debug)]
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Decide whether a request may go out.
fn admit(endpoint_closed: bool, limiter: &InFlightLimiter) -> Result<InFlight, SendError> {
    if endpoint_closed {
        return Err(SendError::Disconnected);
    }
    limiter.try_acquire()
}

/// Perform one vault RPC.
async fn round_trip(client: &Client<VaultProtocol>, call: VaultCall) -> VaultResponse {
    let reply = match call {
        VaultCall::Get(request) => client.rpc(request).await,
        VaultCall::Put(request) => client.rpc(request).await,
        VaultCall::Post(request) => client.rpc(request).await,
        VaultCall::Delete(request) => client.rpc(request).await,
    };
    reply.unwrap_or_else(|err| Err(NetworkError::Transport(err.to_string())))
}

impl Routing for IrohRouting {
    fn send(&self, message_id: MessageId, request: DataRequest) -> Result<(), SendError> {
        let slot = admit(self.endpoint.is_closed(), &self.in_flight)?;
        let client = self.client();
        let sink = self.sink.clone();
        let call = VaultCall::new(message_id, request);

        self.runtime.spawn(async move {
            let _slot = slot;
            let result = round_trip(&client, call).await;
            if let Err(err) = &result {
                debug!(message_id = %message_id, "vault call failed: {err}");
            }
            sink.deliver(message_id, result);
        });
        Ok(())
    }
}
