//! # Iroh SAFE client
//!
//! This crate is a non-blocking client for storing and retrieving data on a
//! decentralised storage network. It talks to the network through an abstract
//! routing layer, and every operation returns a lazy [`ResponseGetter`] at
//! once. The caller can poll it, block on it, await it, or hand it to another
//! thread.
//!
//! The crate is split into a handful of modules:
//!
//! - [`data`]: the data model. Content-addressed [`ImmutableData`] and
//!   owner-versioned [`StructuredData`].
//! - [`request`]: [`DataRequest`] and the [`MessageId`] correlation token.
//! - [`coordinator`]: the [`RequestCoordinator`], which tracks pending requests
//!   and matches asynchronous responses back to their handles.
//! - [`response_getter`]: the write-once [`ResponseGetter`] handle.
//! - [`client`]: the [`Client`] facade with get/put/post/delete operations.
//! - [`routing`]: the [`Routing`] trait any transport implements.
//! - [`net`] and [`protocol`]: an iroh/irpc based [`Routing`] implementation,
//!   [`IrohRouting`], that sends requests to a vault over QUIC.
//!
//! ## Getting started
//!
//! Build a [`Client`] over a routing adapter. The adapter receives a
//! [`ResponseSink`] to report responses to:
//!
//! ```no_run
//! use anyhow::Result;
//! use iroh::Endpoint;
//! use iroh_safe_client::{
//!     Client, ClientConfig, ImmutableData, ImmutableDataType, IrohRouting, VAULT_ALPN,
//! };
//!
//! # async fn launch(vault_addr: String) -> Result<()> {
//! let endpoint = Endpoint::builder()
//!     .alpns(vec![VAULT_ALPN.to_vec()])
//!     .bind()
//!     .await?;
//! let client = Client::try_new(ClientConfig::default(), |sink| {
//!     IrohRouting::new(endpoint, &vault_addr, sink)
//! })?;
//!
//! let chunk = ImmutableData::new(ImmutableDataType::Normal, b"hello".to_vec());
//! let stored = client.put_immutable(chunk).resolved().await?;
//! # let _ = stored;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod net;
pub mod protocol;
pub mod request;
pub mod response_getter;
pub mod routing;

pub use client::Client;
pub use config::ClientConfig;
pub use coordinator::{CoordinatorSnapshot, Delivery, RequestCoordinator, ResponseSink};
pub use data::{
    hash_content, Data, DataIdentifier, ImmutableData, ImmutableDataType, PublicKey, Signature,
    StructuredData, XorName, MAX_STRUCTURED_DATA_SIZE_IN_BYTES,
};
pub use error::{ClientError, Conflict, NetworkError, SendError};
pub use net::{IrohRouting, MAX_IN_FLIGHT_REQUESTS, VAULT_ALPN};
pub use request::{DataRequest, MessageId};
pub use response_getter::{Outcome, ResponseGetter};
pub use routing::Routing;
