//! Public client facade.

use tracing::debug;

use crate::config::ClientConfig;
use crate::coordinator::{CoordinatorSnapshot, RequestCoordinator, ResponseSink};
use crate::data::{
    Data, DataIdentifier, ImmutableData, ImmutableDataType, Signature, StructuredData, XorName,
};
use crate::error::{ClientError, Conflict};
use crate::request::DataRequest;
use crate::response_getter::ResponseGetter;
use crate::routing::Routing;

/// The main client instance through which all data requests reach the
/// routing layer.
///
/// The client is non-blocking: every operation validates what it can locally,
/// submits the request and returns a [`ResponseGetter`] straight away. The
/// caller decides whether to block on it, poll it, await it or hand it to
/// another thread. Many requests may be outstanding at once, and they resolve
/// in whatever order the network answers them.
///
/// # Example
///
/// ```no_run
/// use iroh_safe_client::{Client, ClientConfig, ImmutableData, ImmutableDataType};
/// # use iroh_safe_client::{DataRequest, MessageId, Routing, SendError};
/// # struct Adapter;
/// # impl Routing for Adapter {
/// #     fn send(&self, _: MessageId, _: DataRequest) -> Result<(), SendError> { Ok(()) }
/// # }
///
/// let client = Client::new(ClientConfig::default(), |_sink| Adapter);
/// let chunk = ImmutableData::new(ImmutableDataType::Normal, b"hello".to_vec());
/// let name = chunk.name();
///
/// client.put_immutable(chunk).wait()?;
/// let fetched = client.get_immutable(name, ImmutableDataType::Normal).wait()?;
/// # Ok::<(), iroh_safe_client::ClientError>(())
/// ```
pub struct Client<R: Routing> {
    coordinator: RequestCoordinator<R>,
    config: ClientConfig,
}

impl<R: Routing> Client<R> {
    /// Create a client whose routing adapter is built by `connect`.
    ///
    /// `connect` receives the [`ResponseSink`] the adapter reports responses to.
    pub fn new<F>(config: ClientConfig, connect: F) -> Self
    where
        F: FnOnce(ResponseSink) -> R,
    {
        let coordinator = RequestCoordinator::new(&config, connect);
        Self {
            coordinator,
            config,
        }
    }

    /// Like [`new`](Self::new) for adapters whose construction can fail.
    pub fn try_new<F, E>(config: ClientConfig, connect: F) -> Result<Self, E>
    where
        F: FnOnce(ResponseSink) -> Result<R, E>,
    {
        let coordinator = RequestCoordinator::try_new(&config, connect)?;
        Ok(Self {
            coordinator,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The coordinator multiplexing this client's requests.
    pub fn coordinator(&self) -> &RequestCoordinator<R> {
        &self.coordinator
    }

    /// Get a snapshot of the coordinator's state for diagnostics.
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.coordinator.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Immutable Data
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch an immutable chunk by address.
    ///
    /// Chunks already seen by this client are served from the local cache
    /// without a network round trip.
    pub fn get_immutable(&self, name: XorName, kind: ImmutableDataType) -> ResponseGetter {
        if let Some(data) = self.coordinator.cached_immutable(&name, kind) {
            debug!(address = %name, "immutable data served from cache");
            return ResponseGetter::ready(Ok(Data::Immutable(data)));
        }
        self.coordinator
            .submit(DataRequest::GetImmutable { name, kind })
    }

    /// Store an immutable chunk. Resolves to the stored chunk.
    pub fn put_immutable(&self, data: ImmutableData) -> ResponseGetter {
        self.coordinator.submit(DataRequest::PutImmutable(data))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Structured Data
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch a structured record. `version: None` asks for the latest.
    pub fn get_structured(
        &self,
        identifier: XorName,
        type_tag: u64,
        version: Option<u64>,
    ) -> ResponseGetter {
        self.coordinator.submit(DataRequest::GetStructured {
            identifier,
            type_tag,
            version,
        })
    }

    /// Create a structured record.
    ///
    /// An oversized payload resolves to [`ClientError::SizeExceeded`] without
    /// contacting the routing layer.
    pub fn put_structured(&self, data: StructuredData) -> ResponseGetter {
        if let Err(err) = data.validate_size() {
            return ResponseGetter::ready(Err(err));
        }
        self.coordinator.submit(DataRequest::PutStructured(data))
    }

    /// Submit the next version of a structured record.
    ///
    /// Versions only increase, so a `new_version` at or below the latest
    /// version this client has seen resolves to
    /// [`ClientError::VersionConflict`] locally. Anything newer goes to the
    /// network, which holds the authoritative current version.
    pub fn post_structured(&self, new_version: StructuredData) -> ResponseGetter {
        if let Err(err) = new_version.validate_size() {
            return ResponseGetter::ready(Err(err));
        }
        let known = self
            .coordinator
            .known_version(&new_version.data_identifier());
        if let Some(current) = known.filter(|current| new_version.version() <= *current) {
            return self.reject_post(&new_version, current);
        }
        self.coordinator
            .submit(DataRequest::PostStructured(new_version))
    }

    /// Submit the next version of a structured record whose current version
    /// the caller tracks.
    ///
    /// `new_version` must be exactly `prior_version + 1`; anything else
    /// resolves to [`ClientError::VersionConflict`] without a network round
    /// trip.
    pub fn post_structured_with_prior(
        &self,
        new_version: StructuredData,
        prior_version: u64,
    ) -> ResponseGetter {
        if let Err(err) = new_version.validate_size() {
            return ResponseGetter::ready(Err(err));
        }
        if prior_version.checked_add(1) != Some(new_version.version()) {
            return self.reject_post(&new_version, prior_version);
        }
        self.coordinator
            .submit(DataRequest::PostStructured(new_version))
    }

    fn reject_post(&self, new_version: &StructuredData, current: u64) -> ResponseGetter {
        debug!(
            address = %new_version.data_identifier(),
            current,
            requested = new_version.version(),
            "rejecting post locally"
        );
        ResponseGetter::ready(Err(ClientError::VersionConflict(
            Conflict::StaleVersion {
                current,
                requested: new_version.version(),
            },
        )))
    }

    /// Delete a structured record at its current `version`, authorised by
    /// `signatures` from its current owners.
    pub fn delete_structured(
        &self,
        identifier: XorName,
        type_tag: u64,
        version: u64,
        signatures: Vec<Signature>,
    ) -> ResponseGetter {
        self.coordinator.submit(DataRequest::DeleteStructured {
            identifier,
            type_tag,
            version,
            signatures,
        })
    }

    /// Latest version of a structured record this client has observed.
    pub fn known_version(&self, identifier: XorName, type_tag: u64) -> Option<u64> {
        self.coordinator
            .known_version(&DataIdentifier::Structured(identifier, type_tag))
    }
}
