//! Request coordination: correlation ids, the pending table, and response
//! demultiplexing.
//!
//! - **Submission**: [`RequestCoordinator::submit`] allocates a [`MessageId`],
//!   registers a pending entry and hands the request to the [`Routing`] layer
//! - **Delivery**: [`ResponseSink::deliver`] matches a response to its pending
//!   entry by id, validates it and resolves the caller's [`ResponseGetter`]
//! - **Expiry**: a background sweeper resolves overdue entries to
//!   [`ClientError::Timeout`]; responses that arrive later count as unmatched
//! - **Cache**: successful responses feed an immutable chunk LRU and a book of
//!   the latest known structured versions

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::data::{Data, DataIdentifier, ImmutableData, ImmutableDataType, XorName};
use crate::error::{ClientError, Conflict, NetworkError};
use crate::request::{DataRequest, Expectation, MessageId};
use crate::response_getter::{Outcome, ResponseGetter, ResponseSlot};
use crate::routing::Routing;

/// Floor for the sweep period, so a zero interval cannot spin a core.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

// ─────────────────────────────────────────────────────────────────────────────
// Pending Table
// ─────────────────────────────────────────────────────────────────────────────

/// A request that has been sent and not yet resolved.
#[derive(Debug)]
struct PendingRequest {
    expectation: Expectation,
    verb: &'static str,
    created_at: Instant,
    /// `None` when the timeout is too large to represent.
    deadline: Option<Instant>,
    slot: Arc<ResponseSlot>,
}

impl PendingRequest {
    fn is_overdue(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// What happened to a delivered response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The response resolved its pending request.
    Resolved,
    /// The request was overdue; its handle resolved to a timeout instead.
    Expired,
    /// No pending request carries this id (unknown, duplicate or already
    /// expired). The response was dropped.
    Unmatched,
    /// The coordinator no longer exists.
    Detached,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Knowledge gathered from successful responses.
struct ClientCache {
    /// Immutable chunks never change, so entries never go stale.
    immutable: Option<Mutex<LruCache<XorName, ImmutableData>>>,
    /// Latest structured version seen per identifier.
    versions: DashMap<DataIdentifier, u64>,
}

impl ClientCache {
    fn new(capacity: usize) -> Self {
        Self {
            immutable: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            versions: DashMap::new(),
        }
    }

    fn immutable(&self, name: &XorName, kind: ImmutableDataType) -> Option<ImmutableData> {
        let cache = self.immutable.as_ref()?;
        let mut cache = cache.lock();
        cache.get(name).filter(|data| data.kind() == kind).cloned()
    }

    fn immutable_len(&self) -> usize {
        self.immutable
            .as_ref()
            .map(|cache| cache.lock().len())
            .unwrap_or(0)
    }

    fn note_version(&self, identifier: DataIdentifier, version: u64) {
        self.versions
            .entry(identifier)
            .and_modify(|known| *known = (*known).max(version))
            .or_insert(version);
    }

    /// Learn from the outcome of a matched response.
    fn record(&self, expectation: &Expectation, outcome: &Outcome) {
        match outcome {
            Ok(Data::Immutable(data)) => {
                if let Some(cache) = &self.immutable {
                    cache.lock().put(data.name(), data.clone());
                }
            }
            Ok(Data::Structured(_)) if expectation.removes => {
                self.versions.remove(&expectation.identifier);
            }
            Ok(Data::Structured(data)) => {
                self.note_version(data.data_identifier(), data.version());
            }
            Err(ClientError::VersionConflict(Conflict::StaleVersion { current, .. })) => {
                // The network told us what it holds; later posts can fail fast.
                self.versions.insert(expectation.identifier, *current);
            }
            Err(_) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared State
// ─────────────────────────────────────────────────────────────────────────────

/// Counters reported by [`RequestCoordinator::snapshot`].
#[derive(Debug, Default)]
struct Counters {
    resolved: AtomicU64,
    timed_out: AtomicU64,
    unmatched: AtomicU64,
}

/// Diagnostic view of a coordinator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    /// Requests awaiting a response.
    pub pending: usize,
    /// Requests resolved by a matching response (success or error).
    pub resolved: u64,
    /// Requests resolved to a timeout.
    pub timed_out: u64,
    /// Responses dropped because nothing was waiting for them.
    pub unmatched: u64,
    /// Immutable chunks in the client cache.
    pub cached_immutable: usize,
}

/// State reachable both from the coordinator and from response sinks.
struct Shared {
    pending: DashMap<MessageId, PendingRequest>,
    next_id: AtomicU64,
    request_timeout: Duration,
    cache: ClientCache,
    counters: Counters,
}

impl Shared {
    fn new(config: &ClientConfig) -> Self {
        Self {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            cache: ClientCache::new(config.immutable_cache_capacity),
            counters: Counters::default(),
        }
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn on_response(&self, message_id: MessageId, result: Result<Data, NetworkError>) -> Delivery {
        // Removing first makes resolution at-most-once: a duplicate finds nothing.
        let Some((_, entry)) = self.pending.remove(&message_id) else {
            self.counters.unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(message_id = %message_id, "dropping unmatched response");
            return Delivery::Unmatched;
        };

        let elapsed = entry.created_at.elapsed();
        if entry.is_overdue(Instant::now()) {
            self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
            warn!(
                message_id = %message_id,
                verb = entry.verb,
                elapsed_ms = elapsed.as_millis() as u64,
                "response arrived after deadline"
            );
            entry.slot.resolve(Err(ClientError::Timeout));
            return Delivery::Expired;
        }

        let outcome = match result {
            Ok(data) => entry.expectation.check(&data).map(|()| data),
            Err(err) => Err(ClientError::from(err)),
        };
        if let Err(err) = &outcome {
            debug!(
                message_id = %message_id,
                verb = entry.verb,
                address = %entry.expectation.identifier,
                "request failed: {err}"
            );
        }
        self.cache.record(&entry.expectation, &outcome);

        if entry.slot.resolve(outcome) {
            self.counters.resolved.fetch_add(1, Ordering::Relaxed);
            debug!(
                message_id = %message_id,
                verb = entry.verb,
                elapsed_ms = elapsed.as_millis() as u64,
                "request resolved"
            );
            Delivery::Resolved
        } else {
            debug!(message_id = %message_id, "handle already resolved; ignoring response");
            Delivery::Unmatched
        }
    }

    fn expire_overdue(&self, now: Instant) -> usize {
        // Collect first: removing while iterating a DashMap shard deadlocks.
        let overdue: Vec<MessageId> = self
            .pending
            .iter()
            .filter(|entry| entry.is_overdue(now))
            .map(|entry| *entry.key())
            .collect();

        let mut expired = 0;
        for message_id in overdue {
            let removed = self
                .pending
                .remove_if(&message_id, |_, entry| entry.is_overdue(now));
            if let Some((_, entry)) = removed {
                warn!(
                    message_id = %message_id,
                    verb = entry.verb,
                    address = %entry.expectation.identifier,
                    "request timed out"
                );
                if entry.slot.resolve(Err(ClientError::Timeout)) {
                    self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                    expired += 1;
                }
            }
        }
        expired
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Sink
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound half of the routing boundary.
///
/// Handed to the routing adapter when a coordinator is built. Cheap to clone
/// and usable from any thread. Holds only a weak reference, so an adapter that
/// outlives its client delivers into the void instead of keeping it alive.
#[derive(Clone)]
pub struct ResponseSink {
    shared: Weak<Shared>,
}

impl ResponseSink {
    /// Report the response (or definitive failure) for a sent request.
    pub fn deliver(&self, message_id: MessageId, result: Result<Data, NetworkError>) -> Delivery {
        match self.shared.upgrade() {
            Some(shared) => shared.on_response(message_id, result),
            None => {
                debug!(message_id = %message_id, "coordinator gone; dropping response");
                Delivery::Detached
            }
        }
    }
}

impl std::fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSink").finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Multiplexes many outstanding requests over one routing adapter.
///
/// One coordinator exists per [`Client`](crate::Client). Submission never
/// blocks; responses may resolve in any order, matched strictly by
/// [`MessageId`].
pub struct RequestCoordinator<R: Routing> {
    shared: Arc<Shared>,
    routing: R,
}

impl<R: Routing> RequestCoordinator<R> {
    /// Build a coordinator and the routing adapter that feeds it.
    ///
    /// `connect` receives the [`ResponseSink`] the adapter must report
    /// responses to.
    pub fn new<F>(config: &ClientConfig, connect: F) -> Self
    where
        F: FnOnce(ResponseSink) -> R,
    {
        match Self::try_new(config, |sink| Ok::<R, std::convert::Infallible>(connect(sink))) {
            Ok(coordinator) => coordinator,
            Err(never) => match never {},
        }
    }

    /// Like [`new`](Self::new) for adapters whose construction can fail.
    pub fn try_new<F, E>(config: &ClientConfig, connect: F) -> Result<Self, E>
    where
        F: FnOnce(ResponseSink) -> Result<R, E>,
    {
        let shared = Arc::new(Shared::new(config));
        let sink = ResponseSink {
            shared: Arc::downgrade(&shared),
        };
        let routing = connect(sink)?;
        spawn_sweeper(Arc::downgrade(&shared), config.sweep_interval);
        Ok(Self { shared, routing })
    }

    /// Send a request and return the handle its response will resolve.
    ///
    /// If the routing adapter refuses the request, the handle is already
    /// resolved to [`ClientError::Send`] and nothing stays registered.
    pub fn submit(&self, request: DataRequest) -> ResponseGetter {
        let message_id = self.shared.next_message_id();
        let slot = Arc::new(ResponseSlot::new());
        let expectation = request.expectation();
        let verb = request.verb();
        let now = Instant::now();

        // Register before sending: the adapter may answer before `send` returns.
        self.shared.pending.insert(
            message_id,
            PendingRequest {
                expectation,
                verb,
                created_at: now,
                deadline: now.checked_add(self.shared.request_timeout),
                slot: slot.clone(),
            },
        );
        debug!(
            message_id = %message_id,
            verb,
            address = %expectation.identifier,
            "submitting request"
        );

        if let Err(err) = self.routing.send(message_id, request) {
            if self.shared.pending.remove(&message_id).is_some() {
                warn!(message_id = %message_id, verb, "routing refused request: {err}");
                return ResponseGetter::ready(Err(ClientError::Send(err)));
            }
            debug!(message_id = %message_id, "request resolved despite send error: {err}");
        }
        ResponseGetter::pending(message_id, slot)
    }

    /// Match a response to its pending request. Same as delivering through a
    /// [`ResponseSink`].
    pub fn on_response(&self, message_id: MessageId, result: Result<Data, NetworkError>) -> Delivery {
        self.shared.on_response(message_id, result)
    }

    /// Resolve every overdue request to [`ClientError::Timeout`] now, instead
    /// of waiting for the sweeper. Returns how many expired.
    pub fn expire_overdue(&self) -> usize {
        self.shared.expire_overdue(Instant::now())
    }

    /// A new sink feeding this coordinator.
    pub fn sink(&self) -> ResponseSink {
        ResponseSink {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// The routing adapter requests go through.
    pub fn routing(&self) -> &R {
        &self.routing
    }

    /// Number of requests awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    /// Get a snapshot of current coordinator state for diagnostics.
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let counters = &self.shared.counters;
        CoordinatorSnapshot {
            pending: self.shared.pending.len(),
            resolved: counters.resolved.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
            unmatched: counters.unmatched.load(Ordering::Relaxed),
            cached_immutable: self.shared.cache.immutable_len(),
        }
    }

    /// A cached chunk at `name` of the given class, if any.
    pub(crate) fn cached_immutable(
        &self,
        name: &XorName,
        kind: ImmutableDataType,
    ) -> Option<ImmutableData> {
        self.shared.cache.immutable(name, kind)
    }

    /// Latest structured version this client has seen for `identifier`.
    pub fn known_version(&self, identifier: &DataIdentifier) -> Option<u64> {
        self.shared.cache.versions.get(identifier).map(|v| *v)
    }
}

/// Start the background thread that expires overdue requests.
///
/// The thread holds a weak reference and exits on the first tick after the
/// coordinator is dropped. A thread rather than a task keeps the blocking API
/// usable without a tokio runtime.
fn spawn_sweeper(shared: Weak<Shared>, interval: Duration) {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    let spawned = thread::Builder::new()
        .name("safe-client-sweeper".into())
        .spawn(move || loop {
            thread::sleep(interval);
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.expire_overdue(Instant::now());
        });
    if let Err(err) = spawned {
        // Overdue entries are still caught when their response finally arrives.
        warn!("failed to start request sweeper: {err}");
    }
}
