//! `ResponseGetter` is a lazily evaluated response getter.
//!
//! Every client operation returns one. It wraps a write-once cell that the
//! [`RequestCoordinator`](crate::RequestCoordinator) fills when the matching
//! network response (or a timeout) arrives. The caller picks how to observe
//! it: poll, block the current thread, or `.await` it on a tokio runtime.
//! Clones share the cell, so a handle can be passed to other threads and all
//! of them see the same value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use crate::data::Data;
use crate::error::ClientError;
use crate::request::MessageId;

/// Final value of a request.
pub type Outcome = Result<Data, ClientError>;

/// Write-once cell shared between a handle and the coordinator.
#[derive(Debug, Default)]
pub(crate) struct ResponseSlot {
    value: Mutex<Option<Outcome>>,
    /// Wakes blocking waiters.
    ready: Condvar,
    /// Wakes async waiters.
    notify: Notify,
}

impl ResponseSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store the outcome and wake all waiters.
    ///
    /// Returns `false` and leaves the stored value untouched if the slot was
    /// already resolved.
    pub(crate) fn resolve(&self, outcome: Outcome) -> bool {
        {
            let mut value = self.value.lock();
            if value.is_some() {
                return false;
            }
            *value = Some(outcome);
        }
        self.ready.notify_all();
        self.notify.notify_waiters();
        true
    }

    fn peek(&self) -> Option<Outcome> {
        self.value.lock().clone()
    }

    fn is_resolved(&self) -> bool {
        self.value.lock().is_some()
    }
}

/// Handle to the eventual result of one request.
#[derive(Clone, Debug)]
pub struct ResponseGetter {
    slot: Arc<ResponseSlot>,
    message_id: Option<MessageId>,
}

impl ResponseGetter {
    /// A handle bound to an in-flight request.
    pub(crate) fn pending(message_id: MessageId, slot: Arc<ResponseSlot>) -> Self {
        Self {
            slot,
            message_id: Some(message_id),
        }
    }

    /// A handle that is already resolved, e.g. from a cache hit or a local
    /// validation failure.
    pub fn ready(outcome: Outcome) -> Self {
        let slot = ResponseSlot::new();
        slot.resolve(outcome);
        Self {
            slot: Arc::new(slot),
            message_id: None,
        }
    }

    /// Correlation id of the underlying request, if one was sent.
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    /// Whether the outcome is known.
    pub fn is_resolved(&self) -> bool {
        self.slot.is_resolved()
    }

    /// Non-blocking check. `None` while the request is pending.
    pub fn poll(&self) -> Option<Outcome> {
        self.slot.peek()
    }

    /// Block the calling thread until the request resolves.
    ///
    /// Do not call this from inside an async task; use
    /// [`resolved`](Self::resolved) there.
    pub fn wait(&self) -> Outcome {
        let mut value = self.slot.value.lock();
        loop {
            if let Some(outcome) = value.as_ref() {
                return outcome.clone();
            }
            self.slot.ready.wait(&mut value);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Giving up returns [`ClientError::Timeout`] to this caller only. The
    /// request stays in flight and the handle can still resolve later.
    pub fn wait_with_timeout(&self, timeout: Duration) -> Outcome {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };
        let mut value = self.slot.value.lock();
        loop {
            if let Some(outcome) = value.as_ref() {
                return outcome.clone();
            }
            if self.slot.ready.wait_until(&mut value, deadline).timed_out() {
                return value.as_ref().cloned().unwrap_or(Err(ClientError::Timeout));
            }
        }
    }

    /// Wait for the outcome without blocking the executor.
    pub async fn resolved(&self) -> Outcome {
        loop {
            let notified = self.slot.notify.notified();
            tokio::pin!(notified);
            // Register before checking, so a resolve between the check and the
            // await is not missed.
            notified.as_mut().enable();
            if let Some(outcome) = self.poll() {
                return outcome;
            }
            notified.await;
        }
    }
}
