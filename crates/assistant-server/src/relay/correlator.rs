//! Request/response correlation by numeric id.
//!
//! Every request forwarded to the producer gets a fresh id. The caller
//! registers a one-shot slot under that id and parks on it until the
//! producer's `response` carrying the same id arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use assistant_core::{RelayError, RequestId};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

type PendingMap = DashMap<RequestId, oneshot::Sender<Value>>;

/// Tracks requests awaiting a producer response.
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
}

impl RequestCorrelator {
    /// Create an empty correlator. The first allocated id is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Allocate the next id. Ids are never reused within a process.
    pub fn allocate_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Open a slot for `id`. Dropping the handle releases the slot.
    pub fn register(&self, id: RequestId) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let _ = self.pending.insert(id, tx);
        PendingResponse {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Deliver `payload` to the waiter for `id`.
    ///
    /// Returns `false` when nobody is waiting, which covers unknown, late and
    /// duplicate ids.
    pub fn fulfill(&self, id: RequestId, payload: Value) -> bool {
        match self.pending.remove(&id) {
            Some((_, tx)) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Drop the slot for `id` without answering it.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Fail every waiter with [`RelayError::ProducerUnavailable`].
    ///
    /// Returns how many waiters were released.
    pub fn fail_all(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

/// Waiter side of a registered request.
#[must_use = "dropping a PendingResponse cancels the request"]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Value>,
    pending: Arc<PendingMap>,
}

impl PendingResponse {
    /// Wait until the producer answers or goes away.
    pub async fn wait(self) -> Result<Value, RelayError> {
        self.wait_timeout(None).await
    }

    /// Wait with an optional deadline.
    pub async fn wait_timeout(mut self, timeout: Option<Duration>) -> Result<Value, RelayError> {
        let rx = &mut self.rx;
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| RelayError::Timeout(limit))?,
            None => rx.await,
        };
        received.map_err(|_| RelayError::ProducerUnavailable("producer disconnected".into()))
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        let _ = self.pending.remove(&self.id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
