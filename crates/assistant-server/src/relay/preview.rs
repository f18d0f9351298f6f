//! Preview frame fan-out with reference-counted start/stop signalling.
//!
//! The producer is asked to stream preview frames only while at least one
//! viewer is subscribed. `streaming` records which producer connection holds
//! an outstanding `startPreview`, so neither control request is sent twice in
//! a row and losing a connection that is no longer current changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use assistant_core::{ProducerConnectionId, SubscriberId};
use assistant_core::protocol::{start_preview, stop_preview};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::correlator::RequestCorrelator;
use super::producer::ProducerLink;

struct Subscribers {
    queues: HashMap<SubscriberId, mpsc::UnboundedSender<Bytes>>,
    streaming: Option<ProducerConnectionId>,
}

/// Subscriber set plus the producer-side start/stop state.
pub struct PreviewBroadcaster {
    link: Arc<dyn ProducerLink>,
    ids: Arc<RequestCorrelator>,
    state: Mutex<Subscribers>,
}

impl PreviewBroadcaster {
    /// Control requests go through `link` with ids drawn from `ids`.
    pub fn new(link: Arc<dyn ProducerLink>, ids: Arc<RequestCorrelator>) -> Self {
        Self {
            link,
            ids,
            state: Mutex::new(Subscribers {
                queues: HashMap::new(),
                streaming: None,
            }),
        }
    }

    /// Add a viewer. The first viewer triggers `startPreview`.
    pub fn subscribe(self: &Arc<Self>) -> PreviewSubscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock();
            let _ = state.queues.insert(id.clone(), tx);
            if state.queues.len() == 1 && state.streaming.is_none() {
                state.streaming = self.signal(start_preview());
            }
            debug!(subscriber = %id, viewers = state.queues.len(), "preview viewer subscribed");
        }
        PreviewSubscription {
            id,
            rx,
            broadcaster: Arc::clone(self),
        }
    }

    /// Remove a viewer. The last viewer leaving triggers `stopPreview`.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut state = self.state.lock();
        if state.queues.remove(id).is_none() {
            return;
        }
        debug!(subscriber = %id, viewers = state.queues.len(), "preview viewer unsubscribed");
        if state.queues.is_empty() && state.streaming.take().is_some() {
            let _ = self.signal(stop_preview());
        }
    }

    /// Push one frame to every viewer. Never blocks.
    ///
    /// Returns how many queues accepted the frame.
    pub fn publish(&self, frame: Bytes) -> usize {
        let state = self.state.lock();
        state
            .queues
            .values()
            .filter(|tx| tx.send(frame.clone()).is_ok())
            .count()
    }

    /// Number of subscribed viewers.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().queues.len()
    }

    /// Whether a `startPreview` is currently outstanding.
    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming.is_some()
    }

    /// Producer `conn_id` just identified: start its stream if viewers are
    /// waiting.
    pub fn producer_ready(&self, conn_id: &ProducerConnectionId) {
        let mut state = self.state.lock();
        if !state.queues.is_empty() && state.streaming.as_ref() != Some(conn_id) {
            state.streaming = self.signal(start_preview());
        }
    }

    /// Producer `conn_id` went away. Its stream, if it had one, has stopped.
    pub fn producer_lost(&self, conn_id: &ProducerConnectionId) {
        let mut state = self.state.lock();
        if state.streaming.as_ref() == Some(conn_id) {
            state.streaming = None;
        }
    }

    /// Drop every viewer queue, which ends their streams.
    pub fn close(&self) {
        let mut state = self.state.lock();
        let viewers = state.queues.len();
        state.queues.clear();
        state.streaming = None;
        debug!(viewers, "preview viewers released");
    }

    fn signal(&self, data: Value) -> Option<ProducerConnectionId> {
        let id = self.ids.allocate_id();
        match self.link.send_request(id, data) {
            Ok(conn_id) => Some(conn_id),
            Err(e) => {
                debug!(request_id = %id, error = %e, "preview control request not sent");
                None
            }
        }
    }
}

/// A viewer's registration. Dropping it unsubscribes.
pub struct PreviewSubscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Bytes>,
    broadcaster: Arc<PreviewBroadcaster>,
}

impl PreviewSubscription {
    /// This viewer's id.
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Wait for the next frame, in publish order.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn rx_is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for PreviewSubscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::{RelayError, RequestId};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every control request instead of writing to a socket.
    struct RecordingLink {
        sent: Mutex<Vec<(RequestId, Value)>>,
        up: AtomicBool,
        conn: Mutex<ProducerConnectionId>,
    }

    impl RecordingLink {
        fn new(up: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                up: AtomicBool::new(up),
                conn: Mutex::new(ProducerConnectionId::new()),
            })
        }

        fn conn(&self) -> ProducerConnectionId {
            self.conn.lock().clone()
        }

        fn reconnect(&self) -> ProducerConnectionId {
            let fresh = ProducerConnectionId::new();
            *self.conn.lock() = fresh.clone();
            fresh
        }

        fn kinds(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter_map(|(_, v)| v.as_object()?.keys().next().cloned())
                .collect()
        }
    }

    impl ProducerLink for RecordingLink {
        fn send_request(&self, id: RequestId, data: Value) -> Result<ProducerConnectionId, RelayError> {
            if !self.up.load(Ordering::SeqCst) {
                return Err(RelayError::ProducerUnavailable("down".into()));
            }
            self.sent.lock().push((id, data));
            Ok(self.conn())
        }
    }

    fn broadcaster(link: &Arc<RecordingLink>) -> Arc<PreviewBroadcaster> {
        let link: Arc<dyn ProducerLink> = link.clone();
        Arc::new(PreviewBroadcaster::new(link, Arc::new(RequestCorrelator::new())))
    }

    #[test]
    fn start_and_stop_sent_once_per_transition() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);

        let v1 = b.subscribe();
        let v2 = b.subscribe();
        let v3 = b.subscribe();
        assert_eq!(link.kinds(), vec!["startPreview"]);

        drop(v1);
        drop(v2);
        assert_eq!(link.kinds(), vec!["startPreview"]);
        drop(v3);
        assert_eq!(link.kinds(), vec!["startPreview", "stopPreview"]);

        let _again = b.subscribe();
        assert_eq!(link.kinds(), vec!["startPreview", "stopPreview", "startPreview"]);
    }

    #[test]
    fn control_requests_use_fresh_ids() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        drop(b.subscribe());
        drop(b.subscribe());
        let ids: Vec<u64> = link.sent.lock().iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn frames_fan_out_in_order() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        let mut viewers = [b.subscribe(), b.subscribe(), b.subscribe()];

        assert_eq!(b.publish(Bytes::from_static(b"one")), 3);
        assert_eq!(b.publish(Bytes::from_static(b"two")), 3);

        for viewer in &mut viewers {
            assert_eq!(viewer.next_frame().await.unwrap(), Bytes::from_static(b"one"));
            assert_eq!(viewer.next_frame().await.unwrap(), Bytes::from_static(b"two"));
            assert!(viewer.rx.try_recv().is_err());
        }
    }

    #[test]
    fn publish_without_viewers_is_a_no_op() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        assert_eq!(b.publish(Bytes::from_static(b"frame")), 0);
        assert!(link.kinds().is_empty());
    }

    #[test]
    fn unsubscribe_unknown_id_is_ignored() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        let _v = b.subscribe();
        b.unsubscribe(&SubscriberId::new());
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(link.kinds(), vec!["startPreview"]);
    }

    #[test]
    fn viewers_waiting_get_started_when_producer_becomes_ready() {
        let link = RecordingLink::new(false);
        let b = broadcaster(&link);
        let _v = b.subscribe();
        assert!(!b.is_streaming());
        assert!(link.kinds().is_empty());

        link.up.store(true, Ordering::SeqCst);
        b.producer_ready(&link.conn());
        assert!(b.is_streaming());
        b.producer_ready(&link.conn());
        assert_eq!(link.kinds(), vec!["startPreview"]);
    }

    #[test]
    fn producer_loss_rearms_start() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        let _v = b.subscribe();
        b.producer_lost(&link.conn());
        assert!(!b.is_streaming());
        let next = link.reconnect();
        b.producer_ready(&next);
        assert_eq!(link.kinds(), vec!["startPreview", "startPreview"]);
    }

    #[test]
    fn losing_a_replaced_producer_keeps_the_new_stream() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        let v = b.subscribe();
        let old = link.conn();

        let new = link.reconnect();
        b.producer_ready(&new);
        b.producer_lost(&old);
        assert!(b.is_streaming());

        drop(v);
        assert_eq!(link.kinds(), vec!["startPreview", "startPreview", "stopPreview"]);
    }

    #[tokio::test]
    async fn close_ends_viewer_streams() {
        let link = RecordingLink::new(true);
        let b = broadcaster(&link);
        let mut v = b.subscribe();
        b.close();
        assert!(v.next_frame().await.is_none());
        assert_eq!(b.subscriber_count(), 0);
        assert!(!b.is_streaming());
        drop(v);
        assert_eq!(link.kinds(), vec!["startPreview"]);
    }

    #[test]
    fn no_stop_when_never_started() {
        let link = RecordingLink::new(false);
        let b = broadcaster(&link);
        drop(b.subscribe());
        link.up.store(true, Ordering::SeqCst);
        assert!(link.kinds().is_empty());
    }
}
