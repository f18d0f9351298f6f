//! Consumer socket lifecycle.
//!
//! Requests on one connection are served one after another. A reader task
//! keeps watching the socket while a request is in flight so a disconnect
//! abandons the wait immediately and releases its pending slot.
//!
//! Shutdown is only observed between requests. A request in flight is failed
//! by the relay closing, and that failure is still written back.

use std::sync::Arc;
use std::time::Duration;

use assistant_core::ConsumerId;
use assistant_core::protocol::{ConsumerMessage, ConsumerReply};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::relay::Relay;

/// Run the consumer session for one upgraded socket.
#[instrument(skip_all)]
pub async fn run_consumer_session(
    ws: WebSocket,
    relay: Arc<Relay>,
    timeout: Option<Duration>,
    shutdown: CancellationToken,
) {
    let client_id = ConsumerId::new();
    info!(client_id = %client_id, "consumer connected");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();
    let closed = CancellationToken::new();

    let reader_closed = closed.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    if inbound_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        reader_closed.cancel();
    });

    let session = relay.consumer(timeout);

    loop {
        let text = tokio::select! {
            text = inbound_rx.recv() => match text {
                Some(text) => text,
                None => break,
            },
            () = shutdown.cancelled() => break,
        };

        let reply = match ConsumerMessage::parse(&text) {
            Ok(ConsumerMessage::Request { data }) => {
                tokio::select! {
                    result = session.request(data) => match result {
                        Ok(response) => ConsumerReply::Response { data: response },
                        Err(e) => {
                            warn!(client_id = %client_id, error = %e, "request failed");
                            ConsumerReply::from(&e)
                        }
                    },
                    () = closed.cancelled() => {
                        debug!(client_id = %client_id, "consumer left while waiting");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "unsupported consumer message");
                ConsumerReply::from(&e)
            }
        };

        let text = match reply.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "failed to encode reply");
                continue;
            }
        };
        if ws_tx.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }

    reader.abort();
    let _ = ws_tx.close().await;
    info!(client_id = %client_id, "consumer disconnected");
}
