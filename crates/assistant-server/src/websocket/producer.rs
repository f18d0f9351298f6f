//! Producer socket lifecycle, from upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::relay::Relay;

/// Run the producer session for one upgraded socket.
///
/// 1. Attaches to the relay, which queues `hello`
/// 2. Drains the outbound queue into the socket from a writer task
/// 3. Dispatches inbound text frames in arrival order
/// 4. Detaches on close, socket error, supersession or shutdown
#[instrument(skip_all)]
pub async fn run_producer_session(ws: WebSocket, relay: Arc<Relay>, shutdown: CancellationToken) {
    let attachment = match relay.attach_producer() {
        Ok(attachment) => attachment,
        Err(e) => {
            warn!(error = %e, "failed to attach producer");
            return;
        }
    };
    let conn_id = attachment.conn_id;
    let mut outbound = attachment.outbound;
    info!(conn_id = %conn_id, "producer connected");

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Ends when the relay drops our sender (superseded) or the socket fails.
    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => relay.handle_producer_text(&conn_id, text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    debug!(conn_id = %conn_id, len = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "producer socket error");
                    break;
                }
            },
            _ = &mut writer => {
                debug!(conn_id = %conn_id, "producer writer finished");
                break;
            }
            () = shutdown.cancelled() => break,
        }
    }

    relay.detach_producer(&conn_id);
    writer.abort();
    info!(conn_id = %conn_id, "producer disconnected");
}
