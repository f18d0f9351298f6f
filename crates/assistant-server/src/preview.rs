//! `GET /preview`: live MJPEG stream for preview viewers.
//!
//! The response body owns the [`PreviewSubscription`]. When the viewer goes
//! away hyper drops the body, the subscription guard drops with it, and the
//! broadcaster sees the viewer leave. A failed write is just the end of the
//! stream.

use std::convert::Infallible;

use assistant_core::constants::{PREVIEW_BOUNDARY, PREVIEW_PART_CONTENT_TYPE};
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::relay::preview::PreviewSubscription;

/// `Content-Type` of the whole preview response.
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={PREVIEW_BOUNDARY}")
}

/// Frame one JPEG as a multipart part, trailing separator included.
pub fn encode_part(frame: &[u8]) -> Bytes {
    let header = format!(
        "--{PREVIEW_BOUNDARY}\r\nContent-Type: {PREVIEW_PART_CONTENT_TYPE}\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 4);
    part.put_slice(header.as_bytes());
    part.put_slice(frame);
    part.put_slice(b"\r\n\r\n");
    part.freeze()
}

/// Stream frames from `subscription` until the viewer leaves or the server
/// shuts down.
pub fn preview_response(subscription: PreviewSubscription, shutdown: CancellationToken) -> Response {
    let body = async_stream::stream! {
        let mut subscription = subscription;
        debug!(subscriber = %subscription.id(), "preview stream started");
        loop {
            let frame = tokio::select! {
                frame = subscription.next_frame() => frame,
                () = shutdown.cancelled() => None,
            };
            let Some(frame) = frame else { break };
            yield Ok::<Bytes, Infallible>(encode_part(&frame));
        }
        debug!(subscriber = %subscription.id(), "preview stream ended");
    };

    ([(header::CONTENT_TYPE, content_type())], Body::from_stream(body)).into_response()
}
