use std::time::Duration;

use hyper::body::{Bytes, Sender};
use tokio::time::{interval_at, timeout, Instant};
use tracing::warn;

use super::{Disconnect, SessionConfig};
use crate::events::format::{self, SSE_KEEPALIVE};
use crate::events::Subscription;

async fn send(sink: &mut Sender, chunk: String, deadline: Duration) -> Result<(), Disconnect> {
    match timeout(deadline, sink.send_data(Bytes::from(chunk))).await {
        Ok(Ok(())) => Ok(()),
        // the response body was dropped, i.e. the client went away
        Ok(Err(_)) => Err(Disconnect::PeerClosed),
        Err(_) => Err(Disconnect::WriteTimeout),
    }
}

/// Streams SSE frames into a response body until the client disconnects or
/// the broker closes the queue. A keepalive comment goes out once the stream
/// has been idle for a heartbeat, and doubles as the check that notices a
/// client which left in the meantime.
pub async fn stream(
    mut subscription: Subscription,
    mut sink: Sender,
    config: &SessionConfig,
) -> Disconnect {
    let id = subscription.id();
    if let Err(reason) = send(&mut sink, format::sse_connected(), config.write_timeout).await {
        return reason;
    }

    let mut heartbeat = interval_at(Instant::now() + config.heartbeat, config.heartbeat);
    loop {
        let written = tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => match format::sse_frame(&event) {
                    Ok(frame) => send(&mut sink, frame, config.write_timeout).await.map(|()| true),
                    Err(err) => {
                        warn!(client_id = %id, kind = %event.kind(), error = %err, "skipping event that failed to serialize");
                        Ok(false)
                    }
                },
                None => return Disconnect::Unsubscribed,
            },
            _ = heartbeat.tick() => {
                send(&mut sink, SSE_KEEPALIVE.to_string(), config.write_timeout)
                    .await
                    .map(|()| false)
            }
        };
        match written {
            // keepalives only fill gaps between events
            Ok(true) => heartbeat.reset(),
            Ok(false) => {}
            Err(reason) => return reason,
        }
    }
}
