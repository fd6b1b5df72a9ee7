//! WebSocket session: three loops over one connection.
//!
//! - the event loop turns queued events and heartbeat ticks into frames,
//! - the read loop watches the peer (pings, pongs, close, read deadline),
//! - the write loop is the only writer of the socket.
//!
//! The first two feed the write loop through a bounded outbound buffer. A
//! full buffer means the socket cannot keep up and the client is evicted.
//! Every loop ends with the reason the session closed, and the first reason
//! wins.

use std::time::Duration;

use futures::future::try_join3;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, trace, warn};

use super::{Disconnect, SessionConfig};
use crate::events::format::{self, Envelope};
use crate::events::Subscription;
use crate::shared::types::ClientId;
use crate::ws::{read_client_frame, write_frame, Frame, Opcode};

pub const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug)]
enum Outbound {
    Frame(Frame),
    /// Send a close frame, then end the session for the given reason.
    Close(Disconnect),
}

fn enqueue(outbound: &mpsc::Sender<Outbound>, item: Outbound) -> Result<(), Disconnect> {
    outbound.try_send(item).map_err(|err| match err {
        TrySendError::Full(_) => Disconnect::Backpressure,
        // the write loop already ended and reported why
        TrySendError::Closed(_) => Disconnect::PeerClosed,
    })
}

async fn event_loop(
    mut subscription: Subscription,
    outbound: mpsc::Sender<Outbound>,
    heartbeat: Duration,
) -> Result<(), Disconnect> {
    let id = subscription.id();
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => match format::ws_message(&event) {
                    Ok(text) => enqueue(&outbound, Outbound::Frame(Frame::text(text)))?,
                    Err(err) => {
                        warn!(client_id = %id, kind = %event.kind(), error = %err, "skipping event that failed to serialize");
                    }
                },
                None => {
                    enqueue(&outbound, Outbound::Close(Disconnect::Unsubscribed))?;
                    return Ok(());
                }
            },
            _ = ticker.tick() => enqueue(&outbound, Outbound::Frame(Frame::ping()))?,
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    id: ClientId,
    mut reader: R,
    outbound: mpsc::Sender<Outbound>,
    read_timeout: Duration,
) -> Result<(), Disconnect> {
    loop {
        let frame = match timeout(read_timeout, read_client_frame(&mut reader)).await {
            Ok(frame) => frame?,
            Err(_) => return Err(Disconnect::ReadTimeout),
        };
        match frame.opcode {
            Opcode::Ping => enqueue(&outbound, Outbound::Frame(Frame::pong(frame.payload)))?,
            Opcode::Pong => trace!(client_id = %id, "pong"),
            Opcode::Close => {
                enqueue(&outbound, Outbound::Close(Disconnect::PeerClosed))?;
                return Ok(());
            }
            // inbound messages are accepted but have no meaning yet
            Opcode::Text => {
                debug!(client_id = %id, message = %String::from_utf8_lossy(&frame.payload), "message from client");
            }
            Opcode::Binary | Opcode::Continuation => {
                debug!(client_id = %id, bytes = frame.payload.len(), "ignoring non-text frame");
            }
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut queued: mpsc::Receiver<Outbound>,
    write_timeout: Duration,
) -> Result<(), Disconnect> {
    while let Some(item) = queued.recv().await {
        let (frame, reason) = match item {
            Outbound::Frame(frame) => (frame, None),
            Outbound::Close(reason) => (Frame::close(), Some(reason)),
        };
        match timeout(write_timeout, write_frame(&mut writer, &frame)).await {
            Ok(written) => written?,
            Err(_) => return Err(Disconnect::WriteTimeout),
        }
        if let Some(reason) = reason {
            return Err(reason);
        }
    }
    Ok(())
}

/// Runs a session on an upgraded connection until it closes. The
/// subscription and the connection are both dropped before this returns.
pub async fn run<S>(io: S, subscription: Subscription, config: &SessionConfig) -> Disconnect
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let id = subscription.id();
    let (reader, writer) = tokio::io::split(io);
    let (outbound, queued) = mpsc::channel(OUTBOUND_CAPACITY);

    let hello = match Envelope::connected().and_then(|hello| hello.to_json()) {
        Ok(hello) => hello,
        Err(err) => return Disconnect::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
    };
    if let Err(reason) = enqueue(&outbound, Outbound::Frame(Frame::text(hello))) {
        return reason;
    }

    let outcome = try_join3(
        write_loop(writer, queued, config.write_timeout),
        read_loop(id, reader, outbound.clone(), config.read_timeout),
        event_loop(subscription, outbound, config.heartbeat),
    )
    .await;

    match outcome {
        Err(reason) => reason,
        // every sender is gone and the write loop drained the buffer
        Ok(_) => Disconnect::PeerClosed,
    }
}
